//! Alignment column ⇄ residue id translation for one chain.

use shared::{Column, ResidueId, ViewportRange};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Partial bijection between alignment columns and a chain's native residue
/// numbering. Gap columns have no residue; residues outside the alignment have
/// no column. Immutable once built: a realigned chain gets a new mapper.
#[derive(Debug, Default)]
pub struct PositionMapper {
    forward: BTreeMap<Column, ResidueId>,
    inverse: OnceLock<HashMap<ResidueId, Column>>,
}

impl PositionMapper {
    /// Build from raw `(column, residue)` entries where `None` marks a gap.
    pub fn new(entries: impl IntoIterator<Item = (Column, Option<ResidueId>)>) -> Self {
        Self::from_pairs(
            entries
                .into_iter()
                .filter_map(|(column, residue)| residue.map(|residue| (column, residue))),
        )
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Column, ResidueId)>) -> Self {
        Self {
            forward: pairs.into_iter().collect(),
            inverse: OnceLock::new(),
        }
    }

    pub fn column_to_residue(&self, column: Column) -> Option<ResidueId> {
        self.forward.get(&column).copied()
    }

    pub fn residue_to_column(&self, residue: ResidueId) -> Option<Column> {
        self.inverse().get(&residue).copied()
    }

    /// Mapped `(column, residue)` pairs inside `range`, in column order.
    pub fn columns_in(&self, range: ViewportRange) -> impl Iterator<Item = (Column, ResidueId)> + '_ {
        self.forward
            .range(range.start..=range.end)
            .map(|(column, residue)| (*column, *residue))
    }

    /// First and last mapped column inside `range`.
    pub fn nearest_mapped_within(&self, range: ViewportRange) -> Option<(Column, Column)> {
        let mut mapped = self.forward.range(range.start..=range.end);
        let (first, _) = mapped.next()?;
        let last = mapped.next_back().map_or(*first, |(column, _)| *column);
        Some((*first, last))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    fn inverse(&self) -> &HashMap<ResidueId, Column> {
        self.inverse.get_or_init(|| {
            let mut inverse = HashMap::with_capacity(self.forward.len());
            // Ascending columns: a residue mapped twice keeps its highest column.
            for (column, residue) in &self.forward {
                if let Some(previous) = inverse.insert(*residue, *column) {
                    log::debug!(
                        "residue {} mapped to columns {} and {}, keeping {}",
                        residue,
                        previous,
                        column,
                        column
                    );
                }
            }
            inverse
        })
    }
}
