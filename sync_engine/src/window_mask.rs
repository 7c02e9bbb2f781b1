//! Visible-residue subsets for an alignment viewport.

use crate::position_mapper::PositionMapper;
use shared::{ChainId, ColorRule, PaintScope, ResidueId, ViewportRange};
use std::collections::BTreeSet;

/// Residues of one chain to keep visible. `visible` always contains `pinned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMask {
    pub chain_id: ChainId,
    pub visible: BTreeSet<ResidueId>,
    pub pinned: BTreeSet<ResidueId>,
}

impl WindowMask {
    /// Residues natively mapped into `range`, plus residues under an active
    /// rule whose column lies in `range` wherever their own mapping puts them.
    pub fn compute<'a>(
        scope: &PaintScope,
        chain_id: &str,
        mapper: &PositionMapper,
        range: ViewportRange,
        rules: impl IntoIterator<Item = &'a ColorRule>,
    ) -> Self {
        let pinned = pinned_residues(scope, chain_id, mapper, range, rules);
        let mut visible: BTreeSet<ResidueId> = mapper.columns_in(range).map(|(_, residue)| residue).collect();
        visible.extend(pinned.iter().copied());
        Self {
            chain_id: chain_id.to_string(),
            visible,
            pinned,
        }
    }
}

/// A residue target is pinned when the column it was derived from is inside
/// the window. Targets without an anchor fall back to their own mapped
/// column, then to any grid column the owning rule paints.
fn pinned_residues<'a>(
    scope: &PaintScope,
    chain_id: &str,
    mapper: &PositionMapper,
    range: ViewportRange,
    rules: impl IntoIterator<Item = &'a ColorRule>,
) -> BTreeSet<ResidueId> {
    let mut pinned = BTreeSet::new();
    for rule in rules {
        let rule_in_range = rule.grid_columns().any(|column| range.contains(column));
        for target in &rule.residues {
            if &target.scope != scope || target.chain_id != chain_id {
                continue;
            }
            let in_range = match target.anchor_column {
                Some(anchor) => range.contains(anchor),
                None => {
                    mapper
                        .residue_to_column(target.residue_id)
                        .is_some_and(|column| range.contains(column))
                        || rule_in_range
                }
            };
            if in_range {
                pinned.insert(target.residue_id);
            }
        }
    }
    pinned
}
