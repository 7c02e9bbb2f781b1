use serde::{Deserialize, Serialize};
use std::fmt;

// ===== IDENTIFIERS =====

/// Index into the alignment's shared column axis.
pub type Column = u32;
/// Zero-based row of one sequence in the alignment grid.
pub type RowIndex = u32;
/// A structure file's native per-chain residue number (may be negative, has gaps).
pub type ResidueId = i32;
pub type ChainId = String;
pub type AlignedStructureId = String;

/// Canonical chain key: `"{STRUCTURE_ID_UPPERCASE}_{chain}"`, e.g. `"1JFF_B"`.
pub fn make_chain_key(structure_id: &str, chain_id: &str) -> String {
    format!("{}_{}", structure_id.to_uppercase(), chain_id)
}

/// Chain id from a canonical chain key. Structure ids never contain `_`,
/// so everything after the first underscore is the chain.
pub fn chain_from_key(chain_key: &str) -> Option<&str> {
    chain_key
        .split_once('_')
        .map(|(_, chain)| chain)
        .filter(|chain| !chain.is_empty())
}

// ===== COLORS =====

/// Paint color. Hex forms are normalized to lowercase so `#FF0000` and
/// `#ff0000` compare equal; other CSS forms (`hsl(...)`) are kept verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn new(value: impl AsRef<str>) -> Self {
        let trimmed = value.as_ref().trim();
        if trimmed.starts_with('#') {
            Self(trimmed.to_ascii_lowercase())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Packed `0xRRGGBB` value for `#rrggbb` / `#rgb` colors.
    pub fn rgb(&self) -> Option<u32> {
        let hex = self.0.strip_prefix('#')?;
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok(),
            3 => {
                let short = u32::from_str_radix(hex, 16).ok()?;
                let r = (short >> 8) & 0xf;
                let g = (short >> 4) & 0xf;
                let b = short & 0xf;
                Some((r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11))
            }
            _ => None,
        }
    }
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        Color::new(value)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Color::new(value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ===== COLOR RULES =====

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    BindingSite,
    Mutation,
    Annotation,
    Custom,
}

/// Which structure a residue target is painted on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaintScope {
    #[default]
    Primary,
    Aligned(AlignedStructureId),
}

impl PaintScope {
    pub fn aligned(id: impl Into<AlignedStructureId>) -> Self {
        PaintScope::Aligned(id.into())
    }
}

impl fmt::Display for PaintScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaintScope::Primary => f.write_str("primary"),
            PaintScope::Aligned(id) => write!(f, "aligned:{}", id),
        }
    }
}

/// One `(row, column)` cell of the grid. Renderers key cell palettes by the
/// `"row-column"` form produced by `Display`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: RowIndex,
    pub column: Column,
}

impl CellKey {
    pub fn new(row: RowIndex, column: Column) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.column)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResidueTarget {
    #[serde(default)]
    pub scope: PaintScope,
    pub chain_id: ChainId,
    pub residue_id: ResidueId,
    /// Alignment column this residue was derived from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_column: Option<Column>,
}

impl ResidueTarget {
    pub fn primary(chain_id: impl Into<ChainId>, residue_id: ResidueId) -> Self {
        Self {
            scope: PaintScope::Primary,
            chain_id: chain_id.into(),
            residue_id,
            anchor_column: None,
        }
    }

    pub fn in_scope(mut self, scope: PaintScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn anchored_at(mut self, column: Column) -> Self {
        self.anchor_column = Some(column);
        self
    }
}

/// A prioritized directive to paint grid columns, grid cells and/or
/// structure residues with one color.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ColorRule {
    pub id: String,
    pub kind: RuleKind,
    /// Higher wins.
    pub priority: i32,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cells: Vec<CellKey>,
    #[serde(default)]
    pub residues: Vec<ResidueTarget>,
}

impl ColorRule {
    pub fn new(id: impl Into<String>, kind: RuleKind, priority: i32, color: impl Into<Color>) -> Self {
        Self {
            id: id.into(),
            kind,
            priority,
            color: color.into(),
            label: None,
            columns: Vec::new(),
            cells: Vec::new(),
            residues: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn with_cells(mut self, cells: impl IntoIterator<Item = CellKey>) -> Self {
        self.cells.extend(cells);
        self
    }

    pub fn with_residues(mut self, residues: impl IntoIterator<Item = ResidueTarget>) -> Self {
        self.residues.extend(residues);
        self
    }

    pub fn has_targets(&self) -> bool {
        !(self.columns.is_empty() && self.cells.is_empty() && self.residues.is_empty())
    }

    /// Every grid column this rule touches, whole-column or single-cell.
    pub fn grid_columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns
            .iter()
            .copied()
            .chain(self.cells.iter().map(|cell| cell.column))
    }
}

// ===== ALIGNED STRUCTURES =====

/// A secondary structure superimposed onto the primary structure's frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlignedStructure {
    pub id: AlignedStructureId,
    pub source_structure: String,
    pub source_chain: ChainId,
    /// Chain of the primary structure this one is superimposed onto.
    pub target_chain_id: ChainId,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmsd: Option<f64>,
}

fn default_visible() -> bool {
    true
}

// ===== VIEWPORT =====

/// Inclusive range of alignment columns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportRange {
    pub start: Column,
    pub end: Column,
}

impl ViewportRange {
    /// Endpoints may arrive in either order from drag gestures.
    pub fn new(a: Column, b: Column) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn contains(&self, column: Column) -> bool {
        self.start <= column && column <= self.end
    }

    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }
}

// ===== ANNOTATIONS =====

/// Residues surrounding one bound ligand instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LigandSite {
    /// e.g. `"GTP_A_501"`
    pub id: String,
    pub ligand_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ligand_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    pub neighborhood: Vec<ResidueId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Substitution,
    Insertion,
    Deletion,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Variant {
    pub column: Column,
    /// Resolved from the chain's mapping upstream; `None` when unmapped.
    #[serde(default)]
    pub residue_id: Option<ResidueId>,
    pub kind: VariantKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_residue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_residue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenotype: Option<String>,
}

// ===== ACTIONS =====

/// Closed action vocabulary accepted by the dispatcher.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    AddColorRule {
        rule: ColorRule,
    },
    RemoveColorRule {
        id: String,
    },
    ClearColors,
    SetColorScheme {
        scheme: String,
    },
    HighlightResidue {
        chain_id: ChainId,
        #[serde(default)]
        residue_id: Option<ResidueId>,
        #[serde(default)]
        column: Option<Column>,
    },
    ClearHighlight,
    FocusResidue {
        chain_id: ChainId,
        #[serde(default)]
        residue_id: Option<ResidueId>,
        #[serde(default)]
        column: Option<Column>,
    },
    FocusRange {
        chain_id: ChainId,
        start_residue: ResidueId,
        end_residue: ResidueId,
        #[serde(default)]
        column_start: Option<Column>,
        #[serde(default)]
        column_end: Option<Column>,
    },
    JumpToRange {
        start: Column,
        end: Column,
    },
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::AddColorRule { .. } => "ADD_COLOR_RULE",
            SyncAction::RemoveColorRule { .. } => "REMOVE_COLOR_RULE",
            SyncAction::ClearColors => "CLEAR_COLORS",
            SyncAction::SetColorScheme { .. } => "SET_COLOR_SCHEME",
            SyncAction::HighlightResidue { .. } => "HIGHLIGHT_RESIDUE",
            SyncAction::ClearHighlight => "CLEAR_HIGHLIGHT",
            SyncAction::FocusResidue { .. } => "FOCUS_RESIDUE",
            SyncAction::FocusRange { .. } => "FOCUS_RANGE",
            SyncAction::JumpToRange { .. } => "JUMP_TO_RANGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_is_normalized() {
        let color = Color::new(" #FF00aa ");
        assert_eq!(color.as_str(), "#ff00aa");
        assert_eq!(color, Color::from("#ff00AA"));
        assert_eq!(color.rgb(), Some(0xff00aa));
    }

    #[test]
    fn test_color_short_hex_expands() {
        assert_eq!(Color::new("#f0a").rgb(), Some(0xff00aa));
        assert_eq!(Color::new("hsl(120, 70%, 50%)").rgb(), None);
        assert_eq!(Color::new("hsl(120, 70%, 50%)").as_str(), "hsl(120, 70%, 50%)");
    }

    #[test]
    fn test_cell_key_uses_row_column_form() {
        assert_eq!(CellKey::new(3, 57).to_string(), "3-57");
    }

    #[test]
    fn test_viewport_range_orders_endpoints() {
        let range = ViewportRange::new(150, 100);
        assert_eq!(range, ViewportRange { start: 100, end: 150 });
        assert!(range.contains(100));
        assert!(range.contains(150));
        assert!(!range.contains(151));
        assert_eq!(range.len(), 51);
        assert_eq!(ViewportRange::new(0, u32::MAX).len(), 1 << 32);
    }

    #[test]
    fn test_chain_keys() {
        assert_eq!(make_chain_key("1jff", "B"), "1JFF_B");
        assert_eq!(chain_from_key("1JFF_B"), Some("B"));
        assert_eq!(chain_from_key("1JFF_"), None);
        assert_eq!(chain_from_key("1JFF"), None);
    }

    #[test]
    fn test_grid_columns_cover_columns_and_cells() {
        let rule = ColorRule::new("r", RuleKind::Custom, 1, "#000000")
            .with_columns([4, 5])
            .with_cells([CellKey::new(0, 9)]);
        assert_eq!(rule.grid_columns().collect::<Vec<_>>(), vec![4, 5, 9]);
        assert!(rule.has_targets());
        assert!(!ColorRule::new("e", RuleKind::Custom, 1, "#000000").has_targets());
    }

    #[test]
    fn test_actions_use_screaming_tags() {
        let json = r##"{"type":"ADD_COLOR_RULE","rule":{"id":"lig1","kind":"binding-site","priority":10,"color":"#FF0000","columns":[12,13,14]}}"##;
        let action: SyncAction = serde_json::from_str(json).unwrap();
        match &action {
            SyncAction::AddColorRule { rule } => {
                assert_eq!(rule.kind, RuleKind::BindingSite);
                assert_eq!(rule.color.as_str(), "#ff0000");
                assert_eq!(rule.columns, vec![12, 13, 14]);
                assert!(rule.residues.is_empty());
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(action.name(), "ADD_COLOR_RULE");

        let clear: SyncAction = serde_json::from_str(r#"{"type":"CLEAR_COLORS"}"#).unwrap();
        assert_eq!(clear, SyncAction::ClearColors);
    }

    #[test]
    fn test_actions_parse_from_toml() {
        let action: SyncAction = toml::from_str(
            r#"
            type = "HIGHLIGHT_RESIDUE"
            chain_id = "A"
            column = 42
            "#,
        )
        .unwrap();
        assert_eq!(
            action,
            SyncAction::HighlightResidue {
                chain_id: "A".to_string(),
                residue_id: None,
                column: Some(42),
            }
        );
    }

    #[test]
    fn test_residue_target_defaults_to_primary_scope() {
        let target: ResidueTarget =
            serde_json::from_str(r#"{"chain_id":"A","residue_id":105}"#).unwrap();
        assert_eq!(target, ResidueTarget::primary("A", 105));

        let aligned: ResidueTarget = serde_json::from_str(
            r#"{"scope":{"aligned":"s2"},"chain_id":"B","residue_id":7,"anchor_column":3}"#,
        )
        .unwrap();
        assert_eq!(aligned.scope, PaintScope::aligned("s2"));
        assert_eq!(aligned.anchor_column, Some(3));
    }
}
