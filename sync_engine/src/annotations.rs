//! Turn upstream annotation lists (ligand neighborhoods, variants) into color
//! rules.

use crate::position_mapper::PositionMapper;
use shared::{CellKey, Color, ColorRule, LigandSite, ResidueTarget, RowIndex, RuleKind, Variant, VariantKind};

const LIGAND_PALETTE: &[(&str, &str)] = &[
    ("GTP", "#4363d8"),
    ("GDP", "#ffd700"),
    ("TAX", "#3cb44b"),
    ("TXL", "#3cb44b"),
    ("EPO", "#f58231"),
    ("VLB", "#e6194b"),
    ("COL", "#911eb4"),
    ("MG", "#42d4f4"),
    ("CA", "#f032e6"),
    ("ZN", "#bfef45"),
];

/// Fixed colors for common ligands; anything else gets a stable hue derived
/// from its id.
pub fn ligand_color(ligand_id: &str) -> Color {
    if let Some((_, color)) = LIGAND_PALETTE.iter().find(|(id, _)| *id == ligand_id) {
        return Color::new(color);
    }
    // hash = c + hash * 31, with the shift wrapping at 32 bits.
    let hash = ligand_id.encode_utf16().fold(0_i64, |hash, unit| {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        i64::from(unit) + (shifted - hash)
    });
    Color::new(format!("hsl({}, 70%, 50%)", hash.abs() % 360))
}

pub fn variant_color(kind: VariantKind) -> Color {
    match kind {
        VariantKind::Substitution => Color::new("#f97316"),
        VariantKind::Insertion => Color::new("#22c55e"),
        VariantKind::Deletion => Color::new("#ef4444"),
    }
}

/// Rule for one ligand's neighborhood on `chain_id`, shown in grid row `row`.
/// Every neighborhood residue paints the structure; only residues with an
/// alignment column also paint a grid cell.
pub fn ligand_site_rule(
    site: &LigandSite,
    chain_id: &str,
    row: RowIndex,
    mapper: &PositionMapper,
    priority: i32,
) -> ColorRule {
    let color = site.color.clone().unwrap_or_else(|| ligand_color(&site.ligand_id));
    let mut cells = Vec::new();
    let mut residues = Vec::with_capacity(site.neighborhood.len());

    for residue_id in &site.neighborhood {
        let mut target = ResidueTarget::primary(chain_id, *residue_id);
        if let Some(column) = mapper.residue_to_column(*residue_id) {
            cells.push(CellKey::new(row, column));
            target = target.anchored_at(column);
        }
        residues.push(target);
    }

    ColorRule::new(site.id.clone(), RuleKind::BindingSite, priority, color)
        .with_label(site.ligand_name.clone().unwrap_or_else(|| site.ligand_id.clone()))
        .with_cells(cells)
        .with_residues(residues)
}

/// One rule per variant that resolved to a residue; the rest are skipped.
pub fn variant_rules(
    chain_key: &str,
    chain_id: &str,
    row: RowIndex,
    variants: &[Variant],
    priority: i32,
) -> Vec<ColorRule> {
    variants
        .iter()
        .filter_map(|variant| {
            let residue_id = variant.residue_id?;
            let rule = ColorRule::new(
                format!("{}{}", variant_id_prefix(chain_key), variant.column),
                RuleKind::Mutation,
                priority,
                variant_color(variant.kind),
            )
            .with_cells([CellKey::new(row, variant.column)])
            .with_residues([ResidueTarget::primary(chain_id, residue_id).anchored_at(variant.column)]);
            Some(match variant_label(variant) {
                Some(label) => rule.with_label(label),
                None => rule,
            })
        })
        .collect()
}

/// Every variant rule of `chain_key` has an id starting with this.
pub fn variant_id_prefix(chain_key: &str) -> String {
    format!("variant_{}_", chain_key)
}

fn variant_label(variant: &Variant) -> Option<String> {
    match (&variant.from_residue, &variant.to_residue) {
        (Some(from), Some(to)) => Some(format!("{}{}{}", from, variant.column, to)),
        _ => variant.phenotype.clone(),
    }
}
