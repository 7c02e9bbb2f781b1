//! Priority-ordered color rules and their resolution into per-view paint.

use shared::{AlignedStructureId, CellKey, ChainId, Color, ColorRule, Column, PaintScope, ResidueId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_BACKGROUND: &str = "#ffffff";

pub type SubscriptionId = u64;

type Listener = Arc<dyn Fn(&ColorRuleStore) + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredRule {
    rule: ColorRule,
    /// Assigned on every add; breaks priority ties in favor of the latest add.
    sequence: u64,
}

/// Observable set of color rules, unique by id, kept sorted by descending
/// `(priority, sequence)`. Every effective mutation notifies subscribers
/// synchronously, in mutation order.
pub struct ColorRuleStore {
    rules: Vec<StoredRule>,
    default_color: Color,
    next_sequence: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for ColorRuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorRuleStore")
            .field("rules", &self.rules)
            .field("default_color", &self.default_color)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for ColorRuleStore {
    fn default() -> Self {
        Self::new(Color::new(DEFAULT_BACKGROUND))
    }
}

impl ColorRuleStore {
    pub fn new(default_color: Color) -> Self {
        Self {
            rules: Vec::new(),
            default_color,
            next_sequence: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ColorRuleStore) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Insert or replace the rule with `rule.id`.
    pub fn add_rule(&mut self, rule: ColorRule) {
        self.insert(rule);
        self.sort();
        self.notify();
    }

    /// Insert or replace several rules with a single notification. Later
    /// entries win ties against earlier ones. Returns how many were added.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = ColorRule>) -> usize {
        let mut added = 0;
        for rule in rules {
            self.insert(rule);
            added += 1;
        }
        if added > 0 {
            self.sort();
            self.notify();
        }
        added
    }

    /// Returns `false` and stays silent when no rule has this id.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|stored| stored.rule.id != id);
        if self.rules.len() == before {
            return false;
        }
        log::debug!("color rule '{}' removed", id);
        self.notify();
        true
    }

    /// Remove every rule matching `matches`; one notification at most.
    pub fn remove_where(&mut self, matches: impl Fn(&ColorRule) -> bool) -> usize {
        let before = self.rules.len();
        self.rules.retain(|stored| !matches(&stored.rule));
        let removed = before - self.rules.len();
        if removed > 0 {
            log::debug!("{} color rules removed", removed);
            self.notify();
        }
        removed
    }

    /// Returns `false` and stays silent when already empty.
    pub fn clear_rules(&mut self) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        self.rules.clear();
        self.notify();
        true
    }

    pub fn set_default_color(&mut self, color: Color) -> bool {
        if self.default_color == color {
            return false;
        }
        self.default_color = color;
        self.notify();
        true
    }

    /// Drop residue targets painted on an aligned structure that is going
    /// away; rules left without any target are removed.
    pub fn purge_scope(&mut self, aligned_id: &AlignedStructureId) -> bool {
        let scope = PaintScope::Aligned(aligned_id.clone());
        let mut changed = false;
        for stored in &mut self.rules {
            let before = stored.rule.residues.len();
            stored.rule.residues.retain(|target| target.scope != scope);
            changed |= stored.rule.residues.len() != before;
        }
        if !changed {
            return false;
        }
        self.rules.retain(|stored| stored.rule.has_targets());
        self.notify();
        true
    }

    /// Rules in descending `(priority, sequence)` order.
    pub fn rules(&self) -> impl DoubleEndedIterator<Item = &ColorRule> + '_ {
        self.rules.iter().map(|stored| &stored.rule)
    }

    pub fn get(&self, id: &str) -> Option<&ColorRule> {
        self.rules().find(|rule| rule.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn default_color(&self) -> &Color {
        &self.default_color
    }

    /// Flatten the rules into per-view paint. Walks lowest to highest
    /// `(priority, sequence)` so each stronger rule overwrites weaker ones.
    pub fn resolve(&self) -> ResolvedPaint {
        let mut paint = ResolvedPaint::empty(self.default_color.clone());
        for rule in self.rules().rev() {
            for column in &rule.columns {
                paint.column_colors.insert(*column, rule.color.clone());
            }
            for cell in &rule.cells {
                paint.cell_colors.insert(*cell, rule.color.clone());
            }
            for target in &rule.residues {
                paint
                    .residue_colors
                    .entry(target.scope.clone())
                    .or_default()
                    .insert((target.chain_id.clone(), target.residue_id), rule.color.clone());
            }
        }
        paint
    }

    fn insert(&mut self, rule: ColorRule) {
        self.rules.retain(|stored| stored.rule.id != rule.id);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        log::debug!("color rule '{}' added (priority {}, seq {})", rule.id, rule.priority, sequence);
        self.rules.push(StoredRule { rule, sequence });
    }

    fn sort(&mut self) {
        self.rules
            .sort_by(|a, b| (b.rule.priority, b.sequence).cmp(&(a.rule.priority, a.sequence)));
    }

    fn notify(&self) {
        for (_, listener) in &self.listeners {
            listener(self);
        }
    }
}

/// One residue's paint as handed to a structure adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResiduePaint {
    pub chain_id: ChainId,
    pub residue_id: ResidueId,
    pub color: Color,
}

/// Residues sharing one color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorGroup {
    pub color: Color,
    pub residues: Vec<(ChainId, ResidueId)>,
}

/// Resolved paint for every view, computed from a snapshot of the rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaint {
    pub column_colors: BTreeMap<Column, Color>,
    pub cell_colors: BTreeMap<CellKey, Color>,
    pub residue_colors: BTreeMap<PaintScope, BTreeMap<(ChainId, ResidueId), Color>>,
    pub default_color: Color,
}

impl ResolvedPaint {
    pub fn empty(default_color: Color) -> Self {
        Self {
            column_colors: BTreeMap::new(),
            cell_colors: BTreeMap::new(),
            residue_colors: BTreeMap::new(),
            default_color,
        }
    }

    pub fn has_grid_paint(&self) -> bool {
        !(self.column_colors.is_empty() && self.cell_colors.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_grid_paint() && self.residue_colors.values().all(BTreeMap::is_empty)
    }

    /// Paint list for one structure, sorted by chain then residue. Empty means
    /// the structure should show its default colors.
    pub fn residue_paint(&self, scope: &PaintScope) -> Vec<ResiduePaint> {
        self.residue_colors
            .get(scope)
            .map(|residues| {
                residues
                    .iter()
                    .map(|((chain_id, residue_id), color)| ResiduePaint {
                        chain_id: chain_id.clone(),
                        residue_id: *residue_id,
                        color: color.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn color_groups(&self, scope: &PaintScope) -> Vec<ColorGroup> {
        let mut groups: BTreeMap<&Color, Vec<(ChainId, ResidueId)>> = BTreeMap::new();
        if let Some(residues) = self.residue_colors.get(scope) {
            for ((chain_id, residue_id), color) in residues {
                groups.entry(color).or_default().push((chain_id.clone(), *residue_id));
            }
        }
        groups
            .into_iter()
            .map(|(color, residues)| ColorGroup {
                color: color.clone(),
                residues,
            })
            .collect()
    }

    /// Cell palette keyed the way grid renderers expect (`"row-column"`).
    pub fn cell_palette(&self) -> BTreeMap<String, Color> {
        self.cell_colors
            .iter()
            .map(|(cell, color)| (cell.to_string(), color.clone()))
            .collect()
    }
}
