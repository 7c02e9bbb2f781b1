//! Action router between the alignment grid and the structure views.

use crate::adapters::{AdapterError, MsaAdapter, StructureAdapter};
use crate::annotations::{ligand_site_rule, variant_id_prefix, variant_rules};
use crate::color_rules::{ColorRuleStore, ResolvedPaint};
use crate::config::SyncConfig;
use crate::dataflow::{Mailbox, MailboxReceiver, Relay, TaskHandle, mailbox, relay};
use crate::error::{SyncError, View, report};
use crate::pipeline::{
    AlignedView, ChainContext, Highlight, RepaintWorker, SyncEvent, ViewportEvent, Views, WindowWorker,
    lock, push_grid_paint,
};
use crate::position_mapper::PositionMapper;
use futures::channel::mpsc::UnboundedReceiver;
use shared::{
    AlignedStructure, AlignedStructureId, CellKey, ChainId, Color, ColorRule, Column, LigandSite, PaintScope,
    ResidueId, ResidueTarget, RowIndex, RuleKind, SyncAction, Variant, ViewportRange, chain_from_key,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const BINDING_SITE_PRIORITY: i32 = 10;
pub const MUTATION_PRIORITY: i32 = 5;

/// One marked grid position for `add_mutations`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationMark {
    pub column: Column,
    pub color: Color,
}

/// Snapshot of the rule store.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    pub rules: Vec<ColorRule>,
    pub default_color: Color,
}

/// Routes `SyncAction`s to the rule store and the view adapters.
///
/// Rule mutations reach the views through the store subscription: the grid
/// synchronously, structures through the debounced repaint worker. Navigation
/// actions (highlight, focus, jump) go straight to the adapters. A side whose
/// adapter is not attached is skipped.
///
/// Must be created inside a tokio runtime; the workers stop when the
/// dispatcher is dropped.
pub struct SyncDispatcher {
    config: SyncConfig,
    store: Arc<Mutex<ColorRuleStore>>,
    views: Arc<Mutex<Views>>,
    /// Grid paint resolved by the last store mutation, pushed once the store
    /// is unlocked. The lock also serializes grid pushes.
    grid_inbox: Mutex<MailboxReceiver<Arc<ResolvedPaint>>>,
    repaint_mailbox: Mailbox<Arc<ResolvedPaint>>,
    window_mailbox: Mailbox<ViewportEvent>,
    repaint_in_flight: Arc<AtomicBool>,
    _repaint_worker: TaskHandle,
    _window_worker: TaskHandle,
}

impl SyncDispatcher {
    pub fn new(config: SyncConfig) -> Self {
        Self::build(config, Relay::default())
    }

    /// Like `new`, also returning the stream of worker outcomes.
    pub fn with_events(config: SyncConfig) -> (Self, UnboundedReceiver<SyncEvent>) {
        let (sync_event_relay, sync_event_stream) = relay();
        (Self::build(config, sync_event_relay), sync_event_stream)
    }

    fn build(config: SyncConfig, sync_event_relay: Relay<SyncEvent>) -> Self {
        let store = Arc::new(Mutex::new(ColorRuleStore::new(config.default_color.clone())));
        let views = Arc::new(Mutex::new(Views::default()));
        let (grid_mailbox, grid_inbox) = mailbox();
        let (repaint_mailbox, repaint_inbox) = mailbox();
        let (window_mailbox, window_inbox) = mailbox();
        let repaint_in_flight = Arc::new(AtomicBool::new(false));

        lock(&store).subscribe({
            let views = Arc::clone(&views);
            let repaint_mailbox = repaint_mailbox.clone();
            let window_mailbox = window_mailbox.clone();
            move |store: &ColorRuleStore| {
                let paint = Arc::new(store.resolve());
                let window = lock(&views).window;
                grid_mailbox.post(Arc::clone(&paint));
                repaint_mailbox.post(paint);
                // Pins follow the rules.
                if let Some(range) = window {
                    window_mailbox.post(ViewportEvent::Range(range));
                }
            }
        });

        let repaint_worker = TaskHandle::start_droppable(
            RepaintWorker {
                inbox: repaint_inbox,
                views: Arc::clone(&views),
                debounce: config.repaint_debounce(),
                source_tag: config.structure_source_tag.clone(),
                in_flight: Arc::clone(&repaint_in_flight),
                repaint_completed_relay: sync_event_relay.clone(),
            }
            .run(),
        );
        let window_worker = TaskHandle::start_droppable(
            WindowWorker {
                inbox: window_inbox,
                store: Arc::clone(&store),
                views: Arc::clone(&views),
                debounce: config.window_debounce(),
                window_applied_relay: sync_event_relay,
            }
            .run(),
        );

        Self {
            config,
            store,
            views,
            grid_inbox: Mutex::new(grid_inbox),
            repaint_mailbox,
            window_mailbox,
            repaint_in_flight,
            _repaint_worker: repaint_worker,
            _window_worker: window_worker,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ===== ACTIONS =====

    pub fn dispatch(&self, action: SyncAction) {
        log::debug!("dispatch {}", action.name());
        match action {
            SyncAction::AddColorRule { rule } => self.update_store(|store| store.add_rule(rule)),
            SyncAction::RemoveColorRule { id } => {
                if !self.update_store(|store| store.remove_rule(&id)) {
                    log::debug!("REMOVE_COLOR_RULE: no rule '{}'", id);
                }
            }
            SyncAction::ClearColors => self.clear_colors(),
            SyncAction::SetColorScheme { scheme } => self.switch_color_scheme(&scheme),
            SyncAction::HighlightResidue {
                chain_id,
                residue_id,
                column,
            } => self.highlight_residue(&chain_id, residue_id, column),
            SyncAction::ClearHighlight => self.clear_highlight_views(),
            SyncAction::FocusResidue {
                chain_id,
                residue_id,
                column,
            } => self.focus_residue(&chain_id, residue_id, column),
            SyncAction::FocusRange {
                chain_id,
                start_residue,
                end_residue,
                column_start,
                column_end,
            } => self.focus_range(&chain_id, start_residue, end_residue, column_start.zip(column_end)),
            SyncAction::JumpToRange { start, end } => self.jump_to_range(ViewportRange::new(start, end)),
        }
    }

    fn clear_colors(&self) {
        // A non-empty store notifies, which clears the grid and posts a
        // default-paint repaint; an empty one must do both here instead.
        let changed = self.update_store(ColorRuleStore::clear_rules);
        if !changed {
            self.restore_defaults("CLEAR_COLORS");
        }
    }

    fn switch_color_scheme(&self, scheme: &str) {
        let changed = self.update_store(ColorRuleStore::clear_rules);
        lock(&self.views).color_scheme = Some(scheme.to_string());
        report(
            "SET_COLOR_SCHEME",
            self.with_msa("set_color_scheme", |msa| {
                msa.set_color_scheme(scheme)?;
                msa.redraw()
            }),
        );
        if !changed {
            self.post_default_paint();
        }
    }

    fn restore_defaults(&self, context: &str) {
        report(
            context,
            self.with_msa("clear_colors", |msa| {
                msa.clear_colors()?;
                msa.redraw()
            }),
        );
        self.post_default_paint();
    }

    fn highlight_residue(&self, chain_id: &str, residue_id: Option<ResidueId>, column: Option<Column>) {
        let context = match self.context_for(chain_id) {
            Ok(context) => context,
            Err(error) => return report("HIGHLIGHT_RESIDUE", Err(error)),
        };
        let Some((residue_id, column)) = fill_position(&context.mapper, residue_id, column) else {
            log::debug!("HIGHLIGHT_RESIDUE: nothing to highlight");
            return;
        };

        report(
            "HIGHLIGHT_RESIDUE",
            match column {
                Some(column) => self.with_msa("set_highlight", |msa| msa.set_highlight(column, column)),
                None => Err(unmapped(chain_id, residue_id, column)),
            },
        );
        report(
            "HIGHLIGHT_RESIDUE",
            match residue_id {
                Some(residue_id) => self.with_structure("highlight_residue", |structure| {
                    structure.highlight_residue(chain_id, residue_id, true)
                }),
                None => Err(unmapped(chain_id, residue_id, column)),
            },
        );
        if let Some(column) = column {
            self.highlight_aligned(column);
        }

        lock(&self.views).highlight = Some(Highlight {
            chain_id: chain_id.to_string(),
            column,
            residue_id,
        });
    }

    /// Each visible aligned structure highlights whatever residue its own
    /// mapping puts at `column`.
    fn highlight_aligned(&self, column: Column) {
        for (chain_id, mapper, adapter) in self.visible_aligned() {
            let result = match mapper.column_to_residue(column) {
                Some(residue_id) => adapter
                    .highlight_residue(&chain_id, residue_id, true)
                    .map_err(SyncError::adapter(View::Aligned, "highlight_residue")),
                None => Err(SyncError::unmappable(&chain_id, column)),
            };
            report("HIGHLIGHT_RESIDUE", result);
        }
    }

    fn clear_highlight_views(&self) {
        lock(&self.views).highlight = None;
        report("CLEAR_HIGHLIGHT", self.with_msa("clear_highlight", |msa| msa.clear_highlight()));
        report(
            "CLEAR_HIGHLIGHT",
            self.with_structure("clear_highlight", |structure| structure.clear_highlight()),
        );
        for (_, _, adapter) in self.visible_aligned() {
            report(
                "CLEAR_HIGHLIGHT",
                adapter
                    .clear_highlight()
                    .map_err(SyncError::adapter(View::Aligned, "clear_highlight")),
            );
        }
    }

    fn focus_residue(&self, chain_id: &str, residue_id: Option<ResidueId>, column: Option<Column>) {
        let context = match self.context_for(chain_id) {
            Ok(context) => context,
            Err(error) => return report("FOCUS_RESIDUE", Err(error)),
        };
        let Some((residue_id, column)) = fill_position(&context.mapper, residue_id, column) else {
            log::debug!("FOCUS_RESIDUE: nothing to focus");
            return;
        };

        report(
            "FOCUS_RESIDUE",
            match residue_id {
                Some(residue_id) => self.with_structure("focus_residue", |structure| {
                    structure.focus_residue(chain_id, residue_id)
                }),
                None => Err(unmapped(chain_id, residue_id, column)),
            },
        );
        report(
            "FOCUS_RESIDUE",
            match column {
                Some(column) => self.with_msa("jump_to_range", |msa| msa.jump_to_range(column, column)),
                None => Err(unmapped(chain_id, residue_id, column)),
            },
        );
    }

    fn focus_range(
        &self,
        chain_id: &str,
        start_residue: ResidueId,
        end_residue: ResidueId,
        columns: Option<(Column, Column)>,
    ) {
        if let Err(error) = self.context_for(chain_id) {
            return report("FOCUS_RANGE", Err(error));
        }
        report(
            "FOCUS_RANGE",
            self.with_structure("focus_residue_range", |structure| {
                structure.focus_residue_range(chain_id, start_residue, end_residue)
            }),
        );
        if let Some((start, end)) = columns {
            report(
                "FOCUS_RANGE",
                self.with_msa("jump_to_range", |msa| msa.jump_to_range(start, end)),
            );
        }
    }

    fn jump_to_range(&self, range: ViewportRange) {
        report(
            "JUMP_TO_RANGE",
            self.with_msa("jump_to_range", |msa| msa.jump_to_range(range.start, range.end)),
        );
        let result = self.context().and_then(|context| {
            // Endpoints may sit on gaps; focus the mapped stretch inside.
            let (first, last) = context
                .mapper
                .nearest_mapped_within(range)
                .ok_or_else(|| SyncError::unmappable(&context.chain_id, range.start))?;
            let start = context.mapper.column_to_residue(first);
            let end = context.mapper.column_to_residue(last);
            match start.zip(end) {
                Some((start, end)) => self.with_structure("focus_residue_range", |structure| {
                    structure.focus_residue_range(&context.chain_id, start.min(end), start.max(end))
                }),
                None => Err(SyncError::unmappable(&context.chain_id, first)),
            }
        });
        report("JUMP_TO_RANGE", result);
    }

    // ===== VIEW EVENTS =====

    /// Hover in the 3D view. Hovers on chains other than the active one are
    /// ignored.
    pub fn on_structure_hover(&self, chain_id: &str, residue_id: ResidueId) {
        if self.active_chain_id().as_deref() != Some(chain_id) {
            return;
        }
        self.dispatch(SyncAction::HighlightResidue {
            chain_id: chain_id.to_string(),
            residue_id: Some(residue_id),
            column: None,
        });
    }

    pub fn on_structure_hover_end(&self) {
        self.dispatch(SyncAction::ClearHighlight);
    }

    pub fn on_msa_hover(&self, column: Column) {
        let Some(chain_id) = self.active_chain_id() else {
            return;
        };
        self.dispatch(SyncAction::HighlightResidue {
            chain_id,
            residue_id: None,
            column: Some(column),
        });
    }

    pub fn on_msa_hover_end(&self) {
        self.dispatch(SyncAction::ClearHighlight);
    }

    /// Click in the 3D view: scroll the grid to a window around the residue.
    pub fn on_structure_click(&self, chain_id: &str, residue_id: ResidueId) {
        let result = self.context_for(chain_id).and_then(|context| {
            let column = context
                .mapper
                .residue_to_column(residue_id)
                .ok_or_else(|| SyncError::unmappable(chain_id, residue_id))?;
            let padding = self.config.click_jump_padding;
            let start = column.saturating_sub(padding).max(1);
            let end = column.saturating_add(padding);
            self.with_msa("jump_to_range", |msa| msa.jump_to_range(start, end))
        });
        report("structure click", result);
    }

    pub fn highlight_from_annotation(&self, column: Column) {
        self.on_msa_hover(column);
    }

    /// Highlight a column range in the grid and its first mapped residue in
    /// the structure.
    pub fn highlight_range_from_annotation(&self, start: Column, end: Column) {
        let context = match self.context() {
            Ok(context) => context,
            Err(error) => return report("annotation highlight", Err(error)),
        };
        let range = ViewportRange::new(start, end);
        report(
            "annotation highlight",
            self.with_msa("set_highlight", |msa| msa.set_highlight(range.start, range.end)),
        );
        let first = context
            .mapper
            .nearest_mapped_within(range)
            .and_then(|(first, _)| context.mapper.column_to_residue(first).map(|residue| (first, residue)));
        let result = match first {
            Some((_, residue_id)) => self.with_structure("highlight_residue", |structure| {
                structure.highlight_residue(&context.chain_id, residue_id, true)
            }),
            None => Err(SyncError::unmappable(&context.chain_id, range.start)),
        };
        report("annotation highlight", result);

        lock(&self.views).highlight = Some(Highlight {
            chain_id: context.chain_id.clone(),
            column: first.map(|(column, _)| column),
            residue_id: first.map(|(_, residue)| residue),
        });
    }

    pub fn clear_highlight(&self) {
        self.dispatch(SyncAction::ClearHighlight);
    }

    /// Bring a rule into view: the grid scrolls over its column span and the
    /// structure focuses the span of its residues on the active chain. A side the rule
    /// has nothing for is left alone. `false` when there is no such rule or
    /// it targets nothing.
    pub fn focus_rule(&self, id: &str) -> bool {
        let Some(rule) = lock(&self.store).get(id).cloned() else {
            log::debug!("focus rule: no rule '{}'", id);
            return false;
        };
        if !rule.has_targets() {
            return false;
        }

        if let Some((start, end)) = rule.grid_columns().min().zip(rule.grid_columns().max()) {
            report(
                "focus rule",
                self.with_msa("jump_to_range", |msa| msa.jump_to_range(start, end)),
            );
        }

        let mut residues = rule
            .residues
            .iter()
            .filter(|target| target.scope == PaintScope::Primary);
        if let Some(first) = residues.next() {
            let (start, end) = residues
                .filter(|target| target.chain_id == first.chain_id)
                .fold((first.residue_id, first.residue_id), |(start, end), target| {
                    (start.min(target.residue_id), end.max(target.residue_id))
                });
            let result = self.context_for(&first.chain_id).and_then(|_| {
                self.with_structure("focus_residue_range", |structure| {
                    structure.focus_residue_range(&first.chain_id, start, end)
                })
            });
            report("focus rule", result);
        }
        true
    }

    // ===== RULE BUILDERS =====

    /// Column-scoped binding-site rule. Residues are derived for the active
    /// chain and for every aligned structure through their own mappings;
    /// columns without a residue paint the grid only.
    pub fn add_binding_site(&self, id: &str, name: &str, color: impl Into<Color>, columns: &[Column], priority: i32) {
        let residues = self.derive_residues(columns, true);
        let rule = ColorRule::new(id, RuleKind::BindingSite, priority, color)
            .with_label(name)
            .with_columns(columns.iter().copied())
            .with_residues(residues);
        self.dispatch(SyncAction::AddColorRule { rule });
    }

    pub fn remove_binding_site(&self, id: &str) {
        self.dispatch(SyncAction::RemoveColorRule { id: id.to_string() });
    }

    /// Cell-scoped rule for one grid row, painted with the first mark's color.
    pub fn add_mutations(&self, id: &str, marks: &[MutationMark], row: u32, priority: i32) {
        let Some(first) = marks.first() else {
            return;
        };
        let columns: Vec<Column> = marks.iter().map(|mark| mark.column).collect();
        let residues = self.derive_residues(&columns, false);
        let rule = ColorRule::new(id, RuleKind::Mutation, priority, first.color.clone())
            .with_cells(columns.iter().map(|column| CellKey::new(row, *column)))
            .with_residues(residues);
        self.dispatch(SyncAction::AddColorRule { rule });
    }

    pub fn remove_mutations(&self, id: &str) {
        self.dispatch(SyncAction::RemoveColorRule { id: id.to_string() });
    }

    pub fn clear_all_colors(&self) {
        self.dispatch(SyncAction::ClearColors);
    }

    pub fn set_color_scheme(&self, scheme: &str) {
        self.dispatch(SyncAction::SetColorScheme {
            scheme: scheme.to_string(),
        });
    }

    /// Paint one ligand's neighborhood on the active chain; residues with a
    /// column are also marked in grid row `row`.
    pub fn add_ligand_site(&self, site: &LigandSite, row: RowIndex, priority: i32) {
        let context = match self.context() {
            Ok(context) => context,
            Err(error) => return report("ligand site", Err(error)),
        };
        let rule = ligand_site_rule(site, &context.chain_id, row, &context.mapper, priority);
        self.dispatch(SyncAction::AddColorRule { rule });
    }

    /// One rule per resolved variant of the chain behind `chain_key`, all
    /// added with a single notification. Returns how many rules were added.
    pub fn add_variants(&self, chain_key: &str, row: RowIndex, variants: &[Variant], priority: i32) -> usize {
        let result = chain_from_key(chain_key)
            .ok_or_else(|| SyncError::InvalidChainKey {
                chain_key: chain_key.to_string(),
            })
            .and_then(|chain_id| self.context_for(chain_id).map(|_| chain_id));
        let chain_id = match result {
            Ok(chain_id) => chain_id,
            Err(error) => {
                report("variants", Err(error));
                return 0;
            }
        };
        let rules = variant_rules(chain_key, chain_id, row, variants, priority);
        self.update_store(|store| store.add_rules(rules))
    }

    pub fn remove_variants(&self, chain_key: &str) -> usize {
        let prefix = variant_id_prefix(chain_key);
        self.update_store(|store| store.remove_where(|rule| rule.id.starts_with(&prefix)))
    }

    pub fn set_default_color(&self, color: impl Into<Color>) {
        let color = color.into();
        self.update_store(|store| store.set_default_color(color));
    }

    fn derive_residues(&self, columns: &[Column], include_aligned: bool) -> Vec<ResidueTarget> {
        let views = lock(&self.views);
        let mut targets = Vec::new();

        match &views.context {
            Some(context) => {
                for column in columns {
                    match context.mapper.column_to_residue(*column) {
                        Some(residue_id) => targets.push(
                            ResidueTarget::primary(context.chain_id.clone(), residue_id).anchored_at(*column),
                        ),
                        None => report(
                            "derive residues",
                            Err(SyncError::unmappable(&context.chain_id, *column)),
                        ),
                    }
                }
            }
            None => report("derive residues", Err(SyncError::NoContext)),
        }

        if include_aligned {
            for view in views.aligned.values() {
                let scope = view.scope();
                let chain_id = &view.structure.source_chain;
                for column in columns {
                    if let Some(residue_id) = view.mapper.column_to_residue(*column) {
                        targets.push(
                            ResidueTarget::primary(chain_id.clone(), residue_id)
                                .in_scope(scope.clone())
                                .anchored_at(*column),
                        );
                    }
                }
            }
        }
        targets
    }

    // ===== CONTEXT =====

    /// Make `chain_id` the active chain. The previous mapping is dropped and
    /// any highlight on it is forgotten.
    pub fn set_context(&self, chain_id: impl Into<ChainId>, mapper: PositionMapper) {
        let chain_id = chain_id.into();
        log::info!("active chain {} ({} mapped columns)", chain_id, mapper.len());
        let window = {
            let mut views = lock(&self.views);
            views.context = Some(ChainContext {
                chain_id,
                mapper: Arc::new(mapper),
            });
            views.highlight = None;
            views.window
        };
        if let Some(range) = window {
            self.window_mailbox.post(ViewportEvent::Range(range));
        }
    }

    pub fn clear_context(&self) {
        let mut views = lock(&self.views);
        views.context = None;
        views.highlight = None;
    }

    pub fn active_chain_id(&self) -> Option<ChainId> {
        lock(&self.views).context.as_ref().map(|context| context.chain_id.clone())
    }

    pub fn has_context(&self) -> bool {
        lock(&self.views).context.is_some()
    }

    pub fn color_state(&self) -> ColorState {
        let store = lock(&self.store);
        ColorState {
            rules: store.rules().cloned().collect(),
            default_color: store.default_color().clone(),
        }
    }

    pub fn resolved_paint(&self) -> ResolvedPaint {
        lock(&self.store).resolve()
    }

    pub fn current_color_scheme(&self) -> Option<String> {
        lock(&self.views).color_scheme.clone()
    }

    pub fn current_highlight(&self) -> Option<Highlight> {
        lock(&self.views).highlight.clone()
    }

    pub fn is_repaint_in_flight(&self) -> bool {
        self.repaint_in_flight.load(Ordering::SeqCst)
    }

    // ===== VIEWPORT =====

    /// The grid's visible column range changed.
    pub fn set_viewport(&self, start: Column, end: Column) {
        let range = ViewportRange::new(start, end);
        lock(&self.views).window = Some(range);
        self.window_mailbox.post(ViewportEvent::Range(range));
    }

    pub fn clear_window_mask(&self) {
        lock(&self.views).window = None;
        self.window_mailbox.post(ViewportEvent::Clear);
    }

    // ===== ALIGNED STRUCTURES =====

    /// Register a superimposed structure. Re-adding an id keeps its adapter.
    pub fn add_aligned_structure(&self, structure: AlignedStructure, mapper: PositionMapper) {
        log::info!(
            "aligned structure {} ({} chain {}) onto chain {}",
            structure.id,
            structure.source_structure,
            structure.source_chain,
            structure.target_chain_id
        );
        let mut views = lock(&self.views);
        let adapter = views.aligned.get(&structure.id).and_then(|view| view.adapter.clone());
        views.aligned.insert(
            structure.id.clone(),
            AlignedView {
                structure,
                mapper: Arc::new(mapper),
                adapter,
            },
        );
    }

    pub fn attach_aligned_adapter(&self, id: &str, adapter: Arc<dyn StructureAdapter>) -> bool {
        {
            let mut views = lock(&self.views);
            let Some(view) = views.aligned.get_mut(id) else {
                log::debug!("attach: unknown aligned structure {}", id);
                return false;
            };
            view.adapter = Some(adapter);
        }
        self.repaint_current();
        true
    }

    pub fn set_aligned_visibility(&self, id: &str, visible: bool) -> bool {
        let window = {
            let mut views = lock(&self.views);
            let Some(view) = views.aligned.get_mut(id) else {
                return false;
            };
            if view.structure.visible == visible {
                return true;
            }
            view.structure.visible = visible;
            views.window
        };
        if visible {
            self.repaint_current();
            if let Some(range) = window {
                self.window_mailbox.post(ViewportEvent::Range(range));
            }
        }
        true
    }

    /// Unregister a superimposed structure, its window mask and every residue
    /// target painted on it.
    pub fn remove_aligned_structure(&self, id: &str) -> bool {
        let (removed, window_active) = {
            let mut views = lock(&self.views);
            (views.aligned.shift_remove(id), views.window.is_some())
        };
        let Some(removed) = removed else {
            return false;
        };
        log::info!("aligned structure {} removed", id);
        if let (Some(adapter), true) = (&removed.adapter, window_active) {
            report(
                "remove aligned structure",
                adapter
                    .clear_window_mask(&removed.structure.source_chain)
                    .map_err(SyncError::adapter(View::Aligned, "clear_window_mask")),
            );
        }
        let id: AlignedStructureId = id.to_string();
        self.update_store(|store| store.purge_scope(&id));
        true
    }

    pub fn aligned_structures(&self) -> Vec<AlignedStructure> {
        lock(&self.views)
            .aligned
            .values()
            .map(|view| view.structure.clone())
            .collect()
    }

    // ===== ADAPTERS =====

    pub fn attach_msa_adapter(&self, adapter: Arc<dyn MsaAdapter>) {
        lock(&self.views).msa = Some(Arc::clone(&adapter));
        let paint = lock(&self.store).resolve();
        if paint.has_grid_paint() {
            report(
                "attach msa",
                push_grid_paint(adapter.as_ref(), &paint, &self.config.renderer_config()),
            );
        }
    }

    pub fn detach_msa_adapter(&self) {
        lock(&self.views).msa = None;
    }

    pub fn attach_structure_adapter(&self, adapter: Arc<dyn StructureAdapter>) {
        lock(&self.views).structure = Some(adapter);
        self.repaint_current();
    }

    pub fn detach_structure_adapter(&self) {
        lock(&self.views).structure = None;
    }

    // ===== INTERNALS =====

    /// Mutate the rule store, then push the resulting grid paint with the
    /// store unlocked.
    fn update_store<R>(&self, update: impl FnOnce(&mut ColorRuleStore) -> R) -> R {
        let result = {
            let mut store = lock(&self.store);
            update(&mut store)
        };
        self.flush_grid_paint();
        result
    }

    fn flush_grid_paint(&self) {
        let mut grid_inbox = lock(&self.grid_inbox);
        let Some(paint) = grid_inbox.try_take() else {
            return;
        };
        let Some(msa) = lock(&self.views).msa.clone() else {
            return;
        };
        report(
            "grid paint",
            push_grid_paint(msa.as_ref(), &paint, &self.config.renderer_config()),
        );
    }

    /// Queue a repaint of the current rules; nothing to do while there are none.
    fn repaint_current(&self) {
        let paint = {
            let store = lock(&self.store);
            if store.is_empty() {
                return;
            }
            store.resolve()
        };
        self.repaint_mailbox.post(Arc::new(paint));
    }

    fn post_default_paint(&self) {
        let default_color = lock(&self.store).default_color().clone();
        self.repaint_mailbox
            .post(Arc::new(ResolvedPaint::empty(default_color)));
    }

    fn context(&self) -> Result<ChainContext, SyncError> {
        lock(&self.views).context.clone().ok_or(SyncError::NoContext)
    }

    fn context_for(&self, chain_id: &str) -> Result<ChainContext, SyncError> {
        let context = self.context()?;
        if context.chain_id != chain_id {
            return Err(SyncError::StaleChain {
                requested: chain_id.to_string(),
                active: context.chain_id,
            });
        }
        Ok(context)
    }

    fn visible_aligned(&self) -> Vec<(ChainId, Arc<PositionMapper>, Arc<dyn StructureAdapter>)> {
        lock(&self.views)
            .visible_aligned()
            .map(|(view, adapter)| (view.structure.source_chain.clone(), Arc::clone(&view.mapper), adapter))
            .collect()
    }

    fn with_msa(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn MsaAdapter) -> Result<(), AdapterError>,
    ) -> Result<(), SyncError> {
        let msa = lock(&self.views)
            .msa
            .clone()
            .ok_or(SyncError::MissingAdapter { view: View::Msa })?;
        call(msa.as_ref()).map_err(SyncError::adapter(View::Msa, operation))
    }

    fn with_structure(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn StructureAdapter) -> Result<(), AdapterError>,
    ) -> Result<(), SyncError> {
        let structure = lock(&self.views)
            .structure
            .clone()
            .ok_or(SyncError::MissingAdapter { view: View::Structure })?;
        call(structure.as_ref()).map_err(SyncError::adapter(View::Structure, operation))
    }
}

/// Fill in whichever half of a `(residue, column)` pair is missing. `None`
/// when neither was given.
fn fill_position(
    mapper: &PositionMapper,
    residue_id: Option<ResidueId>,
    column: Option<Column>,
) -> Option<(Option<ResidueId>, Option<Column>)> {
    if residue_id.is_none() && column.is_none() {
        return None;
    }
    let residue_id = residue_id.or_else(|| column.and_then(|column| mapper.column_to_residue(column)));
    let column = column.or_else(|| residue_id.and_then(|residue| mapper.residue_to_column(residue)));
    Some((residue_id, column))
}

fn unmapped(chain_id: &str, residue_id: Option<ResidueId>, column: Option<Column>) -> SyncError {
    let position = residue_id
        .map(i64::from)
        .or(column.map(i64::from))
        .unwrap_or_default();
    SyncError::unmappable(chain_id, position)
}
