//! Propagation from resolved paint to the views.
//!
//! The grid is cheap to repaint and is pushed synchronously once a store
//! mutation has released the store. Structures are expensive: resolved paint
//! is posted into a latest-wins mailbox and a single worker repaints them one at a time, after
//! a quiet period. Viewport changes go through a second mailbox to the
//! window-mask worker.

use crate::adapters::{MsaAdapter, RendererConfig, StructureAdapter};
use crate::color_rules::{ColorRuleStore, ResolvedPaint};
use crate::dataflow::{MailboxReceiver, Relay};
use crate::error::{SyncError, View, report};
use crate::position_mapper::PositionMapper;
use crate::window_mask::WindowMask;
use indexmap::IndexMap;
use shared::{AlignedStructure, AlignedStructureId, ChainId, ColorRule, Column, PaintScope, ResidueId, ViewportRange};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Locks never guard anything a panic could leave half-written, so a
/// poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== VIEW STATE =====

#[derive(Clone)]
pub(crate) struct ChainContext {
    pub chain_id: ChainId,
    pub mapper: Arc<PositionMapper>,
}

pub(crate) struct AlignedView {
    pub structure: AlignedStructure,
    pub mapper: Arc<PositionMapper>,
    pub adapter: Option<Arc<dyn StructureAdapter>>,
}

impl AlignedView {
    pub fn scope(&self) -> PaintScope {
        PaintScope::Aligned(self.structure.id.clone())
    }
}

/// The transient hover/annotation highlight currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub chain_id: ChainId,
    pub column: Option<Column>,
    pub residue_id: Option<ResidueId>,
}

/// Everything the dispatcher routes to. Guarded by one lock, always taken
/// after the rule store's lock (or the grid inbox's) when both are needed.
#[derive(Default)]
pub(crate) struct Views {
    pub msa: Option<Arc<dyn MsaAdapter>>,
    pub structure: Option<Arc<dyn StructureAdapter>>,
    pub context: Option<ChainContext>,
    pub aligned: IndexMap<AlignedStructureId, AlignedView>,
    pub window: Option<ViewportRange>,
    pub highlight: Option<Highlight>,
    pub color_scheme: Option<String>,
}

pub(crate) struct PaintTarget {
    pub scope: PaintScope,
    pub adapter: Arc<dyn StructureAdapter>,
}

pub(crate) struct MaskTarget {
    pub scope: PaintScope,
    pub chain_id: ChainId,
    pub mapper: Arc<PositionMapper>,
    pub adapter: Arc<dyn StructureAdapter>,
}

impl Views {
    /// Primary first, then visible aligned structures in insertion order.
    pub fn paint_targets(&self) -> Vec<PaintTarget> {
        let primary = self.structure.clone().map(|adapter| PaintTarget {
            scope: PaintScope::Primary,
            adapter,
        });
        let aligned = self.visible_aligned().map(|(view, adapter)| PaintTarget {
            scope: view.scope(),
            adapter,
        });
        primary.into_iter().chain(aligned).collect()
    }

    pub fn mask_targets(&self) -> Vec<MaskTarget> {
        let primary = match (&self.context, &self.structure) {
            (Some(context), Some(adapter)) => Some(MaskTarget {
                scope: PaintScope::Primary,
                chain_id: context.chain_id.clone(),
                mapper: Arc::clone(&context.mapper),
                adapter: Arc::clone(adapter),
            }),
            _ => None,
        };
        let aligned = self.visible_aligned().map(|(view, adapter)| MaskTarget {
            scope: view.scope(),
            chain_id: view.structure.source_chain.clone(),
            mapper: Arc::clone(&view.mapper),
            adapter,
        });
        primary.into_iter().chain(aligned).collect()
    }

    /// Every attached structure adapter with the chain its mask applies to,
    /// hidden aligned structures included.
    pub fn attached_structures(&self) -> Vec<(ChainId, Arc<dyn StructureAdapter>)> {
        let primary = match (&self.context, &self.structure) {
            (Some(context), Some(adapter)) => Some((context.chain_id.clone(), Arc::clone(adapter))),
            _ => None,
        };
        let aligned = self.aligned.values().filter_map(|view| {
            view.adapter
                .clone()
                .map(|adapter| (view.structure.source_chain.clone(), adapter))
        });
        primary.into_iter().chain(aligned).collect()
    }

    pub fn visible_aligned(&self) -> impl Iterator<Item = (&AlignedView, Arc<dyn StructureAdapter>)> + '_ {
        self.aligned
            .values()
            .filter(|view| view.structure.visible)
            .filter_map(|view| view.adapter.clone().map(|adapter| (view, adapter)))
    }
}

// ===== EVENTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEvent {
    Range(ViewportRange),
    Clear,
}

/// Outcomes of the background workers, for tooling and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    RepaintApplied { scope: PaintScope, residues: usize },
    RepaintFailed { scope: PaintScope, message: String },
    RepaintCycleCompleted { failures: usize },
    WindowMaskApplied { scope: PaintScope, visible: usize, pinned: usize },
    WindowMaskCleared { structures: usize },
}

// ===== GRID SINK =====

/// Paint the grid with `paint`, on the store's current default color.
pub(crate) fn push_grid_paint(
    msa: &dyn MsaAdapter,
    paint: &ResolvedPaint,
    renderer: &RendererConfig,
) -> Result<(), SyncError> {
    if paint.has_grid_paint() {
        let renderer = renderer.clone().with_background(paint.default_color.clone());
        msa.apply_column_colors(&paint.column_colors, &renderer)
            .map_err(SyncError::adapter(View::Msa, "apply_column_colors"))?;
        msa.apply_cell_colors(&paint.cell_colors, &renderer)
            .map_err(SyncError::adapter(View::Msa, "apply_cell_colors"))?;
    } else {
        msa.clear_colors()
            .map_err(SyncError::adapter(View::Msa, "clear_colors"))?;
    }
    msa.redraw().map_err(SyncError::adapter(View::Msa, "redraw"))
}

// ===== STRUCTURE SINK =====

/// Raised while a repaint cycle runs; lowered on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct RepaintWorker {
    pub inbox: MailboxReceiver<Arc<ResolvedPaint>>,
    pub views: Arc<Mutex<Views>>,
    pub debounce: Duration,
    pub source_tag: String,
    pub in_flight: Arc<AtomicBool>,
    pub repaint_completed_relay: Relay<SyncEvent>,
}

impl RepaintWorker {
    pub async fn run(mut self) {
        while let Some(mut paint) = self.inbox.recv_debounced(self.debounce).await {
            loop {
                self.repaint(&paint).await;
                // Posts that landed mid-flight collapsed into the slot.
                match self.inbox.try_take() {
                    Some(latest) => {
                        log::debug!("repaint requested while in flight, repainting with latest state");
                        paint = latest;
                    }
                    None => break,
                }
            }
        }
        log::debug!("repaint worker stopped");
    }

    async fn repaint(&self, paint: &ResolvedPaint) {
        let _in_flight = InFlightGuard::raise(&self.in_flight);
        let targets = lock(&self.views).paint_targets();
        let mut failures = 0;

        for target in targets {
            let residues = paint.residue_paint(&target.scope);
            let count = residues.len();
            let view = match target.scope {
                PaintScope::Primary => View::Structure,
                PaintScope::Aligned(_) => View::Aligned,
            };
            let (operation, result) = if residues.is_empty() {
                ("restore_default_colors", target.adapter.restore_default_colors().await)
            } else {
                (
                    "apply_colorscheme",
                    target.adapter.apply_colorscheme(&self.source_tag, residues).await,
                )
            };
            match result {
                Ok(()) => {
                    log::debug!("repainted {} ({} residues)", target.scope, count);
                    self.repaint_completed_relay.send(SyncEvent::RepaintApplied {
                        scope: target.scope,
                        residues: count,
                    });
                }
                Err(source) => {
                    failures += 1;
                    let message = source.to_string();
                    report(
                        &format!("repaint {}", target.scope),
                        Err(SyncError::adapter(view, operation)(source)),
                    );
                    self.repaint_completed_relay.send(SyncEvent::RepaintFailed {
                        scope: target.scope,
                        message,
                    });
                }
            }
        }

        self.repaint_completed_relay
            .send(SyncEvent::RepaintCycleCompleted { failures });
    }
}

// ===== WINDOW-MASK SINK =====

pub(crate) struct WindowWorker {
    pub inbox: MailboxReceiver<ViewportEvent>,
    pub store: Arc<Mutex<ColorRuleStore>>,
    pub views: Arc<Mutex<Views>>,
    pub debounce: Duration,
    pub window_applied_relay: Relay<SyncEvent>,
}

impl WindowWorker {
    pub async fn run(mut self) {
        while let Some(event) = self.inbox.recv_debounced(self.debounce).await {
            match event {
                ViewportEvent::Range(range) => self.apply(range),
                ViewportEvent::Clear => self.clear(),
            }
        }
        log::debug!("window mask worker stopped");
    }

    fn apply(&self, range: ViewportRange) {
        let rules: Vec<ColorRule> = lock(&self.store).rules().cloned().collect();
        let targets = lock(&self.views).mask_targets();
        if targets.is_empty() {
            log::debug!("window mask {}..={}: no structure attached", range.start, range.end);
        }

        for target in targets {
            let mask = WindowMask::compute(&target.scope, &target.chain_id, &target.mapper, range, &rules);
            let result = target
                .adapter
                .apply_window_mask(&mask.chain_id, &mask.visible, &mask.pinned)
                .map_err(SyncError::adapter(View::Structure, "apply_window_mask"));
            if result.is_ok() {
                self.window_applied_relay.send(SyncEvent::WindowMaskApplied {
                    scope: target.scope,
                    visible: mask.visible.len(),
                    pinned: mask.pinned.len(),
                });
            }
            report("window mask", result);
        }
    }

    fn clear(&self) {
        let structures = lock(&self.views).attached_structures();
        let count = structures.len();
        for (chain_id, adapter) in structures {
            report(
                "clear window mask",
                adapter
                    .clear_window_mask(&chain_id)
                    .map_err(SyncError::adapter(View::Structure, "clear_window_mask")),
            );
        }
        self.window_applied_relay
            .send(SyncEvent::WindowMaskCleared { structures: count });
    }
}
