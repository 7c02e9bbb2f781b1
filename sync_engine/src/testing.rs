//! Recording adapters shared by the unit tests.

use crate::adapters::{AdapterError, MsaAdapter, RendererConfig, StructureAdapter};
use crate::color_rules::ResiduePaint;
use crate::pipeline::SyncEvent;
use futures::channel::mpsc::UnboundedReceiver;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use shared::{CellKey, ChainId, Color, Column, ResidueId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum MsaCall {
    SetColorScheme(String),
    ColumnColors(BTreeMap<Column, Color>),
    CellColors(BTreeMap<CellKey, Color>),
    ClearColors,
    JumpToRange(Column, Column),
    SetHighlight(Column, Column),
    ClearHighlight,
    Redraw,
}

#[derive(Default)]
pub struct RecordingMsa {
    calls: Mutex<Vec<MsaCall>>,
    backgrounds: Mutex<Vec<Color>>,
}

impl RecordingMsa {
    pub fn calls(&self) -> Vec<MsaCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Renderer background of every column paint, in call order.
    pub fn backgrounds(&self) -> Vec<Color> {
        self.backgrounds.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&MsaCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| matches(call)).count()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: MsaCall) -> Result<(), AdapterError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl MsaAdapter for RecordingMsa {
    fn set_color_scheme(&self, scheme: &str) -> Result<(), AdapterError> {
        self.record(MsaCall::SetColorScheme(scheme.to_string()))
    }

    fn apply_column_colors(
        &self,
        colors: &BTreeMap<Column, Color>,
        config: &RendererConfig,
    ) -> Result<(), AdapterError> {
        self.backgrounds.lock().unwrap().push(config.background.clone());
        self.record(MsaCall::ColumnColors(colors.clone()))
    }

    fn apply_cell_colors(
        &self,
        colors: &BTreeMap<CellKey, Color>,
        _config: &RendererConfig,
    ) -> Result<(), AdapterError> {
        self.record(MsaCall::CellColors(colors.clone()))
    }

    fn clear_colors(&self) -> Result<(), AdapterError> {
        self.record(MsaCall::ClearColors)
    }

    fn jump_to_range(&self, start: Column, end: Column) -> Result<(), AdapterError> {
        self.record(MsaCall::JumpToRange(start, end))
    }

    fn set_highlight(&self, start: Column, end: Column) -> Result<(), AdapterError> {
        self.record(MsaCall::SetHighlight(start, end))
    }

    fn clear_highlight(&self) -> Result<(), AdapterError> {
        self.record(MsaCall::ClearHighlight)
    }

    fn redraw(&self) -> Result<(), AdapterError> {
        self.record(MsaCall::Redraw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructureCall {
    ApplyColorscheme {
        source_tag: String,
        paint: Vec<ResiduePaint>,
    },
    RestoreDefaultColors,
    HighlightResidue(ChainId, ResidueId, bool),
    ClearHighlight,
    FocusResidue(ChainId, ResidueId),
    FocusResidueRange(ChainId, ResidueId, ResidueId),
    ApplyWindowMask {
        chain_id: ChainId,
        visible: BTreeSet<ResidueId>,
        pinned: BTreeSet<ResidueId>,
    },
    ClearWindowMask(ChainId),
}

impl StructureCall {
    pub fn is_repaint(&self) -> bool {
        matches!(
            self,
            StructureCall::ApplyColorscheme { .. } | StructureCall::RestoreDefaultColors
        )
    }
}

/// Structure adapter whose repaints take `repaint_delay` of (tokio) time and
/// can be made to fail.
#[derive(Default)]
pub struct RecordingStructure {
    calls: Mutex<Vec<StructureCall>>,
    repaint_delay: Duration,
    fail_repaints: AtomicBool,
    active_repaints: AtomicUsize,
    max_concurrent_repaints: AtomicUsize,
}

impl RecordingStructure {
    pub fn with_repaint_delay(repaint_delay: Duration) -> Self {
        Self {
            repaint_delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<StructureCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn repaints(&self) -> Vec<StructureCall> {
        self.calls().into_iter().filter(StructureCall::is_repaint).collect()
    }

    pub fn count(&self, matches: impl Fn(&StructureCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| matches(call)).count()
    }

    pub fn last_paint(&self) -> Option<Vec<ResiduePaint>> {
        self.calls().into_iter().rev().find_map(|call| match call {
            StructureCall::ApplyColorscheme { paint, .. } => Some(paint),
            _ => None,
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_repaints.store(failing, Ordering::SeqCst);
    }

    pub fn max_concurrent_repaints(&self) -> usize {
        self.max_concurrent_repaints.load(Ordering::SeqCst)
    }

    fn record(&self, call: StructureCall) -> Result<(), AdapterError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    async fn simulate_repaint(&self) -> Result<(), AdapterError> {
        let active = self.active_repaints.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_repaints.fetch_max(active, Ordering::SeqCst);
        if !self.repaint_delay.is_zero() {
            tokio::time::sleep(self.repaint_delay).await;
        }
        self.active_repaints.fetch_sub(1, Ordering::SeqCst);
        if self.fail_repaints.load(Ordering::SeqCst) {
            Err(AdapterError::Message("overpaint layer rebuild failed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl StructureAdapter for RecordingStructure {
    fn apply_colorscheme(
        &self,
        source_tag: &str,
        paint: Vec<ResiduePaint>,
    ) -> BoxFuture<'_, Result<(), AdapterError>> {
        let _ = self.record(StructureCall::ApplyColorscheme {
            source_tag: source_tag.to_string(),
            paint,
        });
        self.simulate_repaint().boxed()
    }

    fn restore_default_colors(&self) -> BoxFuture<'_, Result<(), AdapterError>> {
        let _ = self.record(StructureCall::RestoreDefaultColors);
        self.simulate_repaint().boxed()
    }

    fn highlight_residue(&self, chain_id: &str, residue_id: ResidueId, on: bool) -> Result<(), AdapterError> {
        self.record(StructureCall::HighlightResidue(chain_id.to_string(), residue_id, on))
    }

    fn clear_highlight(&self) -> Result<(), AdapterError> {
        self.record(StructureCall::ClearHighlight)
    }

    fn focus_residue(&self, chain_id: &str, residue_id: ResidueId) -> Result<(), AdapterError> {
        self.record(StructureCall::FocusResidue(chain_id.to_string(), residue_id))
    }

    fn focus_residue_range(
        &self,
        chain_id: &str,
        start: ResidueId,
        end: ResidueId,
    ) -> Result<(), AdapterError> {
        self.record(StructureCall::FocusResidueRange(chain_id.to_string(), start, end))
    }

    fn apply_window_mask(
        &self,
        chain_id: &str,
        visible: &BTreeSet<ResidueId>,
        pinned: &BTreeSet<ResidueId>,
    ) -> Result<(), AdapterError> {
        self.record(StructureCall::ApplyWindowMask {
            chain_id: chain_id.to_string(),
            visible: visible.clone(),
            pinned: pinned.clone(),
        })
    }

    fn clear_window_mask(&self, chain_id: &str) -> Result<(), AdapterError> {
        self.record(StructureCall::ClearWindowMask(chain_id.to_string()))
    }
}

/// Let debounce timers and workers run to completion. Only meaningful under
/// a paused clock, where the sleep auto-advances.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

pub fn drain_events(events: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut drained = Vec::new();
    while let Some(Some(event)) = events.next().now_or_never() {
        drained.push(event);
    }
    drained
}
