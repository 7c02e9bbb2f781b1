//! Contracts the grid (MSA) view and the 3D structure views implement, plus
//! logging-only implementations for tooling without real renderers.

use crate::color_rules::ResiduePaint;
use futures::future::{BoxFuture, FutureExt};
use shared::{CellKey, Color, Column, ResidueId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Grid renderer settings passed with every paint call. The renderer never
/// holds on to a shared mutable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Name of the per-position palette the grid switches to while painting.
    pub palette: String,
    /// Base scheme for cells no rule touches.
    pub base_scheme: String,
    pub background: Color,
}

impl RendererConfig {
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
}

/// The 2D alignment grid view.
///
/// Paint calls run after the rule store is unlocked, so an implementation may
/// read dispatcher state from inside them. Dispatching from inside one is not
/// supported.
pub trait MsaAdapter: Send + Sync + 'static {
    fn set_color_scheme(&self, scheme: &str) -> Result<(), AdapterError>;
    fn apply_column_colors(
        &self,
        colors: &BTreeMap<Column, Color>,
        config: &RendererConfig,
    ) -> Result<(), AdapterError>;
    fn apply_cell_colors(
        &self,
        colors: &BTreeMap<CellKey, Color>,
        config: &RendererConfig,
    ) -> Result<(), AdapterError>;
    fn clear_colors(&self) -> Result<(), AdapterError>;
    fn jump_to_range(&self, start: Column, end: Column) -> Result<(), AdapterError>;
    fn set_highlight(&self, start: Column, end: Column) -> Result<(), AdapterError>;
    fn clear_highlight(&self) -> Result<(), AdapterError>;
    fn redraw(&self) -> Result<(), AdapterError>;
}

/// One 3D structure: the primary chain's, or one superimposed copy.
///
/// Repaints rebuild an overpaint layer in the 3D scene and are asynchronous;
/// callers never run two of them concurrently against the same scene.
pub trait StructureAdapter: Send + Sync + 'static {
    fn apply_colorscheme(
        &self,
        source_tag: &str,
        paint: Vec<ResiduePaint>,
    ) -> BoxFuture<'_, Result<(), AdapterError>>;
    fn restore_default_colors(&self) -> BoxFuture<'_, Result<(), AdapterError>>;
    fn highlight_residue(&self, chain_id: &str, residue_id: ResidueId, on: bool) -> Result<(), AdapterError>;
    fn clear_highlight(&self) -> Result<(), AdapterError>;
    fn focus_residue(&self, chain_id: &str, residue_id: ResidueId) -> Result<(), AdapterError>;
    fn focus_residue_range(
        &self,
        chain_id: &str,
        start: ResidueId,
        end: ResidueId,
    ) -> Result<(), AdapterError>;
    fn apply_window_mask(
        &self,
        chain_id: &str,
        visible: &BTreeSet<ResidueId>,
        pinned: &BTreeSet<ResidueId>,
    ) -> Result<(), AdapterError>;
    fn clear_window_mask(&self, chain_id: &str) -> Result<(), AdapterError>;
}

/// Grid adapter that only logs what it was asked to do.
#[derive(Clone, Default)]
pub struct LoggingMsaAdapter;

impl MsaAdapter for LoggingMsaAdapter {
    fn set_color_scheme(&self, scheme: &str) -> Result<(), AdapterError> {
        log::info!("[msa] color scheme -> {}", scheme);
        Ok(())
    }

    fn apply_column_colors(
        &self,
        colors: &BTreeMap<Column, Color>,
        config: &RendererConfig,
    ) -> Result<(), AdapterError> {
        log::info!("[msa] {} column colors via '{}'", colors.len(), config.palette);
        Ok(())
    }

    fn apply_cell_colors(
        &self,
        colors: &BTreeMap<CellKey, Color>,
        config: &RendererConfig,
    ) -> Result<(), AdapterError> {
        log::info!("[msa] {} cell colors via '{}'", colors.len(), config.palette);
        Ok(())
    }

    fn clear_colors(&self) -> Result<(), AdapterError> {
        log::info!("[msa] colors cleared");
        Ok(())
    }

    fn jump_to_range(&self, start: Column, end: Column) -> Result<(), AdapterError> {
        log::info!("[msa] jump to {}..={}", start, end);
        Ok(())
    }

    fn set_highlight(&self, start: Column, end: Column) -> Result<(), AdapterError> {
        log::info!("[msa] highlight {}..={}", start, end);
        Ok(())
    }

    fn clear_highlight(&self) -> Result<(), AdapterError> {
        log::info!("[msa] highlight cleared");
        Ok(())
    }

    fn redraw(&self) -> Result<(), AdapterError> {
        log::debug!("[msa] redraw");
        Ok(())
    }
}

/// Structure adapter that only logs; `label` tells the structures apart.
#[derive(Clone)]
pub struct LoggingStructureAdapter {
    label: String,
}

impl LoggingStructureAdapter {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl StructureAdapter for LoggingStructureAdapter {
    fn apply_colorscheme(
        &self,
        source_tag: &str,
        paint: Vec<ResiduePaint>,
    ) -> BoxFuture<'_, Result<(), AdapterError>> {
        log::info!(
            "[structure:{}] '{}' paints {} residues",
            self.label,
            source_tag,
            paint.len()
        );
        async { Ok(()) }.boxed()
    }

    fn restore_default_colors(&self) -> BoxFuture<'_, Result<(), AdapterError>> {
        log::info!("[structure:{}] default colors restored", self.label);
        async { Ok(()) }.boxed()
    }

    fn highlight_residue(&self, chain_id: &str, residue_id: ResidueId, on: bool) -> Result<(), AdapterError> {
        log::info!("[structure:{}] highlight {}:{} {}", self.label, chain_id, residue_id, on);
        Ok(())
    }

    fn clear_highlight(&self) -> Result<(), AdapterError> {
        log::info!("[structure:{}] highlight cleared", self.label);
        Ok(())
    }

    fn focus_residue(&self, chain_id: &str, residue_id: ResidueId) -> Result<(), AdapterError> {
        log::info!("[structure:{}] focus {}:{}", self.label, chain_id, residue_id);
        Ok(())
    }

    fn focus_residue_range(
        &self,
        chain_id: &str,
        start: ResidueId,
        end: ResidueId,
    ) -> Result<(), AdapterError> {
        log::info!("[structure:{}] focus {}:{}..={}", self.label, chain_id, start, end);
        Ok(())
    }

    fn apply_window_mask(
        &self,
        chain_id: &str,
        visible: &BTreeSet<ResidueId>,
        pinned: &BTreeSet<ResidueId>,
    ) -> Result<(), AdapterError> {
        log::info!(
            "[structure:{}] window mask {}: {} visible, {} pinned",
            self.label,
            chain_id,
            visible.len(),
            pinned.len()
        );
        Ok(())
    }

    fn clear_window_mask(&self, chain_id: &str) -> Result<(), AdapterError> {
        log::info!("[structure:{}] window mask {} cleared", self.label, chain_id);
        Ok(())
    }
}
