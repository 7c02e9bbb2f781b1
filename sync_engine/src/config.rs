use crate::adapters::RendererConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::Color;
use std::path::Path;
use std::time::Duration;

/// Dispatcher tuning. Every field has a default so a partial TOML table works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period before a structure repaint runs.
    pub repaint_debounce_ms: u64,
    /// Quiet period before a viewport change reaches the window mask.
    pub window_debounce_ms: u64,
    pub default_color: Color,
    /// Grid scheme restored by `CLEAR_COLORS` and used under painted cells.
    pub base_color_scheme: String,
    pub custom_palette: String,
    /// Tag structure adapters use to own (and later replace) their overpaint.
    pub structure_source_tag: String,
    /// Columns shown either side of a residue clicked in the 3D view.
    pub click_jump_padding: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repaint_debounce_ms: 150,
            window_debounce_ms: 50,
            default_color: Color::new("#ffffff"),
            base_color_scheme: "clustal2".to_string(),
            custom_palette: "custom-position".to_string(),
            structure_source_tag: "sync-dispatcher".to_string(),
            click_jump_padding: 25,
        }
    }
}

impl SyncConfig {
    pub fn repaint_debounce(&self) -> Duration {
        Duration::from_millis(self.repaint_debounce_ms)
    }

    pub fn window_debounce(&self) -> Duration {
        Duration::from_millis(self.window_debounce_ms)
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            palette: self.custom_palette.clone(),
            base_scheme: self.base_color_scheme.clone(),
            background: self.default_color.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: SyncConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
