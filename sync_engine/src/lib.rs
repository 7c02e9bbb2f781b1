//! Cross-view synchronization between an alignment grid and 3D structure
//! views: coordinate translation, prioritized color rules and a debounced,
//! serialized repaint pipeline.

pub mod adapters;
pub mod annotations;
pub mod color_rules;
pub mod config;
pub mod dataflow;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod position_mapper;
pub mod window_mask;

#[cfg(test)]
mod testing;

pub use adapters::{AdapterError, LoggingMsaAdapter, LoggingStructureAdapter, MsaAdapter, RendererConfig, StructureAdapter};
pub use color_rules::{ColorGroup, ColorRuleStore, ResiduePaint, ResolvedPaint, SubscriptionId};
pub use config::{SyncConfig, load_config};
pub use dispatcher::{BINDING_SITE_PRIORITY, ColorState, MUTATION_PRIORITY, MutationMark, SyncDispatcher};
pub use error::{SyncError, View};
pub use pipeline::{Highlight, SyncEvent, ViewportEvent};
pub use position_mapper::PositionMapper;
pub use window_mask::WindowMask;
