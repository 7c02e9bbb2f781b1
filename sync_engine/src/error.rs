use crate::adapters::AdapterError;
use shared::ChainId;

/// Which view an operation was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Msa,
    Structure,
    Aligned,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Msa => f.write_str("msa"),
            View::Structure => f.write_str("structure"),
            View::Aligned => f.write_str("aligned structure"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no {view} adapter attached")]
    MissingAdapter { view: View },
    #[error("position {position} has no counterpart on chain {chain_id}")]
    UnmappablePosition { chain_id: ChainId, position: i64 },
    #[error("no active chain context")]
    NoContext,
    #[error("'{chain_key}' is not a chain key")]
    InvalidChainKey { chain_key: String },
    #[error("chain {requested} is not the active chain ({active})")]
    StaleChain { requested: ChainId, active: ChainId },
    #[error("{view} adapter failed during {operation}")]
    AdapterOperation {
        view: View,
        operation: &'static str,
        #[source]
        source: AdapterError,
    },
}

impl SyncError {
    pub fn adapter(view: View, operation: &'static str) -> impl FnOnce(AdapterError) -> SyncError {
        move |source| SyncError::AdapterOperation {
            view,
            operation,
            source,
        }
    }

    pub fn unmappable(chain_id: &str, position: impl Into<i64>) -> SyncError {
        SyncError::UnmappablePosition {
            chain_id: chain_id.to_string(),
            position: position.into(),
        }
    }

    /// Expected degradations (a view not attached yet, a gap column, an
    /// outdated chain) as opposed to a renderer actually failing.
    pub fn is_benign(&self) -> bool {
        !matches!(self, SyncError::AdapterOperation { .. })
    }
}

/// Log an operation's outcome. Nothing is surfaced to the caller.
pub fn report(context: &str, result: Result<(), SyncError>) {
    match result {
        Ok(()) => {}
        Err(error) if error.is_benign() => log::debug!("{}: skipped: {}", context, error),
        Err(SyncError::AdapterOperation {
            view,
            operation,
            source,
        }) => log::warn!("{}: {} adapter {} failed: {}", context, view, operation, source),
        Err(error) => log::warn!("{}: {}", context, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_failures_are_not_benign() {
        let error = SyncError::adapter(View::Msa, "redraw")(AdapterError::Message("gl lost".into()));
        assert!(!error.is_benign());
        assert_eq!(error.to_string(), "msa adapter failed during redraw");
        assert!(SyncError::NoContext.is_benign());
        assert!(SyncError::unmappable("A", 12_u32).is_benign());
    }
}
