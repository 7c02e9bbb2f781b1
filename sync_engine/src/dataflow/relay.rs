//! Event streaming Relay
//!
//! Relay carries events from whoever observes them (UI adapters, the replay
//! tool, the dispatcher's own workers) to whoever consumes them, over an
//! unbounded channel.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Type-safe event relay.
///
/// # Event-Source Naming Convention
///
/// Relays follow the `{source}_{event}_relay` pattern:
/// - `action_dispatched_relay` - an action was fed to the dispatcher
/// - `repaint_completed_relay` - the repaint worker finished a cycle
///
/// # Examples
///
/// ```rust
/// use futures::StreamExt;
/// use sync_engine::dataflow::relay;
///
/// # futures::executor::block_on(async {
/// let (column_hovered_relay, mut column_hovered_stream) = relay::<u32>();
/// column_hovered_relay.send(42);
/// assert_eq!(column_hovered_stream.next().await, Some(42));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: UnboundedSender<T>,
}

/// Error type for Relay operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The receiver has been dropped
    ChannelClosed,
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new Relay with its receiver stream. The `relay()` function is
    /// the shorter spelling.
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (Relay { sender }, receiver)
    }

    /// Send an event. Dropped silently when nobody listens.
    pub fn send(&self, value: T) {
        let _ = self.sender.unbounded_send(value);
    }

    /// Send an event, reporting a closed receiver.
    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }

    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A disconnected relay: events are discarded. Used where an event sink is
    /// optional, e.g. a dispatcher built without an event listener.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

/// Creates a new Relay with an associated receiver stream.
pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Relay::new()
}
