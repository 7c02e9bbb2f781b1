//! Depth-1, latest-wins mailbox
//!
//! Every `post` overwrites whatever is waiting in the slot, so a slow consumer
//! only ever sees the freshest value. The consumer side can wait for a value
//! (`recv`), poll for one (`try_take`), or wait until posts have been quiet
//! for a while (`recv_debounced`), which is how expensive repaints are
//! coalesced.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Posting side. Cheap to clone; every clone writes the same slot.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Consuming side. There is exactly one per mailbox.
#[derive(Debug)]
pub struct MailboxReceiver<T> {
    receiver: watch::Receiver<Option<T>>,
    slot: Weak<watch::Sender<Option<T>>>,
}

pub fn mailbox<T>() -> (Mailbox<T>, MailboxReceiver<T>) {
    let (sender, receiver) = watch::channel(None);
    let slot = Arc::new(sender);
    let receiver = MailboxReceiver {
        receiver,
        slot: Arc::downgrade(&slot),
    };
    (Mailbox { slot }, receiver)
}

impl<T> Mailbox<T> {
    /// Replace the pending value (if any) and wake the consumer.
    pub fn post(&self, value: T) {
        self.slot.send_replace(Some(value));
    }

    pub fn has_pending(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

impl<T> MailboxReceiver<T> {
    /// Take the pending value without waiting.
    pub fn try_take(&mut self) -> Option<T> {
        let slot = self.slot.upgrade()?;
        let mut taken = None;
        // Taking is not a post; the consumer must not be woken by it.
        slot.send_if_modified(|value| {
            taken = value.take();
            false
        });
        taken
    }

    /// Wait for the next posted value. `None` once every `Mailbox` is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            self.mark_seen();
            if let Some(value) = self.try_take() {
                return Some(value);
            }
            self.receiver.changed().await.ok()?;
        }
    }

    /// Wait for a value, then keep waiting until no new post has arrived for
    /// `quiet`; every post restarts the timer. Returns the last value posted.
    pub async fn recv_debounced(&mut self, quiet: Duration) -> Option<T> {
        loop {
            self.wait_pending().await?;
            loop {
                self.mark_seen();
                tokio::select! {
                    changed = self.receiver.changed() => {
                        changed.ok()?;
                    }
                    _ = tokio::time::sleep(quiet) => break,
                }
            }
            if let Some(value) = self.try_take() {
                return Some(value);
            }
        }
    }

    async fn wait_pending(&mut self) -> Option<()> {
        loop {
            if self.receiver.borrow_and_update().is_some() {
                return Some(());
            }
            self.receiver.changed().await.ok()?;
        }
    }

    fn mark_seen(&mut self) {
        let _ = self.receiver.borrow_and_update();
    }
}
