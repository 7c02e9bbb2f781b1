//! Dataflow primitives the dispatcher is wired from
//!
//! - **[`Relay`]** - unbounded event stream (`{source}_{event}_relay`)
//! - **[`Mailbox`]** - depth-1 latest-wins slot with debounced receive
//! - **[`TaskHandle`]** - spawned worker aborted on drop

pub mod mailbox;
pub mod relay;
pub mod task;

pub use mailbox::{Mailbox, MailboxReceiver, mailbox};
pub use relay::{Relay, RelayError, relay};
pub use task::TaskHandle;
