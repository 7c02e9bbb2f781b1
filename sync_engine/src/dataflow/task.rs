use std::future::Future;
use tokio::task::JoinHandle;

/// Owns a spawned task and aborts it when dropped, so background workers
/// live exactly as long as the value that started them.
#[derive(Debug)]
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `future` on the current tokio runtime. Panics outside a runtime,
    /// like `tokio::spawn`.
    pub fn start_droppable<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
