use std::{future::Future, time::Duration};
use tokio::{task::JoinHandle, time::sleep};

/// Collapses a burst of [Debouncer::schedule] calls into one run of the last
/// task, `delay` after the burst goes quiet.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            // Once fired, the task runs on its own; cancelling the timer
            // after this point must not tear down a save halfway through.
            tokio::spawn(task);
        });
        self.pending = Some(timer);
    }

    /// No-op if nothing is pending or the task already fired.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
