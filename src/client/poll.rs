//! Periodic background reloads.
//!
//! A poll drives [`Router::background_reload`] on a fixed interval. Poll
//! ticks are not active visits: they never interrupt a navigation in
//! flight, and a tick whose response lands while a visit is active (or
//! after the page moved on) is discarded.

use crate::client::cancel::CancelToken;
use crate::client::router::Router;
use crate::types::VisitOptions;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Handle to a running poll loop.
///
/// The loop stops when [`PollHandle::stop`] is called or the handle is
/// dropped.
#[derive(Debug)]
pub struct PollHandle {
    stop: CancelToken,
    task: tokio::task::JoinHandle<()>,
}

impl PollHandle {
    /// Stop the poll loop. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether the loop has been asked to stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop.cancel();
        self.task.abort();
    }
}

impl Router {
    /// Reload the current page every `every`, in the background.
    ///
    /// Pass `only`/`except` in `options` to keep the poll partial. Ticks
    /// use the prefetch concurrency rules: they run alongside active
    /// visits and their results apply only when nothing else owns the
    /// screen.
    #[must_use]
    pub fn poll(&self, every: Duration, options: VisitOptions) -> PollHandle {
        let router = self.clone();
        let stop = CancelToken::new();
        let watch = stop.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; polling starts one period in.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        router.background_reload(options.clone()).await;
                    }
                    _ = watch.cancelled() => break,
                }
            }
        });
        PollHandle { stop, task }
    }
}
