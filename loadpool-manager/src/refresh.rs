use crate::manager::ServerLoadManager;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};

/// Background task reloading a member's cache on a fixed period.
///
/// Dropping the handle leaves the task running; use [`RefreshTask::cancel`]
/// or [`RefreshTask::stop`], or end the manager.
#[derive(Debug)]
pub struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub(crate) fn spawn(
        manager: ServerLoadManager,
        interval: Duration,
        cancel: CancellationToken,
        span: Span,
    ) -> Self {
        let token = cancel.clone();
        // tokio intervals reject a zero period
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(
            async move {
                info!(interval_ms = interval.as_millis() as u64, "periodic load refresh started");

                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately, registration already loaded the cache
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            match manager.reload().await {
                                Ok(()) => debug!("periodic load refresh done"),
                                Err(e) => warn!(error = %e, "periodic load refresh failed"),
                            }
                        }
                    }
                }

                info!("periodic load refresh stopped");
            }
            .instrument(span),
        );

        RefreshTask { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "periodic load refresh task panicked");
        }
    }
}
