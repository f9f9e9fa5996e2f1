use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::store::{AllowlistStore, RefreshError};

/// Background task that refreshes an [`AllowlistStore`] on a fixed period.
pub struct AllowlistRefresher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AllowlistRefresher {
    /// Loads the allow-list once, then spawns the periodic refresh.
    ///
    /// The first load runs before this returns and its error is handed back,
    /// so the service never starts serving with an empty allow-list.
    /// Scheduled refreshes that fail are logged and retried next period.
    pub async fn start(
        store: Arc<AllowlistStore>,
        period: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, RefreshError> {
        let size = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
            result = store.refresh(None) => result?,
        };
        info!(entries = size, every = ?period, "allow-list loaded, scheduling refresh");

        let handle = tokio::spawn(run(store, period, cancel.clone()));
        Ok(Self { cancel, handle })
    }

    /// Stops the loop and waits for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "allow-list refresher task failed");
        }
    }
}

async fn run(store: Arc<AllowlistStore>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = store.refresh(None) => match result {
                        Ok(size) => debug!(entries = size, "scheduled allow-list refresh done"),
                        Err(e) => error!(error = %e, "scheduled allow-list refresh failed"),
                    },
                }
            }
        }
    }

    info!("allow-list refresher stopped");
}
