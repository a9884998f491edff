use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fable_types::models::StoryId;

use crate::auth::AppState;

/// Background task that reclaims turn locks nobody used in time.
///
/// Owned by the server: spawned at boot, stopped by [`LockSweeper::shutdown`].
pub struct LockSweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LockSweeper {
    pub fn spawn(state: AppState, lock_timeout: chrono::Duration, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweep_loop(state, lock_timeout, interval, cancel.clone()));
        info!(
            "Lock sweeper started (timeout {}s, every {}s)",
            lock_timeout.num_seconds(),
            interval.as_secs()
        );
        Self { cancel, handle }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Lock sweeper task failed: {}", e);
        }
    }
}

async fn run_sweep_loop(
    state: AppState,
    lock_timeout: chrono::Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        match sweep_once(&state, Utc::now(), lock_timeout).await {
            Ok(released) => {
                if !released.is_empty() {
                    info!("Sweep: released {} expired turn locks {:?}", released.len(), released);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }

    info!("Lock sweeper stopped");
}

/// Release every lock older than `lock_timeout` as of `now`.
pub async fn sweep_once(
    state: &AppState,
    now: DateTime<Utc>,
    lock_timeout: chrono::Duration,
) -> anyhow::Result<Vec<StoryId>> {
    let db = state.clone();
    let released = tokio::task::spawn_blocking(move || db.db.release_expired_turns(now, lock_timeout)).await??;
    Ok(released)
}
