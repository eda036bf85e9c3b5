//! services/api/src/web/sync_task.rs
//!
//! The auto-sync worker. It only runs when a remote store is configured, and each
//! tick is skipped unless auto-sync is enabled in the app settings.

use crate::web::state::AppState;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub async fn auto_sync(app_state: Arc<AppState>, cancellation_token: CancellationToken) {
    let period = app_state.config.auto_sync_interval;
    info!(minutes = period.as_secs() / 60, "Auto-sync task started.");
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Auto-sync task cancelled.");
                return;
            }
            _ = ticker.tick() => {
                let enabled = app_state.library.lock().await.app_settings.auto_sync;
                if !enabled {
                    debug!("Auto-sync is disabled in the settings, skipping.");
                    continue;
                }
                // Failures are already logged and broadcast by `run_sync`.
                let _ = app_state.run_sync().await;
            }
        }
    }
}
