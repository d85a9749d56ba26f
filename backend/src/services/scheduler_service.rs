//! Background task scheduler.
//!
//! Runs the periodic review-window sweep.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::services::review_sweeper::ReviewSweeper;

/// Delay before the first sweep so the server can finish starting up.
const STARTUP_DELAY: Duration = Duration::from_secs(5);

/// Spawn all background scheduler tasks.
pub fn spawn_all(sweeper: Arc<ReviewSweeper>, sweep_interval: Duration) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // Review-window sweep
    handles.push(tokio::spawn(async move {
        tokio::time::sleep(STARTUP_DELAY).await;
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::debug!("Running review-window sweep");

            if let Err(e) = sweeper.sweep().await {
                tracing::warn!("Review-window sweep failed: {}", e);
            }
        }
    }));

    tracing::info!(
        "Background schedulers started: review sweep every {}s",
        sweep_interval.as_secs()
    );
    handles
}
