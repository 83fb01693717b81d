// crates/server/src/sweep.rs
//! Periodic job store cleanup.
//!
//! Consumed results disappear on pop; this sweeper handles the rest:
//! terminal jobs whose result was never collected, aged out after the
//! configured retention window. Running jobs are never swept.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::state::AppState;

/// Spawn the background sweep loop. Runs for the life of the process.
pub fn spawn_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = state.config.sweep_interval;
    let max_age = state.config.sweep_max_age;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = state.store.sweep(max_age, true);
            if removed > 0 {
                tracing::info!(removed, "swept expired jobs");
            }
        }
    })
}
