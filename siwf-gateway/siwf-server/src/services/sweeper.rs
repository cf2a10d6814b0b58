//! Periodic nonce retention sweep

use chrono::Utc;
use siwf_auth::NonceLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn a task deleting expired nonce rows every `period`
pub fn spawn(ledger: Arc<dyn NonceLedger>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match ledger.sweep_expired(Utc::now()).await {
                Ok(removed) => debug!(removed, "nonce sweep complete"),
                Err(err) => warn!(error = %err, "nonce sweep failed"),
            }
        }
    })
}
