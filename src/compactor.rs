use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::ledger::Ledger;

/// Check the log every `interval` and compact it once more than `threshold`
/// appends have accumulated.
pub async fn run_compactor(ledger: Arc<Ledger>, threshold: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = compact_if_due(&ledger, threshold).await {
            error!("compaction failed: {e}");
        }
    }
}

/// Returns whether a compaction ran.
pub async fn compact_if_due(ledger: &Ledger, threshold: u64) -> Result<bool, crate::admission::ValidationError> {
    let appends = ledger.appends_since_compact().await?;
    if appends <= threshold {
        debug!(appends, threshold, "compaction not due");
        return Ok(false);
    }
    ledger.compact().await?;
    Ok(true)
}
