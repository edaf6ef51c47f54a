use std::net::SocketAddr;

// ── Admission ───────────────────────────────────────────────────

/// Counter: admission decisions. Labels: outcome, stage.
pub const ADMISSIONS_TOTAL: &str = "slotguard_admissions_total";

/// Histogram: time spent in the admission pipeline, in seconds.
pub const ADMISSION_DURATION_SECONDS: &str = "slotguard_admission_duration_seconds";

// ── Ledger ──────────────────────────────────────────────────────

/// Counter: bookings committed. Labels: mode.
pub const COMMITS_TOTAL: &str = "slotguard_commits_total";

/// Counter: commits aborted because the slot was taken after the pre-check.
pub const CONCURRENT_CONFLICTS_TOTAL: &str = "slotguard_concurrent_conflicts_total";

/// Gauge: bookings currently held in memory.
pub const BOOKINGS_STORED: &str = "slotguard_bookings_stored";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotguard_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotguard_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "slotguard_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
