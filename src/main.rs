use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use slotguard::compactor::run_compactor;
use slotguard::config::Config;
use slotguard::driver::handle_line;
use slotguard::ledger::Ledger;
use slotguard::notify::NotifyHub;
use slotguard::service::BookingService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries protocol replies only.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    slotguard::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.wal_path();
    let ledger = Arc::new(Ledger::open(&wal_path, Arc::new(NotifyHub::new()))?);
    info!("slotguard ready");
    info!("  wal: {}", wal_path.display());
    info!("  compact: every {:?} past {} appends", config.compact_interval, config.compact_threshold);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    tokio::spawn(run_compactor(ledger.clone(), config.compact_threshold, config.compact_interval));
    let service = BookingService::new(ledger);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = handle_line(&service, &line).await;
                stdout.write_all(format!("{reply}\n").as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("slotguard stopped");
    Ok(())
}
