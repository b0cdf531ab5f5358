use std::time::Duration;

use anyhow::Context;
use calendar_core::telemetry::init_tracing;
use calendar_core::CalendarConfig;
use calendar_mq::{Connector, RedisProducer};
use calendar_scheduler::SchedulerEngine;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Upper bound on the whole connect phase, retries included.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "calendar-scheduler", version, about = "Scans events and publishes due reminders")]
struct Cli {
    /// Config file path (falls back to CALENDAR_CONFIG, then ~/.calendar/calendar.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("CALENDAR_CONFIG").ok());
    let config = CalendarConfig::load(config_path.as_deref()).context("loading config")?;
    init_tracing(&config.logging, "calendar_scheduler={level},calendar_mq={level}");

    let store = calendar_storage::open_event_store(&config.storage)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
            }
            cancel.cancel();
        }
    });

    let mut producer = RedisProducer::new(config.broker.clone());
    let connect = producer.wait_for_connect(
        config.broker.max_attempts,
        config.broker.retry_backoff(),
        &cancel,
    );
    match tokio::time::timeout(STARTUP_TIMEOUT, connect).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "producer could not connect");
            return Err(e.into());
        }
        Err(_) => {
            error!(timeout_secs = STARTUP_TIMEOUT.as_secs(), "producer connect timed out");
            anyhow::bail!("producer connect timed out");
        }
    }

    let engine = SchedulerEngine::new(store, Box::new(producer), &config.scheduler);
    engine.run(cancel).await;
    engine.close().await?;

    info!("scheduler stopped");
    Ok(())
}
