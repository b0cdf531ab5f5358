use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use calendar_core::telemetry::init_tracing;
use calendar_core::CalendarConfig;
use calendar_mq::{Connector, RedisConsumer};
use calendar_storage::{db, SqliteNotificationStore};
use calendar_storer::Storer;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Upper bound on the whole connect phase, retries included.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "calendar-storer", version, about = "Persists delivered reminders")]
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
    init_tracing(&config.logging, "calendar_storer={level},calendar_mq={level}");

    info!(path = %config.storage.path, "opening notification store");
    let conn = db::open_connection(&config.storage.path)?;
    let store = Arc::new(SqliteNotificationStore::new(conn)?);

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

    let mut consumer = RedisConsumer::new(config.broker.clone());
    let connect = consumer.wait_for_connect(
        config.broker.max_attempts,
        config.broker.retry_backoff(),
        &cancel,
    );
    match tokio::time::timeout(STARTUP_TIMEOUT, connect).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "consumer could not connect");
            return Err(e.into());
        }
        Err(_) => {
            error!(timeout_secs = STARTUP_TIMEOUT.as_secs(), "consumer connect timed out");
            anyhow::bail!("consumer connect timed out");
        }
    }

    let mut storer = Storer::new(store, Box::new(consumer));
    storer.run(cancel).await?;
    storer.close().await?;

    info!("storer stopped");
    Ok(())
}
