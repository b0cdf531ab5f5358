use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use calendar_core::telemetry::init_tracing;
use calendar_core::CalendarConfig;
use clap::Parser;
use tracing::info;

mod app;
mod http;

#[derive(Parser)]
#[command(name = "calendar", version, about = "Calendar event HTTP API")]
struct Cli {
    /// Config file path (falls back to CALENDAR_CONFIG, then ~/.calendar/calendar.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // config path: --config > CALENDAR_CONFIG env > ~/.calendar/calendar.toml
    let config_path = cli.config.or_else(|| std::env::var("CALENDAR_CONFIG").ok());
    let config = CalendarConfig::load(config_path.as_deref()).context("loading config")?;
    init_tracing(&config.logging, "calendar_gateway={level},tower_http=debug");

    let events = calendar_storage::open_event_store(&config.storage)?;
    let state = Arc::new(app::AppState::new(events));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!("calendar gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
        })
        .await?;
    Ok(())
}
