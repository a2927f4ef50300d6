use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use duebell_board::WekanClient;
use duebell_core::config::DuebellConfig;
use duebell_notify::{Dispatcher, MessageFormatter, SnsPublisher};
use duebell_scheduler::ReminderScheduler;
use tracing::{error, info};

mod app;
mod http;

#[derive(Parser, Debug)]
#[command(name = "duebell-gateway", version, about = "Due-date reminders for task boards")]
struct Cli {
    /// Path to duebell.toml (default: $DUEBELL_CONFIG, then ~/.duebell/duebell.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "duebell_gateway=info,duebell_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > DUEBELL_CONFIG env > ~/.duebell/duebell.toml
    let config_path = cli.config.or_else(|| std::env::var("DUEBELL_CONFIG").ok());
    let config = DuebellConfig::load(config_path.as_deref())
        .inspect_err(|e| error!(code = e.code(), "configuration rejected: {e}"))?;
    let tz = config
        .reminders
        .tz()
        .inspect_err(|e| error!(code = e.code(), "configuration rejected: {e}"))?;

    info!(
        board = %config.board.base_url,
        region = %config.notify.region,
        lookahead_minutes = config.reminders.lookahead_minutes,
        interval_minutes = config.reminders.poll_interval_minutes,
        timezone = %config.reminders.timezone,
        "configuration loaded"
    );

    let board = Arc::new(WekanClient::new(&config.board, tz)?);
    let publisher = Arc::new(SnsPublisher::from_config(&config.notify)?);
    let dispatcher = Dispatcher::new(
        publisher,
        config.notify.topic_arn.clone(),
        MessageFormatter::new(tz, config.board.base_url.clone()),
    )
    .with_timeout(Duration::from_secs(config.notify.request_timeout_secs));

    let scheduler = Arc::new(ReminderScheduler::new(board, dispatcher, &config.reminders));
    scheduler.start(config.reminders.poll_interval())?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, Arc::clone(&scheduler)));
    let router = app::build_router(state);

    info!(%addr, "duebell gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    info!("duebell gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
