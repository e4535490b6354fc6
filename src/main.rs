use clap::Parser;
use color_eyre::eyre::Result;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod config;
mod ui;
mod wallets;

const LOG_DIR: &str = "logs";

/// Logs go to a daily file; the terminal belongs to the UI.
fn init_tracing() -> WorkerGuard {
    let appender = rolling::daily(LOG_DIR, "red-vs-blue.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = config::Args::parse();
    let _log_guard = init_tracing();
    tracing::info!("starting red-vs-blue client");
    let app_config = config::AppConfig::from_args(args)?;
    client::run_app(app_config).await
}
