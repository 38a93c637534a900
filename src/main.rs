use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use nottofu_dashboard::config::{CliArgs, ClientConfig};
use nottofu_dashboard::error::DashboardError;
use nottofu_dashboard::event_log::{EventLevel, EventSource};
use nottofu_dashboard::server;
use nottofu_dashboard::settings::{default_settings_path, load_settings};
use nottofu_dashboard::state::DashboardState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let _log_guard = init_tracing(args.log_file.as_deref())?;

    info!("Starting nottofu-dashboard v{}", env!("CARGO_PKG_VERSION"));

    let settings = match args.settings.clone().or_else(default_settings_path) {
        Some(path) => {
            info!("Settings file: {:?}", path);
            load_settings(&path)
        }
        None => Default::default(),
    };

    let config = ClientConfig::from_args(args, &settings);
    config.validate()?;
    info!("Backend API: {}", config.api_url);
    info!(
        "Intervals: data {}ms, status {}ms, timeout {}ms",
        config.refresh_interval.as_millis(),
        config.status_interval.as_millis(),
        config.request_timeout.as_millis()
    );
    let port = config.port;

    let state = Arc::new(DashboardState::new(config)?);
    state
        .events
        .emit(
            EventSource::Dashboard,
            EventLevel::Info,
            format!("Dashboard starting on port {}", port),
        )
        .await;
    state.start();

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Dashboard listening on http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dashboard shutting down");
    state.shutdown().await;

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, DashboardError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nottofu_dashboard=info,tower_http=info".into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| DashboardError::InvalidConfig(format!("log file {:?}", path)))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal");
}
