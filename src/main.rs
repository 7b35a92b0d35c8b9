use anyhow::{Context, Result};
use axum::Router;
use photo_splitter::{
    config::{self, Command},
    models::event::StorageEvent,
    routes::routes::{api_routes, worker_routes},
    state::{self, ApiState},
};
use std::{io::ErrorKind, path::Path, process::ExitCode};
use tokio::{io::AsyncReadExt, net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Logging setup ---
    // stderr keeps stdout free for the `process` result
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_splitter=info,tower_http=info".into()),
        )
        .init();

    // --- Parse config + command ---
    let (cfg, command) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-splitter {:?} with config: {:?}", command, cfg);

    match command {
        Command::Api => {
            let state = ApiState::from_config(&cfg);
            serve(&cfg, api_routes(state, cfg.max_body_bytes)).await?;
        }
        Command::Worker => {
            let worker = state::worker_from_config(&cfg);
            serve(&cfg, worker_routes(worker)).await?;
        }
        Command::Process { event } => {
            let worker = state::worker_from_config(&cfg);
            let event = read_event(event.as_deref()).await?;
            let result = worker.handle_event(&event).await;

            println!("{}", serde_json::to_string(&result)?);
            if !result.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Bind and serve until Ctrl+C or SIGTERM.
async fn serve(cfg: &config::AppConfig, app: Router) -> Result<()> {
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Read one event envelope from `path`, or from stdin when absent.
async fn read_event(path: Option<&Path>) -> Result<StorageEvent> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading event file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("reading event from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("parsing storage event")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
