//! CLI module for Access Gate
//!
//! Provides subcommands for running the system in different topologies:
//! - `directory`: admin API plus the message responder
//! - `gate`: key-checking API resolving keys through the directory
//! - `serve`: both in one process (default)

pub mod directory;
pub mod gate;
pub mod serve;

use std::future::Future;

use axum::Router;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::api::{create_router, ApiComponents, MetricsEndpoint};
use crate::config::AppConfig;
use crate::infrastructure::observability::{init_metrics, init_tracing, shutdown_tracing};

/// Access Gate - access key management and enforcement
#[derive(Parser)]
#[command(name = "access-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run directory and gate in one process (default mode)
    Serve,

    /// Run the access key directory: admin API and message responder
    Directory,

    /// Run the gate: token-info API backed by the directory
    Gate,
}

/// Load `.env`, configuration and logging for a command
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.logging, &config.observability.tracing);

    Ok(config)
}

/// Attach the metrics endpoint when metrics are enabled
fn with_metrics(config: &AppConfig, mut components: ApiComponents) -> ApiComponents {
    components.metrics = init_metrics(&config.observability.metrics).map(|metrics| {
        MetricsEndpoint {
            metrics,
            path: config.observability.metrics.path.clone(),
        }
    });
    components
}

/// Fans one shutdown signal out to the HTTP server and background listeners
#[derive(Debug, Clone)]
struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Shutdown {
    fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    fn trigger(&self) {
        self.sender.send_replace(true);
    }

    fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let _ = receiver.wait_for(|stopped| *stopped).await;
        }
    }
}

/// Serve `app` until Ctrl+C or SIGTERM, then stop listeners and flush traces
async fn serve_http(config: &AppConfig, app: Router, shutdown: Shutdown) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let trigger = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.trigger();
        })
        .await;

    shutdown.trigger();
    shutdown_tracing();
    info!("Shutdown complete");

    result.map_err(Into::into)
}

fn build_app(config: &AppConfig, components: ApiComponents) -> Router {
    create_router(with_metrics(config, components))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["access-gate", "gate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Gate)));

        let cli = Cli::try_parse_from(["access-gate"]).unwrap();
        assert!(cli.command.is_none());

        assert!(Cli::try_parse_from(["access-gate", "ui"]).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_reaches_every_waiter() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(shutdown.wait());
        let second = tokio::spawn(shutdown.wait());

        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .unwrap();
    }
}
