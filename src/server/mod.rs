//! HTTP services
//!
//! Three small services share this module:
//! - trainer: fits a model from an uploaded CSV and persists it
//! - predictor: serves predictions from the persisted model
//! - gateway: validates uploads and forwards them to the other two

mod api;
mod error;
mod gateway;
mod handlers;
mod state;

pub use api::{create_gateway_router, create_predictor_router, create_router, create_trainer_router};
pub use error::ServerError;
pub use state::AppState;

use crate::storage::DEFAULT_MODEL_DIR;
use crate::utils::DEFAULT_DATASET;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Which service a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServiceKind {
    Trainer,
    Predictor,
    Gateway,
}

impl ServiceKind {
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Gateway => 8000,
            ServiceKind::Trainer => 8001,
            ServiceKind::Predictor => 8002,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Trainer => "trainer",
            ServiceKind::Predictor => "predictor",
            ServiceKind::Gateway => "gateway",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Listen port; None uses the service default
    pub port: Option<u16>,
    pub model_dir: PathBuf,
    pub trainer_url: String,
    pub predict_url: String,
    pub max_upload_size: usize,
    pub upstream_timeout: Duration,
    pub default_dataset: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()),
            model_dir: std::env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_DIR)),
            trainer_url: std::env::var("TRAINER_URL").unwrap_or_else(|_| "http://trainer:8001".to_string()),
            predict_url: std::env::var("PREDICT_URL").unwrap_or_else(|_| "http://predict:8002".to_string()),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
            upstream_timeout: Duration::from_secs(
                std::env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            default_dataset: std::env::var("DEFAULT_DATASET").unwrap_or_else(|_| DEFAULT_DATASET.to_string()),
        }
    }
}

impl ServerConfig {
    pub fn port_for(&self, kind: ServiceKind) -> u16 {
        self.port.unwrap_or_else(|| kind.default_port())
    }
}

/// Start one service with the given configuration
pub async fn run_server(kind: ServiceKind, config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let state = Arc::new(AppState::new(config.clone())?);
    let app = create_router(kind, state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port_for(kind)).parse()?;
    info!(
        service = kind.name(),
        address = %addr,
        model_dir = %config.model_dir.display(),
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Service starting"
    );
    if kind == ServiceKind::Gateway {
        info!(trainer_url = %config.trainer_url, predict_url = %config.predict_url, "Forwarding to upstream services");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!(service = kind.name(), "Server shut down cleanly");
    Ok(())
}
