//! Application state management

use std::sync::Arc;

use crate::storage::{ArtifactStore, FsArtifactStore};
use crate::training::{ModelRegistry, TrainingPipeline};
use crate::utils::{DataLoader, DatasetManager};

use super::error::ServerError;
use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn ArtifactStore>,
    pub registry: ModelRegistry,
    pub loader: DataLoader,
    pub datasets: DatasetManager,
    /// Client for gateway forwarding, bounded by the upstream timeout
    pub http: reqwest::Client,
}

impl AppState {
    /// State backed by a filesystem store under `config.model_dir`
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.model_dir));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn ArtifactStore>) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| ServerError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            datasets: DatasetManager::new(config.default_dataset.clone()),
            config,
            store,
            registry: ModelRegistry::default(),
            loader: DataLoader::new(),
            http,
        })
    }

    /// Fresh pipeline over the shared store
    pub fn pipeline(&self) -> TrainingPipeline {
        TrainingPipeline::with_registry(Arc::clone(&self.store), self.registry.clone())
    }
}
