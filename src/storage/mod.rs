//! Persistence of trained artifacts
//!
//! The artifact bundles the fitted model with the encoders it was trained
//! with. It is written as JSON to a temporary file in the target directory
//! and renamed over the destination, so readers never see a partial file.

use crate::error::{PipelineError, Result};
use crate::preprocessing::EncoderSet;
use crate::training::{EvaluationMetric, TrainedModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Version written into every artifact; other versions are rejected on load
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default directory shared by the trainer and predictor
pub const DEFAULT_MODEL_DIR: &str = "/shared-data/models";

/// Default artifact file name inside the model directory
pub const DEFAULT_MODEL_FILE: &str = "model.pkl";

/// Everything needed to reproduce predictions of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub format_version: u32,
    pub model_kind: String,
    pub model: TrainedModel,
    pub encoders: EncoderSet,
    pub target_column: String,
    /// Feature columns in the order the model was fit on
    pub feature_names: Vec<String>,
    pub metric: EvaluationMetric,
    pub trained_at: DateTime<Utc>,
}

/// Storage slot for a single artifact
pub trait ArtifactStore: Send + Sync {
    /// Replace the stored artifact
    fn save(&self, artifact: &TrainedArtifact) -> Result<()>;

    /// Read the stored artifact, `ArtifactNotFound` if there is none
    fn load(&self) -> Result<TrainedArtifact>;

    fn exists(&self) -> bool;

    /// Where the artifact lives
    fn location(&self) -> &Path;
}

/// Artifact store backed by one file on the local filesystem
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    path: PathBuf,
}

impl Default for FsArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_DIR)
    }
}

impl FsArtifactStore {
    /// Store `model.pkl` inside `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_file_name(dir, DEFAULT_MODEL_FILE)
    }

    pub fn with_file_name(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self { dir, path }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, artifact: &TrainedArtifact) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, artifact)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PipelineError::IoError(e.error))?;

        info!(
            path = %self.path.display(),
            model_kind = %artifact.model_kind,
            features = artifact.feature_names.len(),
            encoders = artifact.encoders.len(),
            "Saved model artifact"
        );
        Ok(())
    }

    fn load(&self) -> Result<TrainedArtifact> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ArtifactNotFound { path: self.path.clone() })
            }
            Err(e) => return Err(e.into()),
        };

        let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::SerializationError(format!("corrupt artifact {}: {}", self.path.display(), e))
        })?;

        match value.get("format_version").and_then(|v| v.as_u64()) {
            Some(v) if v == u64::from(ARTIFACT_FORMAT_VERSION) => {}
            other => {
                return Err(PipelineError::SerializationError(format!(
                    "artifact {} has format version {:?}, expected {}",
                    self.path.display(),
                    other,
                    ARTIFACT_FORMAT_VERSION
                )))
            }
        }

        let artifact: TrainedArtifact = serde_json::from_value(value)?;
        debug!(path = %self.path.display(), model_kind = %artifact.model_kind, "Loaded model artifact");
        Ok(artifact)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
