//! HTTP request handlers for the trainer and predictor services

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::params::{parse_columns_to_drop, parse_model_params};
use crate::training::{ModelConfiguration, DEFAULT_MODEL_KIND};

use super::error::{Result, ServerError};
use super::state::AppState;

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Multipart form split into file parts and text fields
#[derive(Debug, Default)]
pub(crate) struct FormData {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

impl FormData {
    pub async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                    info!(field = %name, file_name = %file_name, bytes = data.len(), "Received file");
                    form.files.insert(name, UploadedFile { file_name, content_type, data });
                }
                None => {
                    let text = field.text().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    #[cfg(test)]
    pub fn insert_file(&mut self, name: &str, file: UploadedFile) {
        self.files.insert(name.to_string(), file);
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Text field value; blank values count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ============================================================================
// Trainer
// ============================================================================

pub async fn trainer_status() -> Json<Value> {
    Json(json!({ "message": "Trainer service is up and ready to train models" }))
}

/// Train a model from an uploaded CSV, or the default dataset when none is sent
pub async fn train(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Json<Value>> {
    let form = FormData::read(&mut multipart).await?;

    let model_kind = form.text("model_type").unwrap_or(DEFAULT_MODEL_KIND).to_string();
    if !state.registry.contains(&model_kind) {
        return Err(ServerError::BadRequest(format!("Model not supported: {}", model_kind)));
    }
    let hyperparameters = parse_model_params(form.text("model_params").unwrap_or("{}"))?;
    let columns_to_drop = parse_columns_to_drop(form.text("columns_to_drop"))?;
    let target_column = form.text("target_column").map(str::to_string);

    let df = match form.file("dataset_file") {
        Some(upload) => state
            .loader
            .load_csv_bytes(&upload.data)
            .map_err(|e| ServerError::BadRequest(format!("Error reading CSV file: {}", e)))?,
        None => {
            info!(dataset = %state.datasets.default_name(), "No dataset uploaded, using default dataset");
            state
                .datasets
                .load_default()
                .map_err(|e| ServerError::Internal(format!("failed to load default dataset: {}", e)))?
        }
    };

    if let Some(target) = &target_column {
        if df.get_column_index(target).is_none() {
            return Err(ServerError::BadRequest(format!("Target column '{}' not found in dataset", target)));
        }
    }

    let mut config = ModelConfiguration::new(model_kind).with_hyperparameters(hyperparameters);
    config.target_column = target_column;
    config.columns_to_drop = columns_to_drop;

    let mut pipeline = state.pipeline();
    let outcome = tokio::task::spawn_blocking(move || pipeline.train(&df, &config))
        .await
        .map_err(|e| ServerError::Internal(format!("training task failed: {}", e)))??;

    let mut metrics = Map::new();
    metrics.insert(outcome.metric.name.clone(), json!(outcome.metric.value));

    Ok(Json(json!({
        "metrics": metrics,
        "model_path": outcome.artifact_location.display().to_string(),
    })))
}

// ============================================================================
// Predictor
// ============================================================================

pub async fn predictor_status() -> Json<Value> {
    Json(json!({ "message": "Predictor service is up and ready to make predictions" }))
}

/// Predict with the persisted model, loaded fresh for every request
pub async fn predict(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Json<Value>> {
    let form = FormData::read(&mut multipart).await?;

    let upload = form
        .file("input_file")
        .ok_or_else(|| ServerError::BadRequest("No input file provided".to_string()))?;

    if !state.store.exists() {
        warn!(path = %state.store.location().display(), "Prediction requested before any model was trained");
        return Err(ServerError::NotFound("Model not found. Train a model first.".to_string()));
    }

    let df = state
        .loader
        .load_csv_bytes(&upload.data)
        .map_err(|e| ServerError::BadRequest(format!("Error reading CSV file: {}", e)))?;
    let columns_to_drop = parse_columns_to_drop(form.text("columns_to_drop"))?;

    let mut pipeline = state.pipeline();
    let predictions = tokio::task::spawn_blocking(move || pipeline.predict(&df, columns_to_drop.as_deref()))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;

    info!(rows = predictions.len(), "Predictions served");
    Ok(Json(json!({ "predictions": predictions })))
}
