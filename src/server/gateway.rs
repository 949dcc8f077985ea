//! Gateway handlers forwarding uploads to the trainer and predictor

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::{Result, ServerError};
use super::handlers::{FormData, UploadedFile};
use super::state::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv";

pub async fn gateway_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (trainer_status, predict_status) = tokio::join!(
        upstream_status(&state.http, &state.config.trainer_url, "Trainer"),
        upstream_status(&state.http, &state.config.predict_url, "Predictor"),
    );

    Json(json!({
        "message": "Gateway is up",
        "trainer_status": trainer_status,
        "predict_status": predict_status,
    }))
}

async fn upstream_status(client: &reqwest::Client, base_url: &str, service: &str) -> Value {
    let url = format!("{}/", base_url.trim_end_matches('/'));
    let response = match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(e) => return json!({ "error": format!("{} service unavailable: {}", service, e) }),
    };
    response
        .json::<Value>()
        .await
        .unwrap_or_else(|e| json!({ "error": format!("{} service returned invalid JSON: {}", service, e) }))
}

pub async fn forward_train(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Response> {
    let form = FormData::read(&mut multipart).await?;
    let url = format!("{}/train", state.config.trainer_url.trim_end_matches('/'));
    forward(&state.http, &url, "Trainer", &form, "dataset_file").await
}

pub async fn forward_predict(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Response> {
    let form = FormData::read(&mut multipart).await?;
    let url = format!("{}/predict", state.config.predict_url.trim_end_matches('/'));
    forward(&state.http, &url, "Predictor", &form, "input_file").await
}

fn require_csv<'a>(form: &'a FormData, file_field: &str) -> Result<&'a UploadedFile> {
    let upload = form
        .file(file_field)
        .ok_or_else(|| ServerError::BadRequest(format!("Missing file field '{}'", file_field)))?;

    let is_csv = upload
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().eq_ignore_ascii_case(CSV_CONTENT_TYPE))
        .unwrap_or(false);
    if !is_csv {
        return Err(ServerError::BadRequest("Only CSV files are supported.".to_string()));
    }
    Ok(upload)
}

/// Re-send the form upstream and relay its status and JSON body
async fn forward(
    client: &reqwest::Client,
    url: &str,
    service: &str,
    form: &FormData,
    file_field: &str,
) -> Result<Response> {
    let upload = require_csv(form, file_field)?;

    let part = reqwest::multipart::Part::bytes(upload.data.to_vec())
        .file_name(upload.file_name.clone())
        .mime_str(CSV_CONTENT_TYPE)
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let mut outgoing = reqwest::multipart::Form::new().part(file_field.to_string(), part);
    for (name, value) in form.fields() {
        outgoing = outgoing.text(name.to_string(), value.to_string());
    }

    let response = client.post(url).multipart(outgoing).send().await.map_err(|e| {
        error!(service, url, error = %e, "Upstream request failed");
        ServerError::Upstream(format!("Error calling {} service: {}", service, e))
    })?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = response
        .bytes()
        .await
        .map_err(|e| ServerError::Upstream(format!("Error reading {} service response: {}", service, e)))?;

    let json_body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| {
        json!({
            "error": true,
            "message": String::from_utf8_lossy(&body),
        })
    });

    info!(service, status = status.as_u16(), "Relayed upstream response");
    Ok((status, Json(json_body)).into_response())
}
