//! Integration test: trainer, predictor and gateway endpoints

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tabserve::server::{
    create_gateway_router, create_predictor_router, create_trainer_router, AppState, ServerConfig,
};
use tower::ServiceExt;

const BOUNDARY: &str = "tabserve-test-boundary";

fn test_config(model_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: None,
        model_dir: model_dir.to_path_buf(),
        // Nothing listens on port 1, so upstream calls fail fast
        trainer_url: "http://127.0.0.1:1".to_string(),
        predict_url: "http://127.0.0.1:1".to_string(),
        max_upload_size: 10 * 1024 * 1024,
        upstream_timeout: Duration::from_secs(2),
        default_dataset: "iris".to_string(),
    }
}

fn test_state(model_dir: &Path) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(model_dir)).unwrap())
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File { name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a str },
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match part {
            Part::Text(name, value) => {
                body.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name));
                body.push_str(value);
            }
            Part::File { name, file_name, content_type, data } => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, file_name
                ));
                body.push_str(&format!("Content-Type: {}\r\n\r\n", content_type));
                body.push_str(data);
            }
        }
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const TRAIN_CSV: &str = "a,b,target\n1,2,0\n3,4,1\n5,6,0\n7,8,1\n";

#[tokio::test]
async fn test_trainer_status() {
    let dir = tempfile::tempdir().unwrap();
    let response = create_trainer_router(test_state(dir.path())).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Trainer service is up and ready to train models");
}

#[tokio::test]
async fn test_trainer_unsupported_model() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/train",
        &[
            Part::File { name: "dataset_file", file_name: "data.csv", content_type: "text/csv", data: TRAIN_CSV },
            Part::Text("model_type", "SVC"),
        ],
    );
    let response = create_trainer_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_trainer_missing_target() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/train",
        &[
            Part::File { name: "dataset_file", file_name: "data.csv", content_type: "text/csv", data: TRAIN_CSV },
            Part::Text("target_column", "label"),
        ],
    );
    let response = create_trainer_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trainer_malformed_params() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/train",
        &[
            Part::File { name: "dataset_file", file_name: "data.csv", content_type: "text/csv", data: TRAIN_CSV },
            Part::Text("model_params", "not json"),
        ],
    );
    let response = create_trainer_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_then_predict_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let request = multipart_request(
        "/train",
        &[
            Part::File { name: "dataset_file", file_name: "data.csv", content_type: "text/csv", data: TRAIN_CSV },
            Part::Text("model_type", "RandomForestClassifier"),
            Part::Text("model_params", r#"{"n_estimators": 10}"#),
            Part::Text("target_column", "target"),
        ],
    );
    let response = create_trainer_router(Arc::clone(&state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let accuracy = body["metrics"]["accuracy"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    assert!(body["model_path"].as_str().unwrap().ends_with("model.pkl"));

    let request = multipart_request(
        "/predict",
        &[Part::File { name: "input_file", file_name: "input.csv", content_type: "text/csv", data: "a,b\n1,2\n3,4\n" }],
    );
    let response = create_predictor_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["predictions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_predict_reports_unknown_text_column() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let request = multipart_request(
        "/train",
        &[Part::File { name: "dataset_file", file_name: "data.csv", content_type: "text/csv", data: TRAIN_CSV }],
    );
    let response = create_trainer_router(Arc::clone(&state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = multipart_request(
        "/predict",
        &[Part::File {
            name: "input_file",
            file_name: "input.csv",
            content_type: "text/csv",
            data: "a,b,shade\n1,2,dark\n",
        }],
    );
    let response = create_predictor_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("shade"));
}

#[tokio::test]
async fn test_trainer_uses_default_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request("/train", &[Part::Text("model_type", "DecisionTreeClassifier")]);
    let response = create_trainer_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let accuracy = body["metrics"]["accuracy"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    assert!(dir.path().join("model.pkl").exists());
}

#[tokio::test]
async fn test_predictor_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/predict",
        &[Part::File { name: "input_file", file_name: "input.csv", content_type: "text/csv", data: "a,b\n1,2\n" }],
    );
    let response = create_predictor_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predictor_requires_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request("/predict", &[Part::Text("columns_to_drop", "a")]);
    let response = create_predictor_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gateway_rejects_non_csv() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/train",
        &[
            Part::File { name: "dataset_file", file_name: "test.txt", content_type: "text/plain", data: "some content" },
            Part::Text("model_type", "RandomForestClassifier"),
            Part::Text("target_column", "target"),
        ],
    );
    let response = create_gateway_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Only CSV files are supported.");

    let request = multipart_request(
        "/predict",
        &[Part::File { name: "input_file", file_name: "test.txt", content_type: "text/plain", data: "some content" }],
    );
    let response = create_gateway_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gateway_upstream_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let request = multipart_request(
        "/predict",
        &[Part::File { name: "input_file", file_name: "input.csv", content_type: "text/csv", data: "a,b\n1,2\n" }],
    );
    let response = create_gateway_router(test_state(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_gateway_status_reports_upstreams() {
    let dir = tempfile::tempdir().unwrap();
    let response = create_gateway_router(test_state(dir.path())).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["message"], "Gateway is up");
    assert!(body["trainer_status"]["error"].is_string());
    assert!(body["predict_status"]["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let response = create_predictor_router(Arc::clone(&state)).oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = create_predictor_router(state).oneshot(get("/predict")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
