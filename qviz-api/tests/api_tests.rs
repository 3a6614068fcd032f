//! Integration tests for the visualization API endpoints
//!
//! Drives the full router with hand-built multipart bodies:
//! - single-file mode end to end (Likert-bearing HR upload)
//! - the error taxonomy (missing columns, value range, unknown key,
//!   malformed JSON payloads)
//! - response idempotence across identical requests
//! - discovery and health endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

use qviz_api::{build_router, registry::default_registry, AppState, ChartService};
use qviz_common::config::Settings;

const BOUNDARY: &str = "qviz-test-boundary";

/// Test helper: create the app with default settings
fn setup_app() -> axum::Router {
    let service = ChartService::new(Settings::default(), Arc::new(default_registry()));
    build_router(AppState::new(service))
}

/// One multipart part: (field name, optional filename, content)
type Part<'a> = (&'a str, Option<&'a str>, &'a str);

/// Test helper: encode a multipart/form-data body
fn multipart_body(parts: &[Part]) -> String {
    let mut body = String::new();
    for (name, filename, content) in parts {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match filename {
            Some(filename) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                name, filename
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                name
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    body
}

/// Test helper: build a visualize POST request
fn visualize_request(chart_key: &str, parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/visualize/{}", chart_key))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Test helper: extract JSON body from a response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

const SINGLE_FILE_CSV: &str = "ID,Sexe,Age,PGC1,PGC2,COM1\n\
    1,1,34,4,3,2\n\
    2,2,41,5,4,3\n\
    3,1,29,3,3,4\n\
    4,2,55,2,4,5\n\
    5,1,48,4,5,3\n";

// =============================================================================
// Health and discovery
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "qviz-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_supported_keys_is_sorted_and_nonempty() {
    let app = setup_app();
    let request = Request::builder()
        .method("GET")
        .uri("/api/visualize/supported-keys")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let keys: Vec<String> = serde_json::from_value(body).unwrap();
    assert!(keys.len() >= 20);
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(keys.contains(&"time_series".to_string()));
}

// =============================================================================
// Happy path: single-file mode
// =============================================================================

#[tokio::test]
async fn test_likert_distribution_single_file() {
    let app = setup_app();
    let request = visualize_request(
        "likert_distribution",
        &[("hr_file", Some("hr.csv"), SINGLE_FILE_CSV)],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["chart_key"], "likert_distribution");
    assert!(body["generated_at"].as_str().unwrap().ends_with('Z'));
    let spec = body["spec"].as_object().unwrap();
    assert!(!spec.is_empty());
    assert!(!spec["data"]["values"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_comparison_filter_populates_segment_dropdown() {
    let app = setup_app();
    // Empty filter value means "compare by Sexe" rather than a constraint
    let request = visualize_request(
        "likert_distribution",
        &[
            ("hr_file", Some("hr.csv"), SINGLE_FILE_CSV),
            ("filters", None, r#"{"Sexe": ""}"#),
        ],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let params = body["spec"]["params"].as_array().unwrap();
    assert!(params.iter().any(|p| p["name"] == "segment_select"));
}

// =============================================================================
// Error taxonomy
// =============================================================================

#[tokio::test]
async fn test_missing_required_column_age() {
    let app = setup_app();
    let request = visualize_request(
        "likert_distribution",
        &[("hr_file", Some("hr.csv"), "ID,Sexe,PGC1\n1,2,4\n")],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "missing_required_columns");
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert!(details.contains(&"Age".to_string()));
}

#[tokio::test]
async fn test_likert_value_out_of_range() {
    let app = setup_app();
    let csv = "ID,Sexe,Age,PGC1\n1,1,30,6\n2,2,40,3\n";
    let request = visualize_request("likert_distribution", &[("hr_file", Some("hr.csv"), csv)]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "invalid_value_range");
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert_eq!(details, vec!["PGC1 out of range 1-5 in 1 rows"]);
}

#[tokio::test]
async fn test_unknown_chart_key_is_404_with_supported_keys() {
    let app = setup_app();
    let request = visualize_request(
        "not_a_real_key",
        &[("hr_file", Some("hr.csv"), SINGLE_FILE_CSV)],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "invalid_chart_key");
    let supported: Vec<String> =
        serde_json::from_value(body["supported_chart_keys"].clone()).unwrap();
    assert!(!supported.is_empty());
    assert!(supported.contains(&"time_series".to_string()));
}

#[tokio::test]
async fn test_malformed_filters_json_is_a_payload_error() {
    let app = setup_app();
    let request = visualize_request(
        "likert_distribution",
        &[
            ("hr_file", Some("hr.csv"), SINGLE_FILE_CSV),
            ("filters", None, "{not json"),
        ],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "payload_error");
    assert!(body["supported_chart_keys"].is_null());
}

#[tokio::test]
async fn test_missing_hr_file_is_a_payload_error() {
    let app = setup_app();
    let request = visualize_request("likert_distribution", &[("filters", None, "{}")]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "payload_error");
}

#[tokio::test]
async fn test_unsupported_upload_extension() {
    let app = setup_app();
    let request = visualize_request(
        "likert_distribution",
        &[("hr_file", Some("data.txt"), "whatever")],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "invalid_file_type");
}

#[tokio::test]
async fn test_dataset_too_large() {
    let service = ChartService::new(
        Settings {
            max_rows: 2,
            ..Settings::default()
        },
        Arc::new(default_registry()),
    );
    let app = build_router(AppState::new(service));

    let request = visualize_request(
        "likert_distribution",
        &[("hr_file", Some("hr.csv"), SINGLE_FILE_CSV)],
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "dataset_too_large");
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_identical_requests_produce_identical_specs() {
    let app = setup_app();

    let first = app
        .clone()
        .oneshot(visualize_request(
            "dimension_ci_bars",
            &[("hr_file", Some("hr.csv"), SINGLE_FILE_CSV)],
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = extract_json(first.into_body()).await;

    let second = app
        .oneshot(visualize_request(
            "dimension_ci_bars",
            &[("hr_file", Some("hr.csv"), SINGLE_FILE_CSV)],
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = extract_json(second.into_body()).await;

    assert_eq!(first_body["spec"], second_body["spec"]);
    assert_eq!(first_body["chart_key"], second_body["chart_key"]);
}
