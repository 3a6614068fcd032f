//! Visualization endpoints
//!
//! `POST /api/visualize/:chart_key` takes a multipart form with a required
//! `hr_file`, an optional `survey_file`, and optional JSON-encoded
//! `filters` / `config` text fields. Malformed JSON in either field fails
//! the request before any dataset is touched.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use qviz_common::Error;

use crate::registry::StrategyRegistry;
use crate::service::Upload;
use crate::strategies::JsonMap;
use crate::AppState;

/// Structured error envelope returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Vec<String>,
    pub supported_chart_keys: Option<Vec<String>>,
}

/// Translate a domain error into the HTTP error envelope.
///
/// `supported_chart_keys` is populated only for chart-key errors.
pub fn error_response(err: &Error, registry: &StrategyRegistry) -> Response {
    let status = match err {
        Error::UnknownChartKey(_) => StatusCode::NOT_FOUND,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    let supported = match err {
        Error::UnknownChartKey(_) => Some(registry.list_keys()),
        _ => None,
    };
    let body = ErrorBody {
        code: err.code().to_string(),
        message: err.to_string(),
        details: err.details(),
        supported_chart_keys: supported,
    };
    (status, Json(body)).into_response()
}

fn payload_error(message: impl Into<String>, details: Vec<String>) -> Error {
    Error::Payload {
        message: message.into(),
        details,
    }
}

/// Parse an optional JSON text field into an object map
fn parse_json_field(raw: Option<String>, field: &str) -> Result<Option<JsonMap>, Error> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(&raw).map_err(|e| {
        payload_error(
            "Invalid JSON payload in filters/config",
            vec![format!("{}: {}", field, e)],
        )
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(payload_error(
            "Invalid JSON payload in filters/config",
            vec![format!("{} must be a JSON object", field)],
        )),
    }
}

/// GET /api/visualize/supported-keys
pub async fn supported_keys(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.registry().list_keys())
}

/// POST /api/visualize/:chart_key
pub async fn visualize(
    State(state): State<AppState>,
    Path(chart_key): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut hr_file: Option<Upload> = None;
    let mut survey_file: Option<Upload> = None;
    let mut filters_raw: Option<String> = None;
    let mut config_raw: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let err = payload_error("Malformed multipart request", vec![e.to_string()]);
                return error_response(&err, state.service.registry());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "hr_file" | "survey_file" => {
                let filename = field.file_name().map(str::to_string);
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        let err =
                            payload_error("Failed to read uploaded file", vec![e.to_string()]);
                        return error_response(&err, state.service.registry());
                    }
                };
                // Browsers send an empty part for an unselected file input
                if bytes.is_empty() && filename.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                let upload = Upload { filename, bytes };
                if name == "hr_file" {
                    hr_file = Some(upload);
                } else {
                    survey_file = Some(upload);
                }
            }
            "filters" | "config" => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        let err = payload_error("Failed to read form field", vec![e.to_string()]);
                        return error_response(&err, state.service.registry());
                    }
                };
                if name == "filters" {
                    filters_raw = Some(text);
                } else {
                    config_raw = Some(text);
                }
            }
            _ => {
                // Unknown parts are drained and ignored
                let _ = field.bytes().await;
            }
        }
    }

    let filters = match parse_json_field(filters_raw, "filters") {
        Ok(filters) => filters,
        Err(err) => return error_response(&err, state.service.registry()),
    };
    let config = match parse_json_field(config_raw, "config") {
        Ok(config) => config,
        Err(err) => return error_response(&err, state.service.registry()),
    };

    let Some(hr_file) = hr_file else {
        let err = payload_error("hr_file is required", Vec::new());
        return error_response(&err, state.service.registry());
    };

    match state
        .service
        .generate_chart(&chart_key, hr_file, survey_file, filters, config)
    {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(err) => error_response(&err, state.service.registry()),
    }
}
