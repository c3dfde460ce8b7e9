//! HTTP front end.
//!
//! Thin plumbing over the pipeline: one endpoint for image uploads and one
//! for pre-structured row lookups. The pipeline itself is synchronous, so
//! scans run on the blocking pool.

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, Multipart, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ScanError;
use crate::ocr::{self, ScanDiagnostics, Tesseract};
use crate::stats::lookup;

/// Uploads can be full desktop captures.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn router() -> Router {
    Router::new()
        .route("/parse-boxscore", post(parse_boxscore))
        .route("/player-stats", post(player_stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Debug, Deserialize)]
struct ParseParams {
    username: Option<String>,
    #[serde(default)]
    debug: bool,
}

/// Structured failure payload returned instead of the plain message when the
/// debug flag is set.
#[derive(Serialize)]
struct DebugFailure {
    error: String,
    #[serde(flatten)]
    diagnostics: ScanDiagnostics,
}

async fn parse_boxscore(Query(params): Query<ParseParams>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut form_username: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().map(str::to_string);
                match name.as_deref() {
                    Some("file") => match field.bytes().await {
                        Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                        Err(_) => return bad_request("unable to read uploaded file"),
                    },
                    Some("username") => form_username = field.text().await.ok(),
                    _ => {
                        // Drain unknown fields so the stream stays readable.
                        let _ = field.bytes().await;
                    }
                }
            }
            Ok(None) => break,
            Err(_) => return bad_request("malformed multipart payload"),
        }
    }

    let Some(username) = resolve_username(params.username, form_username) else {
        return bad_request("username is required");
    };
    let Some(bytes) = file_bytes else {
        return bad_request("file is required");
    };

    let debug_enabled = params.debug;
    info!(username = %username, debug = debug_enabled, bytes = bytes.len(), "parse-boxscore request");

    let scan = tokio::task::spawn_blocking(move || {
        let engine = Tesseract::locate()?;
        Ok::<_, ScanError>(ocr::scan_image(&engine, &bytes, &username, debug_enabled))
    })
    .await;

    let attempt = match scan {
        Ok(Ok(attempt)) => attempt,
        Ok(Err(error)) => return error_response(error, debug_enabled, None),
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "scan task failed").into_response();
        }
    };

    match attempt.outcome {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error, debug_enabled, Some(attempt.diagnostics)),
    }
}

#[derive(Debug, Deserialize)]
struct LookupRequest {
    rows: Vec<HashMap<String, serde_json::Value>>,
    username: String,
}

async fn player_stats(Json(request): Json<LookupRequest>) -> Response {
    match lookup::get_player_stats(&request.rows, &request.username) {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (StatusCode::NOT_FOUND, "player not found").into_response(),
    }
}

/// Username may arrive as a query parameter or a form field; query wins.
fn resolve_username(query: Option<String>, form: Option<String>) -> Option<String> {
    query
        .into_iter()
        .chain(form)
        .find(|name| !name.trim().is_empty())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

fn status_for(error: &ScanError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_response(error: ScanError, debug: bool, diagnostics: Option<ScanDiagnostics>) -> Response {
    let status = status_for(&error);
    if debug && status == StatusCode::BAD_REQUEST {
        if let Some(diagnostics) = diagnostics {
            let payload = DebugFailure {
                error: error.to_string(),
                diagnostics,
            };
            return (status, Json(payload)).into_response();
        }
    }
    (status, error.to_string()).into_response()
}
