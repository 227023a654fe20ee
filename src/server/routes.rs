use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::errors::ParishError;
use crate::export::StepOutcome;
use crate::images::{cache_key, is_valid_record_id};
use crate::upstream::fetch_pages;

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<ParishError>() {
        Some(ParishError::Validation(_)) => StatusCode::BAD_REQUEST,
        Some(ParishError::NotFound(_)) => StatusCode::NOT_FOUND,
        Some(ParishError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
        Some(ParishError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Admin token gate
// ---------------------------------------------------------------------------

/// Check the bearer token before any side effect. `None` means authorized.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Some(error_response(
            StatusCode::UNAUTHORIZED,
            "Admin routes are disabled: no admin token configured",
        ));
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => None,
        Some(_) => Some(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid admin token",
        )),
        None => Some(error_response(
            StatusCode::UNAUTHORIZED,
            "Missing bearer token",
        )),
    }
}

// ---------------------------------------------------------------------------
// POST /api/regenerate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub job_id: Option<String>,
    pub cursor: Option<String>,
    pub max_pages: Option<usize>,
    /// Run steps in-process until completion instead of returning after one.
    #[serde(default)]
    pub wait: bool,
}

pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if let Some(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let request: RegenerateRequest = if body.is_empty() {
        RegenerateRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid regenerate body: {}", e),
                );
            }
        }
    };

    let result = if request.wait {
        state
            .export
            .run_to_completion(request.job_id, request.cursor, request.max_pages)
            .await
    } else {
        state
            .export
            .step(request.job_id, request.cursor, request.max_pages)
            .await
    };

    match result {
        Ok(StepOutcome::InProgress {
            job_id,
            next_cursor,
            processed,
            total_features,
            object_key,
        }) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "status": "in_progress",
                "jobId": job_id,
                "nextCursor": next_cursor,
                "processed": processed,
                "totalFeatures": total_features,
                "objectKey": object_key,
            })),
        )
            .into_response(),
        Ok(StepOutcome::Completed {
            job_id,
            features,
            updated_at,
            object_key,
        }) => {
            spawn_prewarm(state.clone(), false);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "ok": true,
                    "status": "completed",
                    "jobId": job_id,
                    "features": features,
                    "updatedAt": updated_at,
                    "objectKey": object_key,
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Regenerate step failed: {}", e);
            error_response(status_for(&e), e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/prewarm
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct PrewarmRequest {
    #[serde(default)]
    pub flush: bool,
}

pub async fn prewarm_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if let Some(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let request: PrewarmRequest = if body.is_empty() {
        PrewarmRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid prewarm body: {}", e),
                );
            }
        }
    };

    spawn_prewarm(state, request.flush);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "ok": true,
            "status": "scheduled",
        })),
    )
        .into_response()
}

/// Kick off a background prewarm pass. The caller's response never depends
/// on its outcome; failures are only logged.
fn spawn_prewarm(state: Arc<AppState>, flush: bool) {
    tokio::spawn(async move {
        let fields = vec![state.config.photo_field.clone()];
        let batch = match fetch_pages(
            state.tables.as_ref(),
            &state.config.churches_table,
            &fields,
            state.config.page_size,
            None,
            state.config.prewarm_max_pages,
        )
        .await
        {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("Prewarm record fetch failed: {}", e);
                return;
            }
        };

        crate::images::prewarm(
            state.store.clone(),
            state.images.clone(),
            state.config.clone(),
            &batch.records,
            flush,
        )
        .await;
    });
}

// ---------------------------------------------------------------------------
// GET /<object_key> - the published document
// ---------------------------------------------------------------------------

pub async fn get_document(State(state): State<Arc<AppState>>) -> Response {
    match state.store.get(&state.config.object_key).await {
        Ok(Some(object)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, object.content_type),
                (
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", state.config.document_cache_seconds),
                ),
            ],
            object.body,
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Document not published yet"),
        Err(e) => {
            tracing::error!("Failed to read published document: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /img/{record}/{index} - pull-through image proxy
// ---------------------------------------------------------------------------

pub async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Path((record_id, index_raw)): Path<(String, String)>,
) -> Response {
    // Reject malformed paths before any upstream call.
    if !is_valid_record_id(&record_id) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid record id: '{}'", record_id),
        );
    }
    let index: usize = match index_raw.parse() {
        Ok(i) if i < state.config.max_images_per_record => i,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid image index: '{}'", index_raw),
            );
        }
    };

    let key = cache_key(&state.config.cache_prefix, &record_id, index);
    match state.store.get(&key).await {
        Ok(Some(cached)) => return image_ok(cached.body, &cached.content_type),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Image cache read failed for '{}': {}", key, e);
        }
    }

    // Miss: re-fetch the record for a fresh (non-expired) attachment URL.
    let record = match state
        .tables
        .fetch_record(&state.config.churches_table, &record_id)
        .await
    {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Record '{}' not found", record_id),
            );
        }
        Err(e) => {
            tracing::warn!("Record fetch failed for '{}': {}", record_id, e);
            return error_response(status_for(&e), e.to_string());
        }
    };

    let urls = record
        .field(&state.config.photo_field)
        .map(|field| {
            crate::convert::resolve_attachment_urls(field, state.config.max_images_per_record)
        })
        .unwrap_or_default();
    let Some(url) = urls.get(index) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Record '{}' has no attachment at index {}", record_id, index),
        );
    };

    let image = match state.images.fetch(url).await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Image fetch failed for '{}': {}", key, e);
            return error_response(status_for(&e), e.to_string());
        }
    };

    // Serve first; the cache write happens off the response path.
    let store = state.store.clone();
    let write_key = key.clone();
    let write_body = image.body.clone();
    let write_content_type = image.content_type.clone();
    tokio::spawn(async move {
        if let Err(e) = store
            .put(&write_key, write_body, &write_content_type)
            .await
        {
            tracing::warn!("Image cache write failed for '{}': {}", write_key, e);
        }
    });

    image_ok(image.body, &image.content_type)
}

fn image_ok(body: Vec<u8>, content_type: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        body,
    )
        .into_response()
}
