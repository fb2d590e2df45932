// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lingora Server - HTTP API
//!
//! Thin HTTP surface over the storage layer and the workflow engine.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /api/releases` | Enqueue a release of the current draft (202 + instance id) |
//! | `POST /api/versions/{id}/rollback` | Enqueue a rollback to an archived version |
//! | `GET /api/instances/{id}` | Poll workflow instance status |
//! | `GET /api/versions` | List versions, newest first |
//! | `GET /published/{versionId}/{locale}.json` | Public read path for published snapshots |
//!
//! Enqueue endpoints confirm only that the workflow was registered; callers
//! observe success or failure by polling the instance, or by re-reading
//! version status. The public read path serves artifacts with the long-lived
//! immutable cache directive the CDN expects; a 404 for a live version's
//! snapshot would mean the promote ordering invariant was broken.

pub mod config;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use lingora_core::{ArtifactStore, CoreError, InstanceRecord, Persistence, VersionRecord};
use lingora_engine::{Engine, EngineError};

pub use config::{Config, ConfigError};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage layer.
    pub persistence: Arc<dyn Persistence>,
    /// Artifact store backing the public read path.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Workflow engine.
    pub engine: Engine,
}

impl AppState {
    /// Assemble state from the storage layer and artifact store.
    pub fn new(persistence: Arc<dyn Persistence>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let engine = Engine::new(persistence.clone(), artifacts.clone());
        Self {
            persistence,
            artifacts,
            engine,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/releases", post(enqueue_release))
        .route("/api/versions", get(list_versions))
        .route("/api/versions/{version_id}/rollback", post(enqueue_rollback))
        .route("/api/instances/{instance_id}", get(get_instance))
        .route("/published/{version_id}/{file}", get(serve_snapshot))
        .with_state(state)
}

/// API error with an HTTP status and a stable error code.
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::VersionNotFound { .. } | CoreError::InstanceNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            CoreError::InstanceAlreadyExists { .. } => StatusCode::CONFLICT,
            _ => {
                warn!(error = %err, "Storage error while handling request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => core.into(),
            other => {
                warn!(error = %other, "Engine error while handling request");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "ENGINE_ERROR",
                    message: other.to_string(),
                }
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    instance_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiVersion {
    id: i64,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
}

impl From<VersionRecord> for ApiVersion {
    fn from(record: VersionRecord) -> Self {
        Self {
            id: record.id,
            description: record.description,
            status: record.status,
            created_at: record.created_at,
            created_by: record.created_by,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstance {
    instance_id: String,
    kind: String,
    status: String,
    error: Option<String>,
    output: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl From<InstanceRecord> for ApiInstance {
    fn from(record: InstanceRecord) -> Self {
        Self {
            instance_id: record.instance_id,
            kind: record.kind,
            status: record.status,
            error: record.error,
            output: record.output,
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
        }
    }
}

async fn enqueue_release(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    let instance_id = state.engine.enqueue_release().await?;
    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { instance_id })))
}

async fn enqueue_rollback(
    State(state): State<AppState>,
    Path(version_id): Path<i64>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    let instance_id = state.engine.enqueue_rollback(version_id).await?;
    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { instance_id })))
}

async fn list_versions(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiVersion>>, ApiError> {
    let versions = state.persistence.list_versions().await?;
    Ok(Json(versions.into_iter().map(ApiVersion::from).collect()))
}

async fn get_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Json<ApiInstance>, ApiError> {
    let instance = state
        .persistence
        .get_instance(&instance_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(
                "INSTANCE_NOT_FOUND",
                format!("Instance '{instance_id}' not found"),
            )
        })?;
    Ok(Json(ApiInstance::from(instance)))
}

/// Public read path: `GET /published/{versionId}/{locale}.json`.
///
/// Served with the immutable cache directive - snapshot paths are never
/// rewritten with different content, so the CDN may cache them forever.
async fn serve_snapshot(
    State(state): State<AppState>,
    Path((version_id, file)): Path<(i64, String)>,
) -> Result<Response, ApiError> {
    let Some(locale) = file.strip_suffix(".json") else {
        return Err(ApiError::not_found(
            "SNAPSHOT_NOT_FOUND",
            format!("No snapshot at '{version_id}/{file}'"),
        ));
    };

    let path = lingora_core::artifacts::snapshot_path(version_id, locale);
    let bytes = state.artifacts.get(&path).await?.ok_or_else(|| {
        ApiError::not_found(
            "SNAPSHOT_NOT_FOUND",
            format!("No snapshot at '{path}'"),
        )
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok((StatusCode::OK, headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use lingora_core::{MemoryArtifactStore, PutOptions, SqlitePersistence};
    use tower::util::ServiceExt;

    async fn test_state() -> (AppState, Arc<MemoryArtifactStore>) {
        let persistence: Arc<dyn Persistence> = Arc::new(
            SqlitePersistence::in_memory()
                .await
                .expect("Failed to create in-memory store"),
        );
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let state = AppState::new(persistence, artifacts.clone());
        (state, artifacts)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body")
            .to_vec()
    }

    #[tokio::test]
    async fn test_list_versions() {
        let (state, _) = test_state().await;
        state
            .persistence
            .create_version(Some("first"), None)
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/versions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_bytes(response).await;
        let versions: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(versions[0]["description"], "first");
        assert_eq!(versions[0]["status"], "draft");
    }

    #[tokio::test]
    async fn test_enqueue_release_returns_accepted() {
        let (state, _) = test_state().await;
        let persistence = state.persistence.clone();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/releases")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let instance_id = json["instanceId"].as_str().unwrap();
        assert!(instance_id.starts_with("release-"));

        // The instance row exists as soon as the enqueue response is sent.
        let instance = persistence.get_instance(instance_id).await.unwrap();
        assert!(instance.is_some());
    }

    #[tokio::test]
    async fn test_get_instance_not_found() {
        let (state, _) = test_state().await;

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/instances/release-unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INSTANCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_public_read_path_serves_snapshot() {
        let (state, artifacts) = test_state().await;
        artifacts
            .put("3/en.json", br#"{"a":"A"}"#, &PutOptions::immutable_json())
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/published/3/en.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000, immutable"
        );
        let body = body_bytes(response).await;
        assert_eq!(body, br#"{"a":"A"}"#);
    }

    #[tokio::test]
    async fn test_public_read_path_missing_snapshot() {
        let (state, _) = test_state().await;

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/published/3/en.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
