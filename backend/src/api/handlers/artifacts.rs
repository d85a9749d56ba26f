//! Artifact submission and catalogue handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::dto::{PaginatedResponse, PaginationQuery};
use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::artifact::{Artifact, ArtifactStatus};
use crate::models::audit_log::AuditEvent;
use crate::services::artifact_service::{
    ArtifactListFilter, AttachFileRequest, CreateArtifactRequest, UpdateArtifactRequest,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/artifacts", get(list_artifacts).post(create_artifact))
        .route("/artifacts/:id", get(get_artifact).patch(update_artifact))
        .route("/artifacts/:id/file", post(attach_file))
        .route("/artifacts/:id/withdraw", post(withdraw_artifact))
        .route("/artifacts/:id/activity", get(artifact_activity))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListArtifactsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ArtifactStatus>,
    #[serde(default)]
    pub mine: bool,
}

/// GET /api/v1/artifacts
pub async fn list_artifacts(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Query(query): Query<ListArtifactsQuery>,
) -> Result<Json<PaginatedResponse<Artifact>>> {
    let pagination = PaginationQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let caller = auth.map(|a| a.principal());
    let filter = ArtifactListFilter {
        status: query.status,
        mine: query.mine,
    };
    let page = state
        .artifacts
        .list(filter, caller.as_ref(), pagination.to_page_request())
        .await?;
    Ok(Json(PaginatedResponse::new(page, &pagination)))
}

/// POST /api/v1/artifacts
pub async fn create_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Json(payload): Json<CreateArtifactRequest>,
) -> Result<(StatusCode, Json<Artifact>)> {
    let auth = require_auth(auth)?;
    let artifact = state.artifacts.create(payload, &auth.principal()).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /api/v1/artifacts/:id
pub async fn get_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Artifact>> {
    let caller = auth.map(|a| a.principal());
    let artifact = state.artifacts.get(id, caller.as_ref()).await?;
    Ok(Json(artifact))
}

/// PATCH /api/v1/artifacts/:id
pub async fn update_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateArtifactRequest>,
) -> Result<Json<Artifact>> {
    let auth = require_auth(auth)?;
    let artifact = state
        .artifacts
        .update(id, payload, &auth.principal())
        .await?;
    Ok(Json(artifact))
}

/// POST /api/v1/artifacts/:id/file
pub async fn attach_file(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AttachFileRequest>,
) -> Result<Json<Artifact>> {
    let auth = require_auth(auth)?;
    let artifact = state
        .artifacts
        .attach_file(id, payload, &auth.principal())
        .await?;
    Ok(Json(artifact))
}

/// POST /api/v1/artifacts/:id/withdraw
pub async fn withdraw_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Artifact>> {
    let auth = require_auth(auth)?;
    let artifact = state.lifecycle.withdraw(id, &auth.principal()).await?;
    Ok(Json(artifact))
}

/// GET /api/v1/artifacts/:id/activity
pub async fn artifact_activity(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEvent>>> {
    let caller = auth.map(|a| a.principal());
    let events = state.artifacts.activity(id, caller.as_ref()).await?;
    Ok(Json(events))
}
