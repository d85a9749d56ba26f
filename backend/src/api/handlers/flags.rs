//! Flagging handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::flag::Flag;
use crate::services::flag_service::{CreateFlagRequest, FlagOutcome};

pub fn router() -> Router<SharedState> {
    Router::new().route("/artifacts/:id/flags", get(list_flags).post(create_flag))
}

/// POST /api/v1/artifacts/:id/flags
pub async fn create_flag(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateFlagRequest>,
) -> Result<(StatusCode, Json<FlagOutcome>)> {
    let auth = require_auth(auth)?;
    let outcome = state
        .flags
        .create_flag(id, &auth.principal(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/artifacts/:id/flags
pub async fn list_flags(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Flag>>> {
    let auth = require_auth(auth)?;
    Ok(Json(state.flags.flags(id, &auth.principal()).await?))
}
