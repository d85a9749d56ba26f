//! Community voting handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::vote::Vote;
use crate::services::vote_service::{CastVoteRequest, VoteSummary};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/artifacts/:id/votes", post(cast_vote))
        .route("/artifacts/:id/votes/summary", get(vote_summary))
        .route("/artifacts/:id/votes/mine", get(my_vote))
}

/// POST /api/v1/artifacts/:id/votes
pub async fn cast_vote(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<Vote>)> {
    let auth = require_auth(auth)?;
    let vote = state
        .votes
        .cast_vote(id, &auth.principal(), payload.value)
        .await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

/// GET /api/v1/artifacts/:id/votes/summary
pub async fn vote_summary(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<VoteSummary>> {
    let caller = auth.map(|a| a.principal());
    Ok(Json(state.votes.summary(id, caller.as_ref()).await?))
}

/// GET /api/v1/artifacts/:id/votes/mine
pub async fn my_vote(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Vote>>> {
    let auth = require_auth(auth)?;
    Ok(Json(state.votes.user_vote(id, &auth.principal()).await?))
}
