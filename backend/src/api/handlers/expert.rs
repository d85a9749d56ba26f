//! Expert review handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::dto::{PaginatedResponse, PaginationQuery};
use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::expert_review::ExpertReview;
use crate::services::expert_review_service::{DecisionOutcome, QueueEntry, SubmitDecisionRequest};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/expert/queue", get(review_queue))
        .route("/expert/artifacts/:id/review", post(submit_decision))
        .route("/expert/artifacts/:id/reviews", get(list_reviews))
}

/// GET /api/v1/expert/queue
pub async fn review_queue(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<QueueEntry>>> {
    let auth = require_auth(auth)?;
    let page = state
        .experts
        .queue(&auth.principal(), query.to_page_request())
        .await?;
    Ok(Json(PaginatedResponse::new(page, &query)))
}

/// POST /api/v1/expert/artifacts/:id/review
///
/// On approval the response also reports the publication steps; a failed
/// pin or anchor shows up as `publication.pending` rather than an error.
pub async fn submit_decision(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitDecisionRequest>,
) -> Result<(StatusCode, Json<DecisionOutcome>)> {
    let auth = require_auth(auth)?;
    let outcome = state
        .experts
        .submit_decision(id, &auth.principal(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/expert/artifacts/:id/reviews
pub async fn list_reviews(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ExpertReview>>> {
    let caller = auth.map(|a| a.principal());
    Ok(Json(state.experts.reviews(id, caller.as_ref()).await?))
}
