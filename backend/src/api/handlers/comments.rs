//! Comment thread handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::dto::{PaginatedResponse, PaginationQuery};
use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::comment::Comment;
use crate::services::comment_service::CreateCommentRequest;

pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/artifacts/:id/comments",
        get(list_comments).post(add_comment),
    )
}

/// POST /api/v1/artifacts/:id/comments
pub async fn add_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let auth = require_auth(auth)?;
    let comment = state
        .comments
        .add_comment(id, &auth.principal(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/artifacts/:id/comments
pub async fn list_comments(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Comment>>> {
    let caller = auth.map(|a| a.principal());
    let page = state
        .comments
        .list_comments(id, caller.as_ref(), query.to_page_request())
        .await?;
    Ok(Json(PaginatedResponse::new(page, &query)))
}
