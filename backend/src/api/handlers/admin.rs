//! Admin handlers: pipeline statistics, the audit feed and manual sweeps.

use axum::{
    extract::{Extension, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::audit_log::AuditEvent;
use crate::services::review_sweeper::SweepReport;
use crate::store::PipelineStats;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/stats", get(get_stats))
        .route("/admin/events", get(recent_events))
        .route("/admin/sweep", post(run_sweep))
}

/// GET /api/v1/admin/stats
pub async fn get_stats(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
) -> Result<Json<PipelineStats>> {
    let auth = require_auth(auth)?;
    Ok(Json(state.stats.stats(&auth.principal()).await?))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/admin/events
pub async fn recent_events(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<AuditEvent>>> {
    let auth = require_auth(auth)?;
    let events = state
        .stats
        .recent_events(&auth.principal(), query.limit.unwrap_or(50))
        .await?;
    Ok(Json(events))
}

/// POST /api/v1/admin/sweep
///
/// Run the review-window sweep now instead of waiting for the scheduler.
pub async fn run_sweep(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
) -> Result<Json<SweepReport>> {
    let auth = require_auth(auth)?;
    if !auth.principal().is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    tracing::info!(admin = %auth.identity, "Manual review sweep requested");
    Ok(Json(state.sweeper.sweep().await?))
}
