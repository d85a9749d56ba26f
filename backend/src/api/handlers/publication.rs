//! Content pinning and proof anchoring handlers.

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::anchor_service::{AnchorOutcome, ProofRecord};
use crate::services::pinning_service::{PinInfo, PinOutcome};
use crate::services::proof::{self, ProofDigest, ProofFields};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/ipfs/artifacts/:id", get(pin_info))
        .route("/ipfs/artifacts/:id/pin", post(pin_artifact))
        .route("/chain/artifacts/:id/anchor", post(anchor_artifact))
        .route("/chain/artifacts/:id/proof", get(read_proof))
        .route("/chain/verify", post(verify_proof))
}

fn require_reviewer(auth: &AuthExtension) -> Result<()> {
    if auth.role.is_reviewer() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only experts and admins can publish artifacts".to_string(),
        ))
    }
}

/// POST /api/v1/ipfs/artifacts/:id/pin
pub async fn pin_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PinOutcome>> {
    let auth = require_auth(auth)?;
    require_reviewer(&auth)?;
    Ok(Json(state.pinning.pin_artifact(id, auth.user_id).await?))
}

/// GET /api/v1/ipfs/artifacts/:id
pub async fn pin_info(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PinInfo>> {
    let caller = auth.map(|a| a.principal());
    Ok(Json(state.pinning.pin_info(id, caller.as_ref()).await?))
}

#[derive(Debug, Serialize)]
pub struct AnchorResponse {
    /// False when no ledger is configured
    pub anchored: bool,
    #[serde(flatten)]
    pub outcome: Option<AnchorOutcome>,
}

/// POST /api/v1/chain/artifacts/:id/anchor
pub async fn anchor_artifact(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnchorResponse>> {
    let auth = require_auth(auth)?;
    if !state.anchoring.is_configured() {
        return Err(AppError::ExternalUnavailable(
            "No ledger configured".to_string(),
        ));
    }
    let outcome = state.anchoring.retry_anchor(id, &auth.principal()).await?;
    Ok(Json(AnchorResponse {
        anchored: outcome.is_some(),
        outcome,
    }))
}

/// GET /api/v1/chain/artifacts/:id/proof
pub async fn read_proof(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProofRecord>> {
    Ok(Json(state.anchoring.read_proof(id).await?))
}

/// POST /api/v1/chain/verify
///
/// Recompute the proof hash from caller-supplied fields.
pub async fn verify_proof(Json(fields): Json<ProofFields>) -> Result<Json<ProofDigest>> {
    Ok(Json(proof::verify_proof(&fields)?))
}
