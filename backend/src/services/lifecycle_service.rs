//! Artifact lifecycle orchestrator.
//!
//! [`apply`] is the only code path that writes `Artifact::status`. It
//! checks the trigger against the transition table, keeps `review_ends_at`
//! in step with the status, persists the row and appends the audit event
//! for the change, all inside the caller's transaction.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::artifact::{Artifact, ArtifactStatus, LifecycleTrigger};
use crate::models::audit_log::AuditEventType;
use crate::models::user::Principal;
use crate::services::audit_service::{self, AuditEntry};
use crate::store::{ReviewStore, ReviewTx};

/// A status change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ArtifactStatus,
    pub to: ArtifactStatus,
}

/// Move `artifact` along the edge selected by `trigger`.
///
/// `details` is merged into the audit payload. Withdrawals are recorded as
/// WITHDRAWN `{previousStatus}`; every other edge as STATUS_CHANGE
/// `{from, to, ...details}`. Fails with `PreconditionFailed` and leaves
/// everything untouched when the edge does not exist.
pub async fn apply(
    tx: &mut dyn ReviewTx,
    artifact: &mut Artifact,
    trigger: LifecycleTrigger,
    actor_id: Uuid,
    details: Value,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let from = artifact.status;
    let to = from.transition(trigger).ok_or_else(|| {
        AppError::PreconditionFailed(format!(
            "Cannot apply {:?} to an artifact in status {}",
            trigger, from
        ))
    })?;

    artifact.status = to;
    if to != ArtifactStatus::CommunityReview {
        artifact.review_ends_at = None;
    }
    artifact.updated_at = now;
    tx.save_artifact(artifact).await?;

    let entry = match trigger {
        LifecycleTrigger::Withdraw => {
            AuditEntry::new(AuditEventType::Withdrawn, artifact.id, actor_id)
                .payload(json!({ "previousStatus": from }))
        }
        _ => {
            let mut payload = Map::new();
            payload.insert("from".into(), json!(from));
            payload.insert("to".into(), json!(to));
            if let Value::Object(extra) = details {
                payload.extend(extra);
            }
            AuditEntry::new(AuditEventType::StatusChange, artifact.id, actor_id)
                .payload(Value::Object(payload))
        }
    };
    audit_service::emit(tx, entry, now).await?;

    tracing::info!(
        artifact_id = %artifact.id,
        from = from.as_str(),
        to = to.as_str(),
        "Artifact status changed"
    );

    Ok(Transition { from, to })
}

/// Caller-facing lifecycle operations that are not owned by a subsystem.
pub struct LifecycleService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Withdraw an artifact. Allowed for the submitter or an admin while the
    /// artifact is not terminal.
    pub async fn withdraw(&self, artifact_id: Uuid, caller: &Principal) -> Result<Artifact> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        if artifact.submitted_by != caller.user_id && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Only the submitter or an admin can withdraw this artifact".to_string(),
            ));
        }

        apply(
            tx.as_mut(),
            &mut artifact,
            LifecycleTrigger::Withdraw,
            caller.user_id,
            Value::Null,
            now,
        )
        .await?;
        tx.commit().await?;

        Ok(artifact)
    }
}
