//! Content flagging with automatic escalation.
//!
//! Each user can flag an artifact once. When the number of distinct flags
//! reaches the configured threshold the artifact is frozen in FLAGGED, in the
//! same transaction that recorded the flag that crossed it.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ReviewPolicy;
use crate::error::{AppError, Result};
use crate::models::artifact::{ArtifactStatus, LifecycleTrigger};
use crate::models::audit_log::AuditEventType;
use crate::models::flag::{Flag, FlagReason};
use crate::models::user::Principal;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::lifecycle_service;
use crate::store::ReviewStore;

const MAX_DETAILS_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlagRequest {
    pub reason: FlagReason,
    pub details: Option<String>,
}

impl CreateFlagRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(details) = &self.details {
            if details.chars().count() > MAX_DETAILS_LEN {
                return Err(AppError::Validation(format!(
                    "details must be at most {} characters",
                    MAX_DETAILS_LEN
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlagOutcome {
    pub flag: Flag,
    pub flag_count: i64,
    /// True when this flag moved the artifact into FLAGGED
    pub escalated: bool,
    pub status: ArtifactStatus,
}

pub struct FlagService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    policy: ReviewPolicy,
}

impl FlagService {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>, policy: ReviewPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn create_flag(
        &self,
        artifact_id: Uuid,
        reporter: &Principal,
        req: CreateFlagRequest,
    ) -> Result<FlagOutcome> {
        req.validate()?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let mut artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        let details = req
            .details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let flag = Flag {
            id: Uuid::new_v4(),
            artifact_id,
            reporter_id: reporter.user_id,
            reason: req.reason,
            details,
            created_at: now,
        };
        tx.insert_flag(&flag).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Flagged, artifact_id, reporter.user_id)
                .payload(json!({ "reason": flag.reason, "details": flag.details })),
            now,
        )
        .await?;

        let flag_count = tx.count_flags(artifact_id).await?;
        let threshold = self.policy.flag_threshold;
        let mut escalated = false;

        if flag_count >= threshold && artifact.status != ArtifactStatus::Flagged {
            if artifact.status.is_terminal() {
                tracing::info!(
                    artifact_id = %artifact_id,
                    status = artifact.status.as_str(),
                    flag_count,
                    "Flag threshold reached on a terminal artifact, not escalating"
                );
            } else {
                lifecycle_service::apply(
                    tx.as_mut(),
                    &mut artifact,
                    LifecycleTrigger::FlagThresholdReached,
                    reporter.user_id,
                    json!({
                        "reason": format!(
                            "Auto-flagged: {} flags reached threshold of {}",
                            flag_count, threshold
                        ),
                        "flagCount": flag_count,
                        "threshold": threshold,
                    }),
                    now,
                )
                .await?;
                escalated = true;
            }
        }
        tx.commit().await?;

        Ok(FlagOutcome {
            flag,
            flag_count,
            escalated,
            status: artifact.status,
        })
    }

    /// Flags on an artifact, newest first. Reviewers only.
    pub async fn flags(&self, artifact_id: Uuid, caller: &Principal) -> Result<Vec<Flag>> {
        if !caller.is_reviewer() {
            return Err(AppError::Forbidden(
                "Only experts and admins can view flags".to_string(),
            ));
        }
        if self.store.find_artifact(artifact_id).await?.is_none() {
            return Err(AppError::NotFound("Artifact not found".to_string()));
        }
        self.store.list_flags(artifact_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_length_limit() {
        let req = CreateFlagRequest {
            reason: FlagReason::Other,
            details: Some("x".repeat(2001)),
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_reason_parses_uppercase() {
        let req: CreateFlagRequest =
            serde_json::from_str(r#"{"reason":"COPYRIGHT","details":null}"#).unwrap();
        assert_eq!(req.reason, FlagReason::Copyright);
    }
}
