//! Expert review.
//!
//! An expert decision is terminal: APPROVE verifies the artifact, REJECT
//! rejects it. Approval is followed by publication (pin, then anchor) after
//! the decision has committed. Publication failures are logged and reported
//! as pending; they never undo the decision.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::artifact::{Artifact, ArtifactStatus, LifecycleTrigger};
use crate::models::audit_log::AuditEventType;
use crate::models::expert_review::{ExpertDecision, ExpertReview};
use crate::models::user::Principal;
use crate::services::anchor_service::AnchorService;
use crate::services::artifact_service::ensure_visible;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::lifecycle_service;
use crate::services::pinning_service::PinningService;
use crate::services::PageRequest;
use crate::store::{ArtifactQuery, Page, ReviewStore};

const MAX_NOTES_LEN: usize = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitDecisionRequest {
    pub decision: ExpertDecision,
    pub notes: Option<String>,
    /// Criterion name to pass/fail
    pub checklist: Option<BTreeMap<String, bool>>,
}

impl SubmitDecisionRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(AppError::Validation(format!(
                    "notes must be at most {} characters",
                    MAX_NOTES_LEN
                )));
            }
        }
        Ok(())
    }
}

/// What happened to the post-approval publication steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublicationReport {
    pub content_id: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    /// A configured step failed and can be retried manually
    pub pending: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub review: ExpertReview,
    pub artifact: Artifact,
    pub publication: Option<PublicationReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueVotes {
    pub approve: i64,
    pub reject: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub artifact: Artifact,
    pub votes: QueueVotes,
    pub flag_count: i64,
}

pub struct ExpertReviewService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    pinning: Arc<PinningService>,
    anchoring: Arc<AnchorService>,
}

impl ExpertReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
        pinning: Arc<PinningService>,
        anchoring: Arc<AnchorService>,
    ) -> Self {
        Self {
            store,
            clock,
            pinning,
            anchoring,
        }
    }

    pub async fn submit_decision(
        &self,
        artifact_id: Uuid,
        expert: &Principal,
        req: SubmitDecisionRequest,
    ) -> Result<DecisionOutcome> {
        if !expert.is_reviewer() {
            return Err(AppError::Forbidden(
                "Only experts and admins can submit reviews".to_string(),
            ));
        }
        req.validate()?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let mut artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        if tx
            .find_expert_review(artifact_id, expert.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You have already reviewed this artifact".to_string(),
            ));
        }
        if artifact.status != ArtifactStatus::ExpertReview {
            return Err(AppError::PreconditionFailed(format!(
                "Artifact is not awaiting expert review (status {})",
                artifact.status
            )));
        }

        let checklist = req
            .checklist
            .map(serde_json::to_value)
            .transpose()?;
        let notes = req
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let review = ExpertReview {
            id: Uuid::new_v4(),
            artifact_id,
            expert_id: expert.user_id,
            decision: req.decision,
            notes,
            checklist,
            created_at: now,
        };
        tx.insert_expert_review(&review).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::ExpertReviewed, artifact_id, expert.user_id).payload(
                json!({
                    "reviewId": review.id,
                    "decision": review.decision,
                    "notes": review.notes,
                    "checklist": review.checklist,
                }),
            ),
            now,
        )
        .await?;

        let reason = match review.decision {
            ExpertDecision::Approve => "Approved by expert review",
            ExpertDecision::Reject => "Rejected by expert review",
        };
        lifecycle_service::apply(
            tx.as_mut(),
            &mut artifact,
            LifecycleTrigger::ExpertDecided(review.decision),
            expert.user_id,
            json!({ "reason": reason, "reviewId": review.id }),
            now,
        )
        .await?;
        tx.commit().await?;

        let publication = if artifact.status == ArtifactStatus::Verified {
            let report = self.publish(artifact_id, expert.user_id).await;
            if let Ok(Some(refreshed)) = self.store.find_artifact(artifact_id).await {
                artifact = refreshed;
            }
            Some(report)
        } else {
            None
        };

        Ok(DecisionOutcome {
            review,
            artifact,
            publication,
        })
    }

    /// Pin then anchor a freshly verified artifact. Never fails; problems
    /// end up in the report.
    async fn publish(&self, artifact_id: Uuid, expert_id: Uuid) -> PublicationReport {
        let mut report = PublicationReport::default();

        if self.pinning.is_configured() {
            match self.pinning.pin_artifact(artifact_id, expert_id).await {
                Ok(pinned) => report.content_id = Some(pinned.content_id),
                Err(e) => {
                    tracing::warn!(
                        artifact_id = %artifact_id,
                        error = %e,
                        "Pinning failed after approval"
                    );
                    report.pending = true;
                    report.errors.push(format!("pin: {}", e));
                }
            }
        }

        match self.anchoring.anchor_proof(artifact_id, expert_id).await {
            Ok(Some(anchored)) => {
                report.tx_hash = Some(anchored.tx_hash);
                report.block_number = Some(anchored.block_number);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    artifact_id = %artifact_id,
                    error = %e,
                    "Anchoring failed after approval"
                );
                report.pending = true;
                report.errors.push(format!("anchor: {}", e));
            }
        }
        report
    }

    /// Artifacts awaiting expert review, oldest first.
    pub async fn queue(&self, caller: &Principal, page: PageRequest) -> Result<Page<QueueEntry>> {
        if !caller.is_reviewer() {
            return Err(AppError::Forbidden(
                "Only experts and admins can view the review queue".to_string(),
            ));
        }
        page.validate()?;

        let query = ArtifactQuery {
            status: Some(ArtifactStatus::ExpertReview),
            submitted_by: None,
            oldest_first: true,
        };
        let artifacts = self
            .store
            .list_artifacts(&query, page.limit(), page.offset())
            .await?;

        let mut items = Vec::with_capacity(artifacts.items.len());
        for artifact in artifacts.items {
            let tally = self.store.vote_tally(artifact.id).await?;
            let flag_count = self.store.count_flags(artifact.id).await?;
            items.push(QueueEntry {
                artifact,
                votes: QueueVotes {
                    approve: tally.approve,
                    reject: tally.reject,
                    total: tally.total(),
                },
                flag_count,
            });
        }

        Ok(Page {
            items,
            total: artifacts.total,
        })
    }

    /// Reviews recorded for an artifact, newest first.
    pub async fn reviews(
        &self,
        artifact_id: Uuid,
        caller: Option<&Principal>,
    ) -> Result<Vec<ExpertReview>> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, caller)?;
        self.store.list_expert_reviews(artifact_id).await
    }
}
