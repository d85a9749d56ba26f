//! Community voting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::artifact::ArtifactStatus;
use crate::models::audit_log::AuditEventType;
use crate::models::user::Principal;
use crate::models::vote::{Vote, VoteTally, VoteValue};
use crate::services::artifact_service::ensure_visible;
use crate::services::audit_service::{self, AuditEntry};
use crate::store::ReviewStore;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CastVoteRequest {
    pub value: VoteValue,
}

/// Vote counts for one artifact.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoteSummary {
    pub approve: i64,
    pub reject: i64,
    pub total: i64,
    /// approve / total rounded to two decimals, 0 with no votes
    pub ratio: f64,
    pub status: ArtifactStatus,
    pub review_ends_at: Option<DateTime<Utc>>,
}

pub fn round_ratio(ratio: f64) -> f64 {
    (ratio * 100.0).round() / 100.0
}

pub struct VoteService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl VoteService {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Cast a vote. One per voter, never overwritten.
    pub async fn cast_vote(
        &self,
        artifact_id: Uuid,
        voter: &Principal,
        value: VoteValue,
    ) -> Result<Vote> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        if artifact.status != ArtifactStatus::CommunityReview {
            return Err(AppError::PreconditionFailed(format!(
                "Voting is closed for artifacts in status {}",
                artifact.status
            )));
        }
        if !artifact.review_window_open(now) {
            return Err(AppError::PreconditionFailed(
                "The community review window has ended".to_string(),
            ));
        }
        if artifact.submitted_by == voter.user_id {
            return Err(AppError::PreconditionFailed(
                "You cannot vote on your own artifact".to_string(),
            ));
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            artifact_id,
            voter_id: voter.user_id,
            value,
            created_at: now,
        };
        tx.insert_vote(&vote).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Voted, artifact_id, voter.user_id)
                .payload(json!({ "value": value })),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(
            artifact_id = %artifact_id,
            voter_id = %voter.user_id,
            value = value.as_str(),
            "Vote recorded"
        );
        Ok(vote)
    }

    /// Tally and review window, subject to the same visibility as the
    /// artifact itself.
    pub async fn summary(
        &self,
        artifact_id: Uuid,
        caller: Option<&Principal>,
    ) -> Result<VoteSummary> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, caller)?;
        let tally: VoteTally = self.store.vote_tally(artifact_id).await?;

        Ok(VoteSummary {
            approve: tally.approve,
            reject: tally.reject,
            total: tally.total(),
            ratio: round_ratio(tally.ratio()),
            status: artifact.status,
            review_ends_at: artifact.review_ends_at,
        })
    }

    /// The caller's own vote is always readable. Without one, the artifact
    /// must be visible to the caller.
    pub async fn user_vote(&self, artifact_id: Uuid, voter: &Principal) -> Result<Option<Vote>> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        let vote = self.store.find_vote(artifact_id, voter.user_id).await?;
        if vote.is_none() {
            ensure_visible(&artifact, Some(voter))?;
        }
        Ok(vote)
    }
}
