//! Artifact model and the lifecycle transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::models::expert_review::ExpertDecision;

/// Kind of submitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Image,
    Audio,
    Video,
    Document,
    Text,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Image => "image",
            ArtifactType::Audio => "audio",
            ArtifactType::Video => "video",
            ArtifactType::Document => "document",
            ArtifactType::Text => "text",
        }
    }
}

/// Review status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Pending,
    CommunityReview,
    ExpertReview,
    Verified,
    Rejected,
    Flagged,
    Withdrawn,
}

/// Verdict reached when a community review window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityVerdict {
    Advance,
    Reject,
}

/// Anything that can move an artifact from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTrigger {
    Withdraw,
    ReviewWindowClosed(CommunityVerdict),
    ExpertDecided(ExpertDecision),
    FlagThresholdReached,
}

impl ArtifactStatus {
    pub const ALL: [ArtifactStatus; 7] = [
        ArtifactStatus::Pending,
        ArtifactStatus::CommunityReview,
        ArtifactStatus::ExpertReview,
        ArtifactStatus::Verified,
        ArtifactStatus::Rejected,
        ArtifactStatus::Flagged,
        ArtifactStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "PENDING",
            ArtifactStatus::CommunityReview => "COMMUNITY_REVIEW",
            ArtifactStatus::ExpertReview => "EXPERT_REVIEW",
            ArtifactStatus::Verified => "VERIFIED",
            ArtifactStatus::Rejected => "REJECTED",
            ArtifactStatus::Flagged => "FLAGGED",
            ArtifactStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::Verified | ArtifactStatus::Rejected | ArtifactStatus::Withdrawn
        )
    }

    /// The status reached by applying `trigger`, or `None` when the
    /// combination is not an edge of the lifecycle.
    pub fn transition(self, trigger: LifecycleTrigger) -> Option<ArtifactStatus> {
        use ArtifactStatus::*;

        match (self, trigger) {
            (Verified | Rejected | Withdrawn, _) => None,

            (Pending | CommunityReview | ExpertReview | Flagged, LifecycleTrigger::Withdraw) => {
                Some(Withdrawn)
            }

            (CommunityReview, LifecycleTrigger::ReviewWindowClosed(CommunityVerdict::Advance)) => {
                Some(ExpertReview)
            }
            (CommunityReview, LifecycleTrigger::ReviewWindowClosed(CommunityVerdict::Reject)) => {
                Some(Rejected)
            }
            (Pending | ExpertReview | Flagged, LifecycleTrigger::ReviewWindowClosed(_)) => None,

            (ExpertReview, LifecycleTrigger::ExpertDecided(ExpertDecision::Approve)) => {
                Some(Verified)
            }
            (ExpertReview, LifecycleTrigger::ExpertDecided(ExpertDecision::Reject)) => {
                Some(Rejected)
            }
            (Pending | CommunityReview | Flagged, LifecycleTrigger::ExpertDecided(_)) => None,

            (Pending | CommunityReview | ExpertReview, LifecycleTrigger::FlagThresholdReached) => {
                Some(Flagged)
            }
            (Flagged, LifecycleTrigger::FlagThresholdReached) => None,
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub status: ArtifactStatus,
    pub review_ends_at: Option<DateTime<Utc>>,
    pub submitted_by: Uuid,
    pub source_url: Option<String>,
    pub language: String,
    pub license: Option<String>,
    pub tags: Vec<String>,
    pub file_url: Option<String>,
    pub file_content_type: Option<String>,
    pub content_id: Option<String>,
    pub chain_tx_hash: Option<String>,
    pub chain_block: Option<i64>,
    pub anchored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    pub fn is_pinned(&self) -> bool {
        self.content_id.is_some()
    }

    pub fn is_anchored(&self) -> bool {
        self.chain_tx_hash.is_some()
    }

    /// True while the community can still vote or the submitter can edit.
    pub fn review_window_open(&self, now: DateTime<Utc>) -> bool {
        self.status == ArtifactStatus::CommunityReview
            && self.review_ends_at.map(|ends| now < ends).unwrap_or(false)
    }
}
