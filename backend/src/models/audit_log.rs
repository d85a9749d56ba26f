//! Audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    Submitted,
    Updated,
    FileUploaded,
    Withdrawn,
    Voted,
    Flagged,
    Commented,
    StatusChange,
    ExpertReviewed,
    Pinned,
    Anchored,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Submitted => "SUBMITTED",
            AuditEventType::Updated => "UPDATED",
            AuditEventType::FileUploaded => "FILE_UPLOADED",
            AuditEventType::Withdrawn => "WITHDRAWN",
            AuditEventType::Voted => "VOTED",
            AuditEventType::Flagged => "FLAGGED",
            AuditEventType::Commented => "COMMENTED",
            AuditEventType::StatusChange => "STATUS_CHANGE",
            AuditEventType::ExpertReviewed => "EXPERT_REVIEWED",
            AuditEventType::Pinned => "PINNED",
            AuditEventType::Anchored => "ANCHORED",
        }
    }
}

/// Audit event entry. Append-only; the per-artifact order of `created_at`
/// (ties broken by insertion order) is the audit trail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub actor_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
