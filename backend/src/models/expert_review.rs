//! Expert review model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Terminal decision recorded by an expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpertDecision {
    Approve,
    Reject,
}

impl ExpertDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertDecision::Approve => "APPROVE",
            ExpertDecision::Reject => "REJECT",
        }
    }
}

/// Expert review entity. Unique per (artifact_id, expert_id).
///
/// `checklist` maps named criteria to pass/fail and is stored as JSON.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ExpertReview {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub expert_id: Uuid,
    pub decision: ExpertDecision,
    pub notes: Option<String>,
    pub checklist: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
