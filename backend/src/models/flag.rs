//! Abuse/quality flag model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reason code attached to a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagReason {
    Misinfo,
    Copyright,
    Duplicate,
    Other,
}

impl FlagReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::Misinfo => "MISINFO",
            FlagReason::Copyright => "COPYRIGHT",
            FlagReason::Duplicate => "DUPLICATE",
            FlagReason::Other => "OTHER",
        }
    }
}

/// Flag entity. Unique per (artifact_id, reporter_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Flag {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub reporter_id: Uuid,
    pub reason: FlagReason,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}
