//! Discussion comment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Comment entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
