//! Community vote model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Value of a single community vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteValue {
    Approve,
    Reject,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Approve => "APPROVE",
            VoteValue::Reject => "REJECT",
        }
    }
}

/// Vote entity. Unique per (artifact_id, voter_id), never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub voter_id: Uuid,
    pub value: VoteValue,
    pub created_at: DateTime<Utc>,
}

/// Approve/reject counts for one artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub approve: i64,
    pub reject: i64,
}

impl VoteTally {
    pub fn total(&self) -> i64 {
        self.approve + self.reject
    }

    /// Fraction of approvals; zero when nobody voted.
    pub fn ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.approve as f64 / total as f64
        }
    }

    pub fn record(&mut self, value: VoteValue) {
        match value {
            VoteValue::Approve => self.approve += 1,
            VoteValue::Reject => self.reject += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_of_empty_tally_is_zero() {
        assert_eq!(VoteTally::default().ratio(), 0.0);
    }

    #[test]
    fn test_record_counts_each_value() {
        let mut tally = VoteTally::default();
        tally.record(VoteValue::Approve);
        tally.record(VoteValue::Approve);
        tally.record(VoteValue::Reject);
        assert_eq!(tally.total(), 3);
        assert!((tally.ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
    }
}
