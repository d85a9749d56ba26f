//! Persistence backends for the review pipeline.
//!
//! Services never talk to a database directly. Reads go through
//! [`ReviewStore`]; every mutation runs inside a [`ReviewTx`] that first
//! locks the artifact row, so precondition checks, writes and audit appends
//! commit or roll back together. Dropping a transaction without calling
//! [`ReviewTx::commit`] discards it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::artifact::{Artifact, ArtifactStatus};
use crate::models::audit_log::AuditEvent;
use crate::models::comment::Comment;
use crate::models::expert_review::ExpertReview;
use crate::models::flag::Flag;
use crate::models::user::{Role, User};
use crate::models::vote::{Vote, VoteTally};

pub use memory::MemoryReviewStore;
pub use postgres::PgReviewStore;

/// Filter for artifact listings.
#[derive(Debug, Clone, Default)]
pub struct ArtifactQuery {
    pub status: Option<ArtifactStatus>,
    pub submitted_by: Option<Uuid>,
    /// Oldest first instead of newest first
    pub oldest_first: bool,
}

/// A page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Whole-pipeline counters for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub users: i64,
    pub artifacts: i64,
    pub by_status: BTreeMap<String, i64>,
    pub pinned: i64,
    pub anchored: i64,
    pub votes: i64,
    pub flags: i64,
    pub expert_reviews: i64,
    pub comments: i64,
}

/// Read access and transaction factory.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Open a transaction for a single atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn ReviewTx>>;

    async fn find_artifact(&self, id: Uuid) -> Result<Option<Artifact>>;

    async fn list_artifacts(
        &self,
        query: &ArtifactQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Artifact>>;

    /// Ids of artifacts still in community review whose window closed at or before `now`.
    async fn expired_reviews(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Insert a user by public identity, returning the existing row if present.
    async fn ensure_user(&self, identity: &str, role: Role) -> Result<User>;

    async fn vote_tally(&self, artifact_id: Uuid) -> Result<VoteTally>;

    async fn find_vote(&self, artifact_id: Uuid, voter_id: Uuid) -> Result<Option<Vote>>;

    async fn count_flags(&self, artifact_id: Uuid) -> Result<i64>;

    /// Newest first.
    async fn list_flags(&self, artifact_id: Uuid) -> Result<Vec<Flag>>;

    /// Newest first.
    async fn list_expert_reviews(&self, artifact_id: Uuid) -> Result<Vec<ExpertReview>>;

    /// The earliest APPROVE review for an artifact.
    async fn approving_review(&self, artifact_id: Uuid) -> Result<Option<ExpertReview>>;

    /// Oldest first.
    async fn list_comments(&self, artifact_id: Uuid, limit: i64, offset: i64)
        -> Result<Page<Comment>>;

    /// Audit trail in creation order, ascending.
    async fn list_events(&self, artifact_id: Uuid) -> Result<Vec<AuditEvent>>;

    /// Most recent events across all artifacts, newest first.
    async fn recent_events(&self, limit: i64) -> Result<Vec<AuditEvent>>;

    async fn stats(&self) -> Result<PipelineStats>;
}

/// One atomic unit of work.
#[async_trait]
pub trait ReviewTx: Send {
    /// Load an artifact and hold its lock until commit or drop.
    async fn lock_artifact(&mut self, id: Uuid) -> Result<Option<Artifact>>;

    async fn insert_artifact(&mut self, artifact: &Artifact) -> Result<()>;

    /// Persist every mutable column of `artifact`.
    async fn save_artifact(&mut self, artifact: &Artifact) -> Result<()>;

    /// Fails with `Conflict` if the voter already voted.
    async fn insert_vote(&mut self, vote: &Vote) -> Result<()>;

    async fn vote_tally(&mut self, artifact_id: Uuid) -> Result<VoteTally>;

    /// Fails with `Conflict` if the reporter already flagged.
    async fn insert_flag(&mut self, flag: &Flag) -> Result<()>;

    async fn count_flags(&mut self, artifact_id: Uuid) -> Result<i64>;

    async fn find_expert_review(
        &mut self,
        artifact_id: Uuid,
        expert_id: Uuid,
    ) -> Result<Option<ExpertReview>>;

    /// Fails with `Conflict` if the expert already reviewed.
    async fn insert_expert_review(&mut self, review: &ExpertReview) -> Result<()>;

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()>;

    async fn append_event(&mut self, event: &AuditEvent) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
