//! In-process store.
//!
//! Backs `STORE_BACKEND=memory` and the test suite. A transaction holds the
//! store-wide lock and works on a private copy of the state, which replaces
//! the shared state on commit. That makes every transaction serializable,
//! which is stronger than the row locks the PostgreSQL store takes.
//!
//! For tests and local development only. Every transaction copies the whole
//! state and transactions run one at a time, so cost grows with the data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{ArtifactQuery, Page, PipelineStats, ReviewStore, ReviewTx};
use crate::error::{AppError, Result};
use crate::models::artifact::{Artifact, ArtifactStatus};
use crate::models::audit_log::AuditEvent;
use crate::models::comment::Comment;
use crate::models::expert_review::{ExpertDecision, ExpertReview};
use crate::models::flag::Flag;
use crate::models::user::{Role, User};
use crate::models::vote::{Vote, VoteTally};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    artifacts: HashMap<Uuid, Artifact>,
    votes: Vec<Vote>,
    flags: Vec<Flag>,
    reviews: Vec<ExpertReview>,
    comments: Vec<Comment>,
    events: Vec<AuditEvent>,
    /// Artifacts whose audit appends fail, to exercise rollback paths
    failing_events: HashSet<Uuid>,
}

impl MemoryState {
    fn tally(&self, artifact_id: Uuid) -> VoteTally {
        let mut tally = VoteTally::default();
        for vote in self.votes.iter().filter(|v| v.artifact_id == artifact_id) {
            tally.record(vote.value);
        }
        tally
    }

    fn flag_count(&self, artifact_id: Uuid) -> i64 {
        self.flags.iter().filter(|f| f.artifact_id == artifact_id).count() as i64
    }
}

/// In-memory [`ReviewStore`].
#[derive(Clone, Default)]
pub struct MemoryReviewStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every audit append for `artifact_id` fail with a database error.
    pub async fn fail_event_writes_for(&self, artifact_id: Uuid) {
        self.state.lock().await.failing_events.insert(artifact_id);
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    /// Clones the full state. Fine for test-sized data only.
    async fn begin(&self) -> Result<Box<dyn ReviewTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryReviewTx { guard, working }))
    }

    async fn find_artifact(&self, id: Uuid) -> Result<Option<Artifact>> {
        Ok(self.state.lock().await.artifacts.get(&id).cloned())
    }

    async fn list_artifacts(
        &self,
        query: &ArtifactQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Artifact>> {
        let state = self.state.lock().await;
        let mut items: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|a| query.status.map(|s| a.status == s).unwrap_or(true))
            .filter(|a| query.submitted_by.map(|u| a.submitted_by == u).unwrap_or(true))
            .cloned()
            .collect();

        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if !query.oldest_first {
            items.reverse();
        }

        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn expired_reviews(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut expired: Vec<&Artifact> = state
            .artifacts
            .values()
            .filter(|a| a.status == ArtifactStatus::CommunityReview)
            .filter(|a| a.review_ends_at.map(|ends| ends <= now).unwrap_or(false))
            .collect();
        expired.sort_by_key(|a| a.review_ends_at);
        Ok(expired.into_iter().map(|a| a.id).collect())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn ensure_user(&self, identity: &str, role: Role) -> Result<User> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.users.values().find(|u| u.identity == identity) {
            return Ok(existing.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            role,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn vote_tally(&self, artifact_id: Uuid) -> Result<VoteTally> {
        Ok(self.state.lock().await.tally(artifact_id))
    }

    async fn find_vote(&self, artifact_id: Uuid, voter_id: Uuid) -> Result<Option<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .find(|v| v.artifact_id == artifact_id && v.voter_id == voter_id)
            .cloned())
    }

    async fn count_flags(&self, artifact_id: Uuid) -> Result<i64> {
        Ok(self.state.lock().await.flag_count(artifact_id))
    }

    async fn list_flags(&self, artifact_id: Uuid) -> Result<Vec<Flag>> {
        let state = self.state.lock().await;
        Ok(state
            .flags
            .iter()
            .rev()
            .filter(|f| f.artifact_id == artifact_id)
            .cloned()
            .collect())
    }

    async fn list_expert_reviews(&self, artifact_id: Uuid) -> Result<Vec<ExpertReview>> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .iter()
            .rev()
            .filter(|r| r.artifact_id == artifact_id)
            .cloned()
            .collect())
    }

    async fn approving_review(&self, artifact_id: Uuid) -> Result<Option<ExpertReview>> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .iter()
            .find(|r| r.artifact_id == artifact_id && r.decision == ExpertDecision::Approve)
            .cloned())
    }

    async fn list_comments(
        &self,
        artifact_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Comment>> {
        let state = self.state.lock().await;
        let all: Vec<&Comment> = state
            .comments
            .iter()
            .filter(|c| c.artifact_id == artifact_id)
            .collect();
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn list_events(&self, artifact_id: Uuid) -> Result<Vec<AuditEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<AuditEvent> = state
            .events
            .iter()
            .filter(|e| e.artifact_id == artifact_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let state = self.state.lock().await;
        let mut events = state.events.clone();
        events.sort_by_key(|e| e.created_at);
        events.reverse();
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn stats(&self) -> Result<PipelineStats> {
        let state = self.state.lock().await;
        let mut stats = PipelineStats {
            users: state.users.len() as i64,
            artifacts: state.artifacts.len() as i64,
            votes: state.votes.len() as i64,
            flags: state.flags.len() as i64,
            expert_reviews: state.reviews.len() as i64,
            comments: state.comments.len() as i64,
            ..Default::default()
        };
        for status in ArtifactStatus::ALL {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }
        for artifact in state.artifacts.values() {
            *stats
                .by_status
                .entry(artifact.status.as_str().to_string())
                .or_default() += 1;
            if artifact.is_pinned() {
                stats.pinned += 1;
            }
            if artifact.is_anchored() {
                stats.anchored += 1;
            }
        }
        Ok(stats)
    }
}

/// Transaction over a private copy of the state.
pub struct MemoryReviewTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl ReviewTx for MemoryReviewTx {
    async fn lock_artifact(&mut self, id: Uuid) -> Result<Option<Artifact>> {
        Ok(self.working.artifacts.get(&id).cloned())
    }

    async fn insert_artifact(&mut self, artifact: &Artifact) -> Result<()> {
        if self.working.artifacts.contains_key(&artifact.id) {
            return Err(AppError::Conflict(format!("artifact {} already exists", artifact.id)));
        }
        self.working.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn save_artifact(&mut self, artifact: &Artifact) -> Result<()> {
        match self.working.artifacts.get_mut(&artifact.id) {
            Some(existing) => {
                *existing = artifact.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("artifact {}", artifact.id))),
        }
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<()> {
        let duplicate = self
            .working
            .votes
            .iter()
            .any(|v| v.artifact_id == vote.artifact_id && v.voter_id == vote.voter_id);
        if duplicate {
            return Err(AppError::Conflict(
                "You have already voted on this artifact".to_string(),
            ));
        }
        self.working.votes.push(vote.clone());
        Ok(())
    }

    async fn vote_tally(&mut self, artifact_id: Uuid) -> Result<VoteTally> {
        Ok(self.working.tally(artifact_id))
    }

    async fn insert_flag(&mut self, flag: &Flag) -> Result<()> {
        let duplicate = self
            .working
            .flags
            .iter()
            .any(|f| f.artifact_id == flag.artifact_id && f.reporter_id == flag.reporter_id);
        if duplicate {
            return Err(AppError::Conflict(
                "You have already flagged this artifact".to_string(),
            ));
        }
        self.working.flags.push(flag.clone());
        Ok(())
    }

    async fn count_flags(&mut self, artifact_id: Uuid) -> Result<i64> {
        Ok(self.working.flag_count(artifact_id))
    }

    async fn find_expert_review(
        &mut self,
        artifact_id: Uuid,
        expert_id: Uuid,
    ) -> Result<Option<ExpertReview>> {
        Ok(self
            .working
            .reviews
            .iter()
            .find(|r| r.artifact_id == artifact_id && r.expert_id == expert_id)
            .cloned())
    }

    async fn insert_expert_review(&mut self, review: &ExpertReview) -> Result<()> {
        let duplicate = self
            .working
            .reviews
            .iter()
            .any(|r| r.artifact_id == review.artifact_id && r.expert_id == review.expert_id);
        if duplicate {
            return Err(AppError::Conflict(
                "You have already reviewed this artifact".to_string(),
            ));
        }
        self.working.reviews.push(review.clone());
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        self.working.comments.push(comment.clone());
        Ok(())
    }

    async fn append_event(&mut self, event: &AuditEvent) -> Result<()> {
        if self.working.failing_events.contains(&event.artifact_id) {
            return Err(AppError::Database(format!(
                "audit append rejected for artifact {}",
                event.artifact_id
            )));
        }
        self.working.events.push(event.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryReviewTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
