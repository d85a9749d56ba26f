//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ArtifactQuery, Page, PipelineStats, ReviewStore, ReviewTx};
use crate::error::Result;
use crate::models::artifact::{Artifact, ArtifactStatus};
use crate::models::audit_log::AuditEvent;
use crate::models::comment::Comment;
use crate::models::expert_review::ExpertReview;
use crate::models::flag::Flag;
use crate::models::user::{Role, User};
use crate::models::vote::{Vote, VoteTally};

const ARTIFACT_COLUMNS: &str = r#"
    id, title, description, artifact_type, status, review_ends_at, submitted_by,
    source_url, language, license, tags, file_url, file_content_type,
    content_id, chain_tx_hash, chain_block, anchored_at, created_at, updated_at
"#;

const TALLY_SQL: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE value = 'APPROVE') AS approve,
        COUNT(*) FILTER (WHERE value = 'REJECT') AS reject
    FROM votes
    WHERE artifact_id = $1
"#;

fn tally_from_row((approve, reject): (i64, i64)) -> VoteTally {
    VoteTally { approve, reject }
}

/// [`ReviewStore`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgReviewStore {
    db: PgPool,
}

impl PgReviewStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn begin(&self) -> Result<Box<dyn ReviewTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgReviewTx { tx }))
    }

    async fn find_artifact(&self, id: Uuid) -> Result<Option<Artifact>> {
        let sql = format!("SELECT {} FROM artifacts WHERE id = $1", ARTIFACT_COLUMNS);
        let artifact = sqlx::query_as::<_, Artifact>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(artifact)
    }

    async fn list_artifacts(
        &self,
        query: &ArtifactQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Artifact>> {
        let order = if query.oldest_first { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            SELECT {}
            FROM artifacts
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR submitted_by = $2)
            ORDER BY created_at {order}, id {order}
            LIMIT $3 OFFSET $4
            "#,
            ARTIFACT_COLUMNS,
            order = order
        );
        let status = query.status.map(|s| s.as_str());
        let items = sqlx::query_as::<_, Artifact>(&sql)
            .bind(status)
            .bind(query.submitted_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM artifacts
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR submitted_by = $2)
            "#,
        )
        .bind(status)
        .bind(query.submitted_by)
        .fetch_one(&self.db)
        .await?;

        Ok(Page { items, total })
    }

    async fn expired_reviews(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM artifacts
            WHERE status = $1 AND review_ends_at <= $2
            ORDER BY review_ends_at
            "#,
        )
        .bind(ArtifactStatus::CommunityReview)
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, identity, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn ensure_user(&self, identity: &str, role: Role) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, identity, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(identity)
        .bind(role)
        .execute(&self.db)
        .await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, identity, role, created_at FROM users WHERE identity = $1",
        )
        .bind(identity)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn vote_tally(&self, artifact_id: Uuid) -> Result<VoteTally> {
        let row = sqlx::query_as::<_, (i64, i64)>(TALLY_SQL)
            .bind(artifact_id)
            .fetch_one(&self.db)
            .await?;
        Ok(tally_from_row(row))
    }

    async fn find_vote(&self, artifact_id: Uuid, voter_id: Uuid) -> Result<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, artifact_id, voter_id, value, created_at
            FROM votes
            WHERE artifact_id = $1 AND voter_id = $2
            "#,
        )
        .bind(artifact_id)
        .bind(voter_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(vote)
    }

    async fn count_flags(&self, artifact_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM flags WHERE artifact_id = $1")
            .bind(artifact_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn list_flags(&self, artifact_id: Uuid) -> Result<Vec<Flag>> {
        let flags = sqlx::query_as::<_, Flag>(
            r#"
            SELECT id, artifact_id, reporter_id, reason, details, created_at
            FROM flags
            WHERE artifact_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(artifact_id)
        .fetch_all(&self.db)
        .await?;
        Ok(flags)
    }

    async fn list_expert_reviews(&self, artifact_id: Uuid) -> Result<Vec<ExpertReview>> {
        let reviews = sqlx::query_as::<_, ExpertReview>(
            r#"
            SELECT id, artifact_id, expert_id, decision, notes, checklist, created_at
            FROM expert_reviews
            WHERE artifact_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(artifact_id)
        .fetch_all(&self.db)
        .await?;
        Ok(reviews)
    }

    async fn approving_review(&self, artifact_id: Uuid) -> Result<Option<ExpertReview>> {
        let review = sqlx::query_as::<_, ExpertReview>(
            r#"
            SELECT id, artifact_id, expert_id, decision, notes, checklist, created_at
            FROM expert_reviews
            WHERE artifact_id = $1 AND decision = 'APPROVE'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(artifact_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(review)
    }

    async fn list_comments(
        &self,
        artifact_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Comment>> {
        let items = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, artifact_id, author_id, body, created_at
            FROM comments
            WHERE artifact_id = $1
            ORDER BY created_at, seq
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(artifact_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE artifact_id = $1")
            .bind(artifact_id)
            .fetch_one(&self.db)
            .await?;

        Ok(Page { items, total })
    }

    async fn list_events(&self, artifact_id: Uuid) -> Result<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, artifact_id, actor_id, event_type, payload, created_at
            FROM audit_events
            WHERE artifact_id = $1
            ORDER BY created_at, seq
            "#,
        )
        .bind(artifact_id)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, artifact_id, actor_id, event_type, payload, created_at
            FROM audit_events
            ORDER BY created_at DESC, seq DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(events)
    }

    async fn stats(&self) -> Result<PipelineStats> {
        let (users, artifacts, pinned, anchored, votes, flags, expert_reviews, comments) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM artifacts),
                    (SELECT COUNT(*) FROM artifacts WHERE content_id IS NOT NULL),
                    (SELECT COUNT(*) FROM artifacts WHERE chain_tx_hash IS NOT NULL),
                    (SELECT COUNT(*) FROM votes),
                    (SELECT COUNT(*) FROM flags),
                    (SELECT COUNT(*) FROM expert_reviews),
                    (SELECT COUNT(*) FROM comments)
                "#,
            )
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM artifacts GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let mut by_status: std::collections::BTreeMap<String, i64> = ArtifactStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        by_status.extend(rows);

        Ok(PipelineStats {
            users,
            artifacts,
            by_status,
            pinned,
            anchored,
            votes,
            flags,
            expert_reviews,
            comments,
        })
    }
}

/// Transaction holding row locks until commit or drop.
pub struct PgReviewTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReviewTx for PgReviewTx {
    async fn lock_artifact(&mut self, id: Uuid) -> Result<Option<Artifact>> {
        let sql = format!(
            "SELECT {} FROM artifacts WHERE id = $1 FOR UPDATE",
            ARTIFACT_COLUMNS
        );
        let artifact = sqlx::query_as::<_, Artifact>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(artifact)
    }

    async fn insert_artifact(&mut self, a: &Artifact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (
                id, title, description, artifact_type, status, review_ends_at, submitted_by,
                source_url, language, license, tags, file_url, file_content_type,
                content_id, chain_tx_hash, chain_block, anchored_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(a.id)
        .bind(&a.title)
        .bind(&a.description)
        .bind(a.artifact_type)
        .bind(a.status)
        .bind(a.review_ends_at)
        .bind(a.submitted_by)
        .bind(&a.source_url)
        .bind(&a.language)
        .bind(&a.license)
        .bind(&a.tags)
        .bind(&a.file_url)
        .bind(&a.file_content_type)
        .bind(&a.content_id)
        .bind(&a.chain_tx_hash)
        .bind(a.chain_block)
        .bind(a.anchored_at)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_artifact(&mut self, a: &Artifact) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE artifacts SET
                title = $2, description = $3, artifact_type = $4, status = $5,
                review_ends_at = $6, source_url = $7, language = $8, license = $9,
                tags = $10, file_url = $11, file_content_type = $12, content_id = $13,
                chain_tx_hash = $14, chain_block = $15, anchored_at = $16, updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(a.id)
        .bind(&a.title)
        .bind(&a.description)
        .bind(a.artifact_type)
        .bind(a.status)
        .bind(a.review_ends_at)
        .bind(&a.source_url)
        .bind(&a.language)
        .bind(&a.license)
        .bind(&a.tags)
        .bind(&a.file_url)
        .bind(&a.file_content_type)
        .bind(&a.content_id)
        .bind(&a.chain_tx_hash)
        .bind(a.chain_block)
        .bind(a.anchored_at)
        .bind(a.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::error::AppError::NotFound(format!("artifact {}", a.id)));
        }
        Ok(())
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO votes (id, artifact_id, voter_id, value, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vote.id)
        .bind(vote.artifact_id)
        .bind(vote.voter_id)
        .bind(vote.value)
        .bind(vote.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn vote_tally(&mut self, artifact_id: Uuid) -> Result<VoteTally> {
        let row = sqlx::query_as::<_, (i64, i64)>(TALLY_SQL)
            .bind(artifact_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(tally_from_row(row))
    }

    async fn insert_flag(&mut self, flag: &Flag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flags (id, artifact_id, reporter_id, reason, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(flag.id)
        .bind(flag.artifact_id)
        .bind(flag.reporter_id)
        .bind(flag.reason)
        .bind(&flag.details)
        .bind(flag.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_flags(&mut self, artifact_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM flags WHERE artifact_id = $1")
            .bind(artifact_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn find_expert_review(
        &mut self,
        artifact_id: Uuid,
        expert_id: Uuid,
    ) -> Result<Option<ExpertReview>> {
        let review = sqlx::query_as::<_, ExpertReview>(
            r#"
            SELECT id, artifact_id, expert_id, decision, notes, checklist, created_at
            FROM expert_reviews
            WHERE artifact_id = $1 AND expert_id = $2
            "#,
        )
        .bind(artifact_id)
        .bind(expert_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(review)
    }

    async fn insert_expert_review(&mut self, review: &ExpertReview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO expert_reviews (id, artifact_id, expert_id, decision, notes, checklist, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.id)
        .bind(review.artifact_id)
        .bind(review.expert_id)
        .bind(review.decision)
        .bind(&review.notes)
        .bind(&review.checklist)
        .bind(review.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, artifact_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(comment.id)
        .bind(comment.artifact_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_event(&mut self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, artifact_id, actor_id, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.artifact_id)
        .bind(event.actor_id)
        .bind(event.event_type)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
