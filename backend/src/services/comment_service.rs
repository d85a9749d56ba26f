//! Artifact discussion threads.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::audit_log::AuditEventType;
use crate::models::comment::Comment;
use crate::models::user::Principal;
use crate::services::artifact_service::ensure_visible;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::PageRequest;
use crate::store::{Page, ReviewStore};

const MAX_BODY_LEN: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<()> {
        let len = self.body.trim().chars().count();
        if len == 0 || len > MAX_BODY_LEN {
            return Err(AppError::Validation(format!(
                "body must be between 1 and {} characters",
                MAX_BODY_LEN
            )));
        }
        Ok(())
    }
}

pub struct CommentService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn add_comment(
        &self,
        artifact_id: Uuid,
        author: &Principal,
        req: CreateCommentRequest,
    ) -> Result<Comment> {
        req.validate()?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, Some(author))?;

        let comment = Comment {
            id: Uuid::new_v4(),
            artifact_id,
            author_id: author.user_id,
            body: req.body.trim().to_string(),
            created_at: now,
        };
        tx.insert_comment(&comment).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Commented, artifact_id, author.user_id)
                .payload(json!({ "commentId": comment.id })),
            now,
        )
        .await?;
        tx.commit().await?;

        Ok(comment)
    }

    /// Comments oldest first.
    pub async fn list_comments(
        &self,
        artifact_id: Uuid,
        caller: Option<&Principal>,
        page: PageRequest,
    ) -> Result<Page<Comment>> {
        page.validate()?;
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, caller)?;
        self.store
            .list_comments(artifact_id, page.limit(), page.offset())
            .await
    }
}
