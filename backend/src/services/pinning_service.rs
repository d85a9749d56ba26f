//! Content pinning for verified artifacts.
//!
//! Publishes the artifact's file (best effort) and a metadata document to
//! the content store, then records the metadata content id exactly once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::artifact::{Artifact, ArtifactStatus};
use crate::models::audit_log::AuditEventType;
use crate::models::user::Principal;
use crate::services::artifact_service::ensure_visible;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::content_store::ContentStore;
use crate::services::in_flight::InFlight;
use crate::store::ReviewStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinOutcome {
    pub content_id: String,
    pub file_content_id: Option<String>,
    pub gateway_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinInfo {
    pub artifact_id: Uuid,
    pub pinned: bool,
    pub content_id: Option<String>,
    pub gateway_url: Option<String>,
}

/// Metadata document published for a verified artifact.
pub fn metadata_document(
    artifact: &Artifact,
    submitter_identity: Option<&str>,
    expert_identity: Option<&str>,
    file_content_id: Option<&str>,
    published_at: DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "artifactId": artifact.id,
        "title": artifact.title,
        "description": artifact.description,
        "type": artifact.artifact_type,
        "sourceUrl": artifact.source_url,
        "fileUrl": artifact.file_url,
        "fileContentType": artifact.file_content_type,
        "fileCid": file_content_id,
        "language": artifact.language,
        "license": artifact.license,
        "tags": artifact.tags,
        "submittedBy": submitter_identity,
        "verifiedBy": expert_identity,
        "createdAt": artifact.created_at,
        "publishedAt": published_at,
        "chainTxHash": artifact.chain_tx_hash,
        "chainBlock": artifact.chain_block,
    })
}

fn ensure_pinnable(artifact: &Artifact) -> Result<()> {
    if artifact.status != ArtifactStatus::Verified {
        return Err(AppError::PreconditionFailed(
            "Only verified artifacts can be pinned".to_string(),
        ));
    }
    if artifact.is_pinned() {
        return Err(AppError::PreconditionFailed(
            "Artifact is already pinned".to_string(),
        ));
    }
    Ok(())
}

pub struct PinningService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    content: Option<Arc<dyn ContentStore>>,
    in_flight: InFlight,
    timeout: Duration,
}

impl PinningService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
        content: Option<Arc<dyn ContentStore>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            content,
            in_flight: InFlight::new("Pinning"),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.content.is_some()
    }

    async fn identity_of(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.store.find_user(user_id).await?.map(|u| u.identity))
    }

    /// Publish a verified artifact to the content store.
    pub async fn pin_artifact(&self, artifact_id: Uuid, actor_id: Uuid) -> Result<PinOutcome> {
        // Held until after commit, so a later holder reads the committed row.
        let _guard = self.in_flight.acquire(artifact_id)?;
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_pinnable(&artifact)?;

        let content = self.content.as_ref().ok_or_else(|| {
            AppError::ExternalUnavailable("No content store configured".to_string())
        })?;

        let submitter = self.identity_of(artifact.submitted_by).await?;
        let expert = match self.store.approving_review(artifact_id).await? {
            Some(review) => self.identity_of(review.expert_id).await?,
            None => None,
        };

        let name = format!("artifact-{}", artifact.id);
        let file_content_id = match (&artifact.file_url, &artifact.file_content_type) {
            (Some(url), content_type) => {
                let content_type = content_type.as_deref().unwrap_or("application/octet-stream");
                match tokio::time::timeout(self.timeout, content.pin_file(&name, url, content_type))
                    .await
                {
                    Ok(Ok(cid)) => Some(cid),
                    Ok(Err(e)) => {
                        tracing::warn!(
                            artifact_id = %artifact_id,
                            error = %e,
                            "File pin failed, publishing metadata only"
                        );
                        None
                    }
                    Err(_) => {
                        tracing::warn!(
                            artifact_id = %artifact_id,
                            "File pin timed out, publishing metadata only"
                        );
                        None
                    }
                }
            }
            (None, _) => None,
        };

        let document = metadata_document(
            &artifact,
            submitter.as_deref(),
            expert.as_deref(),
            file_content_id.as_deref(),
            self.clock.now(),
        );
        let content_id = tokio::time::timeout(self.timeout, content.pin_json(&name, &document))
            .await
            .map_err(|_| AppError::ExternalUnavailable("Content store timed out".to_string()))??;
        let gateway_url = content.gateway_url(&content_id);

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut locked = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_pinnable(&locked)?;

        locked.content_id = Some(content_id.clone());
        locked.updated_at = now;
        tx.save_artifact(&locked).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Pinned, artifact_id, actor_id).payload(json!({
                "contentId": content_id,
                "fileContentId": file_content_id,
                "gatewayUrl": gateway_url,
            })),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(artifact_id = %artifact_id, content_id = %content_id, "Artifact pinned");
        Ok(PinOutcome {
            content_id,
            file_content_id,
            gateway_url,
        })
    }

    /// Publication state for an artifact visible to `caller`.
    pub async fn pin_info(&self, artifact_id: Uuid, caller: Option<&Principal>) -> Result<PinInfo> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, caller)?;

        let gateway_url = match (&artifact.content_id, &self.content) {
            (Some(cid), Some(content)) => Some(content.gateway_url(cid)),
            _ => None,
        };
        Ok(PinInfo {
            artifact_id,
            pinned: artifact.is_pinned(),
            content_id: artifact.content_id,
            gateway_url,
        })
    }
}
