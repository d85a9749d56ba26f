//! Artifact service.
//!
//! Submission, editing and file attachment, plus the visibility-filtered
//! read side of the catalogue.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ReviewPolicy;
use crate::error::{AppError, Result};
use crate::models::artifact::{Artifact, ArtifactStatus, ArtifactType};
use crate::models::audit_log::{AuditEvent, AuditEventType};
use crate::models::user::Principal;
use crate::services::audit_service::{self, AuditEntry};
use crate::services::PageRequest;
use crate::store::{ArtifactQuery, Page, ReviewStore};

const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 64;

/// Request to submit a new artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArtifactRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub source_url: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request to edit an artifact during its review window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArtifactRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub artifact_type: Option<ArtifactType>,
    pub source_url: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Reference to a file already uploaded to external storage.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachFileRequest {
    pub file_url: String,
    pub content_type: String,
}

/// Which artifacts a listing should include.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactListFilter {
    pub status: Option<ArtifactStatus>,
    /// Only the caller's own submissions
    #[serde(default)]
    pub mine: bool,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<()> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::Validation(format!("{} must be an http(s) URL", field))),
    }
}

fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!("At most {} tags allowed", MAX_TAGS)));
    }
    if tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(AppError::Validation(format!(
            "Tags must be at most {} characters",
            MAX_TAG_LEN
        )));
    }
    Ok(tags)
}

impl CreateArtifactRequest {
    pub fn validate(&self) -> Result<()> {
        check_len("title", self.title.trim(), 3, 256)?;
        check_len("description", self.description.trim(), 10, 5000)?;
        if let Some(url) = &self.source_url {
            check_url("source_url", url)?;
        }
        if let Some(language) = &self.language {
            check_len("language", language, 2, 10)?;
        }
        if let Some(license) = &self.license {
            check_len("license", license, 0, 128)?;
        }
        Ok(())
    }
}

impl UpdateArtifactRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            check_len("title", title.trim(), 3, 256)?;
        }
        if let Some(description) = &self.description {
            check_len("description", description.trim(), 10, 5000)?;
        }
        if let Some(url) = &self.source_url {
            check_url("source_url", url)?;
        }
        if let Some(language) = &self.language {
            check_len("language", language, 2, 10)?;
        }
        if let Some(license) = &self.license {
            check_len("license", license, 0, 128)?;
        }
        Ok(())
    }

    /// Names of the fields this request touches.
    fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.artifact_type.is_some() {
            fields.push("type");
        }
        if self.source_url.is_some() {
            fields.push("source_url");
        }
        if self.language.is_some() {
            fields.push("language");
        }
        if self.license.is_some() {
            fields.push("license");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        fields
    }
}

impl AttachFileRequest {
    pub fn validate(&self) -> Result<()> {
        check_url("file_url", &self.file_url)?;
        check_len("content_type", self.content_type.trim(), 1, 128)
    }
}

/// VERIFIED artifacts are public. Anything else is visible only to its
/// submitter and to reviewers; other callers get `NotFound`.
pub fn ensure_visible(artifact: &Artifact, caller: Option<&Principal>) -> Result<()> {
    if artifact.status == ArtifactStatus::Verified {
        return Ok(());
    }
    match caller {
        Some(p) if p.user_id == artifact.submitted_by || p.is_reviewer() => Ok(()),
        _ => Err(AppError::NotFound("Artifact not found".to_string())),
    }
}

/// Artifact service
pub struct ArtifactService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    policy: ReviewPolicy,
}

impl ArtifactService {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>, policy: ReviewPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Submit a new artifact. It enters community review immediately.
    pub async fn create(&self, req: CreateArtifactRequest, caller: &Principal) -> Result<Artifact> {
        req.validate()?;
        let tags = normalize_tags(req.tags)?;
        let now = self.clock.now();

        let artifact = Artifact {
            id: Uuid::new_v4(),
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            artifact_type: req.artifact_type,
            status: ArtifactStatus::CommunityReview,
            review_ends_at: Some(now + self.policy.review_window()),
            submitted_by: caller.user_id,
            source_url: req.source_url,
            language: req.language.unwrap_or_else(|| "en".to_string()),
            license: req.license,
            tags,
            file_url: None,
            file_content_type: None,
            content_id: None,
            chain_tx_hash: None,
            chain_block: None,
            anchored_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_artifact(&artifact).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Submitted, artifact.id, caller.user_id).payload(
                json!({
                    "title": artifact.title,
                    "type": artifact.artifact_type,
                    "reviewEndsAt": artifact.review_ends_at,
                }),
            ),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            artifact_id = %artifact.id,
            submitted_by = %caller.user_id,
            "Artifact submitted"
        );
        Ok(artifact)
    }

    /// Edit descriptive fields while the review window is still open.
    pub async fn update(
        &self,
        artifact_id: Uuid,
        req: UpdateArtifactRequest,
        caller: &Principal,
    ) -> Result<Artifact> {
        req.validate()?;
        let fields = req.fields();
        if fields.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let mut artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        if artifact.submitted_by != caller.user_id {
            return Err(AppError::Forbidden(
                "Only the submitter can edit this artifact".to_string(),
            ));
        }
        if !artifact.review_window_open(now) {
            return Err(AppError::PreconditionFailed(
                "Artifacts can only be edited during an open community review".to_string(),
            ));
        }

        if let Some(title) = req.title {
            artifact.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            artifact.description = description.trim().to_string();
        }
        if let Some(artifact_type) = req.artifact_type {
            artifact.artifact_type = artifact_type;
        }
        if let Some(source_url) = req.source_url {
            artifact.source_url = Some(source_url);
        }
        if let Some(language) = req.language {
            artifact.language = language;
        }
        if let Some(license) = req.license {
            artifact.license = Some(license);
        }
        if let Some(tags) = req.tags {
            artifact.tags = normalize_tags(tags)?;
        }
        artifact.updated_at = now;

        tx.save_artifact(&artifact).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Updated, artifact.id, caller.user_id)
                .payload(json!({ "fields": fields })),
            now,
        )
        .await?;
        tx.commit().await?;

        Ok(artifact)
    }

    /// Record the externally stored file for an artifact.
    pub async fn attach_file(
        &self,
        artifact_id: Uuid,
        req: AttachFileRequest,
        caller: &Principal,
    ) -> Result<Artifact> {
        req.validate()?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let mut artifact = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;

        if artifact.submitted_by != caller.user_id {
            return Err(AppError::Forbidden(
                "Only the submitter can attach a file".to_string(),
            ));
        }
        if !matches!(
            artifact.status,
            ArtifactStatus::Pending | ArtifactStatus::CommunityReview
        ) {
            return Err(AppError::PreconditionFailed(format!(
                "Cannot attach a file to an artifact in status {}",
                artifact.status
            )));
        }

        artifact.file_url = Some(req.file_url.clone());
        artifact.file_content_type = Some(req.content_type.trim().to_string());
        artifact.updated_at = now;

        tx.save_artifact(&artifact).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::FileUploaded, artifact.id, caller.user_id).payload(
                json!({
                    "fileUrl": req.file_url,
                    "contentType": artifact.file_content_type,
                }),
            ),
            now,
        )
        .await?;
        tx.commit().await?;

        Ok(artifact)
    }

    pub async fn get(&self, artifact_id: Uuid, caller: Option<&Principal>) -> Result<Artifact> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_visible(&artifact, caller)?;
        Ok(artifact)
    }

    /// Newest-first listing. Anonymous and member callers only see VERIFIED
    /// artifacts unless they ask for their own submissions.
    pub async fn list(
        &self,
        filter: ArtifactListFilter,
        caller: Option<&Principal>,
        page: PageRequest,
    ) -> Result<Page<Artifact>> {
        page.validate()?;

        let query = if filter.mine {
            let caller = caller.ok_or_else(|| {
                AppError::Authentication("Listing your own artifacts requires a user".to_string())
            })?;
            ArtifactQuery {
                status: filter.status,
                submitted_by: Some(caller.user_id),
                oldest_first: false,
            }
        } else {
            match filter.status {
                None | Some(ArtifactStatus::Verified) => ArtifactQuery {
                    status: Some(ArtifactStatus::Verified),
                    ..Default::default()
                },
                Some(status) => {
                    if !caller.map(|p| p.is_reviewer()).unwrap_or(false) {
                        return Err(AppError::Forbidden(
                            "Only experts and admins can list by status".to_string(),
                        ));
                    }
                    ArtifactQuery {
                        status: Some(status),
                        ..Default::default()
                    }
                }
            }
        };

        self.store
            .list_artifacts(&query, page.limit(), page.offset())
            .await
    }

    /// Audit trail of an artifact, oldest first.
    pub async fn activity(
        &self,
        artifact_id: Uuid,
        caller: Option<&Principal>,
    ) -> Result<Vec<AuditEvent>> {
        self.get(artifact_id, caller).await?;
        self.store.list_events(artifact_id).await
    }
}
