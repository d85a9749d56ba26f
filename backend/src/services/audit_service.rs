//! Audit logging service.
//!
//! Every mutation of an artifact appends one or more events to its audit
//! trail from inside the mutating transaction. An append that fails fails
//! the whole operation, so the trail never disagrees with the data.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::audit_log::{AuditEvent, AuditEventType};
use crate::store::{ReviewStore, ReviewTx};

/// Audit event builder
pub struct AuditEntry {
    event_type: AuditEventType,
    artifact_id: Uuid,
    actor_id: Uuid,
    payload: Value,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType, artifact_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            event_type,
            artifact_id,
            actor_id,
            payload: json!({}),
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    fn into_event(self, at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            artifact_id: self.artifact_id,
            actor_id: self.actor_id,
            event_type: self.event_type,
            payload: self.payload,
            created_at: at,
        }
    }
}

/// Append an entry inside the caller's transaction.
pub async fn emit(
    tx: &mut dyn ReviewTx,
    entry: AuditEntry,
    at: DateTime<Utc>,
) -> Result<AuditEvent> {
    let event = entry.into_event(at);
    tx.append_event(&event).await?;
    tracing::debug!(
        artifact_id = %event.artifact_id,
        event_type = event.event_type.as_str(),
        "Audit event appended"
    );
    Ok(event)
}

/// Read side of the audit log.
pub struct AuditService {
    store: Arc<dyn ReviewStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self { store }
    }

    /// Events for one artifact, oldest first.
    pub async fn list_by_artifact(&self, artifact_id: Uuid) -> Result<Vec<AuditEvent>> {
        self.store.list_events(artifact_id).await
    }

    /// Most recent events across all artifacts.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        self.store.recent_events(limit.clamp(1, 200)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::artifact::{Artifact, ArtifactStatus, ArtifactType};
    use crate::store::MemoryReviewStore;

    fn artifact() -> Artifact {
        let now = Utc::now();
        Artifact {
            id: Uuid::new_v4(),
            title: "Field recording".into(),
            description: "Dawn chorus, river delta".into(),
            artifact_type: ArtifactType::Audio,
            status: ArtifactStatus::CommunityReview,
            review_ends_at: Some(now),
            submitted_by: Uuid::new_v4(),
            source_url: None,
            language: "en".into(),
            license: None,
            tags: vec![],
            file_url: None,
            file_content_type: None,
            content_id: None,
            chain_tx_hash: None,
            chain_block: None,
            anchored_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_events_listed_in_append_order() {
        let store = Arc::new(MemoryReviewStore::new());
        let a = artifact();
        let actor = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        tx.insert_artifact(&a).await.unwrap();
        emit(tx.as_mut(), AuditEntry::new(AuditEventType::Submitted, a.id, actor), now)
            .await
            .unwrap();
        emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Voted, a.id, actor)
                .payload(json!({"value": "APPROVE"})),
            now,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let service = AuditService::new(store);
        let events = service.list_by_artifact(a.id).await.unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![AuditEventType::Submitted, AuditEventType::Voted]);
        assert_eq!(events[1].payload["value"], "APPROVE");
    }

    #[tokio::test]
    async fn test_failed_append_surfaces_error() {
        let store = MemoryReviewStore::new();
        let a = artifact();
        store.fail_event_writes_for(a.id).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_artifact(&a).await.unwrap();
        let err = emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Submitted, a.id, Uuid::new_v4()),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
