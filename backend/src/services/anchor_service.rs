//! Proof anchoring for verified artifacts.
//!
//! Hashes the canonical provenance document, submits the hash to the ledger
//! and records the including transaction once it lands in a block.

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
use crate::services::audit_service::{self, AuditEntry};
use crate::services::in_flight::InFlight;
use crate::services::ledger_client::{await_inclusion, InclusionOutcome, LedgerClient};
use crate::services::proof::{self, ProofFields};
use crate::store::ReviewStore;

/// Timing limits for one anchoring attempt.
#[derive(Debug, Clone, Copy)]
pub struct AnchorTimeouts {
    /// Bound on transaction submission
    pub submit: Duration,
    /// Bound on waiting for block inclusion
    pub inclusion: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorOutcome {
    pub tx_hash: String,
    pub block_number: i64,
    pub proof_hash: String,
    pub canonical: String,
    pub network: String,
    pub anchored_at: DateTime<Utc>,
}

/// Stored anchor of an artifact alongside a fresh recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofRecord {
    pub artifact_id: Uuid,
    pub anchored: bool,
    pub chain_tx_hash: Option<String>,
    pub chain_block: Option<i64>,
    pub anchored_at: Option<DateTime<Utc>>,
    pub network: Option<String>,
    pub canonical: Option<String>,
    pub computed_hash: Option<String>,
    pub recorded_hash: Option<String>,
    pub matches: bool,
}

fn ensure_anchorable(artifact: &Artifact) -> Result<()> {
    if artifact.status != ArtifactStatus::Verified {
        return Err(AppError::PreconditionFailed(
            "Only verified artifacts can be anchored".to_string(),
        ));
    }
    if artifact.is_anchored() {
        return Err(AppError::PreconditionFailed(
            "Artifact is already anchored".to_string(),
        ));
    }
    Ok(())
}

pub struct AnchorService {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    ledger: Option<Arc<dyn LedgerClient>>,
    in_flight: InFlight,
    timeouts: AnchorTimeouts,
}

impl AnchorService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
        ledger: Option<Arc<dyn LedgerClient>>,
        timeouts: AnchorTimeouts,
    ) -> Self {
        Self {
            store,
            clock,
            ledger,
            in_flight: InFlight::new("Anchoring"),
            timeouts,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.ledger.is_some()
    }

    async fn identity_of(&self, user_id: Uuid, who: &str) -> Result<String> {
        self.store
            .find_user(user_id)
            .await?
            .map(|u| u.identity)
            .ok_or_else(|| AppError::NotFound(format!("{} not found", who)))
    }

    /// Anchor the proof of a verified artifact, attested by `expert_id`.
    ///
    /// Returns `Ok(None)` when no ledger is configured.
    pub async fn anchor_proof(
        &self,
        artifact_id: Uuid,
        expert_id: Uuid,
    ) -> Result<Option<AnchorOutcome>> {
        self.anchor(artifact_id, expert_id, expert_id).await
    }

    /// Manual retry on behalf of `caller`, attested by the approving expert.
    pub async fn retry_anchor(
        &self,
        artifact_id: Uuid,
        caller: &Principal,
    ) -> Result<Option<AnchorOutcome>> {
        if !caller.is_reviewer() {
            return Err(AppError::Forbidden(
                "Only experts and admins can anchor proofs".to_string(),
            ));
        }
        let review = self
            .store
            .approving_review(artifact_id)
            .await?
            .ok_or_else(|| {
                AppError::PreconditionFailed("Artifact has no approving review".to_string())
            })?;
        self.anchor(artifact_id, review.expert_id, caller.user_id).await
    }

    async fn anchor(
        &self,
        artifact_id: Uuid,
        expert_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<AnchorOutcome>> {
        let ledger = match &self.ledger {
            Some(ledger) => ledger,
            None => {
                tracing::debug!(
                    artifact_id = %artifact_id,
                    "No ledger configured, skipping anchor"
                );
                return Ok(None);
            }
        };

        // Held until after commit, so a later holder reads the committed row.
        let _guard = self.in_flight.acquire(artifact_id)?;
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        let expert_identity = self.identity_of(expert_id, "Expert").await?;
        ensure_anchorable(&artifact)?;

        let submitter_identity = self.identity_of(artifact.submitted_by, "Submitter").await?;
        let verified_at = proof::truncate_to_millis(self.clock.now());
        let fields = ProofFields {
            artifact_id,
            title: artifact.title.clone(),
            content_id: artifact.content_id.clone(),
            submitter_identity,
            verified_at,
            expert_identity,
        };
        let digest = proof::verify_proof(&fields)?;

        let tx_hash =
            tokio::time::timeout(self.timeouts.submit, ledger.submit_remark(&digest.remark()))
                .await
                .map_err(|_| {
                    AppError::ExternalUnavailable("Ledger submission timed out".to_string())
                })??;

        let block_number = match await_inclusion(
            ledger.as_ref(),
            &tx_hash,
            self.timeouts.inclusion,
            self.timeouts.poll_interval,
        )
        .await
        {
            InclusionOutcome::Included { block } => block,
            InclusionOutcome::Dropped(reason) => {
                return Err(AppError::ExternalUnavailable(format!(
                    "Anchor transaction {} dropped: {}",
                    tx_hash, reason
                )));
            }
            InclusionOutcome::TimedOut => {
                return Err(AppError::ExternalUnavailable(format!(
                    "Anchor transaction {} not included within {}s",
                    tx_hash,
                    self.timeouts.inclusion.as_secs()
                )));
            }
        };

        let network = ledger.network().to_string();
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut locked = tx
            .lock_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        ensure_anchorable(&locked)?;

        locked.chain_tx_hash = Some(tx_hash.clone());
        locked.chain_block = Some(block_number);
        locked.anchored_at = Some(verified_at);
        locked.updated_at = now;
        tx.save_artifact(&locked).await?;
        audit_service::emit(
            tx.as_mut(),
            AuditEntry::new(AuditEventType::Anchored, artifact_id, actor_id).payload(json!({
                "txHash": tx_hash,
                "blockNumber": block_number,
                "proofHash": digest.hash,
                "contentId": fields.content_id,
                "canonical": digest.canonical,
                "network": network,
            })),
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            artifact_id = %artifact_id,
            tx_hash = %tx_hash,
            block = block_number,
            "Proof anchored"
        );
        Ok(Some(AnchorOutcome {
            tx_hash,
            block_number,
            proof_hash: digest.hash,
            canonical: digest.canonical,
            network,
            anchored_at: verified_at,
        }))
    }

    /// Stored chain fields plus a recomputation of the proof hash. Public for
    /// verified artifacts.
    pub async fn read_proof(&self, artifact_id: Uuid) -> Result<ProofRecord> {
        let artifact = self
            .store
            .find_artifact(artifact_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Artifact not found".to_string()))?;
        if artifact.status != ArtifactStatus::Verified {
            return Err(AppError::NotFound("Artifact not found".to_string()));
        }

        let mut record = ProofRecord {
            artifact_id,
            anchored: artifact.is_anchored(),
            chain_tx_hash: artifact.chain_tx_hash.clone(),
            chain_block: artifact.chain_block,
            anchored_at: artifact.anchored_at,
            network: None,
            canonical: None,
            computed_hash: None,
            recorded_hash: None,
            matches: false,
        };
        let anchored_at = match artifact.anchored_at {
            Some(at) if artifact.is_anchored() => at,
            _ => return Ok(record),
        };

        // The proof commits to the content id known at anchoring time, which
        // is null when the artifact was pinned afterwards.
        let mut content_id = artifact.content_id.clone();
        let events = self.store.list_events(artifact_id).await?;
        if let Some(event) = events
            .iter()
            .rev()
            .find(|e| e.event_type == AuditEventType::Anchored)
        {
            record.recorded_hash = event.payload["proofHash"].as_str().map(String::from);
            record.network = event.payload["network"].as_str().map(String::from);
            if let Some(anchored_cid) = event.payload.get("contentId") {
                content_id = anchored_cid.as_str().map(String::from);
            }
        }

        let submitter = self.store.find_user(artifact.submitted_by).await?;
        let expert = match self.store.approving_review(artifact_id).await? {
            Some(review) => self.store.find_user(review.expert_id).await?,
            None => None,
        };
        if let (Some(submitter), Some(expert)) = (submitter, expert) {
            let digest = proof::verify_proof(&ProofFields {
                artifact_id,
                title: artifact.title.clone(),
                content_id,
                submitter_identity: submitter.identity,
                verified_at: anchored_at,
                expert_identity: expert.identity,
            })?;
            record.matches = record.recorded_hash.as_deref() == Some(digest.hash.as_str());
            record.canonical = Some(digest.canonical);
            record.computed_hash = Some(digest.hash);
        }

        Ok(record)
    }
}
