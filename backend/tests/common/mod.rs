//! Common test utilities for backend integration and handler tests
//!
//! This module provides shared infrastructure for testing:
//! - An in-memory store and a manual clock
//! - Scripted content store and ledger doubles
//! - Helpers that walk an artifact through the pipeline

#![allow(dead_code)]
#![allow(unused_imports)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use artifact_curator_backend::api::{AppState, SharedState};
use artifact_curator_backend::clock::{Clock, ManualClock};
use artifact_curator_backend::config::Config;
use artifact_curator_backend::error::{AppError, Result};
use artifact_curator_backend::models::artifact::{Artifact, ArtifactType};
use artifact_curator_backend::models::audit_log::{AuditEvent, AuditEventType};
use artifact_curator_backend::models::expert_review::ExpertDecision;
use artifact_curator_backend::models::user::{Principal, Role, SystemPrincipal};
use artifact_curator_backend::models::vote::VoteValue;
use artifact_curator_backend::services::artifact_service::CreateArtifactRequest;
use artifact_curator_backend::services::content_store::ContentStore;
use artifact_curator_backend::services::expert_review_service::{
    DecisionOutcome, SubmitDecisionRequest,
};
use artifact_curator_backend::services::ledger_client::{InclusionStatus, LedgerClient};
use artifact_curator_backend::store::{MemoryReviewStore, ReviewStore};

pub const SYSTEM_IDENTITY: &str = "SYSTEM";

/// Content store double that hands out sequential content ids.
#[derive(Default)]
pub struct MockContentStore {
    counter: AtomicU64,
    pub fail_json: AtomicBool,
    pub fail_file: AtomicBool,
    pub documents: Mutex<Vec<Value>>,
}

impl MockContentStore {
    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    async fn pin_json(&self, _name: &str, document: &Value) -> Result<String> {
        tokio::task::yield_now().await;
        if self.fail_json.load(Ordering::SeqCst) {
            return Err(AppError::ExternalUnavailable("pinning service down".into()));
        }
        self.documents.lock().unwrap().push(document.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("bafyjson{}", n))
    }

    async fn pin_file(&self, _name: &str, _file_url: &str, _content_type: &str) -> Result<String> {
        if self.fail_file.load(Ordering::SeqCst) {
            return Err(AppError::ExternalUnavailable("file fetch failed".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("bafyfile{}", n))
    }

    fn gateway_url(&self, content_id: &str) -> String {
        format!("https://gateway.test/ipfs/{}", content_id)
    }
}

/// Ledger double. Transactions are included immediately unless told to drop.
#[derive(Default)]
pub struct MockLedger {
    counter: AtomicU64,
    pub fail_submit: AtomicBool,
    pub drop_all: AtomicBool,
    pub remarks: Mutex<Vec<String>>,
    blocks: Mutex<HashMap<String, i64>>,
}

impl MockLedger {
    pub fn remarks(&self) -> Vec<String> {
        self.remarks.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_remark(&self, remark: &str) -> Result<String> {
        tokio::task::yield_now().await;
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(AppError::ExternalUnavailable("node unreachable".into()));
        }
        self.remarks.lock().unwrap().push(remark.to_string());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("{:064x}", n);
        self.blocks
            .lock()
            .unwrap()
            .insert(tx_hash.clone(), 1000 + n as i64);
        Ok(tx_hash)
    }

    async fn inclusion_status(&self, tx_hash: &str) -> Result<InclusionStatus> {
        if self.drop_all.load(Ordering::SeqCst) {
            return Ok(InclusionStatus::Dropped("conflicting spend".into()));
        }
        match self.blocks.lock().unwrap().get(tx_hash) {
            Some(block) => Ok(InclusionStatus::Included { block: *block }),
            None => Ok(InclusionStatus::Pending),
        }
    }

    fn network(&self) -> &str {
        "regtest"
    }
}

/// Test context wiring every service against the in-memory store.
pub struct TestContext {
    pub store: MemoryReviewStore,
    pub clock: ManualClock,
    pub content: Arc<MockContentStore>,
    pub ledger: Arc<MockLedger>,
    pub system: SystemPrincipal,
    pub state: SharedState,
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("STORE_BACKEND", "memory"),
        ("SYSTEM_IDENTITY", SYSTEM_IDENTITY),
        ("LEDGER_RPC_URL", "http://ledger.test:18443"),
        ("LEDGER_NETWORK", "regtest"),
        ("LEDGER_INCLUSION_TIMEOUT_SECS", "5"),
        ("LEDGER_POLL_INTERVAL_SECS", "1"),
        ("EXTERNAL_TIMEOUT_SECS", "5"),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

impl TestContext {
    /// Content store and ledger both configured.
    pub async fn new() -> Self {
        Self::build(true, true).await
    }

    /// Neither content store nor ledger configured.
    pub async fn without_integrations() -> Self {
        Self::build(false, false).await
    }

    pub async fn build(with_content: bool, with_ledger: bool) -> Self {
        let store = MemoryReviewStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap());
        let content = Arc::new(MockContentStore::default());
        let ledger = Arc::new(MockLedger::default());

        let system_user = store
            .ensure_user(SYSTEM_IDENTITY, Role::Admin)
            .await
            .unwrap();
        let system = SystemPrincipal::new(system_user.id);

        let content_dyn: Option<Arc<dyn ContentStore>> = if with_content {
            Some(content.clone())
        } else {
            None
        };
        let ledger_dyn: Option<Arc<dyn LedgerClient>> = if with_ledger {
            Some(ledger.clone())
        } else {
            None
        };

        let state = Arc::new(AppState::new(
            test_config(),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            system,
            content_dyn,
            ledger_dyn,
        ));

        Self {
            store,
            clock,
            content,
            ledger,
            system,
            state,
        }
    }

    pub async fn user(&self, identity: &str, role: Role) -> Principal {
        let user = self.store.ensure_user(identity, role).await.unwrap();
        Principal::new(user.id, role)
    }

    pub async fn submit(&self, submitter: &Principal) -> Artifact {
        self.state
            .artifacts
            .create(sample_request("Harbor map of 1921"), submitter)
            .await
            .unwrap()
    }

    /// Cast `approvals` approve votes from fresh members.
    pub async fn approve_votes(&self, artifact_id: Uuid, approvals: usize) {
        for i in 0..approvals {
            let voter = self
                .user(&format!("0xvoter{}-{}", i, artifact_id.simple()), Role::Member)
                .await;
            self.state
                .votes
                .cast_vote(artifact_id, &voter, VoteValue::Approve)
                .await
                .unwrap();
        }
    }

    /// Close the review window with three approvals so the artifact reaches
    /// EXPERT_REVIEW.
    pub async fn to_expert_review(&self, submitter: &Principal) -> Artifact {
        let artifact = self.submit(submitter).await;
        self.approve_votes(artifact.id, 3).await;
        self.clock.advance(Duration::days(8));
        let report = self.state.sweeper.sweep().await.unwrap();
        assert_eq!(report.failed, 0);
        self.store.find_artifact(artifact.id).await.unwrap().unwrap()
    }

    pub async fn approve(&self, artifact_id: Uuid, expert: &Principal) -> DecisionOutcome {
        self.state
            .experts
            .submit_decision(artifact_id, expert, decision(ExpertDecision::Approve))
            .await
            .unwrap()
    }

    pub async fn events(&self, artifact_id: Uuid) -> Vec<AuditEvent> {
        self.store.list_events(artifact_id).await.unwrap()
    }

    pub async fn event_types(&self, artifact_id: Uuid) -> Vec<AuditEventType> {
        self.events(artifact_id)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

pub fn sample_request(title: &str) -> CreateArtifactRequest {
    CreateArtifactRequest {
        title: title.to_string(),
        description: "Hand-drawn survey of the harbor entrance".to_string(),
        artifact_type: ArtifactType::Image,
        source_url: Some("https://archive.example.org/maps/harbor".to_string()),
        language: Some("en".to_string()),
        license: Some("CC-BY-4.0".to_string()),
        tags: vec!["maps".to_string(), "harbor".to_string()],
    }
}

pub fn decision(decision: ExpertDecision) -> SubmitDecisionRequest {
    SubmitDecisionRequest {
        decision,
        notes: Some("Provenance checked against the port authority archive".to_string()),
        checklist: None,
    }
}
