//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::models::user::SystemPrincipal;
use crate::services::anchor_service::{AnchorService, AnchorTimeouts};
use crate::services::artifact_service::ArtifactService;
use crate::services::comment_service::CommentService;
use crate::services::content_store::ContentStore;
use crate::services::expert_review_service::ExpertReviewService;
use crate::services::flag_service::FlagService;
use crate::services::ledger_client::LedgerClient;
use crate::services::lifecycle_service::LifecycleService;
use crate::services::pinning_service::PinningService;
use crate::services::review_sweeper::ReviewSweeper;
use crate::services::stats_service::StatsService;
use crate::services::vote_service::VoteService;
use crate::store::ReviewStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ReviewStore>,
    pub system: SystemPrincipal,
    pub artifacts: Arc<ArtifactService>,
    pub lifecycle: Arc<LifecycleService>,
    pub votes: Arc<VoteService>,
    pub flags: Arc<FlagService>,
    pub comments: Arc<CommentService>,
    pub experts: Arc<ExpertReviewService>,
    pub pinning: Arc<PinningService>,
    pub anchoring: Arc<AnchorService>,
    pub sweeper: Arc<ReviewSweeper>,
    pub stats: Arc<StatsService>,
}

impl AppState {
    /// Wire every service against one store and clock. `content` and
    /// `ledger` are absent when the corresponding integration is not
    /// configured.
    pub fn new(
        config: Config,
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
        system: SystemPrincipal,
        content: Option<Arc<dyn ContentStore>>,
        ledger: Option<Arc<dyn LedgerClient>>,
    ) -> Self {
        let policy = config.review;
        let external_timeout = config.external_timeout();
        let timeouts = AnchorTimeouts {
            submit: external_timeout,
            inclusion: config
                .ledger
                .as_ref()
                .map(|l| l.inclusion_timeout())
                .unwrap_or(external_timeout),
            poll_interval: config
                .ledger
                .as_ref()
                .map(|l| l.poll_interval())
                .unwrap_or_else(|| std::time::Duration::from_secs(5)),
        };

        let pinning = Arc::new(PinningService::new(
            store.clone(),
            clock.clone(),
            content,
            external_timeout,
        ));
        let anchoring = Arc::new(AnchorService::new(
            store.clone(),
            clock.clone(),
            ledger,
            timeouts,
        ));

        Self {
            artifacts: Arc::new(ArtifactService::new(store.clone(), clock.clone(), policy)),
            lifecycle: Arc::new(LifecycleService::new(store.clone(), clock.clone())),
            votes: Arc::new(VoteService::new(store.clone(), clock.clone())),
            flags: Arc::new(FlagService::new(store.clone(), clock.clone(), policy)),
            comments: Arc::new(CommentService::new(store.clone(), clock.clone())),
            experts: Arc::new(ExpertReviewService::new(
                store.clone(),
                clock.clone(),
                pinning.clone(),
                anchoring.clone(),
            )),
            sweeper: Arc::new(ReviewSweeper::new(store.clone(), clock, policy, system)),
            stats: Arc::new(StatsService::new(store.clone())),
            pinning,
            anchoring,
            system,
            store,
            config,
        }
    }
}

pub type SharedState = Arc<AppState>;
