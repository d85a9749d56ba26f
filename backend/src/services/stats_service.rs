//! Admin dashboard statistics.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::audit_log::AuditEvent;
use crate::models::user::Principal;
use crate::services::audit_service::AuditService;
use crate::store::{PipelineStats, ReviewStore};

pub struct StatsService {
    store: Arc<dyn ReviewStore>,
    audit: AuditService,
}

fn require_admin(caller: &Principal) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

impl StatsService {
    pub fn new(store: Arc<dyn ReviewStore>) -> Self {
        Self {
            audit: AuditService::new(store.clone()),
            store,
        }
    }

    pub async fn stats(&self, caller: &Principal) -> Result<PipelineStats> {
        require_admin(caller)?;
        self.store.stats().await
    }

    /// Latest audit events across every artifact.
    pub async fn recent_events(&self, caller: &Principal, limit: i64) -> Result<Vec<AuditEvent>> {
        require_admin(caller)?;
        self.audit.recent(limit).await
    }
}
