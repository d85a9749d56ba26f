//! Per-artifact in-flight markers for publication steps.
//!
//! The markers live in process memory. They keep one replica from running
//! the same external call twice, but two replicas can still both pin or
//! broadcast for the same artifact. Only one of them records the result:
//! the re-check under the row lock turns the other into `PreconditionFailed`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Set of artifacts with a publication step currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    label: &'static str,
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ids: Arc::default(),
        }
    }

    /// Mark `id` as in flight until the returned guard is dropped.
    pub fn acquire(&self, id: Uuid) -> Result<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id) {
            return Err(AppError::Conflict(format!(
                "{} already in progress for artifact {}",
                self.label, id
            )));
        }
        Ok(InFlightGuard {
            id,
            ids: self.ids.clone(),
        })
    }
}

pub struct InFlightGuard {
    id: Uuid,
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}
