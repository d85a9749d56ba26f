//! Health check endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckStatus,
    pub content_store: CheckStatus,
    pub ledger: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            message: None,
        }
    }

    fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            message: None,
        }
    }
}

async fn store_check(state: &SharedState) -> CheckStatus {
    match state.store.find_user(state.system.user_id()).await {
        Ok(_) => CheckStatus::healthy(),
        Err(e) => CheckStatus {
            status: "unhealthy".to_string(),
            message: Some(format!("Store unreachable: {}", e)),
        },
    }
}

/// Health check endpoint - basic liveness check
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let store = store_check(&state).await;
    let configured = |on: bool| {
        if on {
            CheckStatus {
                status: "configured".to_string(),
                message: None,
            }
        } else {
            CheckStatus::disabled()
        }
    };

    let healthy = store.status == "healthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            store,
            content_store: configured(state.pinning.is_configured()),
            ledger: configured(state.anchoring.is_configured()),
        },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response))
}

/// Readiness check endpoint - is the service ready to accept traffic?
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    if store_check(&state).await.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
