//! Caller identity middleware.
//!
//! Authentication happens upstream in the identity gateway, which forwards
//! the caller as two headers:
//! - `X-User-Id: <public identity>` - the caller's wallet address
//! - `X-User-Role: MEMBER | EXPERT | ADMIN` - defaults to MEMBER
//!
//! The identity is resolved to a user row (created on first sight) and the
//! result is attached to the request as `Option<AuthExtension>`. Requests
//! without `X-User-Id` pass through anonymously; malformed headers are
//! rejected with 401.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::user::{Principal, Role};

pub static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub static X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

const MAX_IDENTITY_LEN: usize = 128;

/// Extension that holds the resolved caller
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: Uuid,
    pub identity: String,
    pub role: Role,
}

impl AuthExtension {
    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id, self.role)
    }
}

/// Identity and role claimed by the gateway headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedIdentity {
    pub identity: String,
    pub role: Role,
}

/// Read the gateway headers. `Ok(None)` when the request is anonymous.
pub fn parse_identity_headers(headers: &HeaderMap) -> Result<Option<ClaimedIdentity>> {
    let identity = match headers.get(&X_USER_ID) {
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::Authentication("Invalid X-User-Id header".to_string()))?
            .trim()
            .to_string(),
        None => return Ok(None),
    };
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(AppError::Authentication(
            "Invalid X-User-Id header".to_string(),
        ));
    }

    let role = match headers.get(&X_USER_ROLE) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.parse::<Role>().ok())
            .ok_or_else(|| AppError::Authentication("Invalid X-User-Role header".to_string()))?,
        None => Role::Member,
    };

    Ok(Some(ClaimedIdentity { identity, role }))
}

/// Resolve the caller, if any, and attach it to the request.
pub async fn identity_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_ext = match parse_identity_headers(request.headers()) {
        Ok(Some(claimed)) if claimed.identity == state.config.system_identity => {
            return AppError::Authentication("Reserved identity".to_string()).into_response();
        }
        Ok(Some(claimed)) => match state.store.ensure_user(&claimed.identity, claimed.role).await {
            Ok(user) => Some(AuthExtension {
                user_id: user.id,
                identity: user.identity,
                // The gateway is authoritative for the role.
                role: claimed.role,
            }),
            Err(e) => return e.into_response(),
        },
        Ok(None) => None,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(auth_ext);
    next.run(request).await
}

/// Unwrap the optional caller for endpoints that need one.
pub fn require_auth(auth: Option<AuthExtension>) -> Result<AuthExtension> {
    auth.ok_or_else(|| AppError::Authentication("Missing X-User-Id header".to_string()))
}
