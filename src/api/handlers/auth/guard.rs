//! Guard policies evaluated before protected handlers.
//!
//! Handlers resolve the current user once per request and hand the result to
//! the guard chain explicitly; there is no ambient request state. The
//! policies themselves are pure predicates and never touch the store.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;

use super::error::{auth_error_response, AuthError};
use super::session::authenticate_session;

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Principal {
    pub(crate) user_id: i64,
    pub(crate) username: Option<String>,
}

/// Typed guard rejections; each maps to a distinct response.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum GuardRejection {
    Unauthenticated,
    Unauthorized,
}

/// Per-route policies, evaluated in order.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Policy {
    Authenticated,
    Owner(i64),
}

/// Resolve the session into a principal, once per request.
///
/// An absent or stale session is `Ok(None)`; only store unavailability is an
/// error.
pub(crate) async fn resolve_principal(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<Principal>, StatusCode> {
    match authenticate_session(headers, pool).await {
        Ok(Some(record)) => Ok(Some(Principal {
            user_id: record.user_id,
            username: record.username,
        })),
        Ok(None) => Ok(None),
        Err(status) => Err(status),
    }
}

pub(crate) fn require_authenticated(
    principal: Option<&Principal>,
) -> Result<&Principal, GuardRejection> {
    principal.ok_or(GuardRejection::Unauthenticated)
}

pub(crate) fn require_owner(principal: &Principal, owner_id: i64) -> Result<(), GuardRejection> {
    if principal.user_id == owner_id {
        Ok(())
    } else {
        Err(GuardRejection::Unauthorized)
    }
}

/// Evaluate policies in order; the first failure short-circuits.
///
/// Ownership is never compared against an absent identity: an `Owner` policy
/// with no principal rejects as `Unauthenticated`.
pub(crate) fn evaluate(
    policies: &[Policy],
    principal: Option<&Principal>,
) -> Result<(), GuardRejection> {
    for policy in policies {
        match policy {
            Policy::Authenticated => {
                require_authenticated(principal)?;
            }
            Policy::Owner(owner_id) => {
                let principal = require_authenticated(principal)?;
                require_owner(principal, *owner_id)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn guard_rejection_response(rejection: &GuardRejection) -> (StatusCode, String) {
    match rejection {
        GuardRejection::Unauthenticated => auth_error_response(&AuthError::Unauthenticated),
        GuardRejection::Unauthorized => auth_error_response(&AuthError::Unauthorized),
    }
}
