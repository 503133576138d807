//! OAuth provider callback and account linking.
//!
//! The callback reconciles an external identity against local state. The
//! lookup yields one of three named states: no link row, a link row without
//! an owner, or a link row owned by a user. Combined with whether the
//! request already carries an authenticated session, the decision is:
//!
//! - owned link: sign its owner in, regardless of the current session
//! - unowned or missing link, authenticated session: attach to that user
//! - unowned or missing link, anonymous visitor: provision a fresh user
//!
//! Attach and provision write user and link rows in a single transaction;
//! a failure rolls back and leaves no partial state behind.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::error;

use crate::APP_USER_AGENT;

use super::credentials::hash_password;
use super::error::{auth_error_response, AuthError};
use super::guard::resolve_principal;
use super::session::start_session;
use super::state::{AuthState, OAuthProviderConfig};
use super::storage::{
    attach_link_to_user, lookup_oauth_link, provision_linked_user, LinkOutcome, LinkState,
    ProvisionOutcome,
};
use super::types::{LoginResponse, OAuthCallbackQuery};
use super::utils::generate_placeholder_password;

/// What to do with a provider identity, given the link state and session.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum LinkAction {
    SignInExisting {
        user_id: i64,
    },
    AttachToCurrent {
        user_id: i64,
        existing_link: Option<i64>,
    },
    ProvisionNewUser {
        existing_link: Option<i64>,
    },
}

/// The linking policy, as a pure function over the 2x2 matrix.
pub(super) fn decide_link_action(state: &LinkState, session_user: Option<i64>) -> LinkAction {
    match (state, session_user) {
        (LinkState::LinkedWithOwner { user_id }, _) => LinkAction::SignInExisting {
            user_id: *user_id,
        },
        (LinkState::LinkedNoOwner { link_id }, Some(user_id)) => LinkAction::AttachToCurrent {
            user_id,
            existing_link: Some(*link_id),
        },
        (LinkState::NoLink, Some(user_id)) => LinkAction::AttachToCurrent {
            user_id,
            existing_link: None,
        },
        (LinkState::LinkedNoOwner { link_id }, None) => LinkAction::ProvisionNewUser {
            existing_link: Some(*link_id),
        },
        (LinkState::NoLink, None) => LinkAction::ProvisionNewUser {
            existing_link: None,
        },
    }
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Debug)]
struct IdentityResponse {
    screen_name: String,
}

fn provider_client() -> Result<Client, AuthError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|err| {
            error!("Error creating provider client: {err:?}");
            AuthError::OAuthFailure
        })
}

/// Exchange the callback code for an access token.
async fn exchange_code(provider: &OAuthProviderConfig, code: &str) -> Result<String, AuthError> {
    let client = provider_client()?;

    let mut form = HashMap::new();
    form.insert("client_id", provider.client_id());
    form.insert("client_secret", provider.client_secret().expose_secret());
    form.insert("code", code);
    form.insert("grant_type", "authorization_code");

    let response = client
        .post(provider.token_url())
        .form(&form)
        .send()
        .await
        .map_err(|err| {
            error!("Token exchange failed: {err:?}");
            AuthError::OAuthFailure
        })?;

    if !response.status().is_success() {
        error!("Token exchange rejected: {}", response.status());
        return Err(AuthError::OAuthFailure);
    }

    let token: TokenResponse = response.json().await.map_err(|err| {
        error!("Token exchange returned invalid payload: {err:?}");
        AuthError::OAuthFailure
    })?;

    if token.access_token.trim().is_empty() {
        error!("Token exchange returned an empty token");
        return Err(AuthError::OAuthFailure);
    }

    Ok(token.access_token)
}

/// Fetch the provider-scoped username for the token.
async fn fetch_identity(
    provider: &OAuthProviderConfig,
    access_token: &str,
) -> Result<String, AuthError> {
    let client = provider_client()?;

    let response = client
        .get(provider.identity_url())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| {
            error!("Identity fetch failed: {err:?}");
            AuthError::OAuthFailure
        })?;

    if !response.status().is_success() {
        error!("Identity fetch rejected: {}", response.status());
        return Err(AuthError::OAuthFailure);
    }

    let identity: IdentityResponse = response.json().await.map_err(|err| {
        error!("Identity fetch returned invalid payload: {err:?}");
        AuthError::OAuthFailure
    })?;

    let screen_name = identity.screen_name.trim().to_string();
    if screen_name.is_empty() {
        error!("Identity fetch returned an empty screen name");
        return Err(AuthError::OAuthFailure);
    }

    Ok(screen_name)
}

#[utoipa::path(
    get,
    path = "/v1/auth/oauth/callback",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "Signed in or account linked", body = LoginResponse),
        (status = 502, description = "Provider token or identity fetch failed", body = String),
        (status = 500, description = "Linking could not be persisted", body = String)
    ),
    tag = "auth"
)]
pub async fn callback(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> impl IntoResponse {
    // Resolve the session before touching the provider; linking depends on it.
    let principal = match resolve_principal(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let code = match query.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => return auth_error_response(&AuthError::OAuthFailure).into_response(),
    };

    let provider = auth_state.config().provider();

    let access_token = match exchange_code(provider, &code).await {
        Ok(token) => token,
        Err(err) => return auth_error_response(&err).into_response(),
    };

    let provider_username = match fetch_identity(provider, &access_token).await {
        Ok(username) => username,
        Err(err) => return auth_error_response(&err).into_response(),
    };

    let link_state = match lookup_oauth_link(&pool, provider.name(), &provider_username).await {
        Ok(state) => state,
        Err(err) => {
            error!("OAuth link lookup failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let action = decide_link_action(&link_state, principal.as_ref().map(|p| p.user_id));

    match action {
        LinkAction::SignInExisting { user_id } => {
            sign_in(&pool, &auth_state, user_id, provider.name()).await
        }
        LinkAction::AttachToCurrent {
            user_id,
            existing_link,
        } => {
            let outcome = attach_link_to_user(
                &pool,
                provider.name(),
                &provider_username,
                &access_token,
                user_id,
                existing_link,
            )
            .await;
            match outcome {
                Ok(LinkOutcome::Linked) => {
                    let response = LoginResponse {
                        notice: format!("Successfully linked {} account", provider.name()),
                        user_id,
                    };
                    (StatusCode::OK, Json(response)).into_response()
                }
                Ok(LinkOutcome::Conflict) => {
                    auth_error_response(&AuthError::OAuthLinkFailure).into_response()
                }
                Err(err) => {
                    error!("Failed to link account: {err}");
                    auth_error_response(&AuthError::OAuthLinkFailure).into_response()
                }
            }
        }
        LinkAction::ProvisionNewUser { existing_link } => {
            let placeholder = generate_placeholder_password()
                .and_then(|password| hash_password(&password));
            let password_hash = match placeholder {
                Ok(hash) => hash,
                Err(err) => {
                    error!("Failed to create placeholder credential: {err}");
                    return auth_error_response(&AuthError::OAuthLinkFailure).into_response();
                }
            };

            let outcome = provision_linked_user(
                &pool,
                provider.name(),
                &provider_username,
                &access_token,
                &password_hash,
                existing_link,
            )
            .await;
            match outcome {
                Ok(ProvisionOutcome::Provisioned(user_id)) => {
                    sign_in(&pool, &auth_state, user_id, provider.name()).await
                }
                Ok(ProvisionOutcome::Conflict) => {
                    auth_error_response(&AuthError::OAuthLinkFailure).into_response()
                }
                Err(err) => {
                    error!("Failed to provision linked user: {err}");
                    auth_error_response(&AuthError::OAuthLinkFailure).into_response()
                }
            }
        }
    }
}

async fn sign_in(pool: &PgPool, auth_state: &AuthState, user_id: i64, provider: &str) -> Response {
    let cookie = match start_session(pool, auth_state, user_id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to start session after OAuth callback: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sign in failed".to_string(),
            )
                .into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    let response = LoginResponse {
        notice: format!("Successfully signed in with {provider}"),
        user_id,
    };
    (StatusCode::OK, headers, Json(response)).into_response()
}
