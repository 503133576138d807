//! Local account signup.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::{create_local_account, NewAccount};
use super::error::{auth_error_response, AuthError};
use super::session::start_session;
use super::state::AuthState;
use super::storage::SignupOutcome;
use super::types::{LoginResponse, SignupRequest};
use super::utils::{normalize_username, valid_password, valid_username};

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = LoginResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Username already taken", body = String)
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = normalize_username(&request.username);
    if !valid_username(&username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }
    if !valid_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 8 and 128 characters".to_string(),
        )
            .into_response();
    }

    let account = NewAccount {
        first_name: request.first_name,
        last_name: request.last_name,
        username,
        password: request.password,
    };

    let user = match create_local_account(&pool, &account).await {
        Ok(SignupOutcome::Created(user)) => user,
        Ok(SignupOutcome::Conflict) => {
            return auth_error_response(&AuthError::DuplicateUsername).into_response();
        }
        Err(err) => {
            error!("Signup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    // Log the user in right after registration.
    let cookie = match start_session(&pool, &auth_state, user.id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to start session after signup: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    let response = LoginResponse {
        notice: "User created".to_string(),
        user_id: user.id,
    };
    (StatusCode::CREATED, headers, Json(response)).into_response()
}
