//! Local login.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::credentials::authenticate;
use super::error::{auth_error_response, AuthError};
use super::session::start_session;
use super::state::AuthState;
use super::types::{LoginRequest, LoginResponse};
use super::utils::normalize_username;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = normalize_username(&request.username);

    // Unknown username and wrong password take the same path out.
    let user = match authenticate(&pool, &username, &request.password).await {
        Ok(Some(user)) => user,
        Ok(None) => return auth_error_response(&AuthError::InvalidCredentials).into_response(),
        Err(err) => {
            error!("Login failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let cookie = match start_session(&pool, &auth_state, user.id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to start session after login: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    let response = LoginResponse {
        notice: "You are now logged in".to_string(),
        user_id: user.id,
    };
    (StatusCode::OK, headers, Json(response)).into_response()
}
