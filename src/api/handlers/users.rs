//! User resource endpoints.
//!
//! Flow Overview:
//! 1) Resolve the current user from the session token.
//! 2) Evaluate the guard chain for the route.
//! 3) Apply the change and answer with a notice.

use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::{
    auth_error_response, credentials,
    guard::{evaluate, guard_rejection_response, resolve_principal, Policy},
    normalize_username, session, valid_password, valid_username, AuthError, AuthState,
    UpdateOutcome, UserRecord,
};
use super::auth::{
    delete_user as delete_user_row, list_users as list_user_rows, lookup_user, update_profile,
};
use super::auth::types::NoticeResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            username: record.username,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserUpdateResponse {
    pub notice: String,
    pub user: UserResponse,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse])
    ),
    tag = "users"
)]
pub async fn list_users(pool: Extension<PgPool>) -> impl IntoResponse {
    match list_user_rows(&pool).await {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(users)).into_response()
        }
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
pub async fn get_user(pool: Extension<PgPool>, Path(id): Path<i64>) -> impl IntoResponse {
    match lookup_user(&pool, id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserUpdateResponse),
        (status = 400, description = "Invalid update payload"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the account owner"),
        (status = 409, description = "Username already taken")
    ),
    tag = "users"
)]
pub async fn update_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<i64>,
    payload: Option<Json<UserUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match resolve_principal(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    if let Err(rejection) = evaluate(
        &[Policy::Authenticated, Policy::Owner(id)],
        principal.as_ref(),
    ) {
        return guard_rejection_response(&rejection).into_response();
    }

    let request: UserUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.as_deref().map(normalize_username);
    if let Some(username) = username.as_deref() {
        if !valid_username(username) {
            return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
        }
    }
    if let Some(password) = request.password.as_deref() {
        if !valid_password(password) {
            return (
                StatusCode::BAD_REQUEST,
                "Password must be between 8 and 128 characters".to_string(),
            )
                .into_response();
        }
    }

    let outcome = update_profile(
        &pool,
        id,
        request.first_name.as_deref(),
        request.last_name.as_deref(),
        username.as_deref(),
    )
    .await;

    let user = match outcome {
        Ok(UpdateOutcome::Updated(user)) => user,
        Ok(UpdateOutcome::Conflict) => {
            return auth_error_response(&AuthError::DuplicateUsername).into_response();
        }
        Ok(UpdateOutcome::NotFound) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update profile: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(password) = request.password.as_deref() {
        if let Err(err) = credentials::update_password(&pool, id, password).await {
            error!("Failed to update password: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let response = UserUpdateResponse {
        notice: "User updated".to_string(),
        user: UserResponse::from(user),
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted; owned resources cascade"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the account owner")
    ),
    tag = "users"
)]
pub async fn delete_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let principal = match resolve_principal(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    if let Err(rejection) = evaluate(
        &[Policy::Authenticated, Policy::Owner(id)],
        principal.as_ref(),
    ) {
        return guard_rejection_response(&rejection).into_response();
    }

    if let Err(err) = delete_user_row(&pool, id).await {
        error!("Failed to delete user: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // The user deleted their own account; drop the now-dead cookie too.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = session::clear_session_cookie(&auth_state) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    let response = NoticeResponse {
        notice: "User deleted".to_string(),
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}
