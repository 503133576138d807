//! Message endpoints, the user-owned resource.
//!
//! Reads are public; every mutation runs behind the owner guard for the
//! user in the path. Message rows are additionally scoped to that user in
//! SQL, so a message id from another account is a plain 404.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use utoipa::ToSchema;

use super::auth::guard::{evaluate, guard_rejection_response, resolve_principal, Policy};
use super::auth::lookup_user;
use super::auth::types::NoticeResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageMutationResponse {
    pub notice: String,
    pub message: MessageResponse,
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> MessageResponse {
    MessageResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
    }
}

async fn fetch_messages(pool: &PgPool, user_id: i64) -> Result<Vec<MessageResponse>> {
    let query = r"
        SELECT id, user_id, content
        FROM messages
        WHERE user_id = $1
        ORDER BY id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list messages")?;
    Ok(rows.iter().map(message_from_row).collect())
}

async fn fetch_message(
    pool: &PgPool,
    user_id: i64,
    message_id: i64,
) -> Result<Option<MessageResponse>> {
    let query = r"
        SELECT id, user_id, content
        FROM messages
        WHERE user_id = $1
          AND id = $2
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch message")?;
    Ok(row.map(|row| message_from_row(&row)))
}

async fn insert_message(pool: &PgPool, user_id: i64, content: &str) -> Result<MessageResponse> {
    let query = r"
        INSERT INTO messages (user_id, content)
        VALUES ($1, $2)
        RETURNING id, user_id, content
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(content)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert message")?;
    Ok(message_from_row(&row))
}

async fn update_message_row(
    pool: &PgPool,
    user_id: i64,
    message_id: i64,
    content: &str,
) -> Result<Option<MessageResponse>> {
    let query = r"
        UPDATE messages
        SET content = $3,
            updated_at = NOW()
        WHERE user_id = $1
          AND id = $2
        RETURNING id, user_id, content
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(message_id)
        .bind(content)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update message")?;
    Ok(row.map(|row| message_from_row(&row)))
}

async fn delete_message_row(pool: &PgPool, user_id: i64, message_id: i64) -> Result<bool> {
    let query = r"
        DELETE FROM messages
        WHERE user_id = $1
          AND id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(message_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete message")?;
    Ok(result.rows_affected() > 0)
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/messages",
    params(("id" = i64, Path, description = "Owning user id")),
    responses(
        (status = 200, description = "Messages for the user", body = [MessageResponse]),
        (status = 404, description = "No such user")
    ),
    tag = "messages"
)]
pub async fn list_messages(pool: Extension<PgPool>, Path(id): Path<i64>) -> impl IntoResponse {
    match lookup_user(&pool, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match fetch_messages(&pool, id).await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => {
            error!("Failed to list messages: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/messages",
    params(("id" = i64, Path, description = "Owning user id")),
    request_body = MessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageMutationResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the owner")
    ),
    tag = "messages"
)]
pub async fn create_message(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<i64>,
    payload: Option<Json<MessageRequest>>,
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

    let content = match payload {
        Some(Json(request)) => request.content.trim().to_string(),
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if content.is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty message".to_string()).into_response();
    }

    match insert_message(&pool, id, &content).await {
        Ok(message) => {
            let response = MessageMutationResponse {
                notice: "Message created".to_string(),
                message,
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to create message: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/messages/{message_id}",
    params(
        ("id" = i64, Path, description = "Owning user id"),
        ("message_id" = i64, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "The message", body = MessageResponse),
        (status = 404, description = "No such message for this user")
    ),
    tag = "messages"
)]
pub async fn get_message(
    pool: Extension<PgPool>,
    Path((id, message_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    match fetch_message(&pool, id, message_id).await {
        Ok(Some(message)) => (StatusCode::OK, Json(message)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch message: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}/messages/{message_id}",
    params(
        ("id" = i64, Path, description = "Owning user id"),
        ("message_id" = i64, Path, description = "Message id")
    ),
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Message updated", body = MessageMutationResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such message for this user")
    ),
    tag = "messages"
)]
pub async fn update_message(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path((id, message_id)): Path<(i64, i64)>,
    payload: Option<Json<MessageRequest>>,
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

    let content = match payload {
        Some(Json(request)) => request.content.trim().to_string(),
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    if content.is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty message".to_string()).into_response();
    }

    match update_message_row(&pool, id, message_id, &content).await {
        Ok(Some(message)) => {
            let response = MessageMutationResponse {
                notice: "Message updated".to_string(),
                message,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update message: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}/messages/{message_id}",
    params(
        ("id" = i64, Path, description = "Owning user id"),
        ("message_id" = i64, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "Message deleted", body = NoticeResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such message for this user")
    ),
    tag = "messages"
)]
pub async fn delete_message(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path((id, message_id)): Path<(i64, i64)>,
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

    match delete_message_row(&pool, id, message_id).await {
        Ok(true) => {
            let response = NoticeResponse {
                notice: "Message deleted".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete message: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
