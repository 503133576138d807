//! Database helpers for accounts, sessions and OAuth links.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Public shape of a user row; the password hash never leaves this module
/// except inside [`CredentialRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UserRecord {
    pub(crate) id: i64,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) username: Option<String>,
}

/// Row needed to verify a local login attempt.
pub(super) struct CredentialRecord {
    pub(super) user: UserRecord,
    pub(super) password_hash: String,
}

/// Minimal data returned for a valid session token.
pub(crate) struct SessionRecord {
    pub(crate) user_id: i64,
    pub(crate) username: Option<String>,
}

/// Outcome when attempting to create a local user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(UserRecord),
    Conflict,
}

/// Outcome of a profile update.
#[derive(Debug)]
pub(crate) enum UpdateOutcome {
    Updated(UserRecord),
    Conflict,
    NotFound,
}

/// Link row state for one external identity.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum LinkState {
    NoLink,
    LinkedNoOwner { link_id: i64 },
    LinkedWithOwner { user_id: i64 },
}

/// Outcome of attaching a link to a user.
#[derive(Debug)]
pub(super) enum LinkOutcome {
    Linked,
    Conflict,
}

/// Outcome of provisioning a user from an OAuth identity.
#[derive(Debug)]
pub(super) enum ProvisionOutcome {
    Provisioned(i64),
    Conflict,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        username: row.get("username"),
    }
}

pub(super) async fn insert_local_user(
    pool: &PgPool,
    first_name: Option<&str>,
    last_name: Option<&str>,
    username: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users
            (first_name, last_name, username, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, first_name, last_name, username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn lookup_credentials(
    pool: &PgPool,
    username: &str,
) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT id, first_name, last_name, username, password_hash
        FROM users
        WHERE username = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        password_hash: row.get("password_hash"),
        user: user_from_row(&row),
    }))
}

pub(crate) async fn lookup_user(pool: &PgPool, id: i64) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, first_name, last_name, username
        FROM users
        WHERE id = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| user_from_row(&row)))
}

pub(crate) async fn list_users(pool: &PgPool) -> Result<Vec<UserRecord>> {
    let query = r"
        SELECT id, first_name, last_name, username
        FROM users
        ORDER BY id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    Ok(rows.iter().map(user_from_row).collect())
}

/// Patch semantics: absent fields keep their current values.
pub(crate) async fn update_profile(
    pool: &PgPool,
    id: i64,
    first_name: Option<&str>,
    last_name: Option<&str>,
    username: Option<&str>,
) -> Result<UpdateOutcome> {
    let query = r"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            username = COALESCE($4, username),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, first_name, last_name, username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(UpdateOutcome::Updated(user_from_row(&row))),
        Ok(None) => Ok(UpdateOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

pub(super) async fn update_password_hash(
    pool: &PgPool,
    user_id: i64,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

/// Sessions, links and messages go with the user via ON DELETE CASCADE.
pub(crate) async fn delete_user(pool: &PgPool, id: i64) -> Result<()> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user")?;
    Ok(())
}

pub(crate) async fn insert_session(
    pool: &PgPool,
    user_id: i64,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only unexpired sessions whose user still exists resolve to an identity.
    let query = r"
        SELECT users.id, users.username
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    if row.is_none() {
        return Ok(None);
    }

    // Record activity for audit/visibility without extending the session TTL.
    let query = r"
        UPDATE user_sessions
        SET last_seen_at = NOW()
        WHERE session_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update session last_seen_at")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        username: row.get("username"),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

pub(super) async fn lookup_oauth_link(
    pool: &PgPool,
    provider: &str,
    provider_username: &str,
) -> Result<LinkState> {
    let query = r"
        SELECT id, user_id
        FROM oauth_links
        WHERE provider = $1
          AND provider_username = $2
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(provider)
        .bind(provider_username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup oauth link")?;

    let Some(row) = row else {
        return Ok(LinkState::NoLink);
    };

    let user_id: Option<i64> = row.get("user_id");
    Ok(match user_id {
        Some(user_id) => LinkState::LinkedWithOwner { user_id },
        None => LinkState::LinkedNoOwner {
            link_id: row.get("id"),
        },
    })
}

async fn write_link(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider: &str,
    provider_username: &str,
    token: &str,
    user_id: i64,
    existing_link: Option<i64>,
) -> Result<LinkOutcome> {
    // An ownerless row left behind by an earlier flow is adopted instead of
    // inserting a second row for the same identity.
    if let Some(link_id) = existing_link {
        let query = r"
            UPDATE oauth_links
            SET user_id = $1,
                token = $2
            WHERE id = $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(token)
            .bind(link_id)
            .execute(&mut **tx)
            .instrument(span)
            .await
            .context("failed to adopt oauth link")?;
        return Ok(LinkOutcome::Linked);
    }

    let query = r"
        INSERT INTO oauth_links (provider, provider_username, token, user_id)
        VALUES ($1, $2, $3, $4)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(provider)
        .bind(provider_username)
        .bind(token)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(LinkOutcome::Linked),
        // A racing callback for the same identity got there first.
        Err(err) if is_unique_violation(&err) => Ok(LinkOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert oauth link"),
    }
}

/// Attach an external identity to an existing user, atomically.
pub(super) async fn attach_link_to_user(
    pool: &PgPool,
    provider: &str,
    provider_username: &str,
    token: &str,
    user_id: i64,
    existing_link: Option<i64>,
) -> Result<LinkOutcome> {
    let mut tx = pool.begin().await.context("begin link transaction")?;

    let outcome = write_link(
        &mut tx,
        provider,
        provider_username,
        token,
        user_id,
        existing_link,
    )
    .await?;

    match outcome {
        LinkOutcome::Linked => {
            tx.commit().await.context("commit link transaction")?;
            Ok(LinkOutcome::Linked)
        }
        LinkOutcome::Conflict => {
            let _ = tx.rollback().await;
            Ok(LinkOutcome::Conflict)
        }
    }
}

/// Create a user for a first-ever OAuth login and attach the link, in one
/// transaction: either both rows land or neither does.
pub(super) async fn provision_linked_user(
    pool: &PgPool,
    provider: &str,
    provider_username: &str,
    token: &str,
    password_hash: &str,
    existing_link: Option<i64>,
) -> Result<ProvisionOutcome> {
    let mut tx = pool.begin().await.context("begin provision transaction")?;

    // The provider username doubles as the display name. No local username is
    // assigned, so the password path cannot reach this account.
    let query = r"
        INSERT INTO users (first_name, password_hash)
        VALUES ($1, $2)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(provider_username)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert provisioned user")?;

    let user_id: i64 = row.get("id");

    let outcome = write_link(
        &mut tx,
        provider,
        provider_username,
        token,
        user_id,
        existing_link,
    )
    .await?;

    match outcome {
        LinkOutcome::Linked => {
            tx.commit().await.context("commit provision transaction")?;
            Ok(ProvisionOutcome::Provisioned(user_id))
        }
        LinkOutcome::Conflict => {
            // Roll the freshly inserted user back out; no orphan remains.
            let _ = tx.rollback().await;
            Ok(ProvisionOutcome::Conflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkState, ProvisionOutcome, SignupOutcome, UserRecord};

    #[test]
    fn signup_outcome_debug_names() {
        let user = UserRecord {
            id: 1,
            first_name: None,
            last_name: None,
            username: Some("alice".to_string()),
        };
        assert!(format!("{:?}", SignupOutcome::Created(user)).starts_with("Created"));
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn link_state_variants_distinct() {
        assert_ne!(LinkState::NoLink, LinkState::LinkedNoOwner { link_id: 1 });
        assert_ne!(
            LinkState::LinkedNoOwner { link_id: 1 },
            LinkState::LinkedWithOwner { user_id: 1 }
        );
    }

    #[test]
    fn provision_outcome_carries_user_id() {
        match ProvisionOutcome::Provisioned(42) {
            ProvisionOutcome::Provisioned(id) => assert_eq!(id, 42),
            ProvisionOutcome::Conflict => panic!("unexpected conflict"),
        }
    }
}
