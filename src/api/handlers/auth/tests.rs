//! Auth module tests.
//!
//! Database-backed tests connect to `ACCESSO_TEST_DSN` and skip themselves
//! when it is not exported.

use super::credentials::{authenticate, create_local_account, update_password, NewAccount};
use super::oauth::{decide_link_action, LinkAction};
use super::storage::{
    attach_link_to_user, delete_session, delete_user, insert_session, lookup_oauth_link,
    lookup_session, provision_linked_user, LinkOutcome, LinkState, ProvisionOutcome,
    SignupOutcome,
};
use super::utils::{generate_session_token, hash_session_token};
use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

struct TestDb {
    pool: PgPool,
}

impl TestDb {
    async fn new() -> Result<Self> {
        let Ok(dsn) = std::env::var("ACCESSO_TEST_DSN") else {
            eprintln!("Skipping integration test: ACCESSO_TEST_DSN not set");
            return Err(anyhow!("ACCESSO_TEST_DSN not set"));
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&dsn)
            .await
            .context("failed to connect test pool")?;
        apply_schema(&pool).await?;

        Ok(Self { pool })
    }
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Tests share one database, so every name gets a random suffix.
fn unique(name: &str) -> Result<String> {
    let token = generate_session_token()?;
    let suffix = token.get(..8).unwrap_or("fallback");
    Ok(format!("{name}-{suffix}"))
}

fn new_account(username: &str) -> NewAccount {
    NewAccount {
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        username: username.to_string(),
        password: "CorrectHorseBatteryStaple".to_string(),
    }
}

async fn count_users_with_username(pool: &PgPool, username: &str) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(pool)
        .await
        .context("failed to count users")?;
    Ok(row.get("count"))
}

async fn count_links(pool: &PgPool, provider: &str, provider_username: &str) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM oauth_links WHERE provider = $1 AND provider_username = $2",
    )
    .bind(provider)
    .bind(provider_username)
    .fetch_one(pool)
    .await
    .context("failed to count links")?;
    Ok(row.get("count"))
}

async fn count_all_users(pool: &PgPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
        .fetch_one(pool)
        .await
        .context("failed to count all users")?;
    Ok(row.get("count"))
}

fn created_user(outcome: SignupOutcome) -> Result<super::storage::UserRecord> {
    match outcome {
        SignupOutcome::Created(user) => Ok(user),
        SignupOutcome::Conflict => Err(anyhow!("unexpected conflict")),
    }
}

#[tokio::test]
async fn signup_then_authenticate_round_trip() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("alice")?;
    let account = new_account(&username);
    let user = created_user(create_local_account(&db.pool, &account).await?)?;
    assert_eq!(user.username.as_deref(), Some(username.as_str()));

    let authenticated = authenticate(&db.pool, &username, "CorrectHorseBatteryStaple").await?;
    let authenticated = authenticated.context("expected authentication to succeed")?;
    assert_eq!(authenticated.id, user.id);
    assert_eq!(authenticated.username.as_deref(), Some(username.as_str()));

    Ok(())
}

#[tokio::test]
async fn wrong_password_indistinguishable_from_unknown_user() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("bob")?;
    let account = new_account(&username);
    let _ = created_user(create_local_account(&db.pool, &account).await?)?;

    let wrong_password = authenticate(&db.pool, &username, "not-the-password").await?;
    let unknown_user = authenticate(&db.pool, "no-such-user", "not-the-password").await?;

    assert!(wrong_password.is_none());
    assert!(unknown_user.is_none());
    assert_eq!(wrong_password, unknown_user);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_leaves_single_row() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("carla")?;
    let account = new_account(&username);

    let task_one = create_local_account(&db.pool, &account);
    let task_two = create_local_account(&db.pool, &account);
    let (result_one, result_two) = tokio::join!(task_one, task_two);
    let outcomes = [result_one?, result_two?];

    let successes = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SignupOutcome::Created(_)))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SignupOutcome::Conflict))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(count_users_with_username(&db.pool, &username).await?, 1);

    Ok(())
}

#[tokio::test]
async fn update_password_invalidates_old_one() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("dora")?;
    let account = new_account(&username);
    let user = created_user(create_local_account(&db.pool, &account).await?)?;

    update_password(&db.pool, user.id, "AnotherGoodPassword").await?;

    let old = authenticate(&db.pool, &username, "CorrectHorseBatteryStaple").await?;
    let new = authenticate(&db.pool, &username, "AnotherGoodPassword").await?;
    assert!(old.is_none());
    assert!(new.is_some());

    Ok(())
}

#[tokio::test]
async fn ending_a_session_twice_is_a_noop() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("erin")?;
    let account = new_account(&username);
    let user = created_user(create_local_account(&db.pool, &account).await?)?;

    let token = insert_session(&db.pool, user.id, 60).await?;
    let token_hash = hash_session_token(&token);

    let resolved = lookup_session(&db.pool, &token_hash).await?;
    assert!(resolved.is_some());

    delete_session(&db.pool, &token_hash).await?;
    delete_session(&db.pool, &token_hash).await?;

    assert!(lookup_session(&db.pool, &token_hash).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn stale_session_resolves_to_anonymous() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("frank")?;
    let account = new_account(&username);
    let user = created_user(create_local_account(&db.pool, &account).await?)?;

    let token = insert_session(&db.pool, user.id, 60).await?;
    let token_hash = hash_session_token(&token);

    // Deleting the user cascades the session row; the claim must resolve to
    // anonymous, not error.
    delete_user(&db.pool, user.id).await?;
    assert!(lookup_session(&db.pool, &token_hash).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn expired_session_resolves_to_anonymous() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("gail")?;
    let account = new_account(&username);
    let user = created_user(create_local_account(&db.pool, &account).await?)?;

    let token = insert_session(&db.pool, user.id, -1).await?;
    let token_hash = hash_session_token(&token);
    assert!(lookup_session(&db.pool, &token_hash).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn oauth_anonymous_visitor_provisions_user_and_link() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let provider_username = unique("alice_tw")?;

    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    assert_eq!(state, LinkState::NoLink);

    let action = decide_link_action(&state, None);
    let existing_link = match action {
        LinkAction::ProvisionNewUser { existing_link } => existing_link,
        other => return Err(anyhow!("unexpected action: {other:?}")),
    };

    let outcome = provision_linked_user(
        &db.pool,
        "twitter",
        &provider_username,
        "provider-token",
        "$argon2-placeholder",
        existing_link,
    )
    .await?;
    let user_id = match outcome {
        ProvisionOutcome::Provisioned(user_id) => user_id,
        ProvisionOutcome::Conflict => return Err(anyhow!("unexpected conflict")),
    };

    // Exactly one user and one link; the visitor can be logged in as them.
    assert_eq!(count_links(&db.pool, "twitter", &provider_username).await?, 1);
    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    assert_eq!(state, LinkState::LinkedWithOwner { user_id });

    let token = insert_session(&db.pool, user_id, 60).await?;
    let record = lookup_session(&db.pool, &hash_session_token(&token)).await?;
    let record = record.context("expected session for provisioned user")?;
    assert_eq!(record.user_id, user_id);
    // Provisioned accounts have no local username.
    assert_eq!(record.username, None);

    Ok(())
}

#[tokio::test]
async fn oauth_logged_in_user_links_without_new_account() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("bob")?;
    let account = new_account(&username);
    let bob = created_user(create_local_account(&db.pool, &account).await?)?;

    let provider_username = unique("bob_tw")?;
    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    let action = decide_link_action(&state, Some(bob.id));
    let existing_link = match action {
        LinkAction::AttachToCurrent {
            user_id,
            existing_link,
        } => {
            assert_eq!(user_id, bob.id);
            existing_link
        }
        other => return Err(anyhow!("unexpected action: {other:?}")),
    };

    let users_before = count_all_users(&db.pool).await?;
    let outcome = attach_link_to_user(
        &db.pool,
        "twitter",
        &provider_username,
        "provider-token",
        bob.id,
        existing_link,
    )
    .await?;
    assert!(matches!(outcome, LinkOutcome::Linked));

    // No new user; bob owns the new link.
    assert_eq!(count_all_users(&db.pool).await?, users_before);
    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    assert_eq!(state, LinkState::LinkedWithOwner { user_id: bob.id });

    Ok(())
}

#[tokio::test]
async fn oauth_existing_link_signs_owner_in() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let username = unique("carol")?;
    let account = new_account(&username);
    let carol = created_user(create_local_account(&db.pool, &account).await?)?;

    let provider_username = unique("carol_tw")?;
    let outcome = attach_link_to_user(
        &db.pool,
        "twitter",
        &provider_username,
        "provider-token",
        carol.id,
        None,
    )
    .await?;
    assert!(matches!(outcome, LinkOutcome::Linked));

    let users_before = count_all_users(&db.pool).await?;
    let links_before = count_links(&db.pool, "twitter", &provider_username).await?;

    // A later anonymous callback for the same identity just signs carol in.
    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    assert_eq!(state, LinkState::LinkedWithOwner { user_id: carol.id });
    let action = decide_link_action(&state, None);
    assert_eq!(action, LinkAction::SignInExisting { user_id: carol.id });

    assert_eq!(count_all_users(&db.pool).await?, users_before);
    assert_eq!(
        count_links(&db.pool, "twitter", &provider_username).await?,
        links_before
    );

    Ok(())
}

#[tokio::test]
async fn oauth_unowned_link_row_is_adopted_not_duplicated() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let provider_username = unique("dana_tw")?;

    // An ownerless row should not normally occur but must be handled.
    sqlx::query(
        "INSERT INTO oauth_links (provider, provider_username, token) VALUES ($1, $2, $3)",
    )
    .bind("twitter")
    .bind(&provider_username)
    .bind("stale-token")
    .execute(&db.pool)
    .await
    .context("failed to seed ownerless link")?;

    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    let link_id = match state {
        LinkState::LinkedNoOwner { link_id } => link_id,
        other => return Err(anyhow!("unexpected state: {other:?}")),
    };

    let action = decide_link_action(&state, None);
    assert_eq!(
        action,
        LinkAction::ProvisionNewUser {
            existing_link: Some(link_id)
        }
    );

    let outcome = provision_linked_user(
        &db.pool,
        "twitter",
        &provider_username,
        "fresh-token",
        "$argon2-placeholder",
        Some(link_id),
    )
    .await?;
    let user_id = match outcome {
        ProvisionOutcome::Provisioned(user_id) => user_id,
        ProvisionOutcome::Conflict => return Err(anyhow!("unexpected conflict")),
    };

    // The existing row was adopted; no duplicate identity row exists.
    assert_eq!(count_links(&db.pool, "twitter", &provider_username).await?, 1);
    let state = lookup_oauth_link(&db.pool, "twitter", &provider_username).await?;
    assert_eq!(state, LinkState::LinkedWithOwner { user_id });

    Ok(())
}
