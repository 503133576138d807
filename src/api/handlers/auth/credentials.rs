//! Credential store: argon2 password hashing and local-account verification.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use sqlx::PgPool;
use std::sync::OnceLock;

use super::storage::{self, SignupOutcome, UserRecord};

/// New local account, password still in plaintext. Hashed before it reaches
/// the store.
#[derive(Debug)]
pub(super) struct NewAccount {
    pub(super) first_name: Option<String>,
    pub(super) last_name: Option<String>,
    pub(super) username: String,
    pub(super) password: String,
}

/// Hash a password into a PHC string with a fresh random salt.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// One-way verification; the stored hash is never decryptable.
pub(super) fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}

// Verified against when the username does not exist, so unknown-user and
// wrong-password do comparable work and stay indistinguishable.
static DUMMY_HASH: OnceLock<String> = OnceLock::new();

fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| hash_password("placeholder").unwrap_or_default())
}

/// Create a local account with a hashed password.
///
/// Username conflicts surface from the store's uniqueness constraint, not a
/// pre-check, so two racing signups cannot both win.
pub(super) async fn create_local_account(
    pool: &PgPool,
    account: &NewAccount,
) -> Result<SignupOutcome> {
    let password_hash = hash_password(&account.password)?;
    storage::insert_local_user(
        pool,
        account.first_name.as_deref(),
        account.last_name.as_deref(),
        &account.username,
        &password_hash,
    )
    .await
}

/// Look up a user by username and verify the password.
///
/// Unknown username and wrong password both yield `None`.
pub(super) async fn authenticate(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<Option<UserRecord>> {
    let Some(record) = storage::lookup_credentials(pool, username).await? else {
        let _ = verify_password(dummy_hash(), password);
        return Ok(None);
    };

    if verify_password(&record.password_hash, password) {
        Ok(Some(record.user))
    } else {
        Ok(None)
    }
}

/// Re-hash and replace; the old hash is discarded.
pub(crate) async fn update_password(
    pool: &PgPool,
    user_id: i64,
    new_password: &str,
) -> Result<()> {
    let password_hash = hash_password(new_password)?;
    storage::update_password_hash(pool, user_id, &password_hash).await
}
