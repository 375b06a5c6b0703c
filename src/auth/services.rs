use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::auth::{
    password,
    repo::{NewUser, StoreError, User, UserStore},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Hashing or verification failed, including an unreadable stored hash.
    #[error(transparent)]
    Crypto(#[from] anyhow::Error),
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2 is CPU bound, so it runs on the blocking pool.
async fn hash_off_thread(plain: &str) -> anyhow::Result<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .context("hash task panicked")?
}

async fn verify_off_thread(plain: &str, hash: Option<String>) -> anyhow::Result<bool> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_password(&plain, &hash),
        None => {
            password::verify_dummy(&plain);
            Ok(false)
        }
    })
    .await
    .context("verify task panicked")?
}

/// Hashes the password and inserts the user. Uniqueness is left to the store,
/// so a taken email comes back as `AuthError::Store(StoreError::Duplicate)`.
pub async fn create_user(
    store: &dyn UserStore,
    email: &str,
    plain: &str,
) -> Result<User, AuthError> {
    let password_hash = hash_off_thread(plain).await?;
    let user = store
        .create(NewUser {
            email: email.to_string(),
            password_hash,
        })
        .await?;
    Ok(user)
}

/// `Ok(None)` for an unknown email and for a wrong password alike.
pub async fn validate_user(
    store: &dyn UserStore,
    email: &str,
    plain: &str,
) -> Result<Option<User>, AuthError> {
    let user = store.find_by_email(email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());

    let ok = verify_off_thread(plain, stored_hash)
        .await
        .context("verify password")?;

    if !ok {
        debug!("credential check failed");
        return Ok(None);
    }
    Ok(user)
}
