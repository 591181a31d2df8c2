//! User identities and their optional profiles.
//!
//! Passwords are stored as Argon2 PHC strings only.
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tokio::task;

use crate::error::{DirectoryError, DirectoryResult, unique_violation};
use crate::models::{User, UserProfile};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, date_joined";

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(User),
    Disabled,
    /// Unknown username or wrong password. The two are not told apart.
    Rejected,
}

fn hash_blocking(password: &str) -> DirectoryResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Hash(e.to_string()))
}

fn verify_blocking(password_hash: &str, password: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hashing runs on the blocking thread pool.
pub async fn hash_password(password: &str) -> DirectoryResult<String> {
    let password = password.to_owned();

    task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| DirectoryError::Hash(e.to_string()))?
}

pub async fn verify_password(password_hash: &str, password: &str) -> bool {
    let password_hash = password_hash.to_owned();
    let password = password.to_owned();

    task::spawn_blocking(move || verify_blocking(&password_hash, &password))
        .await
        .unwrap_or(false)
}

/// Works on the pool or inside a transaction.
pub async fn create_user<'e>(
    executor: impl SqliteExecutor<'e>,
    username: &str,
    email: &str,
    password: &str,
) -> DirectoryResult<User> {
    let password_hash = hash_password(password).await?;

    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash, is_active, date_joined) \
         VALUES (?, ?, ?, 1, ?) RETURNING {USER_COLUMNS}"
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now().naive_utc())
    .fetch_one(executor)
    .await
    .map_err(|e| unique_violation(e, &format!("User {username}")))
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> DirectoryResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> DirectoryResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Account switch for administrators; disabled users cannot log in.
pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> DirectoryResult<()> {
    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> DirectoryResult<LoginOutcome> {
    let Some(user) = get_user_by_username(pool, username).await? else {
        return Ok(LoginOutcome::Rejected);
    };

    if !verify_password(&user.password_hash, password).await {
        return Ok(LoginOutcome::Rejected);
    }

    if !user.is_active {
        return Ok(LoginOutcome::Disabled);
    }

    Ok(LoginOutcome::Authenticated(user))
}

pub async fn save_profile<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: i64,
    website: Option<&str>,
    picture: Option<&str>,
) -> DirectoryResult<UserProfile> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "INSERT INTO user_profiles (user_id, website, picture) VALUES (?, ?, ?) \
         ON CONFLICT (user_id) DO UPDATE SET website = excluded.website, picture = excluded.picture \
         RETURNING user_id, website, picture",
    )
    .bind(user_id)
    .bind(website)
    .bind(picture)
    .fetch_one(executor)
    .await?;

    Ok(profile)
}

pub async fn get_profile(pool: &SqlitePool, user_id: i64) -> DirectoryResult<Option<UserProfile>> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT user_id, website, picture FROM user_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}
