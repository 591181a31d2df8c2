//! Browser sessions.
//!
//! A row only exists once there is something to remember: a counted visit
//! or a login. Every write pushes `expires_at` forward by [`SESSION_AGE_DAYS`];
//! expired rows are invisible to [`get_session`] and removed by
//! [`prune_expired`].
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::error::DirectoryResult;
use crate::models::SessionRecord;

pub const SESSION_AGE_DAYS: i64 = 14;

const SESSION_COLUMNS: &str = "token, user_id, visits, last_visit";

fn expiry(now: NaiveDateTime) -> NaiveDateTime {
    now + Duration::days(SESSION_AGE_DAYS)
}

async fn insert_session<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: Option<i64>,
    visits: i64,
    last_visit: Option<NaiveDateTime>,
) -> DirectoryResult<SessionRecord> {
    let token = Uuid::new_v4().simple().to_string();
    let now = Utc::now().naive_utc();

    let session = sqlx::query_as::<_, SessionRecord>(&format!(
        "INSERT INTO sessions (token, user_id, visits, last_visit, created_at, expires_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {SESSION_COLUMNS}"
    ))
    .bind(token)
    .bind(user_id)
    .bind(visits)
    .bind(last_visit)
    .bind(now)
    .bind(expiry(now))
    .fetch_one(executor)
    .await?;

    Ok(session)
}

/// Stores a new anonymous session holding the given visit counter.
pub async fn create_session(
    pool: &SqlitePool,
    visits: i64,
    last_visit: Option<NaiveDateTime>,
) -> DirectoryResult<SessionRecord> {
    insert_session(pool, None, visits, last_visit).await
}

pub async fn get_session(pool: &SqlitePool, token: &str) -> DirectoryResult<Option<SessionRecord>> {
    let session = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ? AND expires_at > ?"
    ))
    .bind(token)
    .bind(Utc::now().naive_utc())
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

pub async fn record_visit(
    pool: &SqlitePool,
    token: &str,
    visits: i64,
    last_visit: NaiveDateTime,
) -> DirectoryResult<()> {
    sqlx::query("UPDATE sessions SET visits = ?, last_visit = ?, expires_at = ? WHERE token = ?")
        .bind(visits)
        .bind(last_visit)
        .bind(expiry(Utc::now().naive_utc()))
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

/// Replaces the session behind `old_token` with a fresh token owned by
/// `user_id`. The visit counter moves over to the new row. An unknown
/// `old_token` starts the counter from scratch.
pub async fn rotate_session(
    pool: &SqlitePool,
    old_token: &str,
    user_id: i64,
) -> DirectoryResult<SessionRecord> {
    let mut tx = pool.begin().await?;

    let previous = sqlx::query_as::<_, SessionRecord>(&format!(
        "DELETE FROM sessions WHERE token = ? RETURNING {SESSION_COLUMNS}"
    ))
    .bind(old_token)
    .fetch_optional(&mut *tx)
    .await?;

    let (visits, last_visit) = previous
        .map(|session| (session.visits, session.last_visit))
        .unwrap_or((0, None));

    let session = insert_session(&mut *tx, Some(user_id), visits, last_visit).await?;
    tx.commit().await?;

    Ok(session)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> DirectoryResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

/// Deletes every session that expired before `now`, returning how many.
pub async fn prune_expired(pool: &SqlitePool, now: NaiveDateTime) -> DirectoryResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
