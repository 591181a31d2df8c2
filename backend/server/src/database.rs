//! # SQLite
//!
//! Disk database behind every category, page, user and session.
//!
//! ## Requirements
//!
//! - One file, no separate service to run
//! - Unique category names and usernames enforced by the store
//! - Atomic counters for page views, category views and likes
//!
//! ## Implementation
//!
//! - Schema created on startup if missing, see `directory::store`
//! - Small pool, requests never hold a connection across an outbound call
//! - Expired sessions swept at startup and then hourly
use std::time::Duration;

use chrono::Utc;
use directory::{DirectoryResult, SqlitePool, sessions, store};
use tokio::time::interval;
use tracing::{info, warn};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub async fn init_database(database_url: &str) -> DirectoryResult<SqlitePool> {
    let pool = store::connect(database_url).await?;
    info!("Connected to {database_url}");

    Ok(pool)
}

/// Runs for the life of the process. The first sweep happens immediately.
pub async fn prune_sessions(pool: SqlitePool) {
    let mut ticker = interval(PRUNE_INTERVAL);

    loop {
        ticker.tick().await;

        match sessions::prune_expired(&pool, Utc::now().naive_utc()).await {
            Ok(0) => {}
            Ok(count) => info!("Pruned {count} expired sessions"),
            Err(e) => warn!("Failed to prune expired sessions: {e}"),
        }
    }
}
