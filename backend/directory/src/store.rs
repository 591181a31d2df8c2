//! # SQLite store
//!
//! Categories, pages, users, profiles and sessions live in one SQLite file.
//!
//! ## Counters
//!
//! Views and likes are never read, bumped in Rust and written back. Every
//! increment is a single `UPDATE ... SET n = n + 1 ... RETURNING` so that
//! concurrent requests cannot lose updates.
use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::error::{DirectoryResult, unique_violation};
use crate::models::{Category, CategoryLink, Page};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
        likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0)
    );

    CREATE TABLE IF NOT EXISTS pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_id INTEGER NOT NULL REFERENCES categories (id),
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0)
    );

    CREATE INDEX IF NOT EXISTS idx_pages_category ON pages (category_id);

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        date_joined TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_profiles (
        user_id INTEGER PRIMARY KEY REFERENCES users (id),
        website TEXT,
        picture TEXT
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER REFERENCES users (id),
        visits INTEGER NOT NULL DEFAULT 0,
        last_visit TEXT,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions (expires_at);
"#;

/// Where [`track_view`] sends the browser when the page cannot be found.
pub const FALLBACK_PATH: &str = "/rango/";

pub async fn connect(database_url: &str) -> DirectoryResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory store. The connection is never recycled,
/// since closing it would drop the database.
pub async fn connect_in_memory() -> DirectoryResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> DirectoryResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    Ok(())
}

/// Lists categories ordered by name.
///
/// A non-empty `starts_with` keeps only names with that (case-sensitive)
/// prefix. A positive `max_results` caps the result length.
pub async fn list_categories(
    pool: &SqlitePool,
    max_results: u32,
    starts_with: &str,
) -> DirectoryResult<Vec<CategoryLink>> {
    // SQLite reads a negative LIMIT as "no limit"
    let limit = if max_results > 0 {
        i64::from(max_results)
    } else {
        -1
    };

    let categories = if starts_with.is_empty() {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, views, likes FROM categories ORDER BY name LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        // LIKE folds ASCII case, substr does not
        sqlx::query_as::<_, Category>(
            "SELECT id, name, views, likes FROM categories \
             WHERE substr(name, 1, length(?)) = ? ORDER BY name LIMIT ?",
        )
        .bind(starts_with)
        .bind(starts_with)
        .bind(limit)
        .fetch_all(pool)
        .await?
    };

    Ok(categories.into_iter().map(CategoryLink::from).collect())
}

pub async fn top_categories(pool: &SqlitePool, limit: u32) -> DirectoryResult<Vec<CategoryLink>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, views, likes FROM categories ORDER BY views DESC, name LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(categories.into_iter().map(CategoryLink::from).collect())
}

pub async fn get_category(pool: &SqlitePool, id: i64) -> DirectoryResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, views, likes FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(category)
}

pub async fn get_category_by_name(
    pool: &SqlitePool,
    name: &str,
) -> DirectoryResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, views, likes FROM categories WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(category)
}

pub async fn insert_category(
    pool: &SqlitePool,
    name: &str,
    views: i64,
    likes: i64,
) -> DirectoryResult<Category> {
    sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, views, likes) VALUES (?, ?, ?) \
         RETURNING id, name, views, likes",
    )
    .bind(name)
    .bind(views)
    .bind(likes)
    .fetch_one(pool)
    .await
    .map_err(|e| unique_violation(e, &format!("Category {name}")))
}

/// Bumps the category view counter, returning the new total.
pub async fn increment_category_views(pool: &SqlitePool, id: i64) -> DirectoryResult<Option<i64>> {
    let views = sqlx::query_scalar::<_, i64>(
        "UPDATE categories SET views = views + 1 WHERE id = ? RETURNING views",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(views)
}

/// Bumps the like counter, returning the new total or `None` for an
/// unknown id.
pub async fn like_category(pool: &SqlitePool, id: i64) -> DirectoryResult<Option<i64>> {
    let likes = sqlx::query_scalar::<_, i64>(
        "UPDATE categories SET likes = likes + 1 WHERE id = ? RETURNING likes",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(likes)
}

pub async fn pages_for_category(pool: &SqlitePool, category_id: i64) -> DirectoryResult<Vec<Page>> {
    let pages = sqlx::query_as::<_, Page>(
        "SELECT id, category_id, title, url, views FROM pages \
         WHERE category_id = ? ORDER BY views DESC, title",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    Ok(pages)
}

pub async fn top_pages(pool: &SqlitePool, limit: u32) -> DirectoryResult<Vec<Page>> {
    let pages = sqlx::query_as::<_, Page>(
        "SELECT id, category_id, title, url, views FROM pages \
         ORDER BY views DESC, title LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(pages)
}

pub async fn get_page(pool: &SqlitePool, id: i64) -> DirectoryResult<Option<Page>> {
    let page = sqlx::query_as::<_, Page>(
        "SELECT id, category_id, title, url, views FROM pages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(page)
}

/// New pages always start with zero views.
pub async fn insert_page(
    pool: &SqlitePool,
    category: &Category,
    title: &str,
    url: &str,
) -> DirectoryResult<Page> {
    let page = sqlx::query_as::<_, Page>(
        "INSERT INTO pages (category_id, title, url, views) VALUES (?, ?, ?, 0) \
         RETURNING id, category_id, title, url, views",
    )
    .bind(category.id)
    .bind(title)
    .bind(url)
    .fetch_one(pool)
    .await?;

    Ok(page)
}

/// Counts a click-through and returns where to send the browser.
///
/// Unknown or malformed ids, and store failures, fall back to
/// [`FALLBACK_PATH`] without touching any counter.
pub async fn track_view(pool: &SqlitePool, page_id: Option<&str>) -> String {
    let Some(id) = page_id.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
        return FALLBACK_PATH.to_string();
    };

    let result = sqlx::query_scalar::<_, String>(
        "UPDATE pages SET views = views + 1 WHERE id = ? RETURNING url",
    )
    .bind(id)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(Some(url)) => url,
        Ok(None) => FALLBACK_PATH.to_string(),
        Err(e) => {
            tracing::warn!("Failed to track view of page {id}: {e}");
            FALLBACK_PATH.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    async fn seeded() -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();

        for name in ["Python", "Django", "Perl", "Other Frameworks", "python-dev"] {
            insert_category(&pool, name, 0, 0).await.unwrap();
        }

        pool
    }

    fn names(links: &[CategoryLink]) -> Vec<&str> {
        links.iter().map(|l| l.category.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_all_sorted_by_name() {
        let pool = seeded().await;
        let all = list_categories(&pool, 0, "").await.unwrap();

        assert_eq!(
            names(&all),
            vec!["Django", "Other Frameworks", "Perl", "Python", "python-dev"]
        );
        assert_eq!(all[1].url, "Other_Frameworks");
    }

    #[tokio::test]
    async fn test_prefix_is_case_sensitive() {
        let pool = seeded().await;

        let upper = list_categories(&pool, 0, "P").await.unwrap();
        assert_eq!(names(&upper), vec!["Perl", "Python"]);

        let lower = list_categories(&pool, 0, "py").await.unwrap();
        assert_eq!(names(&lower), vec!["python-dev"]);

        let none = list_categories(&pool, 0, "Ruby").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_max_results_truncates() {
        let pool = seeded().await;

        let capped = list_categories(&pool, 2, "").await.unwrap();
        assert_eq!(names(&capped), vec!["Django", "Other Frameworks"]);

        let roomy = list_categories(&pool, 8, "P").await.unwrap();
        assert_eq!(roomy.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_category() {
        let pool = seeded().await;
        let err = insert_category(&pool, "Python", 0, 0).await.unwrap_err();

        assert!(matches!(err, crate::DirectoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_track_view_increments_once() {
        let pool = seeded().await;
        let django = get_category_by_name(&pool, "Django").await.unwrap().unwrap();
        let page = insert_page(&pool, &django, "Docs", "https://docs.djangoproject.com/")
            .await
            .unwrap();
        assert_eq!(page.views, 0);

        let target = track_view(&pool, Some(&page.id.to_string())).await;
        assert_eq!(target, "https://docs.djangoproject.com/");

        let page = get_page(&pool, page.id).await.unwrap().unwrap();
        assert_eq!(page.views, 1);
    }

    #[tokio::test]
    async fn test_track_view_unknown_page() {
        let pool = seeded().await;
        let django = get_category_by_name(&pool, "Django").await.unwrap().unwrap();
        let page = insert_page(&pool, &django, "Docs", "https://docs.djangoproject.com/")
            .await
            .unwrap();

        assert_eq!(track_view(&pool, Some("999")).await, FALLBACK_PATH);
        assert_eq!(track_view(&pool, Some("abc")).await, FALLBACK_PATH);
        assert_eq!(track_view(&pool, None).await, FALLBACK_PATH);

        let page = get_page(&pool, page.id).await.unwrap().unwrap();
        assert_eq!(page.views, 0);
    }

    #[tokio::test]
    async fn test_like_category() {
        let pool = seeded().await;
        let perl = get_category_by_name(&pool, "Perl").await.unwrap().unwrap();

        assert_eq!(like_category(&pool, perl.id).await.unwrap(), Some(1));
        assert_eq!(like_category(&pool, perl.id).await.unwrap(), Some(2));
        assert_eq!(like_category(&pool, 9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_top_pages_by_views() {
        let pool = seeded().await;
        let python = get_category_by_name(&pool, "Python").await.unwrap().unwrap();

        let quiet = insert_page(&pool, &python, "Quiet", "http://quiet.example/").await.unwrap();
        let busy = insert_page(&pool, &python, "Busy", "http://busy.example/").await.unwrap();
        track_view(&pool, Some(&busy.id.to_string())).await;

        let top = top_pages(&pool, 5).await.unwrap();
        assert_eq!(top[0].id, busy.id);
        assert_eq!(top[1].id, quiet.id);

        increment_category_views(&pool, python.id).await.unwrap();
        let top = top_categories(&pool, 1).await.unwrap();
        assert_eq!(top[0].category.name, "Python");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_prefix_filter_matches_store(
            names in proptest::collection::btree_set("[A-Ca-c ]{1,6}", 0..12),
            prefix in "[A-Ca-c]{0,2}",
            max in 0u32..5,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let pool = connect_in_memory().await.unwrap();
                for name in &names {
                    insert_category(&pool, name, 0, 0).await.unwrap();
                }

                let listed = list_categories(&pool, 0, &prefix).await.unwrap();
                let expected: Vec<&String> =
                    names.iter().filter(|n| n.starts_with(prefix.as_str())).collect();
                let listed_names: Vec<&String> = listed.iter().map(|l| &l.category.name).collect();
                prop_assert_eq!(listed_names, expected);

                if max > 0 {
                    let capped = list_categories(&pool, max, &prefix).await.unwrap();
                    prop_assert!(capped.len() <= max as usize);
                }

                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
