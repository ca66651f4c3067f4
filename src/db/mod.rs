//! SQLite persistence for the archive: videos, categories, users and the
//! per-user engagement tables.

mod categories;
mod engagement;
mod users;
mod videos;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use categories::Category;
pub use engagement::{PopularKind, RatingStats};
pub use users::{BotStats, RequiredChannel};
pub use videos::{NewVideo, SearchFilter, VideoRow};

pub const VIDEOS_PER_PAGE: u32 = 10;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS bot_settings (
        setting_key TEXT PRIMARY KEY,
        setting_value TEXT
    )",
    "CREATE TABLE IF NOT EXISTS bot_users (
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        join_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        parent_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
        full_path TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS required_channels (
        channel_id INTEGER PRIMARY KEY,
        channel_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS video_archive (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id INTEGER NOT NULL UNIQUE,
        caption TEXT,
        chat_id INTEGER NOT NULL,
        file_name TEXT,
        file_id TEXT NOT NULL,
        category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        view_count INTEGER NOT NULL DEFAULT 0,
        grouping_key TEXT,
        upload_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS video_ratings (
        video_id INTEGER NOT NULL REFERENCES video_archive(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        rated_at TEXT NOT NULL,
        PRIMARY KEY (video_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_favorites (
        user_id INTEGER NOT NULL,
        video_id INTEGER NOT NULL REFERENCES video_archive(id) ON DELETE CASCADE,
        added_at TEXT NOT NULL,
        PRIMARY KEY (user_id, video_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_history (
        user_id INTEGER NOT NULL,
        video_id INTEGER NOT NULL REFERENCES video_archive(id) ON DELETE CASCADE,
        last_watched TEXT NOT NULL,
        PRIMARY KEY (user_id, video_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_video_category ON video_archive (category_id)",
    "CREATE INDEX IF NOT EXISTS idx_video_grouping_key ON video_archive (grouping_key)",
    "CREATE INDEX IF NOT EXISTS idx_video_views ON video_archive (view_count DESC)",
    "CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories (parent_id)",
];

/// Handle to the archive database. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. A single connection keeps every query on
    /// the same memory store.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates missing tables and indexes. Safe to run on every start.
    pub async fn bootstrap(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        log::info!("Database schema ready ({} statements)", SCHEMA.len());
        Ok(())
    }
}

/// One page of a listing plus the total row count behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        let per_page = i64::from(VIDEOS_PER_PAGE);
        ((self.total + per_page - 1) / per_page) as u32
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub(crate) fn page_offset(page: u32) -> i64 {
    i64::from(page) * i64::from(VIDEOS_PER_PAGE)
}

/// Timestamp format shared by all rows written from here; sortable as text.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let db = test_support::database().await;
        db.bootstrap().await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 8);
    }

    #[test]
    fn page_navigation() {
        let page = Page::<()> { items: vec![], total: 25, page: 0 };
        assert_eq!(page.total_pages(), 3);
        assert!(!page.has_prev());
        assert!(page.has_next());

        let last = Page::<()> { items: vec![], total: 25, page: 2 };
        assert!(last.has_prev());
        assert!(!last.has_next());

        let empty = Page::<()> { items: vec![], total: 0, page: 0 };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }
}
