use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError, EntityCounts};

// ============================================================================
// Database
// ============================================================================

/// Handle to the entity store.
///
/// Cloning is cheap (the pool is reference counted). Every create operation
/// commits on its own, so an interrupted extraction leaves a consistent prefix
/// of its work behind.
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::MissingDirectory` if the file's directory does
    /// not exist.
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // SQLite reports a missing directory as CANTOPEN, which reads as a lock
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty() && !p.exists())
            {
                return Err(DatabaseError::MissingDirectory(parent.to_path_buf()));
            }
        }

        // Pre-create the file user-only so it never exists with umask permissions
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                // If creation fails, SQLite reports the error at connect_with
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok();
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        // A single writer ingests one feed at a time; one connection keeps
        // every statement strictly ordered.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let message = e.to_string();
            if is_lock_message(&message) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(message)
            }
        })?;
        tracing::debug!(path = %path, "Database ready");
        Ok(db)
    }

    /// Close the pool, waiting for in-flight statements to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL DEFAULT 'source',
                url TEXT UNIQUE NOT NULL,
                title TEXT,
                description TEXT,
                created_date TEXT NOT NULL,
                updated_date TEXT,
                last_fetch TEXT,
                aggregated_score REAL,
                aggregated_certainty REAL,
                image_path TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Content ids come from the feed provider, not from SQLite
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contents (
                id TEXT PRIMARY KEY NOT NULL,
                kind TEXT NOT NULL DEFAULT 'content',
                title TEXT NOT NULL,
                url TEXT UNIQUE,
                published_date TEXT NOT NULL,
                created_date TEXT NOT NULL,
                updated_date TEXT,
                author_id INTEGER REFERENCES authors(id),
                score INTEGER,
                predicted_score REAL,
                predicted_certainty REAL,
                summary TEXT,
                body TEXT,
                image_path TEXT,
                source_id INTEGER REFERENCES sources(id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Association tables
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_tags (
                content_id TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (content_id, tag_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_categories (
                content_id TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (content_id, category_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_tags (
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (source_id, tag_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_categories (
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (source_id, category_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contents_source ON contents(source_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contents_author ON contents(author_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contents_source_published ON contents(source_id, published_date DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Number of rows per entity table
    pub async fn counts(&self) -> Result<EntityCounts, DatabaseError> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sources),
                (SELECT COUNT(*) FROM contents),
                (SELECT COUNT(*) FROM authors),
                (SELECT COUNT(*) FROM tags),
                (SELECT COUNT(*) FROM categories)
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(EntityCounts {
            sources: row.0,
            contents: row.1,
            authors: row.2,
            tags: row.3,
            categories: row.4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_starts_empty() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(db.counts().await.unwrap(), EntityCounts::default());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.counts().await.unwrap().sources, 0);
    }

    #[tokio::test]
    async fn test_open_file_database_persists() {
        let dir = std::env::temp_dir().join("feedsink_schema_test_persist");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("main.db");
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_str().unwrap();

        let db = Database::open(path_str).await.unwrap();
        db.find_or_create_author("Ada").await.unwrap();
        db.close().await;

        let reopened = Database::open(path_str).await.unwrap();
        assert_eq!(reopened.counts().await.unwrap().authors, 1);
        reopened.close().await;

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_open_under_missing_directory_is_not_a_lock() {
        let dir = std::env::temp_dir().join("feedsink_schema_test_missing_dir");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("main.db");

        let err = Database::open(path.to_str().unwrap()).await.unwrap_err();
        match err {
            DatabaseError::MissingDirectory(missing) => assert_eq!(missing, dir.join("nested")),
            other => panic!("Expected MissingDirectory, got {:?}", other),
        }
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_open_relative_file_in_current_directory() {
        // A bare file name has an empty parent, which always exists
        let name = "feedsink_schema_test_relative.db";
        std::fs::remove_file(name).ok();

        let db = Database::open(name).await.unwrap();
        db.close().await;

        std::fs::remove_file(name).ok();
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("(code: 14) unable to open database file"));
        assert!(!is_lock_message("UNIQUE constraint failed: sources.url"));
    }
}
