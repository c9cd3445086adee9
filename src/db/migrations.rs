//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;

use super::Database;

/// Newest schema version this build knows how to use
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Map a failed migration statement to [`DatabaseError::MigrationFailed`]
fn migration_failed(step: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::MigrationFailed(format!("{}: {}", step, e)))
}

/// Map a failed connection step to [`DatabaseError::ConnectionFailed`]
fn connection_failed<E: std::fmt::Display>(step: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::Database(DatabaseError::ConnectionFailed(format!("{}: {}", step, e)))
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date
    ///
    /// Missing parent directories are created. The path is handed to SQLite as a file
    /// name, never as a connection URL, so `?` and `#` in it are literal.
    ///
    /// # Errors
    /// Returns [`DatabaseError::ConnectionFailed`] if the file cannot be opened and
    /// [`DatabaseError::MigrationFailed`] if the schema cannot be applied or is newer
    /// than this build supports.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(connection_failed("Failed to create database directory"))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(connection_failed("Failed to open database"))?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::debug!(path = %path.display(), "Database ready");
        Ok(db)
    }

    /// Apply every migration newer than the recorded schema version
    async fn migrate(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(connection_failed("Failed to acquire connection"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(migration_failed("Failed to create schema_version table"))?;

        let version = Self::schema_version(&mut conn).await?;
        if version > SCHEMA_VERSION {
            return Err(Error::Database(DatabaseError::MigrationFailed(format!(
                "database schema v{} is newer than supported v{}",
                version, SCHEMA_VERSION
            ))));
        }

        if version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Highest recorded schema version, 0 for a fresh file
    async fn schema_version(conn: &mut SqliteConnection) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read schema version: {}",
                    e
                )))
            })?;

        Ok(version.unwrap_or(0))
    }

    /// v1: thumbnail assets, content items and settings
    ///
    /// Runs in one transaction; a failing step leaves the file at version 0.
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed("Failed to begin migration v1"))?;

        let applied = async {
            for (step, sql) in V1_STATEMENTS {
                sqlx::query(sql)
                    .execute(&mut *conn)
                    .await
                    .map_err(migration_failed(step))?;
            }
            Self::record_migration(conn, 1).await
        }
        .await;

        if let Err(e) = applied {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }

        sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map_err(migration_failed("Failed to commit migration v1"))?;

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(migration_failed("Failed to record migration"))?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Schema v1, applied in order
const V1_STATEMENTS: [(&str, &str); 5] = [
    (
        "Failed to create thumbnail_assets table",
        r#"
        CREATE TABLE thumbnail_assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_uri TEXT NOT NULL,
            alt_text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "Failed to create content_items table",
        r#"
        CREATE TABLE content_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            story_id TEXT NOT NULL,
            title TEXT NOT NULL,
            source_url TEXT NOT NULL,
            owner_actor_id INTEGER NOT NULL,
            thumbnail_asset_id INTEGER REFERENCES thumbnail_assets(id),
            created_at INTEGER NOT NULL,
            published INTEGER NOT NULL DEFAULT 1,
            promoted INTEGER NOT NULL DEFAULT 0,
            commentable INTEGER NOT NULL DEFAULT 0,
            langcode TEXT NOT NULL,
            bundle TEXT NOT NULL
        )
        "#,
    ),
    // Lookup index for the dedup check; not UNIQUE
    (
        "Failed to create source_url index",
        "CREATE INDEX idx_content_items_source_url ON content_items(source_url)",
    ),
    (
        "Failed to create created_at index",
        "CREATE INDEX idx_content_items_created ON content_items(created_at DESC)",
    ),
    (
        "Failed to create settings table",
        r#"
        CREATE TABLE settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    ),
];
