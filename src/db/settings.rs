//! Persisted configuration values.

use crate::error::DatabaseError;
use crate::store::SettingsStore;
use crate::{Error, Result};
use async_trait::async_trait;

use super::Database;

/// Settings key holding the story endpoint (site slug)
pub const ENDPOINT_KEY: &str = "endpoint";

impl Database {
    /// Read a setting value
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM settings WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read setting {}: {}",
                key, e
            )))
        })?;

        Ok(value)
    }

    /// Insert or replace a setting value
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write setting {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// The configured story endpoint, if one has been saved
    pub async fn endpoint(&self) -> Result<Option<String>> {
        self.get_setting(ENDPOINT_KEY).await
    }

    /// Save the story endpoint
    ///
    /// Surrounding whitespace is removed; an empty value is rejected because the endpoint
    /// is required to build the story URL.
    pub async fn set_endpoint(&self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config {
                message: "endpoint must not be empty".to_string(),
                key: Some(ENDPOINT_KEY.to_string()),
            });
        }

        self.set_setting(ENDPOINT_KEY, endpoint).await?;
        tracing::info!(endpoint, "Saved story endpoint");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn load_endpoint(&self) -> Result<Option<String>> {
        self.endpoint().await
    }

    async fn save_endpoint(&self, endpoint: &str) -> Result<()> {
        self.set_endpoint(endpoint).await
    }
}
