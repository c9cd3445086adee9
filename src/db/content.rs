//! Content item and thumbnail asset persistence.

use crate::error::DatabaseError;
use crate::store::ContentStore;
use crate::types::{AssetId, ContentItemId, NewContentItem, NewThumbnailAsset};
use crate::{Error, Result};
use async_trait::async_trait;

use super::{ContentItemRow, Database, ITEM_BUNDLE, ITEM_LANGCODE, ThumbnailAssetRow};

const CONTENT_ITEM_COLUMNS: &str = "id, story_id, title, source_url, owner_actor_id, \
     thumbnail_asset_id, created_at, published, promoted, commentable, langcode, bundle";

impl Database {
    /// Check whether a content item with exactly this source URL exists
    pub async fn content_item_exists(&self, source_url: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM content_items WHERE source_url = ?)
            "#,
        )
        .bind(source_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check if content item exists: {}",
                e
            )))
        })?;

        Ok(exists != 0)
    }

    /// Insert a thumbnail asset
    pub async fn insert_thumbnail_asset(&self, asset: &NewThumbnailAsset) -> Result<AssetId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO thumbnail_assets (source_uri, alt_text, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&asset.source_uri)
        .bind(&asset.alt_text)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert thumbnail asset: {}",
                e
            )))
        })?;

        Ok(AssetId(result.last_insert_rowid()))
    }

    /// Insert a content item
    ///
    /// `created_at` is taken from the item, not from the clock.
    pub async fn insert_content_item(&self, item: &NewContentItem) -> Result<ContentItemId> {
        let result = sqlx::query(
            r#"
            INSERT INTO content_items (story_id, title, source_url, owner_actor_id,
                                       thumbnail_asset_id, created_at, published, promoted,
                                       commentable, langcode, bundle)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.story_id)
        .bind(&item.title)
        .bind(&item.source_url)
        .bind(item.owner.get())
        .bind(item.thumbnail.map(|id| id.get()))
        .bind(item.created_at.timestamp())
        .bind(item.published as i32)
        .bind(item.promoted as i32)
        .bind(item.commentable as i32)
        .bind(ITEM_LANGCODE)
        .bind(ITEM_BUNDLE)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert content item: {}",
                e
            )))
        })?;

        Ok(ContentItemId(result.last_insert_rowid()))
    }

    /// Delete a thumbnail asset that no content item references
    pub async fn delete_thumbnail_asset(&self, id: AssetId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM thumbnail_assets
            WHERE id = ?
              AND NOT EXISTS (SELECT 1 FROM content_items WHERE thumbnail_asset_id = ?)
            "#,
        )
        .bind(id.get())
        .bind(id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete thumbnail asset: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Get content item by ID
    pub async fn get_content_item(&self, id: ContentItemId) -> Result<Option<ContentItemRow>> {
        let item = sqlx::query_as::<_, ContentItemRow>(&format!(
            "SELECT {CONTENT_ITEM_COLUMNS} FROM content_items WHERE id = ?"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get content item: {}",
                e
            )))
        })?;

        Ok(item)
    }

    /// Get the first content item created for a source URL
    pub async fn get_content_item_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<ContentItemRow>> {
        let item = sqlx::query_as::<_, ContentItemRow>(&format!(
            "SELECT {CONTENT_ITEM_COLUMNS} FROM content_items WHERE source_url = ? \
             ORDER BY id ASC LIMIT 1"
        ))
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get content item by source URL: {}",
                e
            )))
        })?;

        Ok(item)
    }

    /// List all content items in insertion order
    pub async fn list_content_items(&self) -> Result<Vec<ContentItemRow>> {
        let items = sqlx::query_as::<_, ContentItemRow>(&format!(
            "SELECT {CONTENT_ITEM_COLUMNS} FROM content_items ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list content items: {}",
                e
            )))
        })?;

        Ok(items)
    }

    /// Count content items
    pub async fn count_content_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count content items: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Get thumbnail asset by ID
    pub async fn get_thumbnail_asset(&self, id: AssetId) -> Result<Option<ThumbnailAssetRow>> {
        let asset = sqlx::query_as::<_, ThumbnailAssetRow>(
            r#"
            SELECT id, source_uri, alt_text, created_at
            FROM thumbnail_assets
            WHERE id = ?
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get thumbnail asset: {}",
                e
            )))
        })?;

        Ok(asset)
    }

    /// Count thumbnail assets
    pub async fn count_thumbnail_assets(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thumbnail_assets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count thumbnail assets: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}

#[async_trait]
impl ContentStore for Database {
    async fn exists(&self, source_url: &str) -> Result<bool> {
        self.content_item_exists(source_url).await
    }

    async fn create_asset(&self, asset: &NewThumbnailAsset) -> Result<AssetId> {
        self.insert_thumbnail_asset(asset).await
    }

    async fn create_item(&self, item: &NewContentItem) -> Result<ContentItemId> {
        self.insert_content_item(item).await
    }

    async fn discard_asset(&self, id: AssetId) -> Result<()> {
        if !self.delete_thumbnail_asset(id).await? {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "unreferenced thumbnail asset {}",
                id
            ))));
        }
        Ok(())
    }
}
