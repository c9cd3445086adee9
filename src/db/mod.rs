//! Database layer for exposure-sync
//!
//! Handles SQLite persistence for content items, thumbnail assets and settings.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - `migrations`: Database lifecycle, schema migrations
//! - `content`: Content item and thumbnail asset persistence, [`ContentStore`](crate::ContentStore) impl
//! - `settings`: Persisted configuration values (the story endpoint)

use crate::types::{ActorId, AssetId, ContentItemId};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod content;
mod migrations;
mod settings;

/// Language code stamped on every ingested item
pub const ITEM_LANGCODE: &str = "en";
/// Content type stamped on every ingested item
pub const ITEM_BUNDLE: &str = "photo_essay";

/// Content item record from database
#[derive(Debug, Clone, FromRow)]
pub struct ContentItemRow {
    /// Unique database ID
    pub id: i64,
    /// Source story identifier
    pub story_id: String,
    /// Story title
    pub title: String,
    /// Story web URL (dedup key)
    pub source_url: String,
    /// User that triggered the sync which created this item
    pub owner_actor_id: i64,
    /// Attached thumbnail asset
    pub thumbnail_asset_id: Option<i64>,
    /// Unix timestamp of the story's publication
    pub created_at: i64,
    /// Published flag (0 = no, 1 = yes)
    pub published: i32,
    /// Promoted flag (0 = no, 1 = yes)
    pub promoted: i32,
    /// Comments enabled flag (0 = no, 1 = yes)
    pub commentable: i32,
    /// Language code
    pub langcode: String,
    /// Content type
    pub bundle: String,
}

impl ContentItemRow {
    /// Typed item ID
    pub fn item_id(&self) -> ContentItemId {
        ContentItemId(self.id)
    }

    /// Typed owner
    pub fn owner(&self) -> ActorId {
        ActorId(self.owner_actor_id)
    }

    /// Typed thumbnail reference
    pub fn thumbnail(&self) -> Option<AssetId> {
        self.thumbnail_asset_id.map(AssetId)
    }

    /// Creation instant
    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.created_at, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Thumbnail asset record from database
#[derive(Debug, Clone, FromRow)]
pub struct ThumbnailAssetRow {
    /// Unique database ID
    pub id: i64,
    /// Remote image URI
    pub source_uri: String,
    /// Alternative text
    pub alt_text: String,
    /// Unix timestamp when the asset row was created
    pub created_at: i64,
}

/// Database handle for exposure-sync
pub struct Database {
    pool: SqlitePool,
}
