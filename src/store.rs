//! Content store abstraction.
//!
//! The sync engine only needs a handful of operations from the storage engine that
//! holds content items. They are expressed as the [`ContentStore`] trait so that the
//! engine can run against [`Database`](crate::Database) or any other backend.

use crate::Result;
use crate::types::{AssetId, ContentItemId, NewContentItem, NewThumbnailAsset};
use async_trait::async_trait;

/// Storage operations used by a sync run
///
/// Implementations must use bound parameters for every value that comes from the
/// remote API; story URLs are attacker-controlled text.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether a content item with exactly this source URL exists
    ///
    /// No normalization is applied: case, trailing slashes and query strings all count.
    async fn exists(&self, source_url: &str) -> Result<bool>;

    /// Persist a thumbnail asset that references a remote image
    async fn create_asset(&self, asset: &NewThumbnailAsset) -> Result<AssetId>;

    /// Persist a content item, using `item.created_at` as its creation time
    async fn create_item(&self, item: &NewContentItem) -> Result<ContentItemId>;

    /// Remove an asset created earlier in the same processing step whose content
    /// item could not be written
    async fn discard_asset(&self, id: AssetId) -> Result<()>;
}

/// Persisted configuration needed to start a sync without arguments
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The saved story endpoint, if any
    async fn load_endpoint(&self) -> Result<Option<String>>;

    /// Save the story endpoint
    async fn save_endpoint(&self, endpoint: &str) -> Result<()>;
}
