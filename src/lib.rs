//! # exposure-sync
//!
//! Insert-only synchronization of a remote photo-story collection into a local
//! content store.
//!
//! ## Design Philosophy
//!
//! exposure-sync is designed to be:
//! - **Insert-only** - Stories already present (by exact web URL) are never touched
//! - **Sensible defaults** - Works against the public API with zero configuration
//! - **Library-first** - No CLI or UI; the embedding application triggers runs
//! - **Store-agnostic** - The engine talks to a [`ContentStore`], with SQLite provided
//!
//! ## Quick Start
//!
//! ```no_run
//! use exposure_sync::{ActorId, Config, Database, StorySync};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//!
//!     let sync = StorySync::new(&config, db.clone())?;
//!     let report = sync.run("harbor-photos", ActorId::new(1)).await;
//!
//!     println!(
//!         "created {} items, skipped {}",
//!         report.created.len(),
//!         report.skipped_existing
//!     );
//!     report.into_result()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The crate emits `tracing` events but never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Remote story API client and payload decoding
pub mod source;
/// Storage traits used by the sync engine
pub mod store;
/// Sync orchestration
pub mod sync;
/// Creation-time derivation from `published_at`
pub mod timestamp;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, FailurePolicy, PersistenceConfig, SourceConfig, SyncConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, Result, ValidationError};
pub use source::{ApiClient, parse_stories};
pub use store::{ContentStore, SettingsStore};
pub use sync::{
    RecordFailure, StoryOutcome, StorySync, SyncReport, SyncState, ThumbnailOutcome,
};
pub use timestamp::derive_created_at;
pub use types::{
    ActorId, AssetId, ContentItemId, NewContentItem, NewThumbnailAsset, StoryRecord,
};
