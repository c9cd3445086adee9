//! Core types for exposure-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Unique identifier for a persisted content item
    ContentItemId
);

row_id!(
    /// Unique identifier for a persisted thumbnail asset
    AssetId
);

row_id!(
    /// Identifier of the user that triggered a sync run; becomes the item owner
    ActorId
);

/// One story from the remote collection, as needed to build a content item
///
/// Created by the parser and dropped once the story has been processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoryRecord {
    /// Opaque source identifier (numbers are kept in their decimal form)
    pub id: String,
    /// Story title
    pub title: String,
    /// Public story URL; the dedup key
    pub web_url: String,
    /// Cover photo URL, if the story has one
    pub thumbnail_url: Option<String>,
    /// Publication time as sent by the API, e.g. `2020-05-01T12:30:00-05:00`
    pub published_at: String,
}

/// Thumbnail asset to be inserted into the store
///
/// Only references the remote image; nothing is downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewThumbnailAsset {
    /// Remote image URI, stored as-is
    pub source_uri: String,
    /// Alternative text (the story title)
    pub alt_text: String,
}

/// Content item to be inserted into the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewContentItem {
    /// Copy of [`StoryRecord::id`]
    pub story_id: String,
    /// Story title
    pub title: String,
    /// Copy of [`StoryRecord::web_url`]
    pub source_url: String,
    /// User that triggered the run
    pub owner: ActorId,
    /// Attached thumbnail, if one was created
    pub thumbnail: Option<AssetId>,
    /// Publication instant of the story; replaces the store's default creation time
    pub created_at: DateTime<Utc>,
    /// Always true on creation
    pub published: bool,
    /// Always false on creation
    pub promoted: bool,
    /// Always false on creation
    pub commentable: bool,
}

impl NewContentItem {
    /// Build the item for a story with the fixed creation flags
    pub fn from_story(
        story: &StoryRecord,
        thumbnail: Option<AssetId>,
        created_at: DateTime<Utc>,
        owner: ActorId,
    ) -> Self {
        Self {
            story_id: story.id.clone(),
            title: story.title.clone(),
            source_url: story.web_url.clone(),
            owner,
            thumbnail,
            created_at,
            published: true,
            promoted: false,
            commentable: false,
        }
    }
}
