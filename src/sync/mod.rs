//! Story synchronization engine.
//!
//! A run fetches the story collection for one endpoint and materializes every story
//! whose web URL is not yet in the content store:
//!
//! ```text
//! Idle → Fetching → Parsing → ProcessingRecords → Done
//!           └──────────┴───────────────┴──────────→ Aborted
//! ```
//!
//! Stories are processed once each, in source order, with no concurrency. Per story:
//! existence lookup, then either skip, or derive the creation instant, resolve the
//! thumbnail and write the content item.
//!
//! Failure handling is asymmetric:
//! - a thumbnail asset that cannot be created is logged and the item is written
//!   without it;
//! - a content item that cannot be written aborts the run (configurable through
//!   [`SyncConfig::on_item_failure`]);
//! - an unusable `published_at` skips only that story (configurable through
//!   [`SyncConfig::on_invalid_timestamp`]).
//!
//! Items written before an abort stay persisted. Runs are safe to repeat one after
//! another but not to overlap: the existence lookup is not isolated from the write.

use crate::config::{Config, FailurePolicy, SyncConfig};
use crate::error::{Error, Result};
use crate::source::{ApiClient, parse_stories};
use crate::store::{ContentStore, SettingsStore};
use crate::timestamp::derive_created_at;
use crate::types::{
    ActorId, AssetId, ContentItemId, NewContentItem, NewThumbnailAsset, StoryRecord,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stage of a sync run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Not started
    Idle,
    /// Requesting the story collection
    Fetching,
    /// Decoding the response body
    Parsing,
    /// Looking up and writing stories one by one
    ProcessingRecords,
    /// Every story was handled
    Done,
    /// Stopped on a fatal error
    Aborted,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Parsing => "parsing",
            SyncState::ProcessingRecords => "processing_records",
            SyncState::Done => "done",
            SyncState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What happened to a story's thumbnail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// The story has no cover photo
    Absent,
    /// An asset was created and attached
    Attached(AssetId),
    /// Creating the asset failed; the item is written without one
    Failed,
}

impl ThumbnailOutcome {
    /// The asset to reference from the content item, if any
    pub fn asset(&self) -> Option<AssetId> {
        match self {
            ThumbnailOutcome::Attached(id) => Some(*id),
            ThumbnailOutcome::Absent | ThumbnailOutcome::Failed => None,
        }
    }
}

/// Result of processing one story
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryOutcome {
    /// A content item with the same source URL exists; nothing was written
    AlreadyExists,
    /// A new content item was written
    Created {
        /// The new item
        item: ContentItemId,
        /// Thumbnail handling for the item
        thumbnail: ThumbnailOutcome,
    },
}

/// A story that was skipped because of a record-level failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFailure {
    /// Source identifier of the story
    pub story_id: String,
    /// Web URL of the story
    pub source_url: String,
    /// Rendered error
    pub message: String,
}

/// Summary of one sync run
#[derive(Debug)]
pub struct SyncReport {
    /// Endpoint the run fetched
    pub endpoint: String,
    /// User that triggered the run
    pub actor: ActorId,
    /// Final state: [`SyncState::Done`] or [`SyncState::Aborted`]
    pub state: SyncState,
    /// State the run was in when it aborted
    pub aborted_in: Option<SyncState>,
    /// Stories in the fetched collection
    pub fetched: usize,
    /// Stories the run started processing
    pub attempted: usize,
    /// Items created, in source order
    pub created: Vec<ContentItemId>,
    /// Stories skipped because their URL already exists
    pub skipped_existing: usize,
    /// Created items that got a thumbnail
    pub thumbnails_attached: usize,
    /// Created items whose thumbnail asset could not be created
    pub thumbnail_failures: usize,
    /// Stories skipped because of a record-level failure
    pub failed_records: Vec<RecordFailure>,
    /// The fatal error that aborted the run
    pub error: Option<Error>,
}

impl SyncReport {
    fn new(endpoint: &str, actor: ActorId) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            actor,
            state: SyncState::Idle,
            aborted_in: None,
            fetched: 0,
            attempted: 0,
            created: Vec::new(),
            skipped_existing: 0,
            thumbnails_attached: 0,
            thumbnail_failures: 0,
            failed_records: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, state: SyncState) {
        debug!(endpoint = %self.endpoint, from = %self.state, to = %state, "Sync state change");
        self.state = state;
    }

    fn abort(mut self, err: Error) -> Self {
        error!(
            endpoint = %self.endpoint,
            stage = %self.state,
            created = self.created.len(),
            error = %err,
            "Story sync aborted"
        );
        self.aborted_in = Some(self.state);
        self.state = SyncState::Aborted;
        self.error = Some(err);
        self
    }

    /// Whether the run handled every story
    pub fn is_success(&self) -> bool {
        self.state == SyncState::Done
    }

    /// Stories that were never looked at because the run aborted
    pub fn unprocessed(&self) -> usize {
        self.fetched.saturating_sub(self.attempted)
    }

    /// Turn an aborted run into its fatal error
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs story syncs against a content store
pub struct StorySync {
    /// API client for the story collection
    client: ApiClient,

    /// Destination for thumbnails and content items
    store: Arc<dyn ContentStore>,

    /// Per-story failure policies
    policy: SyncConfig,
}

impl StorySync {
    /// Create a new sync engine
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be created
    pub fn new(config: &Config, store: Arc<dyn ContentStore>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            client: ApiClient::new(&config.source)?,
            store,
            policy: config.sync.clone(),
        })
    }

    /// Run a sync for the endpoint saved in `settings`
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no endpoint has been saved, or the settings store
    /// error if it cannot be read. Failures during the run are in the report.
    pub async fn run_configured(
        &self,
        settings: &dyn SettingsStore,
        actor: ActorId,
    ) -> Result<SyncReport> {
        let endpoint = settings
            .load_endpoint()
            .await?
            .ok_or_else(|| Error::Config {
                message: "no endpoint has been configured".to_string(),
                key: Some("endpoint".to_string()),
            })?;

        Ok(self.run(&endpoint, actor).await)
    }

    /// Fetch the endpoint's stories and materialize every unseen one
    ///
    /// Never returns early with an error: fatal failures end the run and are reported in
    /// [`SyncReport::error`], alongside what was created before them.
    pub async fn run(&self, endpoint: &str, actor: ActorId) -> SyncReport {
        // Same form the request URL is built from
        let endpoint = endpoint.trim();
        let mut report = SyncReport::new(endpoint, actor);
        info!(endpoint, actor = %actor, "Starting story sync");

        report.enter(SyncState::Fetching);
        let payload = match self.client.fetch(endpoint).await {
            Ok(payload) => payload,
            Err(e) => return report.abort(e),
        };

        report.enter(SyncState::Parsing);
        let stories = match parse_stories(&payload) {
            Ok(stories) => stories,
            Err(e) => return report.abort(e),
        };
        report.fetched = stories.len();
        debug!(endpoint, stories = stories.len(), "Parsed story collection");

        report.enter(SyncState::ProcessingRecords);
        for story in stories {
            report.attempted += 1;

            match self.process_story(&story, actor).await {
                Ok(StoryOutcome::AlreadyExists) => {
                    report.skipped_existing += 1;
                }
                Ok(StoryOutcome::Created { item, thumbnail }) => {
                    report.created.push(item);
                    match thumbnail {
                        ThumbnailOutcome::Attached(_) => report.thumbnails_attached += 1,
                        ThumbnailOutcome::Failed => report.thumbnail_failures += 1,
                        ThumbnailOutcome::Absent => {}
                    }
                }
                Err(e) => match self.policy_for(&e) {
                    FailurePolicy::SkipRecord => {
                        warn!(
                            story_id = %story.id,
                            source_url = %story.web_url,
                            error = %e,
                            "Skipping story"
                        );
                        report.failed_records.push(RecordFailure {
                            story_id: story.id.clone(),
                            source_url: story.web_url.clone(),
                            message: e.to_string(),
                        });
                    }
                    FailurePolicy::AbortRun => return report.abort(e),
                },
            }
        }

        report.enter(SyncState::Done);
        info!(
            endpoint,
            fetched = report.fetched,
            created = report.created.len(),
            skipped = report.skipped_existing,
            failed = report.failed_records.len(),
            "Story sync complete"
        );
        report
    }

    /// Failure policy for an error raised while processing one story
    fn policy_for(&self, err: &Error) -> FailurePolicy {
        match err {
            Error::Validation(_) => self.policy.on_invalid_timestamp,
            Error::RecordPersist { .. } => self.policy.on_item_failure,
            e if e.is_fatal() => FailurePolicy::AbortRun,
            _ => FailurePolicy::SkipRecord,
        }
    }

    /// Lookup, then skip or resolve the thumbnail and write the item
    ///
    /// # Errors
    /// - [`Error::Validation`] if `published_at` is unusable (nothing is written)
    /// - [`Error::RecordPersist`] if the content item cannot be written
    /// - the store's error if the existence lookup fails
    pub async fn process_story(&self, story: &StoryRecord, actor: ActorId) -> Result<StoryOutcome> {
        if self.exists(&story.web_url).await? {
            debug!(story_id = %story.id, source_url = %story.web_url, "Story already imported");
            return Ok(StoryOutcome::AlreadyExists);
        }

        // Before any write, so a bad timestamp never leaves an asset behind
        let created_at = derive_created_at(&story.published_at)?;

        let thumbnail = self.resolve_thumbnail(story).await;
        let item = self
            .create_item(story, thumbnail.asset(), created_at, actor)
            .await?;

        Ok(StoryOutcome::Created { item, thumbnail })
    }

    /// Whether an item with exactly this source URL already exists
    pub async fn exists(&self, source_url: &str) -> Result<bool> {
        self.store.exists(source_url).await
    }

    /// Create the story's thumbnail asset if it has a cover photo
    ///
    /// Never fails: a store error is logged and reported as [`ThumbnailOutcome::Failed`].
    pub async fn resolve_thumbnail(&self, story: &StoryRecord) -> ThumbnailOutcome {
        let Some(uri) = story.thumbnail_url.as_deref() else {
            return ThumbnailOutcome::Absent;
        };

        let asset = NewThumbnailAsset {
            source_uri: uri.to_string(),
            alt_text: story.title.clone(),
        };

        match self.store.create_asset(&asset).await {
            Ok(id) => {
                debug!(story_id = %story.id, asset_id = %id, "Created thumbnail asset");
                ThumbnailOutcome::Attached(id)
            }
            Err(e) => {
                let err = Error::AssetPersist {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                };
                warn!(story_id = %story.id, error = %err, "Continuing without thumbnail");
                ThumbnailOutcome::Failed
            }
        }
    }

    /// Write the content item for a story
    ///
    /// If the write fails, an asset created for it in this step is discarded so that
    /// no thumbnail is left without its item.
    ///
    /// # Errors
    /// Returns [`Error::RecordPersist`] if the store rejects the item
    pub async fn create_item(
        &self,
        story: &StoryRecord,
        thumbnail: Option<AssetId>,
        created_at: DateTime<Utc>,
        owner: ActorId,
    ) -> Result<ContentItemId> {
        let item = NewContentItem::from_story(story, thumbnail, created_at, owner);

        match self.store.create_item(&item).await {
            Ok(id) => {
                info!(
                    story_id = %story.id,
                    item_id = %id,
                    source_url = %story.web_url,
                    "Created content item"
                );
                Ok(id)
            }
            Err(e) => {
                if let Some(asset_id) = thumbnail
                    && let Err(discard_err) = self.store.discard_asset(asset_id).await
                {
                    warn!(
                        asset_id = %asset_id,
                        error = %discard_err,
                        "Failed to discard thumbnail asset of unwritten item"
                    );
                }

                Err(Error::RecordPersist {
                    source_url: story.web_url.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
