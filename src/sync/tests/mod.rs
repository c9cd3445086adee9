use super::*;
use crate::db::Database;
use crate::error::DatabaseError;
use async_trait::async_trait;
use chrono::TimeZone;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "harbor-photos";
const ACTOR: ActorId = ActorId(7);

/// Store call, in the order the engine made it
#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Exists(String),
    CreateAsset(String),
    CreateItem(String),
    DiscardAsset(AssetId),
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<Call>,
    items: Vec<NewContentItem>,
    assets: Vec<NewThumbnailAsset>,
    fail_assets: HashSet<String>,
    fail_items: HashSet<String>,
}

/// In-memory content store that records calls and fails on request
#[derive(Default)]
struct RecordingStore {
    state: Mutex<RecordingState>,
}

impl RecordingStore {
    fn failing_asset(self, uri: &str) -> Self {
        self.state.lock().unwrap().fail_assets.insert(uri.to_string());
        self
    }

    fn failing_item(self, source_url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_items
            .insert(source_url.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn items(&self) -> Vec<NewContentItem> {
        self.state.lock().unwrap().items.clone()
    }

    fn assets(&self) -> Vec<NewThumbnailAsset> {
        self.state.lock().unwrap().assets.clone()
    }
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn exists(&self, source_url: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Exists(source_url.to_string()));
        Ok(state.items.iter().any(|item| item.source_url == source_url))
    }

    async fn create_asset(&self, asset: &NewThumbnailAsset) -> Result<AssetId> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateAsset(asset.source_uri.clone()));
        if state.fail_assets.contains(&asset.source_uri) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "disk I/O error".into(),
            )));
        }
        state.assets.push(asset.clone());
        Ok(AssetId(state.assets.len() as i64))
    }

    async fn create_item(&self, item: &NewContentItem) -> Result<ContentItemId> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateItem(item.source_url.clone()));
        if state.fail_items.contains(&item.source_url) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "database is locked".into(),
            )));
        }
        state.items.push(item.clone());
        Ok(ContentItemId(state.items.len() as i64))
    }

    async fn discard_asset(&self, id: AssetId) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call::DiscardAsset(id));
        Ok(())
    }
}

fn story(id: i64, url: &str, thumbnail: Option<&str>) -> Value {
    json!({
        "id": id,
        "title": format!("Story {}", id),
        "urls": {"story_web": url},
        "cover_photo": thumbnail.map(|u| json!({"url": u})),
        "published_at": "2020-05-01T12:30:00-05:00",
    })
}

async fn serve(stories: Vec<Value>) -> MockServer {
    let mock_server = MockServer::start().await;
    let body = json!({"stories": {"page": 1, "stories": stories}});

    Mock::given(method("GET"))
        .and(path(format!("/api/3/site/{}/stories", ENDPOINT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    mock_server
}

fn config_for(mock_server: &MockServer) -> Config {
    let mut config = Config::default();
    config.source.base_url = mock_server.uri();
    config
}

fn engine(config: &Config, store: Arc<dyn ContentStore>) -> StorySync {
    StorySync::new(config, store).unwrap()
}

async fn setup_db() -> (Arc<Database>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (Arc::new(db), temp_file)
}

#[tokio::test]
async fn test_run_creates_items_in_source_order() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", Some("https://cdn.exposure.co/a.jpg")),
        story(2, "https://exposure.co/b", None),
        story(3, "https://exposure.co/c", Some("https://cdn.exposure.co/c.jpg")),
    ])
    .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(report.is_success(), "run failed: {:?}", report.error);
    assert_eq!(report.state, SyncState::Done);
    assert_eq!(report.aborted_in, None);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.created.len(), 3);
    assert_eq!(report.thumbnails_attached, 2);
    assert_eq!(report.unprocessed(), 0);

    let urls: Vec<_> = store.items().into_iter().map(|i| i.source_url).collect();
    assert_eq!(
        urls,
        vec![
            "https://exposure.co/a",
            "https://exposure.co/b",
            "https://exposure.co/c"
        ]
    );
}

#[tokio::test]
async fn test_item_fields_are_derived_from_story() {
    let mock_server = serve(vec![story(
        1,
        "https://exposure.co/a",
        Some("https://cdn.exposure.co/a.jpg"),
    )])
    .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    sync.run(ENDPOINT, ACTOR).await.into_result().unwrap();

    let item = &store.items()[0];
    assert_eq!(item.story_id, "1");
    assert_eq!(item.title, "Story 1");
    assert_eq!(item.source_url, "https://exposure.co/a");
    assert_eq!(item.owner, ACTOR);
    assert_eq!(item.thumbnail, Some(AssetId(1)));
    assert_eq!(
        item.created_at,
        Utc.with_ymd_and_hms(2020, 5, 1, 17, 30, 0).unwrap()
    );
    assert!(item.published);
    assert!(!item.promoted);
    assert!(!item.commentable);

    let asset = &store.assets()[0];
    assert_eq!(asset.source_uri, "https://cdn.exposure.co/a.jpg");
    assert_eq!(asset.alt_text, "Story 1");
}

#[tokio::test]
async fn test_story_without_cover_photo_makes_no_asset_call() {
    let mock_server = serve(vec![story(1, "https://exposure.co/a", None)]).await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(report.is_success());
    assert_eq!(
        store.calls(),
        vec![
            Call::Exists("https://exposure.co/a".into()),
            Call::CreateItem("https://exposure.co/a".into()),
        ]
    );
    assert_eq!(store.items()[0].thumbnail, None);
}

#[tokio::test]
async fn test_asset_failure_is_absorbed() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", Some("https://cdn.exposure.co/broken.jpg")),
        story(2, "https://exposure.co/b", Some("https://cdn.exposure.co/b.jpg")),
    ])
    .await;
    let store = Arc::new(RecordingStore::default().failing_asset("https://cdn.exposure.co/broken.jpg"));
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(report.is_success(), "run failed: {:?}", report.error);
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.thumbnail_failures, 1);
    assert_eq!(report.thumbnails_attached, 1);

    let items = store.items();
    assert_eq!(items[0].source_url, "https://exposure.co/a");
    assert_eq!(items[0].thumbnail, None);
    assert_eq!(items[1].thumbnail, Some(AssetId(1)));
}

#[tokio::test]
async fn test_item_write_failure_aborts_remaining_stories() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", None),
        story(2, "https://exposure.co/b", Some("https://cdn.exposure.co/b.jpg")),
        story(3, "https://exposure.co/c", None),
        story(4, "https://exposure.co/d", None),
    ])
    .await;
    let store = Arc::new(RecordingStore::default().failing_item("https://exposure.co/b"));
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(!report.is_success());
    assert_eq!(report.state, SyncState::Aborted);
    assert_eq!(report.aborted_in, Some(SyncState::ProcessingRecords));
    assert_eq!(report.fetched, 4);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.unprocessed(), 2);
    assert_eq!(report.created.len(), 1);
    match &report.error {
        Some(Error::RecordPersist { source_url, .. }) => {
            assert_eq!(source_url, "https://exposure.co/b")
        }
        other => panic!("expected record persist error, got {:?}", other),
    }

    // Stories after the failure are never looked up; the orphaned asset is discarded
    let calls = store.calls();
    assert_eq!(
        calls,
        vec![
            Call::Exists("https://exposure.co/a".into()),
            Call::CreateItem("https://exposure.co/a".into()),
            Call::Exists("https://exposure.co/b".into()),
            Call::CreateAsset("https://cdn.exposure.co/b.jpg".into()),
            Call::CreateItem("https://exposure.co/b".into()),
            Call::DiscardAsset(AssetId(1)),
        ]
    );

    // Earlier writes stay
    assert_eq!(store.items().len(), 1);
}

#[tokio::test]
async fn test_item_write_failure_can_be_skipped_by_policy() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", None),
        story(2, "https://exposure.co/b", None),
        story(3, "https://exposure.co/c", None),
    ])
    .await;
    let store = Arc::new(RecordingStore::default().failing_item("https://exposure.co/b"));
    let mut config = config_for(&mock_server);
    config.sync.on_item_failure = FailurePolicy::SkipRecord;
    let sync = engine(&config, store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(report.is_success());
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failed_records.len(), 1);
    assert_eq!(report.failed_records[0].story_id, "2");
    assert_eq!(report.failed_records[0].source_url, "https://exposure.co/b");
}

#[tokio::test]
async fn test_invalid_timestamp_skips_only_that_story() {
    let mut bad = story(2, "https://exposure.co/b", Some("https://cdn.exposure.co/b.jpg"));
    bad["published_at"] = json!("2020-05-01T12:30:00Z");
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", None),
        bad,
        story(3, "https://exposure.co/c", None),
    ])
    .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert!(report.is_success());
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.failed_records.len(), 1);
    assert_eq!(report.failed_records[0].source_url, "https://exposure.co/b");
    assert!(report.failed_records[0].message.contains("2020-05-01T12:30:00Z"));

    // Nothing written for the rejected story, not even its thumbnail
    assert!(store.assets().is_empty());
    assert!(
        !store
            .calls()
            .contains(&Call::CreateItem("https://exposure.co/b".into()))
    );
}

#[tokio::test]
async fn test_invalid_timestamp_aborts_under_abort_policy() {
    let mut bad = story(1, "https://exposure.co/a", None);
    bad["published_at"] = json!("not a date");
    let mock_server = serve(vec![bad, story(2, "https://exposure.co/b", None)]).await;
    let store = Arc::new(RecordingStore::default());
    let mut config = config_for(&mock_server);
    config.sync.on_invalid_timestamp = FailurePolicy::AbortRun;
    let sync = engine(&config, store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert_eq!(report.state, SyncState::Aborted);
    assert!(matches!(report.error, Some(Error::Validation(_))));
    assert!(store.items().is_empty());
}

#[tokio::test]
async fn test_network_failure_aborts_in_fetching() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert_eq!(report.state, SyncState::Aborted);
    assert_eq!(report.aborted_in, Some(SyncState::Fetching));
    assert!(matches!(report.error, Some(Error::Network(_))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_aborts_in_parsing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stories": {}})))
        .mount(&mock_server)
        .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert_eq!(report.aborted_in, Some(SyncState::Parsing));
    assert!(matches!(report.error, Some(Error::Parse(_))));
    assert_eq!(report.fetched, 0);
    assert!(store.calls().is_empty());

    assert!(matches!(report.into_result(), Err(Error::Parse(_))));
}

#[tokio::test]
async fn test_urls_differing_by_trailing_slash_are_distinct() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", None),
        story(2, "https://exposure.co/a/", None),
    ])
    .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.skipped_existing, 0);
}

#[tokio::test]
async fn test_duplicate_url_within_one_payload_is_created_once() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", None),
        story(2, "https://exposure.co/a", None),
    ])
    .await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(ENDPOINT, ACTOR).await;

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(store.items()[0].story_id, "1");
}

#[tokio::test]
async fn test_second_run_against_database_creates_nothing() {
    let mock_server = serve(vec![
        story(1, "https://exposure.co/a", Some("https://cdn.exposure.co/a.jpg")),
        story(2, "https://exposure.co/b", None),
    ])
    .await;
    let (db, _temp_file) = setup_db().await;
    let sync = engine(&config_for(&mock_server), db.clone());

    let first = sync.run(ENDPOINT, ACTOR).await;
    assert!(first.is_success(), "first run failed: {:?}", first.error);
    assert_eq!(first.created.len(), 2);

    let second = sync.run(ENDPOINT, ACTOR).await;
    assert!(second.is_success(), "second run failed: {:?}", second.error);
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_existing, 2);

    assert_eq!(db.count_content_items().await.unwrap(), 2);
    assert_eq!(db.count_thumbnail_assets().await.unwrap(), 1);

    let row = db
        .get_content_item_by_source_url("https://exposure.co/a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.created_at(), Utc.with_ymd_and_hms(2020, 5, 1, 17, 30, 0).unwrap());
    assert_eq!(row.owner(), ACTOR);
    let asset = db
        .get_thumbnail_asset(row.thumbnail().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.source_uri, "https://cdn.exposure.co/a.jpg");
}

#[tokio::test]
async fn test_report_names_the_endpoint_that_was_fetched() {
    let mock_server = serve(vec![story(1, "https://exposure.co/a", None)]).await;
    let store = Arc::new(RecordingStore::default());
    let sync = engine(&config_for(&mock_server), store.clone());

    let report = sync.run(&format!("  {}\n", ENDPOINT), ACTOR).await;

    assert!(report.is_success(), "run failed: {:?}", report.error);
    assert_eq!(report.endpoint, ENDPOINT);
    assert_eq!(report.created.len(), 1);
}

#[tokio::test]
async fn test_run_configured_uses_saved_endpoint() {
    let mock_server = serve(vec![story(1, "https://exposure.co/a", None)]).await;
    let (db, _temp_file) = setup_db().await;
    let sync = engine(&config_for(&mock_server), db.clone());

    db.set_endpoint(ENDPOINT).await.unwrap();
    let report = sync.run_configured(&*db, ACTOR).await.unwrap();

    assert_eq!(report.endpoint, ENDPOINT);
    assert_eq!(report.created.len(), 1);
}

#[tokio::test]
async fn test_run_configured_without_endpoint_is_config_error() {
    let mock_server = MockServer::start().await;
    let (db, _temp_file) = setup_db().await;
    let sync = engine(&config_for(&mock_server), db.clone());

    match sync.run_configured(&*db, ACTOR).await {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("endpoint")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = Config::default();
    config.source.max_redirects = 0;

    let result = StorySync::new(&config, Arc::new(RecordingStore::default()));
    assert!(matches!(result, Err(Error::Config { .. })));
}
