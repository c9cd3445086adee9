//! Story payload decoding.

use crate::error::{Error, Result};
use crate::types::StoryRecord;
use serde::Deserialize;

/// `{ "stories": { "stories": [...] } }`
#[derive(Debug, Deserialize)]
struct StoriesResponse {
    stories: StoriesPage,
}

#[derive(Debug, Deserialize)]
struct StoriesPage {
    stories: Vec<ApiStory>,
}

#[derive(Debug, Deserialize)]
struct ApiStory {
    id: ApiStoryId,
    title: String,
    urls: StoryUrls,
    #[serde(default)]
    cover_photo: Option<CoverPhoto>,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct StoryUrls {
    story_web: String,
}

#[derive(Debug, Deserialize)]
struct CoverPhoto {
    #[serde(default)]
    url: Option<String>,
}

/// Story ids are numeric today; strings are accepted so the id stays opaque
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiStoryId {
    Number(serde_json::Number),
    Text(String),
}

impl From<ApiStoryId> for String {
    fn from(id: ApiStoryId) -> Self {
        match id {
            ApiStoryId::Number(n) => n.to_string(),
            ApiStoryId::Text(s) => s,
        }
    }
}

impl From<ApiStory> for StoryRecord {
    fn from(story: ApiStory) -> Self {
        let thumbnail_url = story
            .cover_photo
            .and_then(|photo| photo.url)
            .filter(|url| !url.trim().is_empty());

        StoryRecord {
            id: story.id.into(),
            title: story.title,
            web_url: story.urls.story_web,
            thumbnail_url,
            published_at: story.published_at,
        }
    }
}

/// Decode a story collection response into records, preserving source order.
///
/// # Errors
/// Returns [`Error::Parse`] if the payload is not JSON, lacks the `stories.stories`
/// array, or any story lacks `id`, `title`, `urls.story_web` or `published_at`.
/// A malformed payload never yields a partial sequence.
pub fn parse_stories(payload: &[u8]) -> Result<Vec<StoryRecord>> {
    let response: StoriesResponse = serde_json::from_slice(payload)
        .map_err(|e| Error::Parse(format!("unexpected story payload: {}", e)))?;

    Ok(response
        .stories
        .stories
        .into_iter()
        .map(StoryRecord::from)
        .collect())
}
