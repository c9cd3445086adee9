//! Remote story API access.
//!
//! [`ApiClient`] performs the single GET a sync run needs and hands the raw body to
//! [`parse_stories`]. The collection is expected in one response; there is no paging.

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::types::StoryRecord;
use tracing::debug;
use url::Url;

mod parse;

pub use parse::parse_stories;

/// HTTP client for the story collection endpoint
pub struct ApiClient {
    /// HTTP client for fetching story collections
    http_client: reqwest::Client,

    /// Scheme and host (plus optional path prefix) of the API
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// The client speaks HTTP/1.1 only, follows at most `max_redirects` redirects,
    /// accepts gzip and deflate encoded bodies and verifies TLS certificates unless
    /// `danger_accept_invalid_certs` is set.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be created
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL {:?}: {}", config.base_url, e),
            key: Some("source.base_url".to_string()),
        })?;

        let mut builder = reqwest::Client::builder()
            .http1_only()
            .redirect(redirect_policy(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder.build().map_err(|e| Error::Config {
            message: format!("Failed to create HTTP client: {}", e),
            key: None,
        })?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Build `<base>/api/3/site/<endpoint>/stories`
    ///
    /// The endpoint is percent-encoded as a single path segment, so it cannot
    /// escape the `site/` path.
    pub fn stories_url(&self, endpoint: &str) -> Result<Url> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() || endpoint == "." || endpoint == ".." {
            return Err(Error::Config {
                message: format!("invalid endpoint: {:?}", endpoint),
                key: Some("endpoint".to_string()),
            });
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config {
                message: format!("base URL cannot carry a path: {}", self.base_url),
                key: Some("source.base_url".to_string()),
            })?
            .pop_if_empty()
            .extend(["api", "3", "site", endpoint, "stories"]);

        Ok(url)
    }

    /// Fetch the raw story collection for an endpoint
    ///
    /// # Errors
    /// Returns [`Error::Network`] on connection, TLS, redirect-limit or body read
    /// failures and on non-success HTTP statuses. No retry is attempted.
    pub async fn fetch(&self, endpoint: &str) -> Result<Vec<u8>> {
        let url = self.stories_url(endpoint)?;
        debug!(%url, "Fetching story collection");

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to fetch {}: {}", url, e)))?;

        // Check HTTP status before handing an error page to the parser
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "story API returned HTTP {}: {}",
                status.as_u16(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read story collection: {}", e)))?;

        debug!(%url, bytes = body.len(), "Fetched story collection");
        Ok(body.to_vec())
    }

    /// Fetch and decode the story collection for an endpoint
    pub async fn fetch_stories(&self, endpoint: &str) -> Result<Vec<StoryRecord>> {
        let payload = self.fetch(endpoint).await?;
        parse_stories(&payload)
    }
}

/// Follow up to `max_redirects` hops, then fail the request
fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        // `previous` holds the original URL plus every URL already redirected from
        let hops = attempt.previous().len();
        if hops > max_redirects {
            attempt.error(format!("too many redirects (limit {})", max_redirects))
        } else {
            attempt.follow()
        }
    })
}
