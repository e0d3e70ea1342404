use async_trait::async_trait;
use octocrab::{FromResponse, Octocrab, Page};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::fetcher::{EventPage, FeedSource, PageFetcher, PageToken};
use crate::types::{Event, RawEvent};

pub const DEFAULT_PER_PAGE: u32 = 100;

/// Authenticated GitHub connection: the account lookup and the factory for
/// event fetchers.
pub struct GitHub {
    client: Octocrab,
    api_url: String,
    base_path: String,
}

impl std::fmt::Debug for GitHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHub")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl From<octocrab::Error> for FeedError {
    fn from(err: octocrab::Error) -> Self {
        FeedError::Api(err.to_string())
    }
}

impl GitHub {
    pub fn new(api_url: &str, token: String) -> Result<Self> {
        let base_path = Url::parse(api_url)
            .map_err(|e| FeedError::Config(format!("invalid api_url '{}': {}", api_url, e)))?
            .path()
            .trim_end_matches('/')
            .to_string();

        let client = Octocrab::builder()
            .base_uri(api_url)
            .map_err(|e| FeedError::Config(e.to_string()))?
            .personal_token(token)
            .build()
            .map_err(|e| FeedError::Auth(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            base_path,
        })
    }

    /// Login of the authenticated account.
    pub async fn current_user(&self) -> Result<String> {
        let user = self.client.current().user().await?;
        Ok(user.login)
    }

    pub fn events(&self, source: FeedSource, per_page: u32) -> GitHubEvents {
        GitHubEvents::new(self.client.clone(), self.base_path.clone(), source, per_page)
    }
}

/// Pages through one REST `events` endpoint. The continuation token is the
/// `rel="next"` link octocrab reads from the `Link` header, kept relative to
/// the API base.
pub struct GitHubEvents {
    client: Octocrab,
    base_path: String,
    source: FeedSource,
    per_page: u32,
}

impl std::fmt::Debug for GitHubEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubEvents")
            .field("source", &self.source)
            .field("per_page", &self.per_page)
            .finish_non_exhaustive()
    }
}

impl GitHubEvents {
    fn new(client: Octocrab, base_path: String, source: FeedSource, per_page: u32) -> Self {
        Self {
            client,
            base_path,
            source,
            per_page,
        }
    }

    fn first_page_route(&self) -> String {
        format!("{}?per_page={}&page=1", self.source.api_path(), self.per_page)
    }
}

#[async_trait]
impl PageFetcher for GitHubEvents {
    async fn fetch(&self, page: Option<&PageToken>, force_refresh: bool) -> Result<EventPage> {
        let route = match page {
            Some(token) => token.as_str().to_string(),
            None => self.first_page_route(),
        };
        debug!(%route, force_refresh, "fetching events page");

        let mut headers = HeaderMap::new();
        if force_refresh {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        let response = self
            .client
            ._get_with_headers(route.as_str(), Some(headers))
            .await?;
        let status = response.status();
        if !status.is_success() {
            let rate_limited = is_rate_limited(status, response.headers());
            let text = self
                .client
                .body_to_string(response)
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(status_error(status, rate_limited, text));
        }

        let page = Page::<RawEvent>::from_response(response)
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))?;
        let next = page
            .next
            .as_ref()
            .and_then(|uri| uri.path_and_query())
            .map(|pq| PageToken::new(strip_base_path(&self.base_path, pq.as_str())));
        debug!(count = page.items.len(), has_next = next.is_some(), "events page received");

        Ok(EventPage {
            events: page.items.into_iter().map(Event::from).collect(),
            next,
        })
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
}

fn status_error(status: StatusCode, rate_limited: bool, text: String) -> FeedError {
    if rate_limited {
        FeedError::RateLimited(text)
    } else if status == StatusCode::UNAUTHORIZED {
        FeedError::Auth(format!("GitHub rejected the token: {}", text))
    } else {
        FeedError::Api(format!("GitHub API {}: {}", status, text))
    }
}

/// Octocrab joins every request path onto the base URI, so a path that
/// already carries the base prefix (GitHub Enterprise `/api/v3`) loses it.
fn strip_base_path(base_path: &str, path: &str) -> String {
    if base_path.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(base_path) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}
