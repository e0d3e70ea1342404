use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Event;

/// Opaque continuation marker for the next page of events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// `None` at the end of the stream.
    pub next: Option<PageToken>,
}

/// Source of event pages. `page = None` asks for the first page.
#[async_trait]
pub trait PageFetcher: Send + Sync + fmt::Debug {
    async fn fetch(&self, page: Option<&PageToken>, force_refresh: bool) -> Result<EventPage>;
}

/// Which activity stream to page through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Events performed by a user
    User(String),
    /// Events a user receives (their news feed)
    Received(String),
    Repository { owner: String, name: String },
    Organization(String),
    Public,
}

impl FeedSource {
    /// Feeds scoped to a single repository don't repeat its name on every row.
    pub fn report_repository(&self) -> bool {
        !matches!(self, FeedSource::Repository { .. })
    }

    pub fn api_path(&self) -> String {
        use urlencoding::encode;

        match self {
            FeedSource::User(login) => format!("/users/{}/events", encode(login)),
            FeedSource::Received(login) => format!("/users/{}/received_events", encode(login)),
            FeedSource::Repository { owner, name } => {
                format!("/repos/{}/{}/events", encode(owner), encode(name))
            }
            FeedSource::Organization(org) => format!("/orgs/{}/events", encode(org)),
            FeedSource::Public => "/events".to_string(),
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::User(login) => write!(f, "{}'s activity", login),
            FeedSource::Received(login) => write!(f, "{}'s news feed", login),
            FeedSource::Repository { owner, name } => write!(f, "{}/{}", owner, name),
            FeedSource::Organization(org) => write!(f, "{} organization", org),
            FeedSource::Public => write!(f, "public events"),
        }
    }
}
