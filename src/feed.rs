use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::block::RenderedEvent;
use crate::error::Result;
use crate::fetcher::{EventPage, PageFetcher, PageToken};
use crate::render::{render_page, RenderContext};
use crate::types::Event;

/// An event paired with its rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub event: Event,
    pub rendered: RenderedEvent,
}

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was applied; `added` entries became visible.
    Loaded { added: usize },
    /// `load_more` with no continuation token. Nothing changed.
    EndOfStream,
    /// Another load is in flight. Nothing changed.
    Busy,
    /// A forced full load replaced this one before it finished. Its result
    /// was discarded.
    Superseded,
}

/// Immutable view of the feed at one point in time.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub entries: Arc<Vec<FeedEntry>>,
    pub has_more: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    entries: Arc<Vec<FeedEntry>>,
    more: Option<PageToken>,
    next_ticket: u64,
    in_flight: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    cancel: CancellationToken,
}

impl FeedState {
    fn begin(&mut self) -> (u64, CancellationToken) {
        self.next_ticket += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            ticket: self.next_ticket,
            cancel: cancel.clone(),
        });
        (self.next_ticket, cancel)
    }

    fn owns(&self, ticket: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.ticket == ticket)
    }
}

enum Apply {
    Replace,
    Append,
}

/// Paginated, appendable collection of rendered events.
///
/// At most one load runs at a time. A forced full load cancels whatever is
/// in flight; every other request made while a load is running is answered
/// with [`LoadOutcome::Busy`]. The state lock is never held across a fetch.
#[derive(Debug)]
pub struct EventFeed {
    fetcher: Arc<dyn PageFetcher>,
    ctx: RenderContext,
    state: Mutex<FeedState>,
}

impl EventFeed {
    pub fn new(fetcher: Arc<dyn PageFetcher>, ctx: RenderContext) -> Self {
        Self {
            fetcher,
            ctx,
            state: Mutex::new(FeedState::default()),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = lock(&self.state);
        FeedSnapshot {
            entries: Arc::clone(&state.entries),
            has_more: state.more.is_some(),
        }
    }

    #[cfg(test)]
    fn is_loading(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// Fetch the first page and replace the whole collection with it.
    pub async fn load_full(&self, force_refresh: bool) -> Result<LoadOutcome> {
        let (guard, cancel) = {
            let mut state = lock(&self.state);
            if let Some(current) = &state.in_flight {
                if !force_refresh {
                    debug!(ticket = current.ticket, "full load skipped, load in flight");
                    return Ok(LoadOutcome::Busy);
                }
                debug!(ticket = current.ticket, "superseding in-flight load");
                current.cancel.cancel();
            }
            let (ticket, cancel) = state.begin();
            (LoadGuard::new(&self.state, ticket), cancel)
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(LoadOutcome::Superseded),
            fetched = self.fetcher.fetch(None, force_refresh) => fetched,
        };

        self.apply(guard.ticket, fetched, Apply::Replace)
    }

    /// Fetch the page after the current continuation token and append it.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let (guard, cancel, token) = {
            let mut state = lock(&self.state);
            if let Some(current) = &state.in_flight {
                debug!(ticket = current.ticket, "load more skipped, load in flight");
                return Ok(LoadOutcome::Busy);
            }
            let Some(token) = state.more.clone() else {
                return Ok(LoadOutcome::EndOfStream);
            };
            let (ticket, cancel) = state.begin();
            (LoadGuard::new(&self.state, ticket), cancel, token)
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(LoadOutcome::Superseded),
            fetched = self.fetcher.fetch(Some(&token), false) => fetched,
        };

        self.apply(guard.ticket, fetched, Apply::Append)
    }

    fn apply(&self, ticket: u64, fetched: Result<EventPage>, mode: Apply) -> Result<LoadOutcome> {
        let rendered = fetched.map(|page| (render_page(page.events, &self.ctx), page.next));

        let mut state = lock(&self.state);
        if !state.owns(ticket) {
            warn!(ticket, "discarding result of superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        state.in_flight = None;

        let (entries, more) = rendered?;
        let added = entries.len();
        match mode {
            Apply::Replace => state.entries = Arc::new(entries),
            Apply::Append => Arc::make_mut(&mut state.entries).extend(entries),
        }
        state.more = more;

        debug!(
            ticket,
            added,
            total = state.entries.len(),
            has_more = state.more.is_some(),
            "feed page applied"
        );
        Ok(LoadOutcome::Loaded { added })
    }
}

/// Releases the in-flight slot if the owning load is dropped before it
/// applies its result.
struct LoadGuard<'a> {
    state: &'a Mutex<FeedState>,
    ticket: u64,
}

impl<'a> LoadGuard<'a> {
    fn new(state: &'a Mutex<FeedState>, ticket: u64) -> Self {
        Self { state, ticket }
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.owns(self.ticket) {
            state.in_flight = None;
        }
    }
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::FeedError;
    use crate::types::{EventPayload, RepoRef, UserRef, WatchPayload};

    enum Scripted {
        Ready(Result<EventPage>),
        Gated(oneshot::Receiver<EventPage>),
    }

    /// Replays scripted pages and records the tokens and refresh flags it
    /// was asked for.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Scripted>>,
        requested: Mutex<Vec<Option<String>>>,
        forced: Mutex<Vec<bool>>,
    }

    impl std::fmt::Debug for ScriptedFetcher {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ScriptedFetcher").finish_non_exhaustive()
        }
    }

    impl ScriptedFetcher {
        fn push(&self, step: Scripted) {
            self.script.lock().unwrap().push_back(step);
        }

        fn page(&self, events: Vec<Event>, next: Option<&str>) {
            self.push(Scripted::Ready(Ok(EventPage {
                events,
                next: next.map(PageToken::new),
            })));
        }

        fn gate(&self) -> oneshot::Sender<EventPage> {
            let (tx, rx) = oneshot::channel();
            self.push(Scripted::Gated(rx));
            tx
        }

        fn requested(&self) -> Vec<Option<String>> {
            self.requested.lock().unwrap().clone()
        }

        fn forced(&self) -> Vec<bool> {
            self.forced.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, page: Option<&PageToken>, force_refresh: bool) -> Result<EventPage> {
            self.requested
                .lock()
                .unwrap()
                .push(page.map(|p| p.as_str().to_string()));
            self.forced.lock().unwrap().push(force_refresh);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Scripted::Ready(result)) => result,
                Some(Scripted::Gated(rx)) => rx
                    .await
                    .map_err(|_| FeedError::Api("gate dropped".to_string())),
                None => Err(FeedError::Api("script exhausted".to_string())),
            }
        }
    }

    fn watch(id: &str) -> Event {
        Event {
            id: id.to_string(),
            actor: Some(UserRef {
                login: "alice".to_string(),
            }),
            repo: Some(RepoRef {
                name: Some("bob/repo".to_string()),
            }),
            created_at: Utc::now(),
            payload: EventPayload::Watch(WatchPayload {
                action: "started".to_string(),
            }),
        }
    }

    fn hidden(id: &str) -> Event {
        Event {
            payload: EventPayload::Download,
            ..watch(id)
        }
    }

    fn ids(feed: &EventFeed) -> Vec<String> {
        feed.snapshot().entries.iter().map(|e| e.event.id.clone()).collect()
    }

    fn feed_with(fetcher: &Arc<ScriptedFetcher>) -> Arc<EventFeed> {
        Arc::new(EventFeed::new(
            Arc::clone(fetcher) as Arc<dyn PageFetcher>,
            RenderContext::default(),
        ))
    }

    async fn wait_until_loading(feed: &EventFeed) {
        while !feed.is_loading() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let feed = feed_with(&fetcher);
        let snapshot = feed.snapshot();
        assert!(snapshot.entries.is_empty());
        assert!(!snapshot.has_more);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn load_full_then_more_concatenates_pages() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1"), hidden("2"), watch("3")], Some("page-2"));
        fetcher.page(vec![hidden("4"), watch("5")], None);
        let feed = feed_with(&fetcher);

        assert_eq!(
            feed.load_full(false).await.unwrap(),
            LoadOutcome::Loaded { added: 2 }
        );
        assert!(feed.snapshot().has_more);

        assert_eq!(
            feed.load_more().await.unwrap(),
            LoadOutcome::Loaded { added: 1 }
        );
        assert_eq!(ids(&feed), vec!["1", "3", "5"]);
        assert!(!feed.snapshot().has_more);
        assert_eq!(
            fetcher.requested(),
            vec![None, Some("page-2".to_string())]
        );
    }

    #[tokio::test]
    async fn load_more_at_end_of_stream_is_noop() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1")], None);
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();
        let before = feed.snapshot().entries;

        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::EndOfStream);
        assert!(Arc::ptr_eq(&before, &feed.snapshot().entries));
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn load_more_before_any_load_is_noop() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let feed = feed_with(&fetcher);
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::EndOfStream);
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn full_reload_replaces_contents() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1"), watch("2")], Some("page-2"));
        fetcher.page(vec![watch("9")], None);
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();
        feed.load_full(true).await.unwrap();

        assert_eq!(ids(&feed), vec!["9"]);
        assert!(!feed.snapshot().has_more);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_previous_contents() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1")], Some("page-2"));
        fetcher.push(Scripted::Ready(Err(FeedError::RateLimited(
            "try later".to_string(),
        ))));
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();
        let err = feed.load_more().await.unwrap_err();

        assert!(matches!(err, FeedError::RateLimited(_)));
        assert_eq!(ids(&feed), vec!["1"]);
        assert!(feed.snapshot().has_more);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn failed_full_load_leaves_feed_empty_and_idle() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.push(Scripted::Ready(Err(FeedError::Auth("bad token".to_string()))));
        let feed = feed_with(&fetcher);

        assert!(feed.load_full(false).await.is_err());
        assert!(feed.snapshot().entries.is_empty());
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn requests_during_a_load_are_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let gate = fetcher.gate();
        let feed = feed_with(&fetcher);

        let background = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.load_full(false).await })
        };
        wait_until_loading(&feed).await;

        assert_eq!(feed.load_full(false).await.unwrap(), LoadOutcome::Busy);
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Busy);

        gate.send(EventPage {
            events: vec![watch("1")],
            next: Some(PageToken::new("page-2")),
        })
        .unwrap();

        assert_eq!(
            background.await.unwrap().unwrap(),
            LoadOutcome::Loaded { added: 1 }
        );
        assert_eq!(ids(&feed), vec!["1"]);
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn forced_refresh_supersedes_in_flight_load_more() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1")], Some("page-2"));
        let late_page = fetcher.gate();
        fetcher.page(vec![watch("fresh")], Some("fresh-2"));
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();

        let stale = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.load_more().await })
        };
        wait_until_loading(&feed).await;

        assert_eq!(
            feed.load_full(true).await.unwrap(),
            LoadOutcome::Loaded { added: 1 }
        );
        assert_eq!(stale.await.unwrap().unwrap(), LoadOutcome::Superseded);

        // The superseded page arriving now changes nothing.
        let _ = late_page.send(EventPage {
            events: vec![watch("stale")],
            next: None,
        });
        assert_eq!(ids(&feed), vec!["fresh"]);
        assert!(feed.snapshot().has_more);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn refresh_flag_reaches_the_fetcher() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1")], Some("page-2"));
        fetcher.page(vec![watch("2")], Some("page-3"));
        fetcher.page(vec![watch("3")], None);
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();
        feed.load_full(true).await.unwrap();
        feed.load_more().await.unwrap();

        assert_eq!(fetcher.forced(), vec![false, true, false]);
        assert_eq!(
            fetcher.requested(),
            vec![None, None, Some("page-3".to_string())]
        );
    }

    #[tokio::test]
    async fn forced_refresh_supersedes_in_flight_full_load() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let late_page = fetcher.gate();
        fetcher.page(Vec::new(), None);
        let feed = feed_with(&fetcher);

        let first = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.load_full(false).await })
        };
        wait_until_loading(&feed).await;

        assert_eq!(
            feed.load_full(true).await.unwrap(),
            LoadOutcome::Loaded { added: 0 }
        );
        assert_eq!(first.await.unwrap().unwrap(), LoadOutcome::Superseded);
        assert!(!feed.is_loading());
        assert_eq!(fetcher.forced(), vec![false, true]);

        let _ = late_page.send(EventPage {
            events: vec![watch("stale")],
            next: Some(PageToken::new("stale-2")),
        });
        let snapshot = feed.snapshot();
        assert!(snapshot.entries.is_empty());
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn dropped_load_releases_the_slot() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let _gate = fetcher.gate();
        fetcher.page(vec![watch("2")], None);
        let feed = feed_with(&fetcher);

        let background = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.load_full(false).await })
        };
        wait_until_loading(&feed).await;
        background.abort();
        let _ = background.await;

        assert!(!feed.is_loading());
        assert_eq!(
            feed.load_full(false).await.unwrap(),
            LoadOutcome::Loaded { added: 1 }
        );
    }

    #[tokio::test]
    async fn snapshots_are_stable_across_appends() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(vec![watch("1")], Some("page-2"));
        fetcher.page(vec![watch("2")], None);
        let feed = feed_with(&fetcher);

        feed.load_full(false).await.unwrap();
        let snapshot = feed.snapshot();
        feed.load_more().await.unwrap();

        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.has_more);
        assert_eq!(feed.snapshot().entries.len(), 2);
    }
}
