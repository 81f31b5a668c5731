//! Notes list query orchestration.
//!
//! [`NotesOrchestrator`] owns the list's UI state (raw and debounced search
//! text, page, tag filter), derives the [`QueryKey`] from it and resolves
//! that key through the shared [`NotesCache`]. Views observe it through a
//! `watch` channel of [`ListSnapshot`]s and re-derive their output from
//! the latest snapshot.

use std::{sync::Arc, time::Duration};

use shared::{domain::NoteTag, protocol::NotesPage};
use tokio::{
    sync::{broadcast::error::RecvError, watch, Mutex, Notify},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    api::NotesApi,
    cache::CacheEvent,
    config::ClientSettings,
    debounce::Debouncer,
    error::{NotesClientError, QueryError},
    query_key::QueryKey,
    NotesCache,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub debounce: Duration,
    pub per_page: u32,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        (&ClientSettings::default()).into()
    }
}

impl From<&ClientSettings> for OrchestratorOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            debounce: settings.debounce_interval(),
            per_page: settings.per_page.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing to show yet.
    Loading,
    /// The current key failed; no data is shown.
    Error,
    /// Data is present, possibly a placeholder from an earlier key.
    Success,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub key: QueryKey,
    pub raw_search: String,
    pub status: QueryStatus,
    pub data: Option<NotesPage>,
    /// `data` belongs to an earlier key and is kept until the current one resolves.
    pub is_placeholder: bool,
    pub is_fetching: bool,
    pub error: Option<QueryError>,
}

impl ListSnapshot {
    pub fn page(&self) -> u32 {
        self.key.page()
    }

    pub fn tag(&self) -> Option<NoteTag> {
        self.key.tag()
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// A request is running while existing data stays on screen.
    pub fn is_background_fetching(&self) -> bool {
        self.is_fetching && self.is_success()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh cached data was applied without a request.
    Cached,
    Fetched,
    Failed(QueryError),
    /// The key changed while resolving; nothing was applied.
    Superseded,
}

struct ListState {
    raw_search: String,
    search: Debouncer<String>,
    page: u32,
    tag: Option<NoteTag>,
    status: QueryStatus,
    data: Option<NotesPage>,
    data_key: Option<QueryKey>,
    error: Option<QueryError>,
    fetching: bool,
    /// Bumped by every sync that applies or fetches; only the latest one may apply.
    sync_seq: u64,
}

impl ListState {
    fn key(&self) -> QueryKey {
        QueryKey::notes(self.search.value().clone(), self.page, self.tag)
    }

    fn snapshot(&self) -> ListSnapshot {
        let key = self.key();
        ListSnapshot {
            is_placeholder: self.data.is_some() && self.data_key.as_ref() != Some(&key),
            key,
            raw_search: self.raw_search.clone(),
            status: self.status,
            data: self.data.clone(),
            is_fetching: self.fetching,
            error: self.error.clone(),
        }
    }

    fn begin_sync(&mut self) -> u64 {
        self.sync_seq += 1;
        self.sync_seq
    }

    fn apply_success(&mut self, key: QueryKey, page: NotesPage) {
        self.status = QueryStatus::Success;
        self.data = Some(page);
        self.data_key = Some(key);
        self.error = None;
        self.fetching = false;
    }

    fn apply_failure(&mut self, err: QueryError) {
        self.status = QueryStatus::Error;
        self.data = None;
        self.data_key = None;
        self.error = Some(err);
        self.fetching = false;
    }
}

pub struct NotesOrchestrator {
    api: Arc<dyn NotesApi>,
    cache: NotesCache,
    per_page: u32,
    inner: Mutex<ListState>,
    snapshots: watch::Sender<ListSnapshot>,
    wake: Notify,
}

impl NotesOrchestrator {
    /// Creates the list state for `tag`. When `initial` is given it is
    /// seeded into the cache as fresh data for the first page with an
    /// empty search, so mounting does not request that key again.
    pub async fn mount(
        api: Arc<dyn NotesApi>,
        cache: NotesCache,
        options: OrchestratorOptions,
        tag: Option<NoteTag>,
        initial: Option<NotesPage>,
    ) -> Arc<Self> {
        let mut state = ListState {
            raw_search: String::new(),
            search: Debouncer::new(String::new(), options.debounce),
            page: 1,
            tag,
            status: QueryStatus::Loading,
            data: None,
            data_key: None,
            error: None,
            fetching: false,
            sync_seq: 0,
        };

        if let Some(page) = initial {
            let key = state.key();
            cache.seed(key.clone(), page.clone()).await;
            state.apply_success(key, page);
        }

        let (snapshots, _) = watch::channel(state.snapshot());
        Arc::new(Self {
            api,
            cache,
            per_page: options.per_page.max(1),
            inner: Mutex::new(state),
            snapshots,
            wake: Notify::new(),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.snapshots.borrow().clone()
    }

    pub async fn current_key(&self) -> QueryKey {
        self.inner.lock().await.key()
    }

    pub async fn next_debounce_deadline(&self) -> Option<Instant> {
        self.inner.lock().await.search.deadline()
    }

    fn publish(&self, state: &ListState) {
        let next = state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Records a search edit. The page drops back to 1 immediately; the
    /// text itself reaches the key only once the debounce interval passes
    /// without another edit.
    pub async fn set_search_text(&self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        {
            let mut state = self.inner.lock().await;
            state.raw_search = text.clone();
            state.page = 1;
            state.search.push(text, now);
            self.publish(&state);
        }
        self.wake.notify_one();
    }

    pub async fn set_page(&self, page: u32) -> Result<(), NotesClientError> {
        if page == 0 {
            return Err(NotesClientError::InvalidPage(page));
        }
        {
            let mut state = self.inner.lock().await;
            state.page = page;
            self.publish(&state);
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Applies a tag filter change coming from the route. A different tag
    /// resets the page to 1; the same tag is a no-op.
    pub async fn set_tag(&self, tag: Option<NoteTag>) {
        {
            let mut state = self.inner.lock().await;
            if state.tag == tag {
                return;
            }
            state.tag = tag;
            state.page = 1;
            self.publish(&state);
        }
        self.wake.notify_one();
    }

    pub async fn set_route_slug<S: AsRef<str>>(&self, slug: &[S]) -> Result<(), NotesClientError> {
        let tag = NoteTag::from_route_slug(slug)?;
        self.set_tag(tag).await;
        Ok(())
    }

    /// Commits the pending search text if its debounce deadline has passed.
    /// Returns true when the key changed.
    pub async fn tick(&self, now: Instant) -> bool {
        let mut state = self.inner.lock().await;
        let committed = state.search.poll(now);
        if committed {
            debug!("notes list: search settled key={}", state.key());
            self.publish(&state);
        }
        committed
    }

    /// Commits the pending search text without waiting.
    pub async fn flush_search(&self) -> bool {
        let mut state = self.inner.lock().await;
        let committed = state.search.flush();
        if committed {
            self.publish(&state);
        }
        committed
    }

    /// Resolves the current key. Fresh cache entries are applied directly;
    /// otherwise a fetch runs while the previous data stays visible. A
    /// result whose key is no longer current, or that a later sync has
    /// overtaken, is not applied.
    pub async fn sync(&self) -> SyncOutcome {
        let key = self.inner.lock().await.key();
        let cached = self.cache.peek(&key).await;

        if let Some(cached) = &cached {
            if cached.is_fresh() {
                if let Some(page) = cached.value.clone() {
                    let mut state = self.inner.lock().await;
                    if state.key() != key {
                        return SyncOutcome::Superseded;
                    }
                    state.begin_sync();
                    state.apply_success(key, page);
                    self.publish(&state);
                    return SyncOutcome::Cached;
                }
            }
        }

        let seq = {
            let mut state = self.inner.lock().await;
            if state.key() != key {
                return SyncOutcome::Superseded;
            }
            let seq = state.begin_sync();
            state.fetching = true;
            match cached.and_then(|cached| cached.value) {
                Some(stale) => {
                    state.status = QueryStatus::Success;
                    state.data = Some(stale);
                    state.data_key = Some(key.clone());
                    state.error = None;
                }
                None if state.data.is_none() => {
                    state.status = QueryStatus::Loading;
                    state.error = None;
                }
                None => {}
            }
            self.publish(&state);
            seq
        };

        let api = Arc::clone(&self.api);
        let query = key.to_list_query(self.per_page);
        let result = self
            .cache
            .ensure(key.clone(), move || async move {
                api.fetch_notes(query).await.map_err(QueryError::from)
            })
            .await;

        let mut state = self.inner.lock().await;
        if state.key() != key || state.sync_seq != seq {
            debug!("notes list: dropping superseded result key={key}");
            return SyncOutcome::Superseded;
        }
        match result {
            Ok(page) => {
                info!(
                    "notes list: loaded key={} notes={} total_pages={}",
                    key,
                    page.notes.len(),
                    page.total_pages
                );
                state.apply_success(key, page);
                self.publish(&state);
                SyncOutcome::Fetched
            }
            Err(err) => {
                warn!("notes list: fetch failed key={} error={}", key, err);
                state.apply_failure(err.clone());
                self.publish(&state);
                SyncOutcome::Failed(err)
            }
        }
    }

    fn spawn_sync(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.sync().await;
        });
    }

    /// Runs the list reactively: commits settled search text on its
    /// deadline, resolves the key whenever it changes, and re-fetches in
    /// the background when the current key is invalidated. Abort the
    /// handle to stop it.
    pub fn spawn_driver(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut events = self.cache.subscribe();

        tokio::spawn(async move {
            let mut synced_key = this.current_key().await;
            this.spawn_sync();

            loop {
                let deadline = this.next_debounce_deadline().await;
                tokio::select! {
                    _ = sleep_until_deadline(deadline) => {
                        this.tick(Instant::now()).await;
                    }
                    _ = this.wake.notified() => {}
                    event = events.recv() => match event {
                        Ok(CacheEvent::Invalidated(keys)) => {
                            let current = this.current_key().await;
                            if keys.contains(&current) {
                                debug!("notes list: refetching invalidated key={current}");
                                synced_key = current;
                                this.spawn_sync();
                            }
                            continue;
                        }
                        Ok(CacheEvent::Updated(_)) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("notes list: missed cache events skipped={skipped}");
                            synced_key = this.current_key().await;
                            this.spawn_sync();
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                let current = this.current_key().await;
                if current != synced_key {
                    synced_key = current;
                    this.spawn_sync();
                }
            }
        })
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
