//! Keyed request/response cache shared by list views and mutations.
//!
//! The cache is an explicit, cloneable handle: every clone sees the same
//! entries. Concurrent fetches of one key share a single request, and
//! invalidation only flags entries stale so readers holding a value are
//! never affected.

use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, sync::Arc};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use tokio::{
    sync::{broadcast, Mutex},
    time::Instant,
};
use tracing::debug;

use crate::{error::QueryError, query_key::CacheKey};

const CACHE_EVENT_CAPACITY: usize = 256;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, QueryError>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<K> {
    /// A fetch for the key finished (successfully or not).
    Updated(K),
    /// These keys were marked stale.
    Invalidated(Vec<K>),
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery<V> {
    pub value: Option<V>,
    pub error: Option<QueryError>,
    pub stale: bool,
    pub fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<V> CachedQuery<V> {
    pub fn is_fresh(&self) -> bool {
        self.value.is_some() && self.error.is_none() && !self.stale
    }
}

struct Entry<V> {
    value: Option<V>,
    error: Option<QueryError>,
    stale: bool,
    updated_at: Option<Instant>,
    invalidated_epoch: u64,
    /// Id of the fetch whose result is currently stored.
    applied_fetch: Option<u64>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            stale: false,
            updated_at: None,
            invalidated_epoch: 0,
            applied_fetch: None,
        }
    }
}

struct InflightFetch<V> {
    id: u64,
    started_epoch: u64,
    future: SharedFetch<V>,
}

struct CacheState<K, V> {
    entries: HashMap<K, Entry<V>>,
    inflight: HashMap<K, InflightFetch<V>>,
    epoch: u64,
    next_fetch_id: u64,
}

impl<K: Clone + Eq + Hash, V: Clone> CacheState<K, V> {
    fn complete(
        &mut self,
        fetch_id: u64,
        key: &K,
        started_epoch: u64,
        result: &Result<V, QueryError>,
    ) {
        if self
            .inflight
            .get(key)
            .is_some_and(|inflight| inflight.id == fetch_id)
        {
            self.inflight.remove(key);
        }

        let entry = self.entries.entry(key.clone()).or_default();
        // A newer request for the key already landed.
        if entry.applied_fetch.is_some_and(|applied| applied > fetch_id) {
            return;
        }
        entry.applied_fetch = Some(fetch_id);
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.error = None;
                // An invalidation that raced the request leaves the data stale.
                entry.stale = entry.invalidated_epoch > started_epoch;
            }
            Err(err) => {
                entry.error = Some(err.clone());
            }
        }
        entry.updated_at = Some(Instant::now());
    }
}

pub struct QueryCache<K, V> {
    state: Arc<Mutex<CacheState<K, V>>>,
    events: broadcast::Sender<CacheEvent<K>>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        }
    }
}

impl<K, V> Default for QueryCache<K, V>
where
    K: CacheKey + Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> QueryCache<K, V>
where
    K: CacheKey + Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CACHE_EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                inflight: HashMap::new(),
                epoch: 0,
                next_fetch_id: 0,
            })),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent<K>> {
        self.events.subscribe()
    }

    /// Stores `value` as fresh data for `key` without a request.
    pub async fn seed(&self, key: K, value: V) {
        let mut guard = self.state.lock().await;
        let entry = guard.entries.entry(key).or_default();
        entry.value = Some(value);
        entry.error = None;
        entry.stale = false;
        entry.updated_at = Some(Instant::now());
    }

    pub async fn peek(&self, key: &K) -> Option<CachedQuery<V>> {
        let guard = self.state.lock().await;
        let fetching = guard.inflight.contains_key(key);
        match guard.entries.get(key) {
            Some(entry) => Some(CachedQuery {
                value: entry.value.clone(),
                error: entry.error.clone(),
                stale: entry.stale,
                fetching,
                updated_at: entry.updated_at,
            }),
            None if fetching => Some(CachedQuery {
                value: None,
                error: None,
                stale: false,
                fetching,
                updated_at: None,
            }),
            None => None,
        }
    }

    pub async fn is_fresh(&self, key: &K) -> bool {
        self.peek(key)
            .await
            .is_some_and(|cached| cached.is_fresh())
    }

    /// Returns fresh cached data for `key`, fetching only when the entry is
    /// missing, stale or failed.
    pub async fn ensure<F, Fut>(&self, key: K, fetcher: F) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, QueryError>> + Send + 'static,
    {
        {
            let guard = self.state.lock().await;
            if let Some(entry) = guard.entries.get(&key) {
                if !entry.stale && entry.error.is_none() {
                    if let Some(value) = &entry.value {
                        debug!("cache: hit key={key:?}");
                        return Ok(value.clone());
                    }
                }
            }
        }
        self.fetch(key, fetcher).await
    }

    /// Fetches `key`, joining an in-flight request for the same key instead
    /// of issuing a second one. A request that started before the key's
    /// latest invalidation is not joined; a new one replaces it.
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, QueryError>> + Send + 'static,
    {
        let future = {
            let mut guard = self.state.lock().await;
            let invalidated_epoch = guard
                .entries
                .get(&key)
                .map_or(0, |entry| entry.invalidated_epoch);
            let existing = guard
                .inflight
                .get(&key)
                .filter(|inflight| inflight.started_epoch >= invalidated_epoch)
                .map(|inflight| inflight.future.clone());

            match existing {
                Some(future) => {
                    debug!("cache: joining in-flight fetch key={key:?}");
                    future
                }
                None => {
                    if guard.inflight.contains_key(&key) {
                        debug!("cache: replacing in-flight fetch started before invalidation key={key:?}");
                    }
                    let fetch_id = guard.next_fetch_id;
                    guard.next_fetch_id += 1;
                    let started_epoch = guard.epoch;

                    let state = Arc::clone(&self.state);
                    let events = self.events.clone();
                    let task_key = key.clone();
                    let request = fetcher();
                    let future = async move {
                        let result = request.await;
                        state
                            .lock()
                            .await
                            .complete(fetch_id, &task_key, started_epoch, &result);
                        let _ = events.send(CacheEvent::Updated(task_key));
                        result
                    }
                    .boxed()
                    .shared();

                    guard.inflight.insert(
                        key,
                        InflightFetch {
                            id: fetch_id,
                            started_epoch,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        future.await
    }

    /// Marks every entry whose key matches `predicate` stale, including keys
    /// that only have a request in flight. Returns the number of keys hit.
    pub async fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let invalidated = {
            let mut guard = self.state.lock().await;
            guard.epoch += 1;
            let epoch = guard.epoch;

            let inflight_only: Vec<K> = guard
                .inflight
                .keys()
                .filter(|key| predicate(key) && !guard.entries.contains_key(*key))
                .cloned()
                .collect();
            for key in inflight_only {
                guard.entries.insert(key, Entry::default());
            }

            let mut invalidated = Vec::new();
            for (key, entry) in guard.entries.iter_mut() {
                if predicate(key) {
                    entry.stale = true;
                    entry.invalidated_epoch = epoch;
                    invalidated.push(key.clone());
                }
            }
            invalidated
        };

        let count = invalidated.len();
        if count > 0 {
            debug!("cache: invalidated keys={count}");
            let _ = self.events.send(CacheEvent::Invalidated(invalidated));
        }
        count
    }

    pub async fn invalidate_namespace(&self, namespace: &str) -> usize {
        self.invalidate_where(|key| key.namespace() == namespace)
            .await
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
