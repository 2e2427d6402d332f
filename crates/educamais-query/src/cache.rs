//! Query cache with request de-duplication, stale-while-revalidate and
//! LRU eviction.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::QueryConfig;
use crate::entry::{Entry, EntryState, InFlight, SharedFetch};
use crate::retry::{Retryable, with_retry};

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Keys currently held.
    pub entries: usize,
    /// Reads answered from a fresh value.
    pub hits: u64,
    /// Reads answered from a stale value while a refetch ran.
    pub stale_hits: u64,
    /// Reads that had to wait for a fetch.
    pub misses: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Fetches that failed after retries.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

struct CacheInner<K: Hash + Eq, V, E> {
    entries: Mutex<LruCache<K, Entry<V, E>>>,
    config: QueryConfig,
    counters: Counters,
}

impl<K, V, E> CacheInner<K, V, E>
where
    K: Hash + Eq + Debug,
    V: Clone,
    E: Clone + Display,
{
    /// Record the outcome of a fetch started at `generation`.
    fn complete(&self, key: &K, generation: u64, result: &Result<V, E>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.peek_mut(key) {
            entry.finish(generation);
            match result {
                Ok(value) => entry.store(value.clone(), generation),
                Err(e) if generation == entry.generation => entry.error = Some(e.clone()),
                Err(_) => {}
            }
        }
        match result {
            Ok(_) => trace!(?key, generation, "Query fetch completed"),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                debug!(?key, error = %e, "Query fetch failed");
            }
        }
    }
}

/// What a read decided to do while holding the lock.
enum Read<V, E> {
    Value(V),
    Wait(SharedFetch<V, E>),
}

/// Key-addressed cache of fetch results.
///
/// - A fresh value is returned without calling the fetcher.
/// - A value past its stale time is returned at once while one background
///   refetch runs.
/// - A value invalidated since it was fetched is never returned by `fetch`;
///   the caller waits for a fetch started after the invalidation.
/// - Otherwise the caller waits; concurrent callers for the same key share
///   one in-flight fetch.
/// - Failed fetches are retried for retryable errors only, and never
///   discard the last good value.
///
/// Cloning is cheap; clones share the same entries.
pub struct QueryCache<K: Hash + Eq, V, E> {
    inner: Arc<CacheInner<K, V, E>>,
}

impl<K: Hash + Eq, V, E> Clone for QueryCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq, V, E> Debug for QueryCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.entries.lock().len())
            .finish()
    }
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Retryable + Display + Send + Sync + 'static,
{
    pub fn new(config: QueryConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(LruCache::new(cap)),
                config,
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Read `key`, fetching with `fetcher` when needed.
    ///
    /// Must be called from within a Tokio runtime; fetches run as spawned
    /// tasks so they complete even if every caller stops waiting.
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let read = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.get_or_insert_mut(key.clone(), Entry::new);
            let counters = &self.inner.counters;
            let state = entry.state(self.inner.config.stale_time);
            let outdated = entry.is_outdated();

            match (state, entry.value.clone()) {
                (EntryState::Fresh, Some(value)) => {
                    trace!(?key, "Query cache hit");
                    counters.hits.fetch_add(1, Ordering::Relaxed);
                    Read::Value(value)
                }
                (EntryState::Fetching, Some(value)) if entry.error.is_none() && !outdated => {
                    counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                    Read::Value(value)
                }
                (EntryState::Stale, Some(value)) if !outdated => {
                    debug!(?key, "Serving expired value, refetching");
                    counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                    self.start(key.clone(), entry, fetcher);
                    Read::Value(value)
                }
                _ => {
                    counters.misses.fetch_add(1, Ordering::Relaxed);
                    match &entry.in_flight {
                        Some(in_flight) if in_flight.generation == entry.generation => {
                            trace!(?key, "Joining in-flight fetch");
                            Read::Wait(in_flight.fetch.clone())
                        }
                        _ => {
                            debug!(?key, outdated, "Query cache miss");
                            Read::Wait(self.start(key.clone(), entry, fetcher))
                        }
                    }
                }
            }
        };

        match read {
            Read::Value(value) => Ok(value),
            Read::Wait(fetch) => fetch.await,
        }
    }

    /// Fetch `key` now, ignoring freshness, and wait for the result.
    ///
    /// Joins an in-flight fetch if it was started after the last
    /// invalidation.
    pub async fn refetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let fetch = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.get_or_insert_mut(key.clone(), Entry::new);
            self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
            match &entry.in_flight {
                Some(in_flight) if in_flight.generation == entry.generation => {
                    in_flight.fetch.clone()
                }
                _ => self.start(key, entry, fetcher),
            }
        };
        fetch.await
    }

    /// Start a fetch for `entry` and record it as in flight.
    fn start<F, Fut>(&self, key: K, entry: &mut Entry<V, E>, fetcher: F) -> SharedFetch<V, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let generation = entry.generation;
        let inner = Arc::clone(&self.inner);
        inner.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let fetch = async move {
            let result = with_retry(&inner.config, &fetcher).await;
            inner.complete(&key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        tokio::spawn(fetch.clone());
        fetch
    }

    /// Fetch a new value for `key` derived from the current one.
    ///
    /// `plan` sees the current value if it is fresh (`None` otherwise) and
    /// returns the fetcher producing the replacement, or `None` when there
    /// is nothing to fetch. The fetch runs as the key's in-flight fetch:
    /// it is retried like any other, concurrent callers join it, and an
    /// invalidation while it runs leaves the key stale. If a fetch started
    /// after the last invalidation is already running, it is joined and
    /// `plan` is not called.
    pub async fn extend<P, F, Fut>(&self, key: K, plan: P) -> Option<Result<V, E>>
    where
        P: FnOnce(Option<&V>) -> Option<F>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let fetch = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.get_or_insert_mut(key.clone(), Entry::new);
            match &entry.in_flight {
                Some(in_flight) if in_flight.generation == entry.generation => {
                    trace!(?key, "Joining in-flight fetch");
                    in_flight.fetch.clone()
                }
                _ => {
                    let current = match entry.state(self.inner.config.stale_time) {
                        EntryState::Fresh => entry.value.as_ref(),
                        _ => None,
                    };
                    let fetcher = plan(current)?;
                    self.start(key, entry, fetcher)
                }
            }
        };
        Some(fetch.await)
    }

    /// Store `value` for `key` as freshly fetched.
    pub fn set(&self, key: K, value: V) {
        let mut entries = self.inner.entries.lock();
        let entry = entries.get_or_insert_mut(key, Entry::new);
        let generation = entry.generation;
        entry.store(value, generation);
    }

    /// Mark every key matching `predicate` as stale.
    ///
    /// Nothing is refetched until the next read. Fetches already in flight
    /// for those keys will not make them fresh. Returns the number of keys
    /// invalidated.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut entries = self.inner.entries.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                entry.invalidate();
                count += 1;
            }
        }
        debug!(count, "Invalidated queries");
        count
    }

    /// Drop `key` from the cache.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.entries.lock().pop(key).is_some()
    }

    /// Drop every key.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    /// Last good value for `key`, without fetching or touching LRU order.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner
            .entries
            .lock()
            .peek(key)
            .and_then(|e| e.value.clone())
    }

    /// Error from the last failed fetch of `key`, if it has not since
    /// succeeded.
    pub fn last_error(&self, key: &K) -> Option<E> {
        self.inner
            .entries
            .lock()
            .peek(key)
            .and_then(|e| e.error.clone())
    }

    pub fn state(&self, key: &K) -> EntryState {
        self.inner
            .entries
            .lock()
            .peek(key)
            .map(|e| e.state(self.inner.config.stale_time))
            .unwrap_or(EntryState::Empty)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            entries: self.len(),
            hits: counters.hits.load(Ordering::Relaxed),
            stale_hits: counters.stale_hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            fetches: counters.fetches.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }
}
