//! Per-key cache entries.

use std::fmt;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};

/// Lifecycle state of a cached key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Never fetched.
    Empty,
    /// A fetch is in flight.
    Fetching,
    /// Holds a value inside its freshness window.
    Fresh,
    /// Holds a value that is past its window or was invalidated.
    Stale,
    /// The last fetch failed. A previous value may still be held.
    Error,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryState::Empty => "empty",
            EntryState::Fetching => "fetching",
            EntryState::Fresh => "fresh",
            EntryState::Stale => "stale",
            EntryState::Error => "error",
        };
        f.write_str(s)
    }
}

pub(crate) type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// An in-flight fetch and the generation it was started at.
pub(crate) struct InFlight<V, E> {
    pub generation: u64,
    pub fetch: SharedFetch<V, E>,
}

/// Entry stored in the cache.
///
/// `generation` is bumped by every invalidation. A value is fresh only if it
/// was fetched at the current generation and is younger than the stale time.
pub(crate) struct Entry<V, E> {
    pub value: Option<V>,
    pub value_generation: u64,
    pub fetched_at: Option<Instant>,
    pub error: Option<E>,
    pub generation: u64,
    pub in_flight: Option<InFlight<V, E>>,
}

impl<V, E> Entry<V, E> {
    pub fn new() -> Self {
        Self {
            value: None,
            value_generation: 0,
            fetched_at: None,
            error: None,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn state(&self, stale_time: Duration) -> EntryState {
        if self.in_flight.is_some() {
            return EntryState::Fetching;
        }
        if self.error.is_some() {
            return EntryState::Error;
        }
        match (&self.value, self.fetched_at) {
            (None, _) | (_, None) => EntryState::Empty,
            (Some(_), Some(at)) => {
                if self.value_generation < self.generation || at.elapsed() >= stale_time {
                    EntryState::Stale
                } else {
                    EntryState::Fresh
                }
            }
        }
    }

    /// Whether an invalidation happened after the held value was fetched.
    pub fn is_outdated(&self) -> bool {
        self.value.is_some() && self.value_generation < self.generation
    }

    /// Store a value fetched at `generation`, unless a newer one is held.
    pub fn store(&mut self, value: V, generation: u64) {
        if self.value.is_some() && generation < self.value_generation {
            return;
        }
        self.value = Some(value);
        self.value_generation = generation;
        self.fetched_at = Some(Instant::now());
        self.error = None;
    }

    /// Mark the value as outdated.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Clear the in-flight marker if it belongs to `generation`.
    pub fn finish(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
        {
            self.in_flight = None;
        }
    }
}
