//! Shared cache of query results
//!
//! Every key carries a generation that is bumped on every write (`set` or
//! `invalidate`). A fetch remembers the generation it started at and its
//! result is only stored if nothing was written in the meantime, so a slow
//! fetch can never overwrite a newer value.

use futures::{channel::mpsc, StreamExt as _};
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};
use trainer_shared::{id::UserId, organization::UserOrganization, session::Session};
use trainer_time::{Clock, Seconds, SystemClock, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Session,
    UserHasOrganization(UserId),
    Organization,
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Session(Option<Arc<Session>>),
    HasOrganization(bool),
    Organization(Option<UserOrganization>),
}

/// Proof that a fetch was started, needed to store its result
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    clock: Arc<dyn Clock>,
}

/// Notifies of keys that changed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct CacheSubscription {
    rx: mpsc::UnboundedReceiver<QueryKey>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<QueryKey, Entry>,
    generations: HashMap<QueryKey, u64>,
    /// Generation each in flight fetch was started at
    in_flight: HashMap<QueryKey, u64>,
    listeners: Vec<mpsc::UnboundedSender<QueryKey>>,
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    updated_at: Timestamp,
    is_invalidated: bool,
}

impl CachedValue {
    pub fn into_session(self) -> Option<Option<Arc<Session>>> {
        match self {
            Self::Session(session) => Some(session),
            _ => None,
        }
    }

    pub fn into_has_organization(self) -> Option<bool> {
        match self {
            Self::HasOrganization(flag) => Some(flag),
            _ => None,
        }
    }

    pub fn into_organization(self) -> Option<Option<UserOrganization>> {
        match self {
            Self::Organization(organization) => Some(organization),
            _ => None,
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CacheInner {
    fn generation(&self, key: &QueryKey) -> u64 {
        self.generations.get(key).copied().unwrap_or_default()
    }

    fn bump(&mut self, key: &QueryKey) -> u64 {
        let generation = self.generations.entry(key.clone()).or_default();
        *generation += 1;
        *generation
    }

    fn notify(&mut self, key: &QueryKey) {
        self.listeners
            .retain(|tx| tx.unbounded_send(key.clone()).is_ok());
    }
}

impl QueryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Default::default(),
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The last stored value, even if it is stale or invalidated
    pub fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.inner
            .lock()
            .expect("mutex poisoned")
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` unconditionally (last write wins)
    #[tracing::instrument(skip(self, value))]
    pub fn set(&self, key: QueryKey, value: CachedValue) {
        let updated_at = self.now();
        let mut guard = self.inner.lock().expect("mutex poisoned");
        guard.bump(&key);
        guard.in_flight.remove(&key); // Any running fetch is now outdated
        guard.entries.insert(
            key.clone(),
            Entry {
                value,
                updated_at,
                is_invalidated: false,
            },
        );
        guard.notify(&key);
    }

    /// Keeps the value for display but forces the next read to fetch again
    #[tracing::instrument(skip(self))]
    pub fn invalidate(&self, key: &QueryKey) {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        guard.bump(key);
        guard.in_flight.remove(key);
        if let Some(entry) = guard.entries.get_mut(key) {
            entry.is_invalidated = true;
        }
        guard.notify(key);
    }

    /// Invalidates every key (stored or in flight) that matches `predicate`
    pub fn invalidate_where<P>(&self, predicate: P)
    where
        P: Fn(&QueryKey) -> bool,
    {
        let keys: HashSet<QueryKey> = {
            let guard = self.inner.lock().expect("mutex poisoned");
            guard
                .entries
                .keys()
                .chain(guard.in_flight.keys())
                .filter(|key| predicate(key))
                .cloned()
                .collect()
        };
        for key in keys {
            self.invalidate(&key);
        }
    }

    /// Returns `true` if there is no usable value and no fetch running.
    ///
    /// With `stale_after` set, values older than that also need a fetch.
    pub fn needs_fetch(&self, key: &QueryKey, stale_after: Option<Seconds>) -> bool {
        let now = self.now();
        let guard = self.inner.lock().expect("mutex poisoned");
        if guard.in_flight.contains_key(key) {
            return false;
        }
        match guard.entries.get(key) {
            None => true,
            Some(entry) if entry.is_invalidated => true,
            Some(entry) => match stale_after {
                None => false,
                Some(stale_after) => now
                    .seconds_since(entry.updated_at)
                    .map_or(false, |age| age >= stale_after),
            },
        }
    }

    /// Registers a fetch for `key`. Returns `None` if one is already running.
    pub fn begin_fetch(&self, key: &QueryKey) -> Option<FetchTicket> {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        if guard.in_flight.contains_key(key) {
            return None;
        }
        let generation = guard.generation(key);
        guard.in_flight.insert(key.clone(), generation);
        Some(FetchTicket {
            key: key.clone(),
            generation,
        })
    }

    /// Starts a fetch even if one is running, the running one will be ignored
    pub fn force_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        let generation = guard.bump(key);
        guard.in_flight.insert(key.clone(), generation);
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Stores the fetched value unless the key was written since the fetch
    /// started. Returns `true` if the value was stored.
    #[tracing::instrument(skip(self, value))]
    pub fn complete_fetch(&self, ticket: FetchTicket, value: CachedValue) -> bool {
        let updated_at = self.now();
        let mut guard = self.inner.lock().expect("mutex poisoned");
        if guard.in_flight.get(&ticket.key) == Some(&ticket.generation) {
            guard.in_flight.remove(&ticket.key);
        }
        if guard.generation(&ticket.key) != ticket.generation {
            warn!(
                ?ticket,
                current = guard.generation(&ticket.key),
                "discarding outdated fetch result"
            );
            return false;
        }
        debug!(?ticket.key, "fetch result stored");
        guard.entries.insert(
            ticket.key.clone(),
            Entry {
                value,
                updated_at,
                is_invalidated: false,
            },
        );
        guard.notify(&ticket.key);
        true
    }

    pub fn subscribe(&self) -> CacheSubscription {
        let (tx, rx) = mpsc::unbounded();
        self.inner
            .lock()
            .expect("mutex poisoned")
            .listeners
            .push(tx);
        CacheSubscription { rx }
    }
}

impl CacheSubscription {
    /// Waits for the next change. `None` once the cache is gone.
    pub async fn next_change(&mut self) -> Option<QueryKey> {
        self.rx.next().await
    }

    /// Drains all the keys that changed since the last call
    pub fn changed_keys(&mut self) -> Vec<QueryKey> {
        let mut result = Vec::new();
        while let Ok(Some(key)) = self.rx.try_next() {
            result.push(key);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use trainer_time::ManualClock;

    use super::*;

    fn cache() -> (QueryCache, ManualClock) {
        let clock = ManualClock::new(Timestamp::from_secs_since_epoch(10_000));
        (QueryCache::new(Arc::new(clock.clone())), clock)
    }

    fn user(n: u128) -> UserId {
        uuid::Uuid::from_u128(n).into()
    }

    fn has_org(cache: &QueryCache, key: &QueryKey) -> Option<bool> {
        cache.get(key).and_then(CachedValue::into_has_organization)
    }

    #[test]
    fn fetch_result_stored() {
        let (cache, _) = cache();
        let key = QueryKey::UserHasOrganization(user(1));
        assert!(cache.needs_fetch(&key, None));

        let ticket = cache.begin_fetch(&key).unwrap();
        assert!(!cache.needs_fetch(&key, None), "fetch is in flight");
        assert!(cache.begin_fetch(&key).is_none(), "no duplicate fetches");

        assert!(cache.complete_fetch(ticket, CachedValue::HasOrganization(true)));
        assert_eq!(has_org(&cache, &key), Some(true));
        assert!(cache.begin_fetch(&key).is_some(), "finished fetch releases the key");
    }

    #[test]
    fn set_during_fetch_wins() {
        let (cache, _) = cache();
        let key = QueryKey::UserHasOrganization(user(1));
        let ticket = cache.begin_fetch(&key).unwrap();

        cache.set(key.clone(), CachedValue::HasOrganization(true));

        assert!(!cache.complete_fetch(ticket, CachedValue::HasOrganization(false)));
        assert_eq!(has_org(&cache, &key), Some(true));
    }

    #[test]
    fn invalidate_during_fetch_discards_and_allows_refetch() {
        let (cache, _) = cache();
        let key = QueryKey::Organization;
        let ticket = cache.begin_fetch(&key).unwrap();

        cache.invalidate(&key);

        assert!(cache.needs_fetch(&key, None));
        assert!(!cache.complete_fetch(ticket, CachedValue::Organization(None)));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn staleness_window() {
        let (cache, clock) = cache();
        let key = QueryKey::UserHasOrganization(user(1));
        let window = Some(Seconds::from_minutes(5));
        cache.set(key.clone(), CachedValue::HasOrganization(true));

        clock.advance(Seconds::new(299));
        assert!(!cache.needs_fetch(&key, window));

        clock.advance(Seconds::new(1));
        assert!(cache.needs_fetch(&key, window));
        assert!(!cache.needs_fetch(&key, None), "no window means never stale");
    }

    #[test]
    fn invalidated_value_still_readable() {
        let (cache, _) = cache();
        let key = QueryKey::UserHasOrganization(user(1));
        cache.set(key.clone(), CachedValue::HasOrganization(false));

        cache.invalidate(&key);

        assert_eq!(has_org(&cache, &key), Some(false));
        assert!(cache.needs_fetch(&key, None));
    }

    #[test]
    fn force_fetch_outdates_running_fetch() {
        let (cache, _) = cache();
        let key = QueryKey::UserHasOrganization(user(1));
        let first = cache.begin_fetch(&key).unwrap();

        let second = cache.force_fetch(&key);

        assert!(!cache.complete_fetch(first, CachedValue::HasOrganization(false)));
        assert!(cache.begin_fetch(&key).is_none(), "forced fetch still running");
        assert!(cache.complete_fetch(second, CachedValue::HasOrganization(true)));
        assert_eq!(has_org(&cache, &key), Some(true));
    }

    #[test]
    fn invalidate_where_only_touches_matching_keys() {
        let (cache, _) = cache();
        let a = QueryKey::UserHasOrganization(user(1));
        let b = QueryKey::UserHasOrganization(user(2));
        cache.set(a.clone(), CachedValue::HasOrganization(true));
        cache.set(b.clone(), CachedValue::HasOrganization(true));
        cache.set(QueryKey::Session, CachedValue::Session(None));

        cache.invalidate_where(|key| matches!(key, QueryKey::UserHasOrganization(_)));

        assert!(cache.needs_fetch(&a, None));
        assert!(cache.needs_fetch(&b, None));
        assert!(!cache.needs_fetch(&QueryKey::Session, None));
    }

    #[test]
    fn subscribers_hear_about_writes() {
        let (cache, _) = cache();
        let mut subscription = cache.subscribe();

        cache.set(QueryKey::Session, CachedValue::Session(None));
        cache.invalidate(&QueryKey::Organization);

        assert_eq!(
            subscription.changed_keys(),
            [QueryKey::Session, QueryKey::Organization]
        );
        assert!(subscription.changed_keys().is_empty());
    }
}
