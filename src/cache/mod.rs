//! Prefetch cache: signature-keyed pages with staleness and tags.
//!
//! Entries are keyed by a normalized request signature (method + resolved
//! URL + body-relevant fields). Expiry is passive (checked on read) and
//! eager removal works by exact key, by URL, or by any matching tag.
//!
//! At most one in-flight prefetch exists per key: concurrent requesters
//! for the same signature attach to the same shared future. Flushing an
//! in-flight key does not cancel the network call; its result is simply
//! discarded on arrival (tracked by a per-fetch generation stamp).
//!
//! Cached pages never become the on-screen page directly: the
//! orchestrator copies them into a visit's result path, which then goes
//! through normal reconciliation.

use crate::error::{GlideError, Result};
use crate::types::{Method, Page};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default lifetime of a cached page.
pub const DEFAULT_CACHE_FOR: Duration = Duration::from_secs(30);

/// Shared handle to one prefetch result; `None` means the fetch failed.
pub type SharedPageFuture = Shared<BoxFuture<'static, Option<Page>>>;

/// Normalized signature of a prefetchable request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a signature from the request's identity-relevant fields.
    #[must_use]
    pub fn new(method: Method, url: &str, body_signature: Option<&str>) -> Self {
        match body_signature {
            Some(body) => CacheKey(format!("{} {} {}", method.as_str(), url, body)),
            None => CacheKey(format!("{} {}", method.as_str(), url)),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached page plus its staleness metadata.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Resolved URL the entry was fetched from.
    pub url: String,
    /// The cached page.
    pub page: Page,
    /// When the entry was stored.
    pub stored_at: Instant,
    /// Lifetime the entry was stored with.
    pub cache_for: Duration,
    /// Invalidation tags.
    pub tags: HashSet<String>,
}

impl CacheEntry {
    /// Whether the entry is still fresh at `now`.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.cache_for
    }
}

struct PendingFetch {
    generation: u64,
    url: String,
    tags: HashSet<String>,
    future: SharedPageFuture,
}

enum Slot {
    Ready(CacheEntry),
    Pending(PendingFetch),
}

impl Slot {
    fn url(&self) -> &str {
        match self {
            Slot::Ready(entry) => &entry.url,
            Slot::Pending(pending) => &pending.url,
        }
    }

    fn tags(&self) -> &HashSet<String> {
        match self {
            Slot::Ready(entry) => &entry.tags,
            Slot::Pending(pending) => &pending.tags,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    next_generation: u64,
    slots: HashMap<CacheKey, Slot>,
}

/// The prefetch cache. Cheap to clone; clones share storage.
#[derive(Clone, Default)]
pub struct PrefetchCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl PrefetchCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The fresh entry for `key`, or `None` if absent, in flight, or
    /// expired. Expired entries are removed on the spot.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        match inner.slots.get(key) {
            Some(Slot::Ready(entry)) => {
                if entry.is_fresh(Instant::now()) {
                    Some(entry.clone())
                } else {
                    inner.slots.remove(key);
                    None
                }
            }
            _ => None,
        }
    }

    /// Whether a prefetch for `key` is currently in flight.
    #[must_use]
    pub fn is_prefetching(&self, key: &CacheKey) -> bool {
        let inner = self.inner.lock().expect("prefetch cache poisoned");
        matches!(inner.slots.get(key), Some(Slot::Pending(_)))
    }

    /// Join the in-flight fetch for `key`, start one, or resolve
    /// immediately from a fresh entry.
    ///
    /// `make` is only invoked when a new fetch actually starts. On
    /// completion the result is stored under `key` with the given
    /// lifetime and tags, unless the key was flushed mid-flight, in
    /// which case the result is discarded.
    pub fn fetch_or_join(
        &self,
        key: &CacheKey,
        url: &str,
        cache_for: Duration,
        tags: HashSet<String>,
        make: impl FnOnce() -> BoxFuture<'static, Option<Page>>,
    ) -> SharedPageFuture {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        match inner.slots.get(key) {
            Some(Slot::Pending(pending)) => return pending.future.clone(),
            Some(Slot::Ready(entry)) if entry.is_fresh(Instant::now()) => {
                let page = entry.page.clone();
                return futures::future::ready(Some(page)).boxed().shared();
            }
            _ => {}
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;

        let cache = self.clone();
        let done_key = key.clone();
        let done_url = url.to_string();
        let done_tags = tags.clone();
        let fetch = make();
        let future: SharedPageFuture = async move {
            let page = fetch.await;
            match &page {
                Some(page) => cache.complete(
                    &done_key,
                    generation,
                    done_url,
                    page.clone(),
                    cache_for,
                    done_tags,
                ),
                None => cache.abandon(&done_key, generation),
            }
            page
        }
        .boxed()
        .shared();

        inner.slots.insert(
            key.clone(),
            Slot::Pending(PendingFetch {
                generation,
                url: url.to_string(),
                tags,
                future: future.clone(),
            }),
        );
        future
    }

    /// Store a page directly (bypassing the in-flight machinery).
    pub fn store(
        &self,
        key: &CacheKey,
        url: impl Into<String>,
        page: Page,
        cache_for: Duration,
        tags: HashSet<String>,
    ) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        inner.slots.insert(
            key.clone(),
            Slot::Ready(CacheEntry {
                url: url.into(),
                page,
                stored_at: Instant::now(),
                cache_for,
                tags,
            }),
        );
    }

    fn complete(
        &self,
        key: &CacheKey,
        generation: u64,
        url: String,
        page: Page,
        cache_for: Duration,
        tags: HashSet<String>,
    ) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        let still_ours = matches!(
            inner.slots.get(key),
            Some(Slot::Pending(pending)) if pending.generation == generation
        );
        if still_ours {
            inner.slots.insert(
                key.clone(),
                Slot::Ready(CacheEntry {
                    url,
                    page,
                    stored_at: Instant::now(),
                    cache_for,
                    tags,
                }),
            );
        } else {
            tracing::debug!(key = %key, "discarding prefetch result flushed mid-flight");
        }
    }

    fn abandon(&self, key: &CacheKey, generation: u64) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        let still_ours = matches!(
            inner.slots.get(key),
            Some(Slot::Pending(pending)) if pending.generation == generation
        );
        if still_ours {
            inner.slots.remove(key);
        }
    }

    /// Remove the entry (or in-flight fetch) for `key`.
    pub fn flush(&self, key: &CacheKey) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        inner.slots.remove(key);
    }

    /// Remove every entry fetched from `url`, regardless of signature.
    pub fn flush_url(&self, url: &str) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        inner.slots.retain(|_, slot| slot.url() != url);
    }

    /// Remove every entry whose tag set intersects `tags`.
    pub fn flush_by_tags<S: AsRef<str>>(&self, tags: &[S]) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        inner
            .slots
            .retain(|_, slot| !tags.iter().any(|t| slot.tags().contains(t.as_ref())));
    }

    /// Clear everything, including in-flight fetches.
    pub fn flush_all(&self) {
        let mut inner = self.inner.lock().expect("prefetch cache poisoned");
        inner.slots.clear();
    }

    /// Number of ready (not in-flight) entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("prefetch cache poisoned");
        inner
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether the cache holds no ready entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a cache lifetime: `"30s"`, `"500ms"`, `"1m"`, or a bare number
/// of seconds.
///
/// # Examples
///
/// ```
/// use glide_rs::cache::parse_cache_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_cache_duration("1s").unwrap(), Duration::from_secs(1));
/// assert_eq!(parse_cache_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_cache_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_cache_duration("30").unwrap(), Duration::from_secs(30));
/// ```
pub fn parse_cache_duration(value: &str) -> Result<Duration> {
    let trimmed = value.trim();

    let (num_str, scale) = if let Some(s) = trimmed.strip_suffix("ms") {
        (s, 0.001)
    } else if let Some(s) = trimmed.strip_suffix('s') {
        (s, 1.0)
    } else if let Some(s) = trimmed.strip_suffix('m') {
        (s, 60.0)
    } else {
        (trimmed, 1.0)
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| GlideError::Config(format!("invalid cache duration: {value:?}")))?;
    if num < 0.0 {
        return Err(GlideError::Config(format!(
            "negative cache duration: {value:?}"
        )));
    }
    Ok(Duration::from_secs_f64(num * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> Page {
        Page::new("Home", url)
    }

    fn key(url: &str) -> CacheKey {
        CacheKey::new(Method::Get, url, None)
    }

    fn tag_set<const N: usize>(tags: [&str; N]) -> HashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_store_and_get() {
        let cache = PrefetchCache::new();
        let k = key("/users");
        cache.store(&k, "/users", page("/users"), Duration::from_secs(30), tag_set([]));
        assert_eq!(cache.get(&k).unwrap().page.url, "/users");
        assert!(cache.get(&key("/other")).is_none());
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let cache = PrefetchCache::new();
        let k = key("/users");
        cache.store(&k, "/users", page("/users"), Duration::ZERO, tag_set([]));
        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_by_tags_intersection() {
        let cache = PrefetchCache::new();
        let ku = key("/users");
        let kp = key("/products");
        cache.store(&ku, "/users", page("/users"), DEFAULT_CACHE_FOR, tag_set(["user", "admin"]));
        cache.store(&kp, "/products", page("/products"), DEFAULT_CACHE_FOR, tag_set(["product"]));

        cache.flush_by_tags(&["user"]);
        assert!(cache.get(&ku).is_none());
        assert!(cache.get(&kp).is_some());
    }

    #[test]
    fn test_flush_url() {
        let cache = PrefetchCache::new();
        let k1 = CacheKey::new(Method::Get, "/users", None);
        let k2 = CacheKey::new(Method::Get, "/users", Some("page=2"));
        cache.store(&k1, "/users", page("/users"), DEFAULT_CACHE_FOR, tag_set([]));
        cache.store(&k2, "/users", page("/users"), DEFAULT_CACHE_FOR, tag_set([]));

        cache.flush_url("/users");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requesters_share_one_fetch() {
        let cache = PrefetchCache::new();
        let k = key("/users");
        let calls = Arc::new(Mutex::new(0u32));

        let c1 = calls.clone();
        let f1 = cache.fetch_or_join(&k, "/users", DEFAULT_CACHE_FOR, tag_set([]), move || {
            async move {
                *c1.lock().unwrap() += 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some(Page::new("Users", "/users"))
            }
            .boxed()
        });
        assert!(cache.is_prefetching(&k));

        let c2 = calls.clone();
        let f2 = cache.fetch_or_join(&k, "/users", DEFAULT_CACHE_FOR, tag_set([]), move || {
            async move {
                *c2.lock().unwrap() += 1;
                Some(Page::new("Users", "/users"))
            }
            .boxed()
        });

        let (r1, r2) = tokio::join!(f1, f2);
        assert_eq!(r1.unwrap().component, "Users");
        assert_eq!(r2.unwrap().component, "Users");
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(cache.get(&k).is_some());
        assert!(!cache.is_prefetching(&k));
    }

    #[tokio::test]
    async fn test_flush_mid_flight_discards_result() {
        let cache = PrefetchCache::new();
        let k = key("/users");

        let fut = cache.fetch_or_join(&k, "/users", DEFAULT_CACHE_FOR, tag_set([]), || {
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some(Page::new("Users", "/users"))
            }
            .boxed()
        });

        cache.flush(&k);
        let result = fut.await;
        // The requester still gets the page, but nothing is cached.
        assert!(result.is_some());
        assert!(cache.get(&k).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_not_cached() {
        let cache = PrefetchCache::new();
        let k = key("/users");
        let fut = cache.fetch_or_join(&k, "/users", DEFAULT_CACHE_FOR, tag_set([]), || {
            async { None }.boxed()
        });
        assert!(fut.await.is_none());
        assert!(cache.get(&k).is_none());
        assert!(!cache.is_prefetching(&k));
    }

    #[test]
    fn test_parse_cache_duration() {
        assert_eq!(parse_cache_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_cache_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_cache_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_cache_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_cache_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert!(parse_cache_duration("abc").is_err());
        assert!(parse_cache_duration("-1s").is_err());
    }

    #[test]
    fn test_cache_key_identity() {
        let a = CacheKey::new(Method::Get, "/users", None);
        let b = CacheKey::new(Method::Get, "/users", None);
        let c = CacheKey::new(Method::Get, "/users", Some("q=1"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
