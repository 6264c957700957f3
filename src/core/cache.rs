//! TTL cache for remote tool/resource/prompt listings.
//!
//! Each [`MetadataKind`] owns one [`CacheEntry`]. Refreshes are coalesced:
//! while a fetch for a kind is in flight, further `refresh` calls attach to
//! it instead of starting another one, and all of them observe the same
//! result. The fetch itself runs on its own task, so it completes even if
//! every caller stops waiting.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Tools,
    Resources,
    Prompts,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 3] = [
        MetadataKind::Tools,
        MetadataKind::Resources,
        MetadataKind::Prompts,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetadataKind::Tools => "tools",
            MetadataKind::Resources => "resources",
            MetadataKind::Prompts => "prompts",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|err| err.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|err| err.into_inner());
        self.origin + offset
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        self.as_ref().now()
    }
}

/// Failure of the fetch behind a refresh. Cheap to clone so every coalesced
/// caller can receive it.
#[derive(Debug, Clone)]
pub struct RemoteError(Arc<dyn StdError + Send + Sync>);

impl RemoteError {
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(MessageError(message.into())))
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for RemoteError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

#[derive(Debug)]
pub struct CacheEntry<R> {
    pub items: Arc<[R]>,
    pub fetched_at: Option<Instant>,
    pub ttl: Duration,
}

impl<R> Clone for CacheEntry<R> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            fetched_at: self.fetched_at,
            ttl: self.ttl,
        }
    }
}

impl<R> CacheEntry<R> {
    fn empty(ttl: Duration) -> Self {
        Self {
            items: Arc::from(Vec::new()),
            fetched_at: None,
            ttl,
        }
    }

    pub fn is_fresh_at(&self, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| now.saturating_duration_since(fetched_at) < self.ttl)
    }

    pub fn age_at(&self, now: Instant) -> Option<Duration> {
        self.fetched_at
            .map(|fetched_at| now.saturating_duration_since(fetched_at))
    }
}

type RefreshResult<R> = Result<CacheEntry<R>, RemoteError>;
type InFlight<R> = Shared<BoxFuture<'static, RefreshResult<R>>>;

struct Slot<R> {
    entry: CacheEntry<R>,
    in_flight: Option<InFlight<R>>,
}

struct Inner<R, C> {
    slots: Mutex<HashMap<MetadataKind, Slot<R>>>,
    clock: C,
    ttl: Duration,
}

impl<R, C> Inner<R, C> {
    fn lock(&self) -> MutexGuard<'_, HashMap<MetadataKind, Slot<R>>> {
        self.slots.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Shared handle; clones refer to the same cache.
pub struct MetadataCache<R, C = SystemClock> {
    inner: Arc<Inner<R, C>>,
}

impl<R, C> Clone for MetadataCache<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> MetadataCache<R, SystemClock>
where
    R: Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<R, C> MetadataCache<R, C>
where
    R: Send + Sync + 'static,
    C: Clock,
{
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        let slots = MetadataKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    Slot {
                        entry: CacheEntry::empty(ttl),
                        in_flight: None,
                    },
                )
            })
            .collect();
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(slots),
                clock,
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Current entry, possibly stale. Never fetches.
    pub fn get(&self, kind: MetadataKind) -> CacheEntry<R> {
        let slots = self.inner.lock();
        slots
            .get(&kind)
            .map(|slot| slot.entry.clone())
            .unwrap_or_else(|| CacheEntry::empty(self.inner.ttl))
    }

    pub fn is_stale(&self, kind: MetadataKind) -> bool {
        !self.get(kind).is_fresh_at(self.inner.clock.now())
    }

    pub fn age(&self, kind: MetadataKind) -> Option<Duration> {
        self.get(kind).age_at(self.inner.clock.now())
    }

    pub fn is_refreshing(&self, kind: MetadataKind) -> bool {
        self.inner
            .lock()
            .get(&kind)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Fetches `kind` again, or joins the fetch already in flight. On failure
    /// the previous entry stays in place.
    ///
    /// `fetch` runs without the cache lock held, so it may read the cache.
    pub async fn refresh<F, Fut>(&self, kind: MetadataKind, fetch: F) -> RefreshResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<R>, RemoteError>> + Send + 'static,
    {
        let (in_flight, reply) = self.join_or_install(kind);
        if let Some(reply) = reply {
            let guard = RefreshGuard {
                inner: Arc::clone(&self.inner),
                kind,
                reply: Some(reply),
            };
            let future = fetch();
            tokio::spawn(async move {
                let result = future.await;
                guard.finish(result);
            });
        }

        in_flight.await
    }

    /// Refreshes only when the entry is stale; otherwise returns it as is.
    pub async fn get_or_refresh<F, Fut>(&self, kind: MetadataKind, fetch: F) -> RefreshResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<R>, RemoteError>> + Send + 'static,
    {
        if self.is_stale(kind) {
            self.refresh(kind, fetch).await
        } else {
            Ok(self.get(kind))
        }
    }

    /// Returns the in-flight refresh for `kind`. When none exists one is
    /// installed, and the sender that completes it is handed back.
    fn join_or_install(&self, kind: MetadataKind) -> (InFlight<R>, Option<Reply<R>>) {
        let mut slots = self.inner.lock();
        let slot = slots.entry(kind).or_insert_with(|| Slot {
            entry: CacheEntry::empty(self.inner.ttl),
            in_flight: None,
        });

        if let Some(in_flight) = &slot.in_flight {
            debug!(%kind, "joining in-flight metadata refresh");
            return (in_flight.clone(), None);
        }

        debug!(%kind, "starting metadata refresh");
        let (reply, receiver) = oneshot::channel();
        let in_flight = async move {
            receiver.await.unwrap_or_else(|_| {
                Err(RemoteError::msg(
                    "metadata refresh task aborted before completing",
                ))
            })
        }
        .boxed()
        .shared();
        slot.in_flight = Some(in_flight.clone());
        (in_flight, Some(reply))
    }
}

type Reply<R> = oneshot::Sender<RefreshResult<R>>;

/// Owns one in-flight refresh. Dropping it unfinished (the fetch panicked or
/// its task was cancelled) clears the marker so the next refresh fetches again.
struct RefreshGuard<R, C> {
    inner: Arc<Inner<R, C>>,
    kind: MetadataKind,
    reply: Option<Reply<R>>,
}

impl<R, C: Clock> RefreshGuard<R, C> {
    fn finish(mut self, result: Result<Vec<R>, RemoteError>) {
        let kind = self.kind;
        let outcome = {
            let mut slots = self.inner.lock();
            let ttl = self.inner.ttl;
            let slot = slots.entry(kind).or_insert_with(|| Slot {
                entry: CacheEntry::empty(ttl),
                in_flight: None,
            });
            slot.in_flight = None;

            match result {
                Ok(items) => {
                    debug!(%kind, count = items.len(), "metadata refresh stored");
                    slot.entry = CacheEntry {
                        items: Arc::from(items),
                        fetched_at: Some(self.inner.clock.now()),
                        ttl,
                    };
                    Ok(slot.entry.clone())
                }
                Err(err) => {
                    warn!(%kind, error = %err, "metadata refresh failed; keeping previous entry");
                    Err(err)
                }
            }
        };

        if let Some(reply) = self.reply.take() {
            // Nobody waiting is fine; the entry is already stored.
            let _ = reply.send(outcome);
        }
    }
}

impl<R, C> Drop for RefreshGuard<R, C> {
    fn drop(&mut self) {
        if self.reply.is_none() {
            return;
        }
        warn!(kind = %self.kind, "metadata refresh aborted; keeping previous entry");
        if let Some(slot) = self.inner.lock().get_mut(&self.kind) {
            slot.in_flight = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn cache_with_clock() -> (MetadataCache<String, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = MetadataCache::with_clock(Duration::from_secs(300), Arc::clone(&clock));
        (cache, clock)
    }

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|idx| format!("tool-{idx}")).collect()
    }

    #[tokio::test]
    async fn starts_empty_and_stale() {
        let (cache, _clock) = cache_with_clock();
        for kind in MetadataKind::ALL {
            let entry = cache.get(kind);
            assert!(entry.items.is_empty());
            assert!(entry.fetched_at.is_none());
            assert!(cache.is_stale(kind));
            assert_eq!(cache.age(kind), None);
        }
    }

    #[tokio::test]
    async fn refresh_then_expire_then_refresh_again() {
        let (cache, clock) = cache_with_clock();

        let first = cache
            .refresh(MetadataKind::Tools, || async { Ok(names(3)) })
            .await
            .expect("first refresh");
        assert_eq!(first.items.len(), 3);

        clock.advance(Duration::from_secs(1));
        let entry = cache.get(MetadataKind::Tools);
        assert_eq!(entry.items.len(), 3);
        assert!(!cache.is_stale(MetadataKind::Tools));

        clock.advance(Duration::from_secs(300));
        assert!(cache.is_stale(MetadataKind::Tools));

        let second = cache
            .refresh(MetadataKind::Tools, || async { Ok(names(5)) })
            .await
            .expect("second refresh");
        let entry = cache.get(MetadataKind::Tools);
        assert_eq!(entry.items.len(), 5);
        assert_eq!(entry.items[4], "tool-4");
        assert!(second.fetched_at > first.fetched_at);
        assert!(!cache.is_stale(MetadataKind::Tools));
    }

    #[tokio::test]
    async fn staleness_boundary_is_exclusive() {
        let (cache, clock) = cache_with_clock();
        cache
            .refresh(MetadataKind::Resources, || async { Ok(names(1)) })
            .await
            .expect("refresh");

        clock.advance(Duration::from_secs(299));
        assert!(!cache.is_stale(MetadataKind::Resources));
        clock.advance(Duration::from_millis(999));
        assert!(!cache.is_stale(MetadataKind::Resources));
        clock.advance(Duration::from_millis(1));
        assert!(cache.is_stale(MetadataKind::Resources));
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_fetch() {
        let (cache, _clock) = cache_with_clock();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first_calls = Arc::clone(&calls);
        let first = cache.refresh(MetadataKind::Tools, move || {
            first_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let _ = release_rx.await;
                Ok(names(2))
            }
        });

        let second_calls = Arc::clone(&calls);
        let second = cache.refresh(MetadataKind::Tools, move || {
            second_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(names(9)) }
        });

        let release = async move {
            tokio::task::yield_now().await;
            let _ = release_tx.send(());
        };

        let (first, second, ()) = tokio::join!(first, second, release);
        let first = first.expect("first caller");
        let second = second.expect("second caller");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.items, &second.items));
        assert_eq!(first.fetched_at, second.fetched_at);
        assert_eq!(cache.get(MetadataKind::Tools).items.len(), 2);
        assert!(!cache.is_refreshing(MetadataKind::Tools));
    }

    #[tokio::test]
    async fn kinds_refresh_independently() {
        let (cache, _clock) = cache_with_clock();
        cache
            .refresh(MetadataKind::Prompts, || async { Ok(names(4)) })
            .await
            .expect("prompts");

        assert_eq!(cache.get(MetadataKind::Prompts).items.len(), 4);
        assert!(cache.get(MetadataKind::Tools).items.is_empty());
        assert!(cache.is_stale(MetadataKind::Tools));
    }

    #[tokio::test]
    async fn failed_refresh_preserves_previous_entry() {
        let (cache, clock) = cache_with_clock();
        let before = cache
            .refresh(MetadataKind::Tools, || async { Ok(names(3)) })
            .await
            .expect("seed");

        clock.advance(Duration::from_secs(10));
        let err = cache
            .refresh(MetadataKind::Tools, || async {
                Err(RemoteError::msg("HTTP error: 502 Bad Gateway"))
            })
            .await
            .expect_err("fetch fails");
        assert_eq!(err.to_string(), "HTTP error: 502 Bad Gateway");

        let after = cache.get(MetadataKind::Tools);
        assert!(Arc::ptr_eq(&before.items, &after.items));
        assert_eq!(before.fetched_at, after.fetched_at);
        assert!(!cache.is_refreshing(MetadataKind::Tools));
    }

    #[tokio::test]
    async fn coalesced_callers_all_see_the_failure() {
        let (cache, _clock) = cache_with_clock();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = cache.refresh(MetadataKind::Resources, move || async move {
            let _ = release_rx.await;
            Err(RemoteError::msg("unauthorized"))
        });
        let second = cache.refresh(MetadataKind::Resources, || async { Ok(names(1)) });
        let release = async move {
            tokio::task::yield_now().await;
            let _ = release_tx.send(());
        };

        let (first, second, ()) = tokio::join!(first, second, release);
        assert_eq!(first.expect_err("first").to_string(), "unauthorized");
        assert_eq!(second.expect_err("second").to_string(), "unauthorized");
        assert!(cache.get(MetadataKind::Resources).items.is_empty());
    }

    #[tokio::test]
    async fn fetch_completes_even_when_caller_gives_up() {
        let (cache, _clock) = cache_with_clock();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let abandoned = cache.refresh(MetadataKind::Tools, move || async move {
            let _ = release_rx.await;
            Ok(names(7))
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), abandoned).await;
        assert!(timed_out.is_err());

        let _ = release_tx.send(());
        for _ in 0..100 {
            if !cache.is_refreshing(MetadataKind::Tools) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.get(MetadataKind::Tools).items.len(), 7);
    }

    #[tokio::test]
    async fn panicked_fetch_does_not_block_later_refreshes() {
        let (cache, _clock) = cache_with_clock();

        let err = cache
            .refresh(MetadataKind::Tools, || async {
                let explode = true;
                if explode {
                    panic!("listing exploded");
                }
                Ok(names(1))
            })
            .await
            .expect_err("panicked fetch");
        assert!(err.to_string().contains("aborted"));
        assert!(!cache.is_refreshing(MetadataKind::Tools));
        assert!(cache.get(MetadataKind::Tools).fetched_at.is_none());

        let entry = cache
            .refresh(MetadataKind::Tools, || async { Ok(names(2)) })
            .await
            .expect("refresh after panic");
        assert_eq!(entry.items.len(), 2);
        assert!(!cache.is_refreshing(MetadataKind::Tools));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fetch_closure_may_read_the_cache() {
        let (cache, _clock) = cache_with_clock();
        cache
            .refresh(MetadataKind::Prompts, || async { Ok(names(1)) })
            .await
            .expect("seed prompts");

        let reader = cache.clone();
        let refreshing = cache.clone();
        let task = tokio::spawn(async move {
            refreshing
                .refresh(MetadataKind::Tools, move || {
                    let seen = (
                        reader.is_stale(MetadataKind::Prompts),
                        reader.get(MetadataKind::Prompts).items.len(),
                        reader.is_refreshing(MetadataKind::Tools),
                    );
                    async move {
                        assert_eq!(seen, (false, 1, true));
                        Ok(names(3))
                    }
                })
                .await
        });

        let entry = tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("refresh finishes")
            .expect("task")
            .expect("refresh");
        assert_eq!(entry.items.len(), 3);
        assert_eq!(cache.age(MetadataKind::Tools), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn get_or_refresh_skips_fresh_entries() {
        let (cache, clock) = cache_with_clock();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            cache
                .get_or_refresh(MetadataKind::Tools, move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(names(1)) }
                })
                .await
                .expect("refresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(301));
        let counted = Arc::clone(&calls);
        cache
            .get_or_refresh(MetadataKind::Tools, move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { Ok(names(1)) }
            })
            .await
            .expect("refresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
