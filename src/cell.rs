//! Expiring value cell - one memoized value with a time-to-live.

use crate::error::{Error, Result};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// How long a computed value stays valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires; only an explicit invalidation forces a recompute.
    #[default]
    Forever,
    /// Recompute once this much time has elapsed since the last computation.
    For(Duration),
}

impl Ttl {
    /// Build from whole seconds. Zero means [`Ttl::Forever`].
    pub fn from_secs(secs: u64) -> Self {
        Duration::from_secs(secs).into()
    }

    /// Whether a value computed at `computed_at` is stale at `now`.
    pub fn is_expired(&self, computed_at: Instant, now: Instant) -> bool {
        match self {
            Ttl::Forever => false,
            Ttl::For(ttl) => now.saturating_duration_since(computed_at) >= *ttl,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Ttl::Forever
        } else {
            Ttl::For(duration)
        }
    }
}

/// What happens to a stored value when its recomputation fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep serving the last good value; the error still reaches the caller.
    #[default]
    KeepStale,
    /// Drop the stored value so the next read has to recompute.
    Evict,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::KeepStale => write!(f, "keep_stale"),
            FailurePolicy::Evict => write!(f, "evict"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_stale" | "keep-stale" | "stale" => Ok(FailurePolicy::KeepStale),
            "evict" => Ok(FailurePolicy::Evict),
            other => Err(Error::ConfigError(format!(
                "Unknown failure policy: {}",
                other
            ))),
        }
    }
}

/// Whether a lookup was served from the cell or had to compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit,
    Computed,
}

struct Stamped<T> {
    value: T,
    computed_at: Instant,
}

/// A single memoized value with a TTL.
///
/// Computations are serialized per cell, so concurrent readers of an empty
/// or expired cell wait for one in-flight computation instead of starting
/// their own. The stored value sits behind a separate short-held lock: writes
/// and peeks never wait for a computation, so a compute function elsewhere
/// may [`set`](Self::set) this cell while it is being computed.
///
/// # Example
///
/// ```
/// # use lazy_kit::cell::{ExpiringCell, Ttl};
/// # use std::time::Duration;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lazy_kit::Result<()> {
/// let cell = ExpiringCell::new(Ttl::For(Duration::from_secs(60)));
/// let v = cell.get_or_compute(|| async { Ok(42) }).await?;
/// assert_eq!(v, 42);
/// // Still fresh: the closure is not called again.
/// let v = cell.get_or_compute(|| async { Ok(0) }).await?;
/// assert_eq!(v, 42);
/// # Ok(())
/// # }
/// ```
pub struct ExpiringCell<T> {
    ttl: Ttl,
    policy: FailurePolicy,
    slot: parking_lot::Mutex<Option<Stamped<T>>>,
    flight: tokio::sync::Mutex<()>,
}

impl<T: Clone> ExpiringCell<T> {
    /// Create an empty cell.
    pub fn new(ttl: Ttl) -> Self {
        ExpiringCell {
            ttl,
            policy: FailurePolicy::default(),
            slot: parking_lot::Mutex::new(None),
            flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Set what happens to the stored value when a recomputation fails.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Return the stored value, computing it first if absent or expired.
    pub async fn get_or_compute<F, Fut>(&self, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get_or_compute_at(Instant::now(), compute).await
    }

    /// Same as [`get_or_compute`](Self::get_or_compute) with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns. The stored value is then kept or
    /// dropped according to the cell's [`FailurePolicy`].
    pub async fn get_or_compute_at<F, Fut>(&self, now: Instant, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.resolve(now, false, compute)
            .await
            .map(|(value, _)| value)
    }

    /// Core lookup. A `pinned` cell returns any stored value regardless of TTL.
    pub(crate) async fn resolve<F, Fut>(
        &self,
        now: Instant,
        pinned: bool,
        compute: F,
    ) -> Result<(T, Lookup)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.fresh(now, pinned) {
            return Ok((value, Lookup::Hit));
        }

        let _flight = self.flight.lock().await;

        // Filled by the computation we waited on, or by a sibling write.
        if let Some(value) = self.fresh(now, pinned) {
            return Ok((value, Lookup::Hit));
        }

        match compute().await {
            Ok(value) => {
                self.set_at(value.clone(), now);
                Ok((value, Lookup::Computed))
            }
            Err(e) => {
                if self.policy == FailurePolicy::Evict {
                    self.slot.lock().take();
                }
                Err(e)
            }
        }
    }

    fn fresh(&self, now: Instant, pinned: bool) -> Option<T> {
        let slot = self.slot.lock();
        slot.as_ref()
            .filter(|stamped| pinned || !self.ttl.is_expired(stamped.computed_at, now))
            .map(|stamped| stamped.value.clone())
    }

    /// Store a value computed elsewhere, stamped with the current time.
    pub fn set(&self, value: T) {
        self.set_at(value, Instant::now())
    }

    pub fn set_at(&self, value: T, now: Instant) {
        *self.slot.lock() = Some(Stamped {
            value,
            computed_at: now,
        });
    }

    /// Clear the stored value. Returns whether there was one.
    pub fn invalidate(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    /// The stored value, without computing and without checking the TTL.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().as_ref().map(|s| s.value.clone())
    }

    pub fn has_value(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn computed_at(&self) -> Option<Instant> {
        self.slot.lock().as_ref().map(|s| s.computed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &AtomicUsize, value: u32) -> impl Future<Output = Result<u32>> + '_ {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_first_read_computes() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(10));

        assert!(!cell.has_value());
        let v = cell
            .get_or_compute(|| counting(&calls, 7))
            .await
            .expect("compute failed");

        assert_eq!(v, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cell.has_value());
    }

    #[tokio::test]
    async fn test_memoized_within_ttl() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(100));
        let t0 = Instant::now();

        let first = cell
            .get_or_compute_at(t0, || counting(&calls, 1))
            .await
            .expect("compute failed");
        let second = cell
            .get_or_compute_at(t0 + Duration::from_secs(50), || counting(&calls, 2))
            .await
            .expect("compute failed");

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recomputes_after_ttl() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(100));
        let t0 = Instant::now();

        cell.get_or_compute_at(t0, || counting(&calls, 1))
            .await
            .expect("compute failed");
        let fresh = cell
            .get_or_compute_at(t0 + Duration::from_secs(150), || counting(&calls, 2))
            .await
            .expect("compute failed");

        assert_eq!(fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            cell.computed_at(),
            Some(t0 + Duration::from_secs(150))
        );
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_inclusive() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(100));
        let t0 = Instant::now();

        cell.get_or_compute_at(t0, || counting(&calls, 1))
            .await
            .expect("compute failed");
        cell.get_or_compute_at(t0 + Duration::from_secs(100), || counting(&calls, 2))
            .await
            .expect("compute failed");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forever_never_expires() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(0));
        assert_eq!(cell.ttl(), Ttl::Forever);
        let t0 = Instant::now();

        cell.get_or_compute_at(t0, || counting(&calls, 1))
            .await
            .expect("compute failed");
        let later = cell
            .get_or_compute_at(t0 + Duration::from_secs(86_400 * 365), || counting(&calls, 2))
            .await
            .expect("compute failed");

        assert_eq!(later, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_recompute_keeps_stale_value() {
        let cell = ExpiringCell::new(Ttl::from_secs(10));
        let t0 = Instant::now();

        cell.get_or_compute_at(t0, || async { Ok("good".to_string()) })
            .await
            .expect("compute failed");

        let err = cell
            .get_or_compute_at(t0 + Duration::from_secs(20), || async {
                Err(Error::FetchError("network down".to_string()))
            })
            .await
            .expect_err("expected failure");

        assert!(matches!(err, Error::FetchError(_)));
        assert_eq!(cell.peek().as_deref(), Some("good"));
        assert_eq!(cell.computed_at(), Some(t0));
    }

    #[tokio::test]
    async fn test_failed_recompute_evicts_when_configured() {
        let cell =
            ExpiringCell::new(Ttl::from_secs(10)).with_failure_policy(FailurePolicy::Evict);
        let t0 = Instant::now();

        cell.get_or_compute_at(t0, || async { Ok(5u32) })
            .await
            .expect("compute failed");
        cell.get_or_compute_at(t0 + Duration::from_secs(20), || async {
            Err(Error::ComputeError("missing attribute".to_string()))
        })
        .await
        .expect_err("expected failure");

        assert!(!cell.has_value());
    }

    #[tokio::test]
    async fn test_first_compute_failure_leaves_cell_empty() {
        let cell: ExpiringCell<u32> = ExpiringCell::new(Ttl::Forever);

        let result = cell
            .get_or_compute(|| async { Err(Error::FetchError("boom".to_string())) })
            .await;

        assert!(result.is_err());
        assert!(!cell.has_value());
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::Forever);

        cell.get_or_compute(|| counting(&calls, 1))
            .await
            .expect("compute failed");
        assert!(cell.invalidate());
        assert!(!cell.invalidate());

        let v = cell
            .get_or_compute(|| counting(&calls, 2))
            .await
            .expect("compute failed");
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_set_then_read_skips_compute() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::from_secs(30));

        cell.set(9);
        let v = cell
            .get_or_compute(|| counting(&calls, 1))
            .await
            .expect("compute failed");

        assert_eq!(v, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_lands_while_computing() {
        let cell = Arc::new(ExpiringCell::new(Ttl::Forever));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let computing = {
            let cell = cell.clone();
            tokio::spawn(async move {
                cell.get_or_compute(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok(1u32)
                })
                .await
            })
        };

        started_rx.await.expect("compute never started");
        cell.set(2);
        assert_eq!(cell.peek(), Some(2));

        release_tx.send(()).expect("compute task gone");
        assert_eq!(computing.await.expect("task panicked").expect("compute failed"), 1);
        assert_eq!(cell.peek(), Some(1));
    }

    #[tokio::test]
    async fn test_waiter_takes_value_set_during_computation() {
        let calls = AtomicUsize::new(0);
        let cell = ExpiringCell::new(Ttl::Forever);

        // The computation writes the cell itself through another path
        // before finishing, as a sibling write would.
        let first = cell
            .get_or_compute(|| async {
                cell.set(5u32);
                Ok(6)
            })
            .await
            .expect("compute failed");
        let second = cell
            .get_or_compute(|| counting(&calls, 7))
            .await
            .expect("compute failed");

        assert_eq!(first, 6);
        assert_eq!(second, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_readers_share_one_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cell = Arc::new(ExpiringCell::new(Ttl::from_secs(60)));

        let read = |cell: Arc<ExpiringCell<u32>>, calls: Arc<AtomicUsize>| async move {
            cell.get_or_compute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(3)
            })
            .await
        };

        let (a, b) = tokio::join!(
            read(cell.clone(), calls.clone()),
            read(cell.clone(), calls.clone())
        );

        assert_eq!(a.expect("first reader failed"), 3);
        assert_eq!(b.expect("second reader failed"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!(
            "evict".parse::<FailurePolicy>().expect("parse failed"),
            FailurePolicy::Evict
        );
        assert_eq!(
            "Keep_Stale".parse::<FailurePolicy>().expect("parse failed"),
            FailurePolicy::KeepStale
        );
        assert!("sometimes".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Evict.to_string(), "evict");
    }
}
