//! Lazy field cache - the per-object registry of expiring cells.

use crate::cell::{ExpiringCell, FailurePolicy, Lookup, Ttl};
use crate::config::LazyConfig;
use crate::entity::{LazyEntity, Stage};
use crate::error::{Error, Result};
use crate::key::{FieldKey, FieldKeyBuilder};
use crate::observability::{LazyMetrics, NoOpMetrics};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Compute function of a lazy field. Receives the owning object.
pub type ComputeFn<O, T> = Box<dyn for<'a> Fn(&'a O) -> BoxFuture<'a, Result<T>> + Send + Sync>;

struct Slot<O, T> {
    cell: ExpiringCell<T>,
    compute: ComputeFn<O, T>,
}

/// Type-erased view of a slot, for operations that don't need the value type.
trait ErasedSlot: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn value_type(&self) -> &'static str;
    fn invalidate(&self) -> bool;
    fn has_value(&self) -> bool;
}

impl<O: 'static, T: Clone + Send + Sync + 'static> ErasedSlot for Slot<O, T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn invalidate(&self) -> bool {
        self.cell.invalidate()
    }

    fn has_value(&self) -> bool {
        self.cell.has_value()
    }
}

/// Per-object cache binding named fields to expiring cells.
///
/// Each field is declared once with a [`FieldKey`], a [`Ttl`] and a compute
/// function. Reads return the cached value while it is fresh and run the
/// compute function otherwise. Once the owner is marked
/// [`Stage::Gotten`], populated fields are returned regardless of TTL.
///
/// A compute function may read other fields of its owner and may
/// [`store`](Self::store) values into sibling fields, including one that is
/// being computed at that moment. It must not read its own field.
///
/// # Example
///
/// ```ignore
/// use futures::FutureExt;
///
/// const URL: FieldKey<String> = FieldKey::new("url");
///
/// let song = Song::new("001");
/// song.lazy_fields().declare(&URL, Duration::from_secs(600), |song: &Song| {
///     async move { fetch_url(&song.mid).await }.boxed()
/// });
///
/// let url = song.lazy_fields().read(&song, &URL).await?;
/// ```
pub struct LazyFields<O> {
    stage: AtomicU8,
    slots: DashMap<&'static str, Arc<dyn ErasedSlot>>,
    failure_policy: FailurePolicy,
    default_ttl: Ttl,
    metrics: Arc<dyn LazyMetrics>,
    _owner: PhantomData<fn(&O)>,
}

impl<O> Default for LazyFields<O> {
    fn default() -> Self {
        LazyFields {
            stage: AtomicU8::new(Stage::Plain as u8),
            slots: DashMap::new(),
            failure_policy: FailurePolicy::default(),
            default_ttl: Ttl::default(),
            metrics: Arc::new(NoOpMetrics),
            _owner: PhantomData,
        }
    }
}

impl<O> LazyFields<O> {
    /// Create an empty field cache in the [`Stage::Plain`] stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply failure policy and default TTL from a configuration.
    pub fn with_config(mut self, config: &LazyConfig) -> Self {
        self.failure_policy = config.failure_policy;
        self.default_ttl = config.default_ttl;
        self
    }

    /// Failure policy for cells declared after this call.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn LazyMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Transition to [`Stage::Gotten`]; populated fields stop expiring.
    pub fn mark_gotten(&self) {
        self.stage.store(Stage::Gotten as u8, Ordering::Release);
    }

    /// Record that the owner was built from partial data. Reads behave as in
    /// [`Stage::Plain`].
    pub fn mark_created(&self) {
        self.stage.store(Stage::Created as u8, Ordering::Release);
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Names of all declared fields, in no particular order.
    pub fn declared(&self) -> Vec<&'static str> {
        self.slots.iter().map(|entry| *entry.key()).collect()
    }

    /// Clear one field so the next read recomputes it, whatever the stage or TTL.
    ///
    /// Returns whether a value was stored.
    ///
    /// # Errors
    ///
    /// `Error::UndeclaredField` if no field has this name.
    pub fn invalidate(&self, name: &str) -> Result<bool> {
        let slot = self.slot(name)?;
        let cleared = slot.invalidate();
        debug!("Invalidated lazy field {} (had value: {})", name, cleared);
        Ok(cleared)
    }

    /// Whether the named field currently holds a value.
    pub fn is_cached(&self, name: &str) -> Result<bool> {
        Ok(self.slot(name)?.has_value())
    }

    fn slot(&self, name: &str) -> Result<Arc<dyn ErasedSlot>> {
        self.slots
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UndeclaredField(name.to_string()))
    }
}

impl<O: LazyEntity> LazyFields<O> {
    /// Register a lazy field with its TTL and compute function.
    ///
    /// Declaring a name twice keeps the first declaration.
    pub fn declare<T, F>(&self, key: &FieldKey<T>, ttl: impl Into<Ttl>, compute: F) -> &Self
    where
        T: Clone + Send + Sync + 'static,
        F: for<'a> Fn(&'a O) -> BoxFuture<'a, Result<T>> + Send + Sync + 'static,
    {
        let ttl = ttl.into();
        let policy = self.failure_policy;
        self.slots.entry(key.name()).or_insert_with(|| {
            debug!(
                "Declared lazy field {}.{} (ttl: {:?})",
                O::kind(),
                key.name(),
                ttl
            );
            let slot: Arc<dyn ErasedSlot> = Arc::new(Slot {
                cell: ExpiringCell::new(ttl).with_failure_policy(policy),
                compute: Box::new(compute) as ComputeFn<O, T>,
            });
            slot
        });
        self
    }

    /// Register a lazy field using the configured default TTL.
    pub fn declare_default<T, F>(&self, key: &FieldKey<T>, compute: F) -> &Self
    where
        T: Clone + Send + Sync + 'static,
        F: for<'a> Fn(&'a O) -> BoxFuture<'a, Result<T>> + Send + Sync + 'static,
    {
        self.declare(key, self.default_ttl, compute)
    }

    /// Read a field, computing it if needed.
    ///
    /// # Errors
    ///
    /// - `Error::UndeclaredField`: `key` was never declared
    /// - `Error::FieldTypeMismatch`: `key` was declared with another value type
    /// - any error returned by the field's compute function
    pub async fn read<T>(&self, owner: &O, key: &FieldKey<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.read_at(owner, key, Instant::now()).await
    }

    /// Read a field as of `now`.
    pub async fn read_at<T>(&self, owner: &O, key: &FieldKey<T>, now: Instant) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let timer = Instant::now();
        let label = FieldKeyBuilder::build(owner, key.name());

        let slot = self.slot(key.name())?;
        let typed = Self::typed::<T>(&slot, key.name())?;
        let pinned = self.stage() == Stage::Gotten;

        match typed
            .cell
            .resolve(now, pinned, || (typed.compute)(owner))
            .await
        {
            Ok((value, Lookup::Hit)) => {
                debug!("✓ Lazy field hit: {}", label);
                self.metrics.record_hit(&label, timer.elapsed());
                Ok(value)
            }
            Ok((value, Lookup::Computed)) => {
                debug!("Computed lazy field {} in {:?}", label, timer.elapsed());
                self.metrics.record_compute(&label, timer.elapsed());
                Ok(value)
            }
            Err(e) => {
                warn!("✗ Computing lazy field {} failed: {}", label, e);
                self.metrics.record_error(&label, e.kind());
                Err(e)
            }
        }
    }

    /// The stored value of a field, without computing and ignoring TTL.
    pub fn peek<T>(&self, key: &FieldKey<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = self.slot(key.name())?;
        let typed = Self::typed::<T>(&slot, key.name())?;
        Ok(typed.cell.peek())
    }

    /// Write a field directly.
    ///
    /// Used by a compute function that obtains data for a sibling field as a
    /// side effect, and by decoders seeding fields from a full record. Never
    /// waits for a computation of that field; one in flight overwrites the
    /// stored value when it finishes.
    pub fn store<T>(&self, key: &FieldKey<T>, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.store_at(key, value, Instant::now())
    }

    pub fn store_at<T>(&self, key: &FieldKey<T>, value: T, now: Instant) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = self.slot(key.name())?;
        let typed = Self::typed::<T>(&slot, key.name())?;
        typed.cell.set_at(value, now);
        debug!("Stored lazy field {}.{}", O::kind(), key.name());
        Ok(())
    }

    fn typed<'s, T>(slot: &'s Arc<dyn ErasedSlot>, name: &str) -> Result<&'s Slot<O, T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        slot.as_any().downcast_ref::<Slot<O, T>>().ok_or_else(|| {
            Error::FieldTypeMismatch(format!(
                "{} is declared as {}, not {}",
                name,
                slot.value_type(),
                std::any::type_name::<T>()
            ))
        })
    }
}
