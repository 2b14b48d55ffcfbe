//! Entity loader - main entry point for primary retrieval.

use crate::entity::LazyEntity;
use crate::error::{Error, Result};
use crate::key::FieldKeyBuilder;
use crate::observability::{LazyMetrics, NoOpMetrics};
use crate::repository::DataRepository;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::time::Instant;

/// Loads entities through a [`DataRepository`] and marks them fully fetched.
///
/// An entity returned by the loader is in [`Stage::Gotten`](crate::Stage::Gotten),
/// so every field it was built with is final for its lifetime.
///
/// # Example
///
/// ```ignore
/// let loader = EntityLoader::new(SongRepository { api });
///
/// match loader.get(&"001".to_string()).await? {
///     Some(song) => println!("{}", song.title),
///     None => println!("no such song"),
/// }
/// ```
pub struct EntityLoader<T, R> {
    repository: R,
    metrics: Arc<dyn LazyMetrics>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: LazyEntity, R: DataRepository<T>> EntityLoader<T, R> {
    /// Create new loader over the given repository.
    pub fn new(repository: R) -> Self {
        EntityLoader {
            repository,
            metrics: Arc::new(NoOpMetrics),
            _entity: PhantomData,
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn LazyMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Retrieve the full record for `id`.
    ///
    /// Returns `Ok(None)` when the repository has no such record.
    ///
    /// # Errors
    ///
    /// Whatever the repository returns: `Error::FetchError` for transport
    /// failures, `Error::ComputeError` for undecodable records.
    pub async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        let timer = Instant::now();
        let key = FieldKeyBuilder::entity::<T>(id);

        debug!("» Retrieving {}", key);

        match self.repository.fetch_by_id(id).await {
            Ok(Some(entity)) => {
                entity.mark_gotten();
                self.metrics.record_compute(&key, timer.elapsed());
                info!("✓ Retrieved {} in {:?}", key, timer.elapsed());
                Ok(Some(entity))
            }
            Ok(None) => {
                debug!("No record for {}", key);
                self.metrics.record_error(&key, "not_found");
                Ok(None)
            }
            Err(e) => {
                self.metrics.record_error(&key, e.kind());
                Err(e)
            }
        }
    }

    /// Like [`get`](Self::get), but a missing record is `Error::NotFound`.
    pub async fn require(&self, id: &T::Id) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(FieldKeyBuilder::entity::<T>(id)))
    }

    /// Get repository reference (for advanced use).
    pub fn repository(&self) -> &R {
        &self.repository
    }
}
