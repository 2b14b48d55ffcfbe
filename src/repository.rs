//! Primary retrieval - fetching a full record for an identifier.

use crate::entity::LazyEntity;
use crate::error::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of full records for an entity type.
///
/// Implementations typically call a remote API and decode the payload.
/// `Ok(None)` means the identifier has no record.
///
/// # Example
///
/// ```ignore
/// struct SongRepository {
///     api: Arc<MusicApi>,
/// }
///
/// impl DataRepository<Song> for SongRepository {
///     async fn fetch_by_id(&self, id: &String) -> Result<Option<Song>> {
///         match self.api.song_detail(id).await? {
///             Some(raw) => Song::from_record(raw).map(Some),
///             None => Ok(None),
///         }
///     }
/// }
/// ```
pub trait DataRepository<T: LazyEntity>: Send + Sync {
    fn fetch_by_id(&self, id: &T::Id) -> impl Future<Output = Result<Option<T>>> + Send;
}

/// Decodes a raw record into an entity.
pub type Decoder<T> = fn(&<T as LazyEntity>::Id, serde_json::Value) -> Result<T>;

/// Repository over raw JSON records held in memory.
///
/// Each fetch decodes a fresh entity from the stored record, like a remote
/// API would. Useful for tests and demos.
pub struct InMemoryRepository<T: LazyEntity> {
    records: DashMap<T::Id, serde_json::Value>,
    decode: Decoder<T>,
    fetches: AtomicUsize,
}

impl<T: LazyEntity> InMemoryRepository<T> {
    pub fn new(decode: Decoder<T>) -> Self {
        InMemoryRepository {
            records: DashMap::new(),
            decode,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, id: T::Id, record: serde_json::Value) {
        self.records.insert(id, record);
    }

    pub fn remove(&self, id: &T::Id) -> Option<serde_json::Value> {
        self.records.remove(id).map(|(_, record)| record)
    }

    /// Number of `fetch_by_id` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<T: LazyEntity> DataRepository<T> for InMemoryRepository<T> {
    fn fetch_by_id(&self, id: &T::Id) -> impl Future<Output = Result<Option<T>>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let decoded = self
            .records
            .get(id)
            .map(|record| (self.decode)(id, record.value().clone()))
            .transpose();
        std::future::ready(decoded)
    }
}
