//! Core entity trait that all lazily populated domain objects implement.

use crate::fields::LazyFields;
use std::fmt::Display;
use std::hash::Hash;

/// Lifecycle stage of a domain object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    /// No stage asserted; fields are computed lazily and independently.
    #[default]
    Plain = 0,
    /// Created from partial data, not yet fetched. Behaves exactly like
    /// [`Stage::Plain`] for reads; it only records where the object came from.
    Created = 1,
    /// Fully fetched by a primary retrieval. Populated fields are final.
    Gotten = 2,
}

impl Stage {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Stage::Created,
            2 => Stage::Gotten,
            _ => Stage::Plain,
        }
    }
}

/// Trait that all domain objects with lazy fields must implement.
///
/// # Example
///
/// ```ignore
/// use lazy_kit::{FieldKey, LazyEntity, LazyFields, Ttl};
///
/// pub struct Song {
///     pub mid: String,
///     fields: LazyFields<Song>,
/// }
///
/// const LYRIC: FieldKey<Option<String>> = FieldKey::new("lyric");
///
/// impl LazyEntity for Song {
///     type Id = String;
///
///     fn identifier(&self) -> &Self::Id {
///         &self.mid
///     }
///
///     fn kind() -> &'static str {
///         "song"
///     }
///
///     fn lazy_fields(&self) -> &LazyFields<Self> {
///         &self.fields
///     }
/// }
///
/// impl Song {
///     pub async fn lyric(&self) -> lazy_kit::Result<Option<String>> {
///         self.fields.read(self, &LYRIC).await
///     }
/// }
/// ```
pub trait LazyEntity: Send + Sync + Sized + 'static {
    /// Type of the entity's identifier (typically String or a numeric id).
    type Id: Display + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the entity's stable identifier.
    fn identifier(&self) -> &Self::Id;

    /// Return the kind label for this entity type.
    ///
    /// Used to namespace log and metric keys. Example: "song", "artist".
    fn kind() -> &'static str;

    /// The field cache owned by this entity.
    fn lazy_fields(&self) -> &LazyFields<Self>;

    fn stage(&self) -> Stage {
        self.lazy_fields().stage()
    }

    /// Assert that this object was fully fetched.
    ///
    /// Called by the primary retrieval path. Every already populated field
    /// becomes immune to TTL expiry until explicitly invalidated.
    fn mark_gotten(&self) {
        self.lazy_fields().mark_gotten()
    }
}
