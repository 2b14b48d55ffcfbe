//! Typed field keys and log-friendly key formatting.

use crate::entity::LazyEntity;
use std::fmt;
use std::marker::PhantomData;

/// Typed name of a lazily computed field.
///
/// Declared once as a constant next to the domain type, so every read and
/// store of the field agrees on the value type at compile time.
///
/// ```
/// use lazy_kit::FieldKey;
///
/// const LYRIC: FieldKey<Option<String>> = FieldKey::new("lyric");
/// assert_eq!(LYRIC.name(), "lyric");
/// ```
pub struct FieldKey<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> FieldKey<T> {
    pub const fn new(name: &'static str) -> Self {
        FieldKey {
            name,
            _value: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for FieldKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldKey<T> {}

impl<T> fmt::Debug for FieldKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldKey({})", self.name)
    }
}

/// Builds the string used to identify a field in logs and metrics.
pub struct FieldKeyBuilder;

impl FieldKeyBuilder {
    /// Format: `"{kind}:{id}.{field}"`, e.g. `"song:001.url"`.
    pub fn build<E: LazyEntity>(entity: &E, field: &str) -> String {
        format!("{}:{}.{}", E::kind(), entity.identifier(), field)
    }

    /// Format: `"{kind}:{id}"`.
    pub fn entity<E: LazyEntity>(id: &E::Id) -> String {
        format!("{}:{}", E::kind(), id)
    }
}
