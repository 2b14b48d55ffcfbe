//! # lazy-kit
//!
//! Lazy, memoizing, TTL-bounded fields and lazily paginated readers for
//! domain objects backed by a remote API.
//!
//! ## Features
//!
//! - **Memoized fields:** Each declared field is computed on first read and
//!   cached until its TTL elapses
//! - **Fully fetched objects:** Once an object is marked gotten, its populated
//!   fields never expire
//! - **Sibling population:** One field's computation may fill other fields
//! - **Single-flight:** Concurrent reads of a stale field share one computation
//! - **Lazy pagination:** Pages are fetched only as items are consumed, with
//!   the total count known after the first page
//! - **Injected collaborators:** Fetchers and repositories are plain values,
//!   never globals
//!
//! ## Quick Start
//!
//! ```ignore
//! use futures::FutureExt;
//! use lazy_kit::{FieldKey, LazyEntity, LazyFields, PagedReader, Ttl};
//!
//! // 1. Name your lazy fields
//! const LYRIC: FieldKey<Option<String>> = FieldKey::new("lyric");
//!
//! // 2. Own a LazyFields in your entity
//! struct Song {
//!     mid: String,
//!     fields: LazyFields<Song>,
//! }
//!
//! impl LazyEntity for Song {
//!     type Id = String;
//!     fn identifier(&self) -> &String { &self.mid }
//!     fn kind() -> &'static str { "song" }
//!     fn lazy_fields(&self) -> &LazyFields<Self> { &self.fields }
//! }
//!
//! // 3. Declare fields with their compute functions
//! song.fields.declare(&LYRIC, Ttl::Forever, move |song: &Song| {
//!     let api = api.clone();
//!     async move { api.lyric(&song.mid).await }.boxed()
//! });
//!
//! // 4. Read them
//! let lyric = song.fields.read(&song, &LYRIC).await?;
//!
//! // 5. Page through remote listings lazily
//! let mut songs = PagedReader::create(fetch_artist_songs, artist_id).await?;
//! println!("{} songs", songs.total());
//! while let Some(song) = songs.next().await? {
//!     // ...
//! }
//! ```

#[macro_use]
extern crate log;

pub mod cell;
pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod key;
pub mod loader;
pub mod observability;
pub mod reader;
pub mod repository;
pub mod strategy;

// Re-exports for convenience
pub use cell::{ExpiringCell, FailurePolicy, Ttl};
pub use config::LazyConfig;
pub use entity::{LazyEntity, Stage};
pub use error::{Error, Result};
pub use fields::LazyFields;
pub use key::FieldKey;
pub use loader::EntityLoader;
pub use observability::{LazyMetrics, NoOpMetrics};
pub use reader::{Page, PageFetcher, PagedReader, ReaderBuilder};
pub use repository::{DataRepository, InMemoryRepository};
pub use strategy::FetchStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
