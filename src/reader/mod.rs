//! Paginated sequential reader - lazy item delivery with an upfront total.

mod builder;

pub use builder::ReaderBuilder;

use crate::error::Result;
use crate::observability::LazyMetrics;
use futures::future::BoxFuture;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// One page of a remote listing.
///
/// An empty `list` marks the end of the data. Only the first page's `total`
/// is trusted by a reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct Page<R> {
    #[serde(deserialize_with = "deserialize_total")]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<R>,
}

impl<R> Page<R> {
    pub fn new(total: u64, list: Vec<R>) -> Self {
        Page { total, list }
    }

    /// A page with no items, which ends a listing.
    pub fn empty(total: u64) -> Self {
        Page {
            total,
            list: Vec::new(),
        }
    }
}

impl<R: DeserializeOwned> Page<R> {
    /// Parse a raw `{"total": .., "list": [..]}` payload.
    ///
    /// `total` may be a number or a numeric string.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

fn deserialize_total<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTotal {
        Number(u64),
        Text(String),
    }

    match RawTotal::deserialize(deserializer)? {
        RawTotal::Number(n) => Ok(n),
        RawTotal::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Fetches one page of a listing identified by `I`.
///
/// Implemented for any `Fn(I, u32) -> impl Future<Output = Result<Page<R>>>`,
/// so closures over an API client can be passed directly. Pages are 1-based.
pub trait PageFetcher<I, R>: Send + Sync {
    fn fetch_page(&self, identifier: &I, page: u32) -> impl Future<Output = Result<Page<R>>> + Send;
}

impl<I, R, F, Fut> PageFetcher<I, R> for F
where
    I: Clone,
    F: Fn(I, u32) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<R>>> + Send,
{
    fn fetch_page(&self, identifier: &I, page: u32) -> impl Future<Output = Result<Page<R>>> + Send {
        self(identifier.clone(), page)
    }
}

/// Fetcher for readers built from an in-memory list; never has more pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPages;

impl<I: Sync, R: Send> PageFetcher<I, R> for NoPages {
    fn fetch_page(&self, _identifier: &I, _page: u32) -> impl Future<Output = Result<Page<R>>> + Send {
        std::future::ready(Ok(Page::empty(0)))
    }
}

/// Per-item post-processing run as each item is produced.
pub type Enricher<R> = Arc<dyn Fn(R) -> BoxFuture<'static, Result<R>> + Send + Sync>;

/// Lazy, one-shot sequence over successive pages.
///
/// Page 1 is fetched on creation so [`total`](Self::total) is known up
/// front. Every later page is fetched only when the consumer has drained the
/// previous one, and the first empty page ends the sequence. Nothing runs
/// in the background: dropping the reader at any point leaves no work behind.
///
/// # Example
///
/// ```
/// use lazy_kit::{Page, PagedReader};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lazy_kit::Result<()> {
/// let fetch = |_artist: u64, page: u32| async move {
///     Ok::<_, lazy_kit::Error>(match page {
///         1 => Page::new(3, vec!["a", "b"]),
///         2 => Page::new(3, vec!["c"]),
///         _ => Page::empty(3),
///     })
/// };
///
/// let mut reader = PagedReader::create(fetch, 7).await?;
/// assert_eq!(reader.total(), 3);
/// assert_eq!(reader.collect_remaining().await?, vec!["a", "b", "c"]);
/// # Ok(())
/// # }
/// ```
pub struct PagedReader<I, R, F> {
    fetcher: F,
    identifier: I,
    label: String,
    total: u64,
    page_index: u32,
    buffer: VecDeque<R>,
    exhausted: bool,
    pages_fetched: u32,
    max_pages: Option<u32>,
    enrich: Option<Enricher<R>>,
    metrics: Arc<dyn LazyMetrics>,
}

impl<I, R, F> PagedReader<I, R, F>
where
    I: fmt::Debug + Send + Sync,
    R: Send + 'static,
    F: PageFetcher<I, R>,
{
    /// Fetch page 1 and return a reader positioned before the first item.
    ///
    /// # Errors
    /// Returns `Error::RetrievalError` if the first page cannot be fetched
    pub async fn create(fetcher: F, identifier: I) -> Result<Self> {
        ReaderBuilder::new(fetcher, identifier).create().await
    }

    /// Configure page cap, enrichment or metrics before creating.
    pub fn builder(fetcher: F, identifier: I) -> ReaderBuilder<I, R, F> {
        ReaderBuilder::new(fetcher, identifier)
    }

    /// Produce the next item, fetching the next page if the buffer is drained.
    ///
    /// Returns `Ok(None)` once the sequence has ended; it stays ended.
    ///
    /// # Errors
    ///
    /// - the page fetch error, in which case the page is not consumed and a
    ///   later call asks for the same page again
    /// - the enrichment error for this item; the item is dropped and the
    ///   following items remain available
    pub async fn next(&mut self) -> Result<Option<R>> {
        if self.buffer.is_empty() && !self.fill().await? {
            return Ok(None);
        }

        match self.buffer.pop_front() {
            Some(item) => self.enrich_item(item).await.map(Some),
            None => Ok(None),
        }
    }

    async fn enrich_item(&self, item: R) -> Result<R> {
        match &self.enrich {
            Some(enrich) => (**enrich)(item).await,
            None => Ok(item),
        }
    }

    /// Fetch the next page into the buffer. Returns false once exhausted.
    async fn fill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        if let Some(cap) = self.max_pages {
            if self.page_index >= cap {
                warn!(
                    "Reader {} stopped at page cap {} ({} items announced)",
                    self.label, cap, self.total
                );
                self.exhausted = true;
                return Ok(false);
            }
        }

        let page = self.page_index + 1;
        let timer = Instant::now();
        let fetched = match self.fetcher.fetch_page(&self.identifier, page).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("✗ Reader {} failed to fetch page {}: {}", self.label, page, e);
                self.metrics.record_error(&self.label, e.kind());
                return Err(e);
            }
        };
        self.pages_fetched += 1;
        self.metrics
            .record_page(&self.label, page, fetched.list.len(), timer.elapsed());

        if fetched.list.is_empty() {
            debug!("Reader {} exhausted at page {}", self.label, page);
            self.exhausted = true;
            return Ok(false);
        }

        debug!(
            "Reader {} fetched page {} ({} items)",
            self.label,
            page,
            fetched.list.len()
        );
        self.page_index = page;
        self.buffer.extend(fetched.list);
        Ok(true)
    }

    /// Take up to `n` items, fetching only the pages needed for them.
    pub async fn take(&mut self, n: usize) -> Result<Vec<R>> {
        let mut items = Vec::with_capacity(n.min(self.buffer.len()));
        for _ in 0..n {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Drain the rest of the sequence, fetching every remaining page.
    pub async fn collect_remaining(&mut self) -> Result<Vec<R>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Consume the reader as a [`Stream`] of items.
    ///
    /// An enrichment error is yielded in place of its item and the stream
    /// continues with the next one. A page fetch error is yielded once and
    /// ends the stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<R>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            if reader.buffer.is_empty() {
                match reader.fill().await {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some((Err(e), None)),
                }
            }
            let item = reader.buffer.pop_front()?;
            let produced = reader.enrich_item(item).await;
            Some((produced, Some(reader)))
        })
    }
}

impl<I, R, F> PagedReader<I, R, F> {
    /// Item count announced by page 1. Never changes.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Index of the last non-empty page buffered (1-based).
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// Number of page fetches performed so far, including page 1.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Items fetched but not yet produced.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn identifier(&self) -> &I {
        &self.identifier
    }
}

impl<R> PagedReader<(), R, NoPages> {
    /// Wrap an in-memory list; `total` is its length and no page is ever fetched.
    pub fn from_items(items: Vec<R>) -> Self {
        PagedReader {
            fetcher: NoPages,
            identifier: (),
            label: "in-memory".to_string(),
            total: items.len() as u64,
            page_index: 1,
            buffer: items.into(),
            exhausted: true,
            pages_fetched: 0,
            max_pages: None,
            enrich: None,
            metrics: Arc::new(crate::observability::NoOpMetrics),
        }
    }
}

impl<I: fmt::Debug, R, F> fmt::Debug for PagedReader<I, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedReader")
            .field("identifier", &self.identifier)
            .field("total", &self.total)
            .field("page_index", &self.page_index)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
