//! Builder pattern for configuring paged readers.

use super::{Enricher, PageFetcher, PagedReader};
use crate::config::LazyConfig;
use crate::error::{Error, Result};
use crate::observability::{LazyMetrics, NoOpMetrics};
use futures::FutureExt;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Fluent builder for [`PagedReader`] configuration.
///
/// Provides chainable methods to set a page cap, a per-item enrichment
/// step, metrics and a log label before the first page is fetched.
///
/// # Example
///
/// ```ignore
/// let albums = PagedReader::builder(fetch_artist_albums, artist_id)
///     .with_max_pages(50)
///     .with_enrichment(move |album: Album| attach_cover(api.clone(), album))
///     .create()
///     .await?;
/// ```
pub struct ReaderBuilder<I, R, F> {
    fetcher: F,
    identifier: I,
    label: Option<String>,
    max_pages: Option<u32>,
    enrich: Option<Enricher<R>>,
    metrics: Arc<dyn LazyMetrics>,
}

impl<I, R, F> ReaderBuilder<I, R, F>
where
    I: fmt::Debug + Send + Sync,
    R: Send + 'static,
    F: PageFetcher<I, R>,
{
    /// Create a new builder with default settings.
    pub fn new(fetcher: F, identifier: I) -> Self {
        Self {
            fetcher,
            identifier,
            label: None,
            max_pages: None,
            enrich: None,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Stop after this many pages even if the source keeps returning items.
    ///
    /// A cap of 0 is treated as no cap.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = (max_pages > 0).then_some(max_pages);
        self
    }

    /// Apply the page cap from a configuration.
    pub fn with_config(mut self, config: &LazyConfig) -> Self {
        self.max_pages = config.max_pages;
        self
    }

    /// Run `enrich` on every item right before it is produced.
    ///
    /// The step runs on the same `next` call as the item it processes; its
    /// failure fails that call only.
    pub fn with_enrichment<E, Fut>(mut self, enrich: E) -> Self
    where
        E: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.enrich = Some(Arc::new(move |item| enrich(item).boxed()));
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn LazyMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Name used in logs and metrics. Defaults to the identifier's debug form.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Fetch page 1 and build the reader.
    ///
    /// # Errors
    ///
    /// Returns `Error::RetrievalError` wrapping the cause if the first page
    /// fetch fails. No reader exists in that case.
    pub async fn create(self) -> Result<PagedReader<I, R, F>> {
        let label = self
            .label
            .unwrap_or_else(|| format!("{:?}", self.identifier));
        let timer = Instant::now();

        let first = match self.fetcher.fetch_page(&self.identifier, 1).await {
            Ok(first) => first,
            Err(e) => {
                self.metrics.record_error(&label, e.kind());
                return Err(Error::RetrievalError(format!(
                    "First page of {} failed: {}",
                    label, e
                )));
            }
        };
        self.metrics
            .record_page(&label, 1, first.list.len(), timer.elapsed());

        let exhausted = first.list.is_empty();
        info!(
            "✓ Reader {} opened: {} items announced, {} on page 1",
            label,
            first.total,
            first.list.len()
        );

        Ok(PagedReader {
            fetcher: self.fetcher,
            identifier: self.identifier,
            label,
            total: first.total,
            page_index: 1,
            buffer: VecDeque::from(first.list),
            exhausted,
            pages_fetched: 1,
            max_pages: self.max_pages,
            enrich: self.enrich,
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Page;
    use std::sync::Mutex;
    use std::time::Duration;

    fn two_pages(_id: String, page: u32) -> impl Future<Output = Result<Page<u32>>> + Send {
        async move {
            Ok::<_, Error>(match page {
                1 => Page::new(3, vec![1, 2]),
                2 => Page::new(3, vec![3]),
                _ => Page::empty(3),
            })
        }
    }

    #[derive(Default)]
    struct PageLog {
        pages: Mutex<Vec<(String, u32, usize)>>,
        errors: Mutex<Vec<String>>,
    }

    impl LazyMetrics for PageLog {
        fn record_page(&self, key: &str, page: u32, items: usize, _duration: Duration) {
            self.pages
                .lock()
                .expect("Failed to lock pages")
                .push((key.to_string(), page, items));
        }

        fn record_error(&self, key: &str, error: &str) {
            self.errors
                .lock()
                .expect("Failed to lock errors")
                .push(format!("{} {}", key, error));
        }
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let mut reader = ReaderBuilder::new(two_pages, "artist-1".to_string())
            .create()
            .await
            .expect("Failed to create reader");

        assert_eq!(reader.total(), 3);
        assert_eq!(
            reader.collect_remaining().await.expect("collect failed"),
            vec![1, 2, 3]
        );
        assert_eq!(reader.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn test_builder_records_pages_under_label() {
        let log = Arc::new(PageLog::default());
        let mut reader = ReaderBuilder::new(two_pages, "artist-1".to_string())
            .with_label("artist:1/songs")
            .with_metrics(log.clone())
            .create()
            .await
            .expect("Failed to create reader");

        reader.collect_remaining().await.expect("collect failed");

        let pages = log.pages.lock().expect("Failed to lock pages");
        assert_eq!(
            *pages,
            vec![
                ("artist:1/songs".to_string(), 1, 2),
                ("artist:1/songs".to_string(), 2, 1),
                ("artist:1/songs".to_string(), 3, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_builder_records_first_page_failure() {
        let log = Arc::new(PageLog::default());
        let failing = |_id: u32, _page: u32| async move {
            Err::<Page<u32>, _>(Error::FetchError("503".to_string()))
        };

        let result = ReaderBuilder::new(failing, 5)
            .with_metrics(log.clone())
            .create()
            .await;

        assert!(matches!(result, Err(Error::RetrievalError(_))));
        assert_eq!(
            *log.errors.lock().expect("Failed to lock errors"),
            vec!["5 fetch".to_string()]
        );
    }

    #[tokio::test]
    async fn test_builder_config_sets_page_cap() {
        let config = LazyConfig::default().with_max_pages(1);
        let mut reader = ReaderBuilder::new(two_pages, "artist-1".to_string())
            .with_config(&config)
            .create()
            .await
            .expect("Failed to create reader");

        assert_eq!(
            reader.collect_remaining().await.expect("collect failed"),
            vec![1, 2]
        );
        assert_eq!(reader.pages_fetched(), 1);
    }

    #[tokio::test]
    async fn test_zero_page_cap_means_unlimited() {
        let mut reader = ReaderBuilder::new(two_pages, "artist-1".to_string())
            .with_max_pages(0)
            .create()
            .await
            .expect("Failed to create reader");

        assert_eq!(
            reader.collect_remaining().await.expect("collect failed"),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_zero_page_cap_from_config_means_unlimited() {
        let config = LazyConfig::default().with_max_pages(0);
        let mut reader = ReaderBuilder::new(two_pages, "artist-1".to_string())
            .with_config(&config)
            .create()
            .await
            .expect("Failed to create reader");

        assert_eq!(
            reader.collect_remaining().await.expect("collect failed"),
            vec![1, 2, 3]
        );
        assert!(reader.is_exhausted());
    }
}
