//! Configuration for field caches and readers.

use crate::cell::{FailurePolicy, Ttl};
use crate::error::{Error, Result};
use crate::strategy::FetchStrategy;

/// Default TTL in seconds for fields declared without one. 0 means forever.
pub const ENV_DEFAULT_TTL_SECS: &str = "LAZY_KIT_DEFAULT_TTL_SECS";
/// `keep_stale` or `evict`.
pub const ENV_FAILURE_POLICY: &str = "LAZY_KIT_FAILURE_POLICY";
/// Page cap for readers. Unset or 0 means unlimited.
pub const ENV_MAX_PAGES: &str = "LAZY_KIT_MAX_PAGES";
/// `standard` or `enhanced`.
pub const ENV_FETCH_STRATEGY: &str = "LAZY_KIT_FETCH_STRATEGY";

/// Settings shared by field caches and readers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LazyConfig {
    pub default_ttl: Ttl,
    pub failure_policy: FailurePolicy,
    pub max_pages: Option<u32>,
    pub fetch_strategy: FetchStrategy,
}

impl LazyConfig {
    /// Load from `LAZY_KIT_*` environment variables, defaulting what is unset.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set to an invalid value
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LazyConfig::default();

        if let Some(raw) = lookup(ENV_DEFAULT_TTL_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("{}={}: {}", ENV_DEFAULT_TTL_SECS, raw, e))
            })?;
            config.default_ttl = Ttl::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_FAILURE_POLICY) {
            config.failure_policy = raw.parse()?;
        }

        if let Some(raw) = lookup(ENV_MAX_PAGES) {
            let pages = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| Error::ConfigError(format!("{}={}: {}", ENV_MAX_PAGES, raw, e)))?;
            config.max_pages = (pages > 0).then_some(pages);
        }

        if let Some(raw) = lookup(ENV_FETCH_STRATEGY) {
            config.fetch_strategy = raw.parse()?;
        }

        debug!("Loaded lazy-kit configuration: {:?}", config);
        Ok(config)
    }

    pub fn with_default_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Page cap for readers. 0 means unlimited, as in `LAZY_KIT_MAX_PAGES`.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = (max_pages > 0).then_some(max_pages);
        self
    }

    pub fn with_fetch_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.fetch_strategy = strategy;
        self
    }
}
