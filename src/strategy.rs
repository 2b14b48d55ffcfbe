//! Fetch strategy selection for capabilities with two implementations.

use crate::config::LazyConfig;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Which of two interchangeable implementations of a capability to use.
///
/// Chosen once at startup (from [`LazyConfig`](crate::config::LazyConfig) or
/// the environment), then used to pick between two values implementing the
/// same trait.
///
/// # Example
///
/// ```
/// use lazy_kit::FetchStrategy;
///
/// trait MediaSource {
///     fn endpoint(&self) -> &'static str;
/// }
/// struct Legacy;
/// struct Signed;
/// impl MediaSource for Legacy {
///     fn endpoint(&self) -> &'static str { "v1" }
/// }
/// impl MediaSource for Signed {
///     fn endpoint(&self) -> &'static str { "v2" }
/// }
///
/// let source = FetchStrategy::Enhanced.select::<dyn MediaSource>(&Legacy, &Signed);
/// assert_eq!(source.endpoint(), "v2");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Baseline implementation, always available.
    #[default]
    Standard,
    /// Richer implementation relying on an optional capability.
    Enhanced,
}

impl FetchStrategy {
    /// Enhanced when the optional capability is available and the
    /// `disable_var` environment variable is not set.
    pub fn detect(enhanced_available: bool, disable_var: &str) -> Self {
        if enhanced_available && std::env::var_os(disable_var).is_none() {
            FetchStrategy::Enhanced
        } else {
            debug!(
                "Using standard fetch strategy (enhanced available: {})",
                enhanced_available
            );
            FetchStrategy::Standard
        }
    }

    /// The configured strategy, downgraded to standard when the enhanced
    /// capability is not available.
    pub fn configured(config: &LazyConfig, enhanced_available: bool) -> Self {
        match config.fetch_strategy {
            FetchStrategy::Enhanced if !enhanced_available => {
                warn!("Enhanced fetch strategy requested but unavailable, using standard");
                FetchStrategy::Standard
            }
            strategy => strategy,
        }
    }

    /// Pick the implementation matching this strategy.
    pub fn select<'a, C: ?Sized>(&self, standard: &'a C, enhanced: &'a C) -> &'a C {
        match self {
            FetchStrategy::Standard => standard,
            FetchStrategy::Enhanced => enhanced,
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Standard => write!(f, "standard"),
            FetchStrategy::Enhanced => write!(f, "enhanced"),
        }
    }
}

impl FromStr for FetchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "v1" => Ok(FetchStrategy::Standard),
            "enhanced" | "v2" => Ok(FetchStrategy::Enhanced),
            other => Err(Error::ConfigError(format!(
                "Unknown fetch strategy: {}",
                other
            ))),
        }
    }
}
