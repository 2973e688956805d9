//! Fetch configuration.
//!
//! Everything that used to be a module-level constant lives here instead and
//! is passed to each component at construction time.

use std::time::Duration;

/// API key pair for signed requests. The bucketed-trade endpoint is public,
/// so this is optional.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

/// What to do when a page seam yields a bar whose timestamp is not strictly
/// greater than the last accepted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail the day's fetch with a `DataIntegrity` error.
    #[default]
    Reject,
    /// Drop the seam bar and keep paging.
    Collapse,
}

/// Settings for the fetch pipeline.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Exchange origin, e.g. `https://www.bitmex.com`.
    pub base_url: String,
    /// Bars requested per page.
    pub page_size: u32,
    /// Unconditional sleep after every successful page, so the server-side
    /// limit counter never has to engage.
    pub page_throttle: Duration,
    /// Sleep before retrying after a 503.
    pub overload_backoff: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
    pub credentials: Option<ApiCredentials>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.bitmex.com".into(),
            page_size: 500,
            page_throttle: Duration::from_secs(2),
            overload_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            duplicate_policy: DuplicatePolicy::default(),
            credentials: None,
        }
    }
}

impl FetchConfig {
    /// Default settings against the testnet endpoint.
    pub fn testnet() -> Self {
        Self {
            base_url: "https://testnet.bitmex.com".into(),
            ..Self::default()
        }
    }
}
