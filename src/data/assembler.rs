//! Range assembly — the read surface consumed by strategy/backtest code.
//!
//! `get_bars` runs a linear fill → assemble → trim pipeline: fetch and
//! persist every missing day in ascending order, read every covering shard,
//! concatenate, and trim to the exact `[start, end)` boundaries. The call
//! either produces a complete, correctly bounded series or fails — no
//! partial results.

use crate::config::FetchConfig;
use crate::data::cache::{ShardCache, ShardKey};
use crate::data::cancel::CancelToken;
use crate::data::client::RateLimitedClient;
use crate::data::fetcher::DayFetcher;
use crate::data::transport::{HttpTransport, RateLimitState};
use crate::domain::{Bar, Resolution};
use crate::error::DataError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;
use tracing::debug;

/// One (symbol, resolution) bar stream backed by the shard cache, filled on
/// demand from the exchange.
pub struct BarStore {
    symbol: String,
    resolution: Resolution,
    fetcher: DayFetcher,
    cache: ShardCache,
}

impl std::fmt::Debug for BarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarStore")
            .field("symbol", &self.symbol)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

impl BarStore {
    pub fn new(
        symbol: impl Into<String>,
        resolution: Resolution,
        fetcher: DayFetcher,
        cache: ShardCache,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            resolution,
            fetcher,
            cache,
        }
    }

    /// Build the full pipeline over the real HTTP transport.
    ///
    /// The cache root must already exist; a missing root is a config error,
    /// not something to silently create.
    pub fn open(
        symbol: impl Into<String>,
        resolution: Resolution,
        cache_root: impl Into<PathBuf>,
        config: &FetchConfig,
    ) -> Result<Self, DataError> {
        let cache_root = cache_root.into();
        if !cache_root.is_dir() {
            return Err(DataError::Config(format!(
                "cache root {} does not exist",
                cache_root.display()
            )));
        }

        let transport = HttpTransport::new(config)?;
        let client = RateLimitedClient::new(Box::new(transport), config);
        let fetcher = DayFetcher::new(client, config);
        Ok(Self::new(symbol, resolution, fetcher, ShardCache::new(cache_root)))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Latest advisory rate-limit snapshot, for logging.
    pub fn rate_limit_state(&self) -> Option<RateLimitState> {
        self.fetcher.rate_limit_state()
    }

    /// Time-ordered bars in `[start, end)` (inclusive start, exclusive end).
    ///
    /// Days already on disk are served from the cache without touching the
    /// network; two consecutive calls for the same range return identical
    /// series and the second issues zero requests.
    pub fn get_bars(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Vec<Bar>, DataError> {
        if start >= end {
            return Err(DataError::Config(format!(
                "invalid range: start {start} is not before end {end}"
            )));
        }

        let days = covered_days(start, end);

        // Fill: fetch and persist any missing day, ascending.
        for &day in &days {
            let key = self.key(day);
            if self.cache.exists(&key) {
                debug!(%day, symbol = %self.symbol, "cache hit");
                continue;
            }
            debug!(%day, symbol = %self.symbol, "cache miss");
            let bars = self
                .fetcher
                .fetch_day(&self.symbol, self.resolution, day, cancel)?;
            self.cache.write(&key, &bars)?;
        }

        // Assemble: concatenate every covering shard in day order.
        let mut series = Vec::new();
        for &day in &days {
            series.extend(self.cache.read(&self.key(day))?);
        }

        // Trim to the requested boundaries.
        series.retain(|bar| bar.timestamp >= start && bar.timestamp < end);
        Ok(series)
    }

    fn key(&self, day: NaiveDate) -> ShardKey {
        ShardKey::new(&self.symbol, self.resolution, day)
    }
}

/// UTC calendar days whose shards cover `[start, end)`, ascending.
///
/// A midnight-aligned `end` is an exclusive day boundary; otherwise the end
/// day itself is still touched by the range and must be covered.
fn covered_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    let first = start.date_naive();
    let last = if end.time() == NaiveTime::MIN {
        end.date_naive()
    } else {
        end.date_naive() + Duration::days(1)
    };

    let mut days = Vec::new();
    let mut day = first;
    while day < last {
        days.push(day);
        day += Duration::days(1);
    }
    days
}
