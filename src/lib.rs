//! bitmex-bars — minute-bar acquisition and disk cache for the BitMEX
//! bucketed-trade endpoint.
//!
//! The crate assembles a continuous, gap-free OHLCV series for an arbitrary
//! UTC time range. It survives pagination limits, 429/503 responses, and
//! throttles itself proactively between pages, persisting one immutable CSV
//! shard per (symbol, resolution, calendar day) so overlapping requests never
//! refetch data already on disk.
//!
//! The sole read surface for strategy/backtest code is
//! [`data::BarStore::get_bars`].

pub mod config;
pub mod data;
pub mod domain;
pub mod error;

pub use config::{ApiCredentials, DuplicatePolicy, FetchConfig};
pub use data::{
    BarStore, CancelToken, DayFetcher, HttpTransport, RateLimitedClient, ShardCache, ShardKey,
    Transport,
};
pub use domain::{Bar, Resolution};
pub use error::DataError;
