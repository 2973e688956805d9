//! Market-data acquisition and disk cache.
//!
//! Control flow for a cache miss:
//! `BarStore` → (per missing day) `DayFetcher` → `RateLimitedClient` →
//! `Transport`, then `ShardCache::write`; assembly reads the covering shards
//! back and trims to the requested boundaries.

pub mod assembler;
pub mod cache;
pub mod cancel;
pub mod client;
pub mod fetcher;
pub mod transport;

pub use assembler::BarStore;
pub use cache::{ShardCache, ShardKey};
pub use cancel::CancelToken;
pub use client::RateLimitedClient;
pub use fetcher::DayFetcher;
pub use transport::{HttpTransport, PageReply, PageRequest, RateLimitState, Transport};
