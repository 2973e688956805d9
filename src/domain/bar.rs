//! Bar — one OHLCV bucket of trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV record for a fixed time bucket of one symbol.
///
/// `timestamp` is the UTC open of the bucket and is the row key everywhere:
/// within a shard, timestamps are strictly increasing and unique. In cache
/// shards the column is named `last_traded`.
///
/// Buckets with no trades carry NaN prices and zero volume, mirroring the
/// exchange's null fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "last_traded")]
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}
