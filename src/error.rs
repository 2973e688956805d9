//! Structured error types for the fetch/cache pipeline.
//!
//! 429 and 503 responses never surface here — they are absorbed locally by
//! the client's retry states and are visible to callers only as latency.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// 400/401/403/404 from the exchange. Never retried; fails the whole call.
    #[error("exchange rejected the request (HTTP {status}): {message}")]
    ClientRequest { status: u16, message: String },

    /// A page came back empty where data was expected, or timestamps stopped
    /// increasing across a page seam under the `Reject` duplicate policy.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// A shard the fill protocol guaranteed to exist is gone. Always fatal —
    /// it means a protocol violation or external cache tampering.
    #[error("missing shard at {path}")]
    MissingShard { path: PathBuf },

    /// Invalid range, unknown resolution, or bad cache root.
    #[error("config error: {0}")]
    Config(String),

    /// Shard I/O or serialization failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Transport-level failure: connect/timeout, malformed body, or a status
    /// outside the classified set.
    #[error("network error: {0}")]
    Network(String),

    /// The cancellation token fired during a fetch or a backoff sleep.
    #[error("operation cancelled")]
    Cancelled,
}
