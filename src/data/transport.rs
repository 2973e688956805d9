//! Exchange transport — one paginated request against `/trade/bucketed`.
//!
//! The [`Transport`] trait is the seam between the retry loop and the actual
//! exchange: the production [`HttpTransport`] speaks HTTP over blocking
//! `reqwest`, tests script the trait with an in-memory exchange. All HTTP
//! knowledge (status classification, header parsing, request signing) lives
//! here; the retry policy lives in the client.

use crate::config::{ApiCredentials, FetchConfig};
use crate::domain::{Bar, Resolution};
use crate::error::DataError;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

/// One page request against the bucketed-trade endpoint.
///
/// `start_time`/`end_time` stay pinned to the full day window; only `offset`
/// advances between pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub symbol: String,
    pub resolution: Resolution,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub offset: u64,
    pub count: u32,
}

/// Advisory snapshot of the server-side limit counter, parsed from the
/// `x-ratelimit-*` response headers. Logged, never used to gate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Classified outcome of one page request.
#[derive(Debug)]
pub enum PageReply {
    /// 2xx with a parsed body.
    Page {
        bars: Vec<Bar>,
        rate_limit: Option<RateLimitState>,
    },
    /// 429 — retry after the server-mandated delay.
    RateLimited { retry_after: Duration },
    /// 503 — retry after a short fixed backoff.
    Overloaded,
    /// 400/401/403/404 — not retryable.
    Rejected { status: u16, message: String },
}

/// Capability seam between the retry loop and the exchange.
pub trait Transport: Send + Sync {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageReply, DataError>;
}

/// Bucketed-trade record as returned by the exchange. Buckets with no trades
/// carry null prices. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct TradeBin {
    timestamp: DateTime<Utc>,
    symbol: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<u64>,
}

impl TradeBin {
    fn into_bar(self) -> Bar {
        Bar {
            timestamp: self.timestamp,
            symbol: self.symbol,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close: self.close.unwrap_or(f64::NAN),
            volume: self.volume.unwrap_or(0),
        }
    }
}

/// Blocking HTTP transport against the real exchange.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
        })
    }

    /// Path + query, percent-encoded by hand so the signed string and the
    /// request URL are byte-identical.
    fn path_and_query(request: &PageRequest) -> String {
        format!(
            "/api/v1/trade/bucketed?symbol={}&binSize={}&start={}&startTime={}&endTime={}&count={}",
            request.symbol,
            request.resolution,
            request.offset,
            encode_timestamp(request.start_time),
            encode_timestamp(request.end_time),
            request.count,
        )
    }
}

impl Transport for HttpTransport {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageReply, DataError> {
        let path = Self::path_and_query(request);
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self.client.get(&url);
        if let Some(creds) = &self.credentials {
            let expires = (Utc::now() + chrono::Duration::seconds(5)).timestamp();
            let signature = sign(&creds.secret, &format!("GET{path}{expires}"))?;
            builder = builder
                .header("api-key", &creds.key)
                .header("api-expires", expires.to_string())
                .header("api-signature", signature);
        }

        let response = builder
            .send()
            .map_err(|e| DataError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let rate_limit = rate_limit_from_headers(response.headers());

        match status {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                Ok(PageReply::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                })
            }
            503 => Ok(PageReply::Overloaded),
            400 | 401 | 403 | 404 => {
                let message = response.text().unwrap_or_default();
                Ok(PageReply::Rejected { status, message })
            }
            200..=299 => {
                let bins: Vec<TradeBin> = response
                    .json()
                    .map_err(|e| DataError::Network(format!("malformed bucketed-trade body: {e}")))?;
                let bars = bins.into_iter().map(TradeBin::into_bar).collect();
                Ok(PageReply::Page { bars, rate_limit })
            }
            other => Err(DataError::Network(format!("unexpected HTTP {other} from {url}"))),
        }
    }
}

type HmacSha256 = Hmac<Sha256>;

/// hex(HMAC-SHA256(secret, verb + path-with-query + expires)).
fn sign(secret: &str, payload: &str) -> Result<String, DataError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| DataError::Config("invalid API secret".into()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "%3A")
}

fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitState> {
    let parse = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
    };

    let limit = parse("x-ratelimit-limit")?;
    let remaining = parse("x-ratelimit-remaining")?;
    let reset_at = Utc.timestamp_opt(parse("x-ratelimit-reset")?, 0).single()?;

    Some(RateLimitState {
        limit: limit as u32,
        remaining: remaining.max(0) as u32,
        reset_at,
    })
}
