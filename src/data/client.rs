//! Rate-limited page client.
//!
//! Drives a [`Transport`] through an explicit retry state machine:
//!
//! ```text
//! Sending -> RateLimited -> Sending
//! Sending -> Overloaded  -> Sending
//! Sending -> Failed      (client error, fatal)
//! Sending -> Done        (success, throttled)
//! ```
//!
//! 429 retries are unbounded and honor the server's Retry-After exactly.
//! Client errors (400/401/403/404) abort immediately — there is no silent
//! fall-through back into the loop.

use crate::config::FetchConfig;
use crate::data::cancel::CancelToken;
use crate::data::transport::{PageReply, PageRequest, RateLimitState, Transport};
use crate::domain::Bar;
use crate::error::DataError;
use std::time::Duration;
use tracing::{debug, warn};

enum SendState {
    Sending,
    RateLimited { retry_after: Duration },
    Overloaded,
    Done {
        bars: Vec<Bar>,
        rate_limit: Option<RateLimitState>,
    },
    Failed(DataError),
}

pub struct RateLimitedClient {
    transport: Box<dyn Transport>,
    page_throttle: Duration,
    overload_backoff: Duration,
    last_rate_limit: Option<RateLimitState>,
}

impl RateLimitedClient {
    pub fn new(transport: Box<dyn Transport>, config: &FetchConfig) -> Self {
        Self {
            transport,
            page_throttle: config.page_throttle,
            overload_backoff: config.overload_backoff,
            last_rate_limit: None,
        }
    }

    /// Latest advisory rate-limit snapshot. Diagnostic only — the throttle
    /// below keeps the counter from engaging regardless of what it says.
    pub fn rate_limit_state(&self) -> Option<RateLimitState> {
        self.last_rate_limit
    }

    /// Issue one page request, absorbing 429/503 locally.
    pub fn fetch_page(
        &mut self,
        request: &PageRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Bar>, DataError> {
        let mut state = SendState::Sending;
        loop {
            state = match state {
                SendState::Sending => {
                    cancel.check()?;
                    match self.transport.fetch_page(request)? {
                        PageReply::Page { bars, rate_limit } => SendState::Done { bars, rate_limit },
                        PageReply::RateLimited { retry_after } => {
                            SendState::RateLimited { retry_after }
                        }
                        PageReply::Overloaded => SendState::Overloaded,
                        PageReply::Rejected { status, message } => {
                            SendState::Failed(DataError::ClientRequest { status, message })
                        }
                    }
                }
                SendState::RateLimited { retry_after } => {
                    warn!(symbol = %request.symbol, ?retry_after, "rate limited, backing off");
                    cancel.sleep(retry_after)?;
                    SendState::Sending
                }
                SendState::Overloaded => {
                    warn!(
                        symbol = %request.symbol,
                        backoff = ?self.overload_backoff,
                        "exchange overloaded, backing off"
                    );
                    cancel.sleep(self.overload_backoff)?;
                    SendState::Sending
                }
                SendState::Failed(err) => return Err(err),
                SendState::Done { bars, rate_limit } => {
                    if let Some(snapshot) = rate_limit {
                        self.last_rate_limit = Some(snapshot);
                        debug!(
                            limit = snapshot.limit,
                            remaining = snapshot.remaining,
                            "rate-limit snapshot"
                        );
                    }
                    // Proactive throttle after every successful page.
                    cancel.sleep(self.page_throttle)?;
                    return Ok(bars);
                }
            };
        }
    }
}
