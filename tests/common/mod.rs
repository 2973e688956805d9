//! Shared fixtures: a deterministic in-memory exchange and bar builders.

#![allow(dead_code)]

use bitmex_bars::data::transport::{PageReply, PageRequest, RateLimitState, Transport};
use bitmex_bars::{Bar, DataError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, h: u32, min: u32) -> DateTime<Utc> {
    day.and_hms_opt(h, min, 0).unwrap().and_utc()
}

/// Deterministic bar whose prices derive from the minute index, so identical
/// ranges always produce identical series.
pub fn minute_bar(symbol: &str, timestamp: DateTime<Utc>) -> Bar {
    let minute = (timestamp.timestamp() / 60) as f64;
    Bar {
        timestamp,
        symbol: symbol.to_string(),
        open: minute,
        high: minute + 1.0,
        low: minute - 1.0,
        close: minute + 0.5,
        volume: 100,
    }
}

/// One full day of 1-minute bars labeled at bucket open: `[day, day+1)`.
pub fn full_day(symbol: &str, day: NaiveDate) -> Vec<Bar> {
    let day_start = at(day, 0, 0);
    (0..1440)
        .map(|i| minute_bar(symbol, day_start + Duration::minutes(i)))
        .collect()
}

/// Scripted reply the fake exchange emits before serving real pages.
enum PreFault {
    RateLimited { retry_after: StdDuration },
    Overloaded,
    Rejected { status: u16, message: String },
}

/// In-memory exchange serving deterministic minute bars, with request logging
/// and scriptable faults.
pub struct FakeExchange {
    empty_days: Vec<NaiveDate>,
    prelude: Mutex<VecDeque<PreFault>>,
    calls: Mutex<Vec<PageRequest>>,
    bars_by_day: HashMap<NaiveDate, Vec<Bar>>,
}

impl FakeExchange {
    pub fn new(symbol: &str, days: &[NaiveDate]) -> Self {
        let bars_by_day = days
            .iter()
            .map(|&d| (d, full_day(symbol, d)))
            .collect();
        Self {
            empty_days: Vec::new(),
            prelude: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            bars_by_day,
        }
    }

    /// Mark a day as present but empty — the upstream anomaly the fetcher
    /// must refuse.
    pub fn with_empty_day(mut self, day: NaiveDate) -> Self {
        self.empty_days.push(day);
        self
    }

    /// Queue one 429 reply ahead of normal serving.
    pub fn push_rate_limit(&self, retry_after: StdDuration) {
        self.prelude
            .lock()
            .unwrap()
            .push_back(PreFault::RateLimited { retry_after });
    }

    /// Queue one 503 reply ahead of normal serving.
    pub fn push_overload(&self) {
        self.prelude.lock().unwrap().push_back(PreFault::Overloaded);
    }

    /// Queue one non-retryable client error ahead of normal serving.
    pub fn push_rejection(&self, status: u16, message: &str) {
        self.prelude.lock().unwrap().push_back(PreFault::Rejected {
            status,
            message: message.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn serve(&self, request: &PageRequest) -> PageReply {
        let day = request.start_time.date_naive();
        if self.empty_days.contains(&day) {
            return PageReply::Page {
                bars: Vec::new(),
                rate_limit: None,
            };
        }

        let bars = self.bars_by_day.get(&day).cloned().unwrap_or_default();
        let page: Vec<Bar> = bars
            .into_iter()
            .filter(|b| b.timestamp >= request.start_time && b.timestamp < request.end_time)
            .skip(request.offset as usize)
            .take(request.count as usize)
            .collect();

        PageReply::Page {
            bars: page,
            rate_limit: Some(RateLimitState {
                limit: 60,
                remaining: 59,
                reset_at: request.start_time,
            }),
        }
    }
}

/// Clonable transport handle so tests can keep inspecting the exchange after
/// the pipeline takes ownership of the transport.
#[derive(Clone)]
pub struct ExchangeHandle(pub Arc<FakeExchange>);

impl Transport for ExchangeHandle {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageReply, DataError> {
        self.0.calls.lock().unwrap().push(request.clone());

        if let Some(fault) = self.0.prelude.lock().unwrap().pop_front() {
            return Ok(match fault {
                PreFault::RateLimited { retry_after } => PageReply::RateLimited { retry_after },
                PreFault::Overloaded => PageReply::Overloaded,
                PreFault::Rejected { status, message } => PageReply::Rejected { status, message },
            });
        }

        Ok(self.0.serve(request))
    }
}
