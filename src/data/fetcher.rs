//! Day fetcher — pages one UTC calendar day of bars into a shard.
//!
//! The request window stays pinned to `[day 00:00, day+1 00:00)`; only the
//! page offset advances. The loop cursor tracks the last received timestamp
//! plus one bin width, so a fully delivered day terminates without asking the
//! exchange for a page it does not have.

use crate::config::{DuplicatePolicy, FetchConfig};
use crate::data::cancel::CancelToken;
use crate::data::client::RateLimitedClient;
use crate::data::transport::{PageRequest, RateLimitState};
use crate::domain::{Bar, Resolution};
use crate::error::DataError;
use chrono::NaiveDate;
use tracing::{debug, info};

pub struct DayFetcher {
    client: RateLimitedClient,
    page_size: u32,
    duplicate_policy: DuplicatePolicy,
}

impl DayFetcher {
    pub fn new(client: RateLimitedClient, config: &FetchConfig) -> Self {
        Self {
            client,
            page_size: config.page_size,
            duplicate_policy: config.duplicate_policy,
        }
    }

    /// Latest advisory rate-limit snapshot from the underlying client.
    pub fn rate_limit_state(&self) -> Option<RateLimitState> {
        self.client.rate_limit_state()
    }

    /// Fetch every bar of one UTC calendar day, in strictly ascending
    /// timestamp order.
    ///
    /// The exchange is expected to always have data for a requested window:
    /// a zero-bar page is an upstream anomaly and fails the day with
    /// `DataIntegrity` rather than being retried.
    pub fn fetch_day(
        &mut self,
        symbol: &str,
        resolution: Resolution,
        day: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<Vec<Bar>, DataError> {
        let day_start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        info!(%symbol, %resolution, %day, "fetching day");

        let mut bars: Vec<Bar> = Vec::new();
        let mut cursor = day_start;
        let mut offset: u64 = 0;

        while cursor < day_end {
            let request = PageRequest {
                symbol: symbol.to_string(),
                resolution,
                start_time: day_start,
                end_time: day_end,
                offset,
                count: self.page_size,
            };

            let page = self.client.fetch_page(&request, cancel)?;
            if page.is_empty() {
                return Err(DataError::DataIntegrity(format!(
                    "empty page for {symbol} {day} at offset {offset}"
                )));
            }

            let page_len = page.len() as u64;
            let page_last = page.last().unwrap().timestamp;
            self.append_page(&mut bars, page)?;

            cursor = page_last + resolution.bin_width();
            // The offset advances by the received page size even when the
            // duplicate policy collapsed seam bars, matching the exchange's
            // pagination semantics.
            offset += page_len;
        }

        // Defensive clamp against off-by-one responses at the day boundary.
        bars.retain(|bar| bar.timestamp < day_end);

        debug!(count = bars.len(), %symbol, %day, "day fetch complete");
        Ok(bars)
    }

    /// Append one page, enforcing strictly increasing timestamps across the
    /// page seam per the configured duplicate policy.
    fn append_page(&self, bars: &mut Vec<Bar>, page: Vec<Bar>) -> Result<(), DataError> {
        for bar in page {
            match bars.last() {
                Some(last) if bar.timestamp <= last.timestamp => match self.duplicate_policy {
                    DuplicatePolicy::Reject => {
                        return Err(DataError::DataIntegrity(format!(
                            "non-increasing timestamp {} after {} at a page seam",
                            bar.timestamp, last.timestamp
                        )));
                    }
                    DuplicatePolicy::Collapse => continue,
                },
                _ => bars.push(bar),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transport::{PageReply, Transport};
    use chrono::{DateTime, Duration, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    struct Scripted {
        replies: Mutex<VecDeque<PageReply>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<PageReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn fetch_page(&self, request: &PageRequest) -> Result<PageReply, DataError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted"))
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 2).unwrap()
    }

    fn minute_bar(ts: DateTime<Utc>) -> Bar {
        Bar {
            timestamp: ts,
            symbol: "XBTUSD".into(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10,
        }
    }

    fn minute_bars(day: NaiveDate, range: std::ops::Range<i64>) -> Vec<Bar> {
        let day_start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
        range
            .map(|i| minute_bar(day_start + Duration::minutes(i)))
            .collect()
    }

    fn page(bars: Vec<Bar>) -> PageReply {
        PageReply::Page {
            bars,
            rate_limit: None,
        }
    }

    fn fetcher(replies: Vec<PageReply>, policy: DuplicatePolicy) -> DayFetcher {
        let config = FetchConfig {
            page_throttle: StdDuration::from_millis(1),
            overload_backoff: StdDuration::from_millis(1),
            duplicate_policy: policy,
            ..FetchConfig::default()
        };
        let client = RateLimitedClient::new(Box::new(Scripted::new(replies)), &config);
        DayFetcher::new(client, &config)
    }

    #[test]
    fn pages_a_full_day_and_terminates() {
        let replies = vec![
            page(minute_bars(day(), 0..500)),
            page(minute_bars(day(), 500..1000)),
            page(minute_bars(day(), 1000..1440)),
        ];
        let mut fetcher = fetcher(replies, DuplicatePolicy::Reject);

        let bars = fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap();

        assert_eq!(bars.len(), 1440);
        let day_start = day().and_hms_opt(0, 0, 0).unwrap().and_utc();
        assert_eq!(bars[0].timestamp, day_start);
        assert_eq!(
            bars[1439].timestamp,
            day_start + Duration::minutes(1439)
        );
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn empty_page_is_a_data_integrity_error() {
        let mut fetcher = fetcher(vec![page(vec![])], DuplicatePolicy::Reject);

        let err = fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DataError::DataIntegrity(_)));
    }

    #[test]
    fn seam_duplicate_fails_under_reject_policy() {
        // Second page re-sends the last bar of the first page.
        let replies = vec![
            page(minute_bars(day(), 0..500)),
            page(minute_bars(day(), 499..1000)),
        ];
        let mut fetcher = fetcher(replies, DuplicatePolicy::Reject);

        let err = fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DataError::DataIntegrity(_)));
    }

    #[test]
    fn seam_duplicate_is_dropped_under_collapse_policy() {
        let replies = vec![
            page(minute_bars(day(), 0..500)),
            page(minute_bars(day(), 499..1000)),
            page(minute_bars(day(), 1000..1440)),
        ];
        let mut fetcher = fetcher(replies, DuplicatePolicy::Collapse);

        let bars = fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap();

        assert_eq!(bars.len(), 1440);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn clamps_bars_at_or_after_the_day_end() {
        // Off-by-one response: the final page includes the first bar of the
        // next day.
        let replies = vec![
            page(minute_bars(day(), 0..500)),
            page(minute_bars(day(), 500..1000)),
            page(minute_bars(day(), 1000..1441)),
        ];
        let mut fetcher = fetcher(replies, DuplicatePolicy::Reject);

        let bars = fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap();

        let day_end = day().and_hms_opt(0, 0, 0).unwrap().and_utc() + Duration::days(1);
        assert_eq!(bars.len(), 1440);
        assert!(bars.iter().all(|b| b.timestamp < day_end));
    }

    #[test]
    fn requests_pin_the_window_and_advance_the_offset() {
        let transport = Scripted::new(vec![
            page(minute_bars(day(), 0..500)),
            page(minute_bars(day(), 500..1000)),
            page(minute_bars(day(), 1000..1440)),
        ]);
        let requests_handle = std::sync::Arc::new(transport);

        struct Shared(std::sync::Arc<Scripted>);
        impl Transport for Shared {
            fn fetch_page(&self, request: &PageRequest) -> Result<PageReply, DataError> {
                self.0.fetch_page(request)
            }
        }

        let config = FetchConfig {
            page_throttle: StdDuration::from_millis(1),
            ..FetchConfig::default()
        };
        let client =
            RateLimitedClient::new(Box::new(Shared(requests_handle.clone())), &config);
        let mut fetcher = DayFetcher::new(client, &config);

        fetcher
            .fetch_day("XBTUSD", Resolution::Minute, day(), &CancelToken::new())
            .unwrap();

        let requests = requests_handle.requests.lock().unwrap();
        let day_start = day().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let offsets: Vec<u64> = requests.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 500, 1000]);
        assert!(requests
            .iter()
            .all(|r| r.start_time == day_start && r.end_time == day_start + Duration::days(1)));
        assert!(requests.iter().all(|r| r.count == 500));
    }
}
