//! Per-category retrieval from the arXiv export API.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use reqwest::blocking::Client;
use url::Url;
use std::cell::Cell;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::paper::UpstreamRecord;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Inclusive range of submission dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `[end - days, end]`. A paper submitted exactly `days` ago is inside.
    /// Spans past the calendar range clamp to the earliest date.
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        let start = ChronoDuration::try_days(days)
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn query_clause(&self) -> String {
        format!(
            "submittedDate:[{}000000 TO {}235959]",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d")
        )
    }
}

/// The current month and the `months - 1` before it, newest first, each
/// labelled `YYYY-MM`.
pub fn month_windows(today: NaiveDate, months: u32) -> Vec<(String, DateWindow)> {
    let mut windows = Vec::with_capacity(months as usize);
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..months {
        if let Some(window) = DateWindow::for_month(year, month) {
            windows.push((format!("{year:04}-{month:02}"), window));
        }
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    windows
}

/// Anything that can answer "papers in this category submitted in this
/// window". The live implementation is [`ArxivClient`].
pub trait PaperSource {
    fn fetch_category(
        &self,
        category: &str,
        window: &DateWindow,
        max_results: usize,
    ) -> Result<Vec<UpstreamRecord>>;
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<UpstreamRecord>,
    pub covered: Vec<String>,
    pub failed: Vec<String>,
}

/// Query each category in turn. A failing category is logged and skipped;
/// only when every category fails is the whole fetch an error.
pub fn fetch_categories(
    source: &dyn PaperSource,
    categories: &[String],
    window: &DateWindow,
    max_results: usize,
) -> Result<FetchOutcome> {
    let mut outcome = FetchOutcome::default();
    for category in categories {
        info!(
            category = %category,
            from = %window.start,
            to = %window.end,
            "fetching category"
        );
        match source.fetch_category(category, window, max_results) {
            Ok(records) => {
                info!(category = %category, count = records.len(), "fetched category");
                outcome.records.extend(records);
                outcome.covered.push(category.clone());
            }
            Err(err) => {
                warn!(category = %category, error = %err, "category fetch failed, skipping");
                outcome.failed.push(category.clone());
            }
        }
    }
    if outcome.covered.is_empty() && !categories.is_empty() {
        return Err(PipelineError::UpstreamUnavailable {
            failed: outcome.failed,
        });
    }
    Ok(outcome)
}

/// Parse one Atom response; malformed entries are dropped with a warning.
pub fn parse_feed(bytes: &[u8], category: &str) -> Result<Vec<UpstreamRecord>> {
    let feed = feed_rs::parser::parse(bytes).map_err(|err| PipelineError::Feed(err.to_string()))?;
    let mut records = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        match UpstreamRecord::from_entry(entry, category) {
            Ok(record) => records.push(record),
            Err(err) => warn!(category = %category, error = %err, "skipping malformed entry"),
        }
    }
    Ok(records)
}

/// Blocking arXiv client. Requests are spaced at least `request_delay`
/// apart across all categories.
pub struct ArxivClient {
    client: Client,
    base_url: Url,
    results_per_page: usize,
    request_delay: Duration,
    last_request: Cell<Option<Instant>>,
}

impl ArxivClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let base_url = Url::parse(&config.api_base_url).map_err(|err| {
            PipelineError::Config(format!("invalid api_base_url {}: {err}", config.api_base_url))
        })?;
        Ok(Self {
            client,
            base_url,
            results_per_page: config.results_per_page.max(1),
            request_delay: Duration::from_secs_f64(config.request_delay_secs),
            last_request: Cell::new(None),
        })
    }

    fn query_url(&self, category: &str, window: &DateWindow, start: usize, count: usize) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(
                "search_query",
                &format!("cat:{category} AND {}", window.query_clause()),
            )
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &count.to_string())
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending");
        url
    }

    fn throttle(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                sleep(self.request_delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn get_page(&self, url: Url) -> Result<Vec<u8>> {
        self.throttle();
        debug!(url = %url, "requesting arXiv page");
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl PaperSource for ArxivClient {
    fn fetch_category(
        &self,
        category: &str,
        window: &DateWindow,
        max_results: usize,
    ) -> Result<Vec<UpstreamRecord>> {
        let mut records = Vec::new();
        let mut start = 0;
        while start < max_results {
            let count = self.results_per_page.min(max_results - start);
            let body = self.get_page(self.query_url(category, window, start, count))?;
            let page = parse_feed(&body, category)?;
            let received = page.len();
            debug!(category = %category, start, received, "page received");
            records.extend(page);
            if received < count {
                break;
            }
            start += count;
        }
        Ok(records)
    }
}
