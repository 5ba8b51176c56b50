//! Yahoo Finance price source.
//!
//! Fetches daily bars from Yahoo's v8 chart API with a blocking client.
//! Requests share one rate limiter across fetch workers; timeouts, 5xx and
//! 429 responses are retried with exponential backoff before the ticker is
//! reported as failed.

use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::Deserialize;

use crate::domain::error::{FetchCause, FetchError, TickercastError};
use crate::domain::series::{Column, PriceSeries};
use crate::domain::ticker::TickerSymbol;
use crate::ports::data_port::PriceSource;

pub const DEFAULT_CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const SECONDS_PER_DAY: i64 = 86_400;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Connection and politeness settings for [`YahooAdapter`].
#[derive(Debug, Clone)]
pub struct YahooSettings {
    /// Chart endpoint; the symbol and query string are appended to it.
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_second: u32,
    pub lowercase_symbols: bool,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHART_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            requests_per_second: 2,
            lowercase_symbols: true,
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    limiter: DirectRateLimiter,
    settings: YahooSettings,
    base_delay: Duration,
}

impl YahooAdapter {
    pub fn from_settings(settings: YahooSettings) -> Result<Self, TickercastError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TickercastError::DataSource {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            settings,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Block until the shared limiter grants a request slot.
    fn acquire(&self) {
        while let Err(not_until) = self.limiter.check() {
            thread::sleep(not_until.wait_time_from(DefaultClock::default().now()));
        }
    }

    fn fetch_with_retry(
        &self,
        ticker: &TickerSymbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, FetchCause> {
        let symbol = ticker.query_symbol(self.settings.lowercase_symbols);
        let url = chart_url(&self.settings.base_url, &symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                log::debug!("{ticker}: retry {attempt} in {delay:?}");
                thread::sleep(delay);
            }

            self.acquire();
            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(FetchCause::UnknownTicker);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(FetchCause::RateLimited);
                        continue;
                    }
                    if status.is_server_error() {
                        last_error = Some(FetchCause::Network(format!("HTTP {status}")));
                        continue;
                    }
                    if !status.is_success() {
                        return Err(FetchCause::Source(format!("HTTP {status}")));
                    }

                    let chart: ChartResponse = resp
                        .json()
                        .map_err(|e| FetchCause::Format(format!("invalid chart JSON: {e}")))?;
                    return parse_response(chart, start, end);
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(FetchCause::Timeout {
                        secs: self.settings.timeout_secs,
                    });
                }
                Err(e) if e.is_connect() => {
                    last_error = Some(FetchCause::Network(e.to_string()));
                }
                Err(e) => return Err(FetchCause::Network(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchCause::Network("max retries exceeded".into())))
    }
}

/// Delay before retry `attempt` (1-based): base * 2^(attempt-1), capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn chart_url(base_url: &str, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
    let base_url = base_url.trim_end_matches('/');
    let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
    let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + SECONDS_PER_DAY - 1;
    format!(
        "{base_url}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d\
         &includeAdjustedClose=true&events=div%2Csplit"
    )
}

/// Chart payload into a normalized series restricted to `start..=end`.
///
/// Rows where every price is null (holidays) are skipped. The adjusted close
/// column is left absent when the payload has none.
fn parse_response(
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, FetchCause> {
    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => return Err(FetchCause::UnknownTicker),
        (None, Some(err)) => {
            return Err(FetchCause::Format(format!("{}: {}", err.code, err.description)));
        }
        (None, None) => return Err(FetchCause::Format("empty result with no error".into())),
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchCause::Format("result array is empty".into()))?;
    let Some(timestamps) = data.timestamp else {
        return Err(FetchCause::Empty);
    };
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchCause::Format("no quote data".into()))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);
    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

    let mut dates = Vec::with_capacity(timestamps.len());
    let mut open = Vec::with_capacity(timestamps.len());
    let mut close = Vec::with_capacity(timestamps.len());
    let mut adjusted = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchCause::Format(format!("invalid timestamp: {ts}")))?;
        if date < start || date > end {
            continue;
        }

        let o = quote.open.get(i).copied().flatten();
        let c = quote.close.get(i).copied().flatten();
        let a = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
        if o.is_none() && c.is_none() && a.is_none() {
            continue;
        }

        dates.push(date);
        open.push(o.unwrap_or(f64::NAN));
        close.push(c.unwrap_or(f64::NAN));
        adjusted.push(a.unwrap_or(f64::NAN));
    }

    if dates.is_empty() {
        return Err(FetchCause::Empty);
    }

    let mut series = PriceSeries::new()
        .with_dates(dates)
        .with_column(Column::Open, open)
        .with_column(Column::Close, close);
    if adj_closes.is_some() {
        series = series.with_column(Column::AdjustedClose, adjusted);
    }
    Ok(series.normalized())
}

impl PriceSource for YahooAdapter {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(
        &self,
        ticker: &TickerSymbol,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        if start_date > end_date {
            return Err(FetchError::new(
                ticker,
                FetchCause::InvalidRange {
                    start: start_date,
                    end: end_date,
                },
            ));
        }
        self.fetch_with_retry(ticker, start_date, end_date)
            .map_err(|cause| FetchError::new(ticker, cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn parse(body: &str) -> Result<PriceSeries, FetchCause> {
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        parse_response(resp, d(2000, 1, 1), d(2100, 1, 1))
    }

    // 2024-01-02 and 2024-01-03 14:30 UTC, plus a holiday row of nulls.
    const SAMPLE: &str = r#"{
      "chart": {
        "result": [{
          "meta": {"symbol": "AAPL", "gmtoffset": -18000},
          "timestamp": [1704205800, 1704292200, 1704378600],
          "indicators": {
            "quote": [{
              "open": [187.15, 184.22, null],
              "high": [188.44, 185.88, null],
              "low": [183.89, 183.43, null],
              "close": [185.64, 184.25, null],
              "volume": [82488700, 58414500, null]
            }],
            "adjclose": [{"adjclose": [184.73, 183.35, null]}]
          }
        }],
        "error": null
      }
    }"#;

    #[test]
    fn parses_chart_payload() {
        let s = parse(SAMPLE).unwrap();
        assert_eq!(s.dates().unwrap(), &[d(2024, 1, 2), d(2024, 1, 3)]);
        assert_eq!(s.values(Column::Open).unwrap(), &[187.15, 184.22]);
        assert_eq!(s.values(Column::Close).unwrap(), &[185.64, 184.25]);
        assert_eq!(s.values(Column::AdjustedClose).unwrap(), &[184.73, 183.35]);
    }

    #[test]
    fn restricts_to_requested_range() {
        let resp: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let s = parse_response(resp, d(2024, 1, 3), d(2024, 1, 3)).unwrap();
        assert_eq!(s.dates().unwrap(), &[d(2024, 1, 3)]);
    }

    #[test]
    fn missing_adjclose_leaves_column_absent() {
        let body = r#"{"chart": {"result": [{
            "timestamp": [1704205800],
            "indicators": {"quote": [{"open": [1.0], "close": [2.0]}]}
        }], "error": null}}"#;
        let s = parse(body).unwrap();
        assert!(!s.has(Column::AdjustedClose));
        assert!(s.has(Column::Open));
    }

    #[test]
    fn not_found_maps_to_unknown_ticker() {
        let body = r#"{"chart": {"result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert_eq!(parse(body).unwrap_err(), FetchCause::UnknownTicker);
    }

    #[test]
    fn other_errors_map_to_format() {
        let body = r#"{"chart": {"result": null,
            "error": {"code": "Bad Request", "description": "Invalid input"}}}"#;
        assert_eq!(
            parse(body).unwrap_err(),
            FetchCause::Format("Bad Request: Invalid input".into())
        );
    }

    #[test]
    fn no_timestamps_is_empty() {
        let body = r#"{"chart": {"result": [{
            "indicators": {"quote": [{}], "adjclose": [{"adjclose": []}]}
        }], "error": null}}"#;
        assert_eq!(parse(body).unwrap_err(), FetchCause::Empty);
    }

    #[test]
    fn chart_url_covers_whole_end_day() {
        let url = chart_url(DEFAULT_CHART_URL, "aapl", d(2024, 1, 1), d(2024, 1, 1));
        assert!(url.starts_with("https://query2.finance.yahoo.com/v8/finance/chart/aapl?"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1704153599"));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn chart_url_accepts_trailing_slash_on_base() {
        let url = chart_url("http://127.0.0.1:9/chart/", "msft", d(2024, 1, 1), d(2024, 1, 2));
        assert!(url.starts_with("http://127.0.0.1:9/chart/msft?period1="));
    }

    #[test]
    fn backoff_doubles_and_saturates_at_cap() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
    }

    /// Serves one canned response per accepted connection, in order.
    fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                read_request(&mut stream);
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{addr}/chart")
    }

    fn read_request(stream: &mut TcpStream) {
        let mut buf = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => seen.extend_from_slice(&buf[..read]),
            }
        }
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn local_adapter(base_url: String, timeout_secs: u64, max_retries: u32) -> YahooAdapter {
        let mut adapter = YahooAdapter::from_settings(YahooSettings {
            base_url,
            timeout_secs,
            max_retries,
            requests_per_second: 100,
            lowercase_symbols: true,
        })
        .unwrap();
        adapter.base_delay = Duration::from_millis(10);
        adapter
    }

    #[test]
    fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            thread::sleep(Duration::from_secs(5));
        });

        let adapter = local_adapter(format!("http://{addr}/chart"), 1, 0);
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        let err = adapter
            .fetch(&ticker, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert_eq!(err.cause, FetchCause::Timeout { secs: 1 });
    }

    #[test]
    fn server_error_is_retried_then_succeeds() {
        let base_url = serve(vec![
            http_response("503 Service Unavailable", ""),
            http_response("200 OK", SAMPLE),
        ]);

        let adapter = local_adapter(base_url, 5, 1);
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        let series = adapter
            .fetch(&ticker, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(series.dates().unwrap(), &[d(2024, 1, 2), d(2024, 1, 3)]);
    }

    #[test]
    fn server_error_without_retries_is_network_failure() {
        let base_url = serve(vec![http_response("503 Service Unavailable", "")]);

        let adapter = local_adapter(base_url, 5, 0);
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        let err = adapter
            .fetch(&ticker, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert!(matches!(err.cause, FetchCause::Network(ref m) if m.contains("503")));
    }

    #[test]
    fn inverted_range_is_rejected_before_any_request() {
        let adapter = YahooAdapter::from_settings(YahooSettings::default()).unwrap();
        let ticker = TickerSymbol::parse("AAPL").unwrap();
        let err = adapter
            .fetch(&ticker, d(2024, 2, 1), d(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err.cause, FetchCause::InvalidRange { .. }));
        assert_eq!(adapter.name(), "yahoo");
    }
}
