#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use tickercast::domain::error::{FetchCause, FetchError};
use tickercast::domain::series::{Column, PriceSeries};
use tickercast::domain::ticker::TickerSymbol;
use tickercast::ports::data_port::PriceSource;

pub struct MockPriceSource {
    pub data: HashMap<TickerSymbol, PriceSeries>,
    pub errors: HashMap<TickerSymbol, FetchCause>,
    pub calls: Mutex<Vec<TickerSymbol>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.data.insert(ticker_of(ticker), series);
        self
    }

    pub fn with_error(mut self, ticker: &str, cause: FetchCause) -> Self {
        self.errors.insert(ticker_of(ticker), cause);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PriceSource for MockPriceSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        ticker: &TickerSymbol,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FetchError> {
        self.calls.lock().unwrap().push(ticker.clone());
        if let Some(cause) = self.errors.get(ticker) {
            return Err(FetchError::new(ticker, cause.clone()));
        }
        let Some(series) = self.data.get(ticker) else {
            return Err(FetchError::new(ticker, FetchCause::UnknownTicker));
        };
        Ok(restrict(series, start_date, end_date))
    }
}

/// Rows of `series` within `start..=end`, keeping absent columns absent.
fn restrict(series: &PriceSeries, start: NaiveDate, end: NaiveDate) -> PriceSeries {
    let Some(dates) = series.dates() else {
        return series.clone();
    };
    let keep: Vec<usize> = (0..dates.len())
        .filter(|&i| dates[i] >= start && dates[i] <= end)
        .collect();
    let mut out = PriceSeries::new().with_dates(keep.iter().map(|&i| dates[i]).collect());
    for column in [Column::Open, Column::Close, Column::AdjustedClose] {
        if let Some(values) = series.values(column) {
            out = out.with_column(
                column,
                keep.iter().filter_map(|&i| values.get(i).copied()).collect(),
            );
        }
    }
    out
}

pub fn ticker_of(s: &str) -> TickerSymbol {
    TickerSymbol::parse(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily series with all three price columns rising by 1 per day.
pub fn generate_series(start_date: &str, count: usize, start_price: f64) -> PriceSeries {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    let dates = (0..count)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let close: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    PriceSeries::new()
        .with_dates(dates)
        .with_column(Column::Open, close.iter().map(|c| c - 0.5).collect())
        .with_column(Column::Close, close.clone())
        .with_column(Column::AdjustedClose, close.iter().map(|c| c * 0.98).collect())
}

pub fn wide_range() -> (NaiveDate, NaiveDate) {
    (date(2000, 1, 1), date(2100, 1, 1))
}
