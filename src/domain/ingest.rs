//! Batch ingestion: fetch and validate every requested ticker.
//!
//! A ticker that fails to load or validate is left out of the result and
//! reported once through `diagnostics`. The call itself never fails; an empty
//! map means nothing could be loaded.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashSet;

use crate::domain::series::PriceSeries;
use crate::domain::ticker::TickerSymbol;
use crate::domain::ticker_map::TickerMap;
use crate::domain::validation::{validate, Requirement};
use crate::ports::data_port::PriceSource;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub requirement: Requirement,
    /// Upper bound on fetches in flight. 1 disables parallelism.
    pub max_concurrent_fetches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub series: TickerMap<PriceSeries>,
    pub diagnostics: Vec<String>,
}

fn ingest_one(
    source: &dyn PriceSource,
    ticker: &TickerSymbol,
    opts: &IngestOptions,
) -> Result<PriceSeries, String> {
    let raw = source
        .fetch(ticker, opts.start_date, opts.end_date)
        .map_err(|e| e.to_string())?;
    validate(ticker, &raw, opts.requirement).map_err(|e| e.to_string())
}

pub fn ingest_all(
    source: &dyn PriceSource,
    tickers: &[TickerSymbol],
    opts: &IngestOptions,
) -> IngestOutcome {
    let mut seen = HashSet::new();
    let unique: Vec<&TickerSymbol> = tickers.iter().filter(|t| seen.insert(*t)).collect();

    log::info!(
        "ingesting {} tickers from {} ({} to {})",
        unique.len(),
        source.name(),
        opts.start_date,
        opts.end_date
    );

    let results: Vec<Result<PriceSeries, String>> = if opts.max_concurrent_fetches <= 1 {
        unique.iter().map(|t| ingest_one(source, t, opts)).collect()
    } else {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(opts.max_concurrent_fetches)
            .build()
        {
            Ok(pool) => pool.install(|| {
                unique
                    .par_iter()
                    .map(|t| ingest_one(source, t, opts))
                    .collect()
            }),
            Err(e) => {
                log::warn!("fetch pool unavailable ({e}), fetching sequentially");
                unique.iter().map(|t| ingest_one(source, t, opts)).collect()
            }
        }
    };

    let outcome = unique.into_iter().zip(results).fold(
        IngestOutcome::default(),
        |mut acc, (ticker, result)| {
            match result {
                Ok(series) => {
                    log::debug!("{ticker}: {} rows [OK]", series.len());
                    acc.series.insert(ticker.clone(), series);
                }
                Err(message) => {
                    log::warn!("skipping {ticker}: {message}");
                    acc.diagnostics.push(message);
                }
            }
            acc
        },
    );

    log::info!(
        "ingested {} of {} tickers",
        outcome.series.len(),
        outcome.series.len() + outcome.diagnostics.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{FetchCause, FetchError};
    use crate::domain::series::Column;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        series: HashMap<String, PriceSeries>,
        calls: AtomicUsize,
    }

    impl PriceSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        fn fetch(
            &self,
            ticker: &TickerSymbol,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.series
                .get(ticker.as_str())
                .cloned()
                .ok_or_else(|| FetchError::new(ticker, FetchCause::UnknownTicker))
        }
    }

    fn full(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let v: Vec<f64> = (0..n).map(|i| i as f64).collect();
        PriceSeries::new()
            .with_dates((0..n).map(|i| start + Duration::days(i as i64)).collect())
            .with_column(Column::Open, v.clone())
            .with_column(Column::Close, v.clone())
            .with_column(Column::AdjustedClose, v)
    }

    fn source() -> StubSource {
        let mut series = HashMap::new();
        series.insert("AAPL".to_string(), full(10));
        series.insert("GOOG".to_string(), full(7));
        series.insert("NOADJ".to_string(), full(5).without(Column::AdjustedClose));
        StubSource {
            series,
            calls: AtomicUsize::new(0),
        }
    }

    fn opts(concurrency: usize) -> IngestOptions {
        IngestOptions {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            requirement: Requirement::OpenClose,
            max_concurrent_fetches: concurrency,
        }
    }

    fn tickers(list: &[&str]) -> Vec<TickerSymbol> {
        list.iter().map(|s| TickerSymbol::parse(s).unwrap()).collect()
    }

    #[test]
    fn failed_fetch_is_dropped_with_one_diagnostic() {
        let out = ingest_all(&source(), &tickers(&["AAPL", "BADTICKER"]), &opts(1));
        let keys: Vec<_> = out.series.tickers().map(|t| t.as_str()).collect();
        assert_eq!(keys, vec!["AAPL"]);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].contains("BADTICKER"));
    }

    #[test]
    fn schema_failure_is_dropped_and_reported_verbatim() {
        let out = ingest_all(&source(), &tickers(&["NOADJ", "GOOG"]), &opts(2));
        assert_eq!(out.series.len(), 1);
        assert_eq!(
            out.diagnostics,
            vec!["NOADJ: missing required columns: adjustedClose".to_string()]
        );
    }

    #[test]
    fn parallel_and_sequential_agree_on_order() {
        let list = tickers(&["GOOG", "BAD", "AAPL", "NOADJ"]);
        let seq = ingest_all(&source(), &list, &opts(1));
        let par = ingest_all(&source(), &list, &opts(4));
        assert_eq!(seq.series, par.series);
        assert_eq!(seq.diagnostics, par.diagnostics);
        let keys: Vec<_> = par.series.tickers().map(|t| t.as_str()).collect();
        assert_eq!(keys, vec!["GOOG", "AAPL"]);
    }

    #[test]
    fn duplicate_tickers_are_fetched_once() {
        let src = source();
        let out = ingest_all(&src, &tickers(&["AAPL", "aapl"]), &opts(1));
        assert_eq!(out.series.len(), 1);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn total_failure_yields_empty_map() {
        let out = ingest_all(&source(), &tickers(&["X", "Y"]), &opts(2));
        assert!(out.series.is_empty());
        assert_eq!(out.diagnostics.len(), 2);
    }
}
