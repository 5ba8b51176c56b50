//! Request-scoped workflows: view, predict and describe.

use chrono::NaiveDate;

use crate::domain::aggregate::{combine_forecast, combine_open_close, CombinedDataset};
use crate::domain::chart::{Chart, DEFAULT_TITLE};
use crate::domain::describe::{CompanyInfo, DescriptionTable};
use crate::domain::error::TickercastError;
use crate::domain::forecast::{ForecastArtifact, ForecastSeries, Forecaster};
use crate::domain::ingest::{ingest_all, IngestOptions, DEFAULT_MAX_CONCURRENT_FETCHES};
use crate::domain::ticker::TickerSymbol;
use crate::domain::ticker_map::TickerMap;
use crate::domain::validation::Requirement;
use crate::ports::data_port::PriceSource;
use crate::ports::forecast_port::ForecastEngine;

pub const DAYS_PER_YEAR: i64 = 365;
pub const MIN_HORIZON_YEARS: u32 = 1;
pub const MAX_HORIZON_YEARS: u32 = 5;

/// Settings shared by the view and predict workflows.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_concurrent_fetches: usize,
    /// Forecast worker threads; 0 means one per core.
    pub forecast_workers: usize,
    pub chart_title: String,
}

impl PipelineConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            forecast_workers: 0,
            chart_title: DEFAULT_TITLE.to_string(),
        }
    }

    fn ingest_options(&self, requirement: Requirement) -> IngestOptions {
        IngestOptions {
            start_date: self.start_date,
            end_date: self.end_date,
            requirement,
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }

    fn chart(&self) -> Chart {
        Chart::new(self.chart_title.clone())
            .with_range_slider()
            .with_crosshair()
    }
}

/// `years * 365`, for 1 to 5 years.
pub fn horizon_days(years: u32) -> Result<i64, TickercastError> {
    if !(MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS).contains(&years) {
        return Err(TickercastError::InvalidHorizon {
            years,
            min: MIN_HORIZON_YEARS,
            max: MAX_HORIZON_YEARS,
        });
    }
    Ok(i64::from(years) * DAYS_PER_YEAR)
}

#[derive(Debug, Clone)]
pub struct ViewOutput {
    pub dataset: CombinedDataset,
    pub chart: Chart,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PredictOutput {
    pub dataset: CombinedDataset,
    pub chart: Chart,
    pub forecasts: TickerMap<ForecastSeries>,
    pub artifacts: TickerMap<ForecastArtifact>,
    pub diagnostics: Vec<String>,
    pub horizon_days: i64,
}

/// Failure of a whole request, with the per-ticker diagnostics gathered
/// before it failed.
#[derive(Debug)]
pub struct RequestFailure {
    pub error: TickercastError,
    pub diagnostics: Vec<String>,
}

impl RequestFailure {
    fn new(error: impl Into<TickercastError>, diagnostics: Vec<String>) -> Self {
        Self {
            error: error.into(),
            diagnostics,
        }
    }
}

pub fn run_view(
    source: &dyn PriceSource,
    tickers: &[TickerSymbol],
    config: &PipelineConfig,
) -> Result<ViewOutput, RequestFailure> {
    let ingested = ingest_all(
        source,
        tickers,
        &config.ingest_options(Requirement::OpenClose),
    );
    if ingested.series.is_empty() {
        return Err(RequestFailure::new(
            TickercastError::NoData {
                requested: tickers.len(),
            },
            ingested.diagnostics,
        ));
    }

    let (dataset, traces) = match combine_open_close(&ingested.series) {
        Ok(out) => out,
        Err(e) => return Err(RequestFailure::new(e, ingested.diagnostics)),
    };

    Ok(ViewOutput {
        dataset,
        chart: config.chart().with_traces(traces),
        diagnostics: ingested.diagnostics,
    })
}

pub fn run_predict(
    source: &dyn PriceSource,
    engine: &dyn ForecastEngine,
    tickers: &[TickerSymbol],
    years: u32,
    config: &PipelineConfig,
) -> Result<PredictOutput, RequestFailure> {
    let horizon = horizon_days(years).map_err(|e| RequestFailure::new(e, Vec::new()))?;

    let ingested = ingest_all(source, tickers, &config.ingest_options(Requirement::Forecast));
    if ingested.series.is_empty() {
        return Err(RequestFailure::new(
            TickercastError::NoData {
                requested: tickers.len(),
            },
            ingested.diagnostics,
        ));
    }

    let batch = match Forecaster::new(engine).forecast_all(
        &ingested.series,
        horizon,
        config.forecast_workers,
    ) {
        Ok(batch) => batch,
        Err(e) => return Err(RequestFailure::new(e, ingested.diagnostics)),
    };

    let (dataset, traces) = match combine_forecast(&batch.series) {
        Ok(out) => out,
        Err(e) => return Err(RequestFailure::new(e, ingested.diagnostics)),
    };

    Ok(PredictOutput {
        dataset,
        chart: config.chart().with_traces(traces),
        forecasts: batch.series,
        artifacts: batch.artifacts,
        diagnostics: ingested.diagnostics,
        horizon_days: horizon,
    })
}

pub fn run_describe(
    table: &DescriptionTable,
    tickers: &[TickerSymbol],
) -> Vec<(TickerSymbol, CompanyInfo)> {
    tickers
        .iter()
        .map(|t| (t.clone(), table.describe(t)))
        .collect()
}
