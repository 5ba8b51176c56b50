//! Per-ticker forecasting on top of a [`ForecastEngine`].
//!
//! Each ticker gets its own freshly fitted model. Historical rows come back
//! as fitted values, which need not equal the observed prices.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;

use crate::domain::chart::{Chart, Fill, Trace};
use crate::domain::error::{EngineError, ForecastError};
use crate::domain::series::{Column, PriceSeries};
use crate::domain::ticker::TickerSymbol;
use crate::domain::ticker_map::TickerMap;
use crate::domain::validation::{validate, Requirement};
use crate::ports::forecast_port::{ForecastEngine, ModelForecast, ModelFrame};

/// Forecast values over historical plus future dates, in the same
/// `date`/`adjustedClose` shape as a [`PriceSeries`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    series: PriceSeries,
    lower: Vec<f64>,
    upper: Vec<f64>,
    history_len: usize,
}

impl ForecastSeries {
    pub fn as_price_series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.series.dates().unwrap_or(&[])
    }

    pub fn values(&self) -> &[f64] {
        self.series.values(Column::AdjustedClose).unwrap_or(&[])
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Rows that fall on historical dates; the rest are future dates.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn len(&self) -> usize {
        self.dates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series.last_date()
    }
}

/// Standalone per-ticker forecast plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastArtifact {
    chart: Chart,
}

impl ForecastArtifact {
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn into_chart(self) -> Chart {
        self.chart
    }
}

/// Result of forecasting a whole batch.
#[derive(Debug, Clone, Default)]
pub struct ForecastBatch {
    pub series: TickerMap<ForecastSeries>,
    pub artifacts: TickerMap<ForecastArtifact>,
}

/// Historical dates followed by `horizon_days` consecutive calendar days.
pub fn future_dates(history: &[NaiveDate], horizon_days: i64) -> Vec<NaiveDate> {
    let mut ds = history.to_vec();
    if let Some(&last) = history.last() {
        ds.extend((1..=horizon_days).map(|k| last + Duration::days(k)));
    }
    ds
}

pub struct Forecaster<'a> {
    engine: &'a dyn ForecastEngine,
}

impl<'a> Forecaster<'a> {
    pub fn new(engine: &'a dyn ForecastEngine) -> Self {
        Self { engine }
    }

    pub fn forecast(
        &self,
        ticker: &TickerSymbol,
        series: &PriceSeries,
        horizon_days: i64,
    ) -> Result<(ForecastSeries, ForecastArtifact), ForecastError> {
        if horizon_days <= 0 {
            return Err(ForecastError::InvalidHorizon {
                ticker: ticker.clone(),
                days: horizon_days,
            });
        }
        let series = validate(ticker, series, Requirement::Forecast)?;

        let fit_err = |source: EngineError| ForecastError::Fit {
            ticker: ticker.clone(),
            source,
        };

        let frame = ModelFrame {
            ds: series.dates().unwrap_or(&[]).to_vec(),
            y: series
                .values(Column::AdjustedClose)
                .unwrap_or(&[])
                .to_vec(),
        };

        log::debug!(
            "{ticker}: fitting {} on {} rows, horizon {horizon_days} days",
            self.engine.name(),
            frame.ds.len()
        );

        let model = self.engine.fit(&frame).map_err(fit_err)?;
        let ds = future_dates(&frame.ds, horizon_days);
        let predicted = model.predict(&ds).map_err(fit_err)?;
        check_shape(&ds, &predicted).map_err(fit_err)?;

        let ModelForecast {
            ds,
            yhat,
            yhat_lower,
            yhat_upper,
        } = predicted;

        let artifact = ForecastArtifact {
            chart: forecast_chart(ticker, &frame, &ds, &yhat, &yhat_lower, &yhat_upper),
        };
        let forecast = ForecastSeries {
            series: PriceSeries::new()
                .with_dates(ds)
                .with_column(Column::AdjustedClose, yhat),
            lower: yhat_lower,
            upper: yhat_upper,
            history_len: frame.ds.len(),
        };

        Ok((forecast, artifact))
    }

    /// Forecast every series on a pool of `workers` threads (0 = one per core).
    ///
    /// The first failure in map order aborts the batch.
    pub fn forecast_all(
        &self,
        series: &TickerMap<PriceSeries>,
        horizon_days: i64,
        workers: usize,
    ) -> Result<ForecastBatch, ForecastError> {
        let entries: Vec<(&TickerSymbol, &PriceSeries)> = series.iter().collect();

        let run = || -> Vec<Result<(ForecastSeries, ForecastArtifact), ForecastError>> {
            entries
                .par_iter()
                .map(|(ticker, s)| self.forecast(ticker, s, horizon_days))
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                log::warn!("forecast pool unavailable ({e}), using global pool");
                run()
            }
        };

        let mut batch = ForecastBatch::default();
        for ((ticker, _), result) in entries.into_iter().zip(results) {
            let (forecast, artifact) = result?;
            log::info!(
                "{ticker}: forecast to {}",
                forecast
                    .last_date()
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            );
            batch.series.insert(ticker.clone(), forecast);
            batch.artifacts.insert(ticker.clone(), artifact);
        }
        Ok(batch)
    }
}

fn check_shape(ds: &[NaiveDate], predicted: &ModelForecast) -> Result<(), EngineError> {
    let expected = ds.len();
    for actual in [
        predicted.ds.len(),
        predicted.yhat.len(),
        predicted.yhat_lower.len(),
        predicted.yhat_upper.len(),
    ] {
        if actual != expected {
            return Err(EngineError::ShapeMismatch { expected, actual });
        }
    }
    Ok(())
}

fn forecast_chart(
    ticker: &TickerSymbol,
    history: &ModelFrame,
    ds: &[NaiveDate],
    yhat: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> Chart {
    Chart::new(format!("Charts for: {ticker}"))
        .with_traces(vec![
            Trace::markers("Actual", history.ds.clone(), history.y.clone()),
            Trace::line("Lower Bound", ds.to_vec(), lower.to_vec()),
            Trace::line("Upper Bound", ds.to_vec(), upper.to_vec()).filled(Fill::Tonexty),
            Trace::line("Predicted", ds.to_vec(), yhat.to_vec()),
        ])
        .with_range_slider()
        .with_crosshair()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::SchemaError;
    use crate::ports::forecast_port::FittedModel;

    /// Predicts the mean of the finite history everywhere.
    struct MeanEngine;

    struct MeanModel(f64);

    impl ForecastEngine for MeanEngine {
        fn name(&self) -> &str {
            "mean"
        }

        fn fit(&self, history: &ModelFrame) -> Result<Box<dyn FittedModel>, EngineError> {
            let ys: Vec<f64> = history.y.iter().copied().filter(|y| y.is_finite()).collect();
            if ys.len() < 2 {
                return Err(EngineError::TooFewObservations {
                    have: ys.len(),
                    need: 2,
                });
            }
            Ok(Box::new(MeanModel(ys.iter().sum::<f64>() / ys.len() as f64)))
        }
    }

    impl FittedModel for MeanModel {
        fn predict(&self, ds: &[NaiveDate]) -> Result<ModelForecast, EngineError> {
            Ok(ModelForecast {
                ds: ds.to_vec(),
                yhat: vec![self.0; ds.len()],
                yhat_lower: vec![self.0 - 1.0; ds.len()],
                yhat_upper: vec![self.0 + 1.0; ds.len()],
            })
        }
    }

    /// Drops the last row of every prediction.
    struct ShortEngine;

    impl ForecastEngine for ShortEngine {
        fn name(&self) -> &str {
            "short"
        }

        fn fit(&self, history: &ModelFrame) -> Result<Box<dyn FittedModel>, EngineError> {
            MeanEngine.fit(history).map(|_| Box::new(ShortModel) as Box<dyn FittedModel>)
        }
    }

    struct ShortModel;

    impl FittedModel for ShortModel {
        fn predict(&self, ds: &[NaiveDate]) -> Result<ModelForecast, EngineError> {
            let n = ds.len().saturating_sub(1);
            Ok(ModelForecast {
                ds: ds[..n].to_vec(),
                yhat: vec![0.0; n],
                yhat_lower: vec![0.0; n],
                yhat_upper: vec![0.0; n],
            })
        }
    }

    fn t(s: &str) -> TickerSymbol {
        TickerSymbol::parse(s).unwrap()
    }

    fn series(start: &str, n: usize) -> PriceSeries {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        PriceSeries::new()
            .with_dates((0..n).map(|i| start + Duration::days(2 * i as i64)).collect())
            .with_column(Column::AdjustedClose, (0..n).map(|i| i as f64).collect())
    }

    #[test]
    fn horizon_extends_exactly_past_last_date() {
        let input = series("2023-01-02", 30);
        let (out, _) = Forecaster::new(&MeanEngine)
            .forecast(&t("AAPL"), &input, 365)
            .unwrap();
        assert_eq!(
            out.last_date().unwrap(),
            input.last_date().unwrap() + Duration::days(365)
        );
        assert_eq!(out.len(), input.len() + 365);
        assert_eq!(out.history_len(), input.len());
        assert_eq!(&out.dates()[..30], input.dates().unwrap());
    }

    #[test]
    fn output_is_price_series_shaped() {
        let (out, _) = Forecaster::new(&MeanEngine)
            .forecast(&t("AAPL"), &series("2023-01-02", 4), 3)
            .unwrap();
        let ps = out.as_price_series();
        assert_eq!(ps.columns(), vec![Column::Date, Column::AdjustedClose]);
        assert!(out.values().iter().all(|v| (*v - 1.5).abs() < 1e-12));
        assert_eq!(out.lower()[0], 0.5);
        assert_eq!(out.upper()[6], 2.5);
    }

    #[test]
    fn non_positive_horizon_is_rejected() {
        let err = Forecaster::new(&MeanEngine)
            .forecast(&t("AAPL"), &series("2023-01-02", 4), 0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidHorizon { days: 0, .. }));
    }

    #[test]
    fn fit_failure_names_ticker() {
        let err = Forecaster::new(&MeanEngine)
            .forecast(&t("NIO"), &series("2023-01-02", 1), 10)
            .unwrap_err();
        assert!(matches!(&err, ForecastError::Fit { ticker, .. } if ticker.as_str() == "NIO"));
        assert!(err.to_string().contains("too few observations"));
    }

    #[test]
    fn missing_adjusted_close_is_a_schema_error() {
        let input = series("2023-01-02", 5).without(Column::AdjustedClose);
        let err = Forecaster::new(&MeanEngine)
            .forecast(&t("AAPL"), &input, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Schema(SchemaError::MissingColumns { .. })
        ));
    }

    #[test]
    fn short_engine_output_is_rejected() {
        let err = Forecaster::new(&ShortEngine)
            .forecast(&t("AAPL"), &series("2023-01-02", 5), 2)
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Fit {
                source: EngineError::ShapeMismatch { expected: 7, actual: 6 },
                ..
            }
        ));
    }

    #[test]
    fn artifact_carries_standalone_chart() {
        let (_, artifact) = Forecaster::new(&MeanEngine)
            .forecast(&t("TSLA"), &series("2023-01-02", 5), 2)
            .unwrap();
        let chart = artifact.chart();
        assert_eq!(chart.title, "Charts for: TSLA");
        assert_eq!(
            chart.trace_names(),
            vec!["Actual", "Lower Bound", "Upper Bound", "Predicted"]
        );
        assert_eq!(chart.traces[0].len(), 5);
        assert_eq!(chart.traces[3].len(), 7);
    }

    #[test]
    fn forecast_all_keeps_order_and_aborts_on_failure() {
        let mut map = TickerMap::new();
        map.insert(t("B"), series("2023-01-02", 6));
        map.insert(t("A"), series("2023-03-01", 8));
        let batch = Forecaster::new(&MeanEngine)
            .forecast_all(&map, 5, 2)
            .unwrap();
        let keys: Vec<_> = batch.series.tickers().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(batch.artifacts.len(), 2);

        map.insert(t("C"), series("2023-01-02", 1));
        let err = Forecaster::new(&MeanEngine)
            .forecast_all(&map, 5, 0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::Fit { ticker, .. } if ticker.as_str() == "C"));
    }

    #[test]
    fn future_dates_are_consecutive_days() {
        let hist = vec![NaiveDate::from_ymd_opt(2024, 2, 27).unwrap()];
        let ds = future_dates(&hist, 3);
        let strs: Vec<_> = ds.iter().map(|d| d.to_string()).collect();
        assert_eq!(strs, vec!["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01"]);
        assert!(future_dates(&[], 3).is_empty());
    }
}
