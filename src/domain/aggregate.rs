//! Cross-ticker aggregation into one tagged dataset plus plot traces.
//!
//! Every row is stamped with its ticker exactly once, here, before the
//! per-ticker series are concatenated. Dates are not aligned across tickers.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::chart::Trace;
use crate::domain::error::SchemaError;
use crate::domain::forecast::ForecastSeries;
use crate::domain::series::{Column, PriceSeries};
use crate::domain::ticker::TickerSymbol;
use crate::domain::ticker_map::TickerMap;
use crate::domain::validation::{validate, Requirement};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedRow {
    pub stock: TickerSymbol,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CombinedDataset {
    rows: Vec<TaggedRow>,
}

impl CombinedDataset {
    pub fn rows(&self) -> &[TaggedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct tags in first-seen order.
    pub fn stocks(&self) -> Vec<&TickerSymbol> {
        let mut out: Vec<&TickerSymbol> = Vec::new();
        for row in &self.rows {
            if !out.contains(&&row.stock) {
                out.push(&row.stock);
            }
        }
        out
    }

    pub fn filter_stock(&self, ticker: &TickerSymbol) -> Vec<&TaggedRow> {
        self.rows.iter().filter(|r| &r.stock == ticker).collect()
    }

    fn append_tagged(&mut self, ticker: &TickerSymbol, series: &PriceSeries) {
        self.rows.extend(series.rows().map(|row| TaggedRow {
            stock: ticker.clone(),
            date: row.date,
            open: row.open,
            close: row.close,
            adjusted_close: row.adjusted_close,
        }));
    }
}

fn column(series: &PriceSeries, column: Column) -> Vec<f64> {
    series.values(column).unwrap_or(&[]).to_vec()
}

/// Raw view: `{ticker}_open` and `{ticker}_close` traces per ticker.
pub fn combine_open_close(
    series: &TickerMap<PriceSeries>,
) -> Result<(CombinedDataset, Vec<Trace>), SchemaError> {
    let mut dataset = CombinedDataset::default();
    let mut traces = Vec::with_capacity(series.len() * 2);

    for (ticker, s) in series.iter() {
        let s = validate(ticker, s, Requirement::OpenClose)?;
        let dates = s.dates().unwrap_or(&[]).to_vec();
        traces.push(Trace::line(
            format!("{ticker}_open"),
            dates.clone(),
            column(&s, Column::Open),
        ));
        traces.push(Trace::line(
            format!("{ticker}_close"),
            dates,
            column(&s, Column::Close),
        ));
        dataset.append_tagged(ticker, &s);
    }

    Ok((dataset, traces))
}

/// Forecast view: one adjusted-close trace per ticker, named after it.
pub fn combine_forecast(
    series: &TickerMap<ForecastSeries>,
) -> Result<(CombinedDataset, Vec<Trace>), SchemaError> {
    let mut dataset = CombinedDataset::default();
    let mut traces = Vec::with_capacity(series.len());

    for (ticker, f) in series.iter() {
        let s = validate(ticker, f.as_price_series(), Requirement::Forecast)?;
        traces.push(Trace::line(
            ticker.as_str(),
            s.dates().unwrap_or(&[]).to_vec(),
            column(&s, Column::AdjustedClose),
        ));
        dataset.append_tagged(ticker, &s);
    }

    Ok((dataset, traces))
}
