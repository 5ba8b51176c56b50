//! CSV file price source and combined-dataset writer.
//!
//! Reads `<base>/<TICKER>.csv` files laid out like a Yahoo Finance export
//! (`Date,Open,High,Low,Close,Adj Close,Volume`). Columns are located by
//! header name, so a file without an adjusted close column loads fine and is
//! rejected later by the validator with the exact column name.

use crate::domain::aggregate::CombinedDataset;
use crate::domain::error::{FetchCause, FetchError, TickercastError};
use crate::domain::series::{Column, PriceSeries};
use crate::domain::ticker::TickerSymbol;
use crate::ports::data_port::PriceSource;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &TickerSymbol) -> Option<PathBuf> {
        [
            ticker.as_str().to_string(),
            ticker.as_str().to_ascii_lowercase(),
        ]
        .into_iter()
        .map(|stem| self.base_path.join(format!("{stem}.csv")))
        .find(|p| p.is_file())
    }
}

fn header_column(name: &str) -> Option<Column> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "date" | "datetime" => Some(Column::Date),
        "open" => Some(Column::Open),
        "close" => Some(Column::Close),
        "adjclose" | "adjustedclose" => Some(Column::AdjustedClose),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Accept "2024-01-02" and timestamped "2024-01-02 00:00:00-05:00".
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_price(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| format!("invalid price {raw:?}: {e}"))
}

fn read_series(
    content: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<PriceSeries, FetchCause> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| FetchCause::Format(format!("CSV header error: {e}")))?
        .clone();

    let mut positions: Vec<(Column, usize)> = Vec::new();
    for (i, name) in headers.iter().enumerate() {
        if let Some(column) = header_column(name) {
            if !positions.iter().any(|(c, _)| *c == column) {
                positions.push((column, i));
            }
        }
    }
    let position = |column: Column| positions.iter().find(|(c, _)| *c == column).map(|(_, i)| *i);

    let Some(date_idx) = position(Column::Date) else {
        // Hand back the value columns; validation names the missing date.
        let mut series = PriceSeries::new();
        for (column, _) in &positions {
            series = series.with_column(*column, Vec::new());
        }
        return Ok(series);
    };

    let value_columns: Vec<(Column, usize)> = positions
        .iter()
        .copied()
        .filter(|(c, _)| *c != Column::Date)
        .collect();
    let mut dates = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); value_columns.len()];

    for (line, result) in rdr.records().enumerate() {
        let record =
            result.map_err(|e| FetchCause::Format(format!("CSV parse error: {e}")))?;
        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            FetchCause::Format(format!("invalid date {raw_date:?} on row {}", line + 1))
        })?;

        if date < start_date || date > end_date {
            continue;
        }

        dates.push(date);
        for ((_, idx), column) in value_columns.iter().zip(values.iter_mut()) {
            let value = parse_price(record.get(*idx).unwrap_or_default())
                .map_err(|e| FetchCause::Format(format!("{e} on row {}", line + 1)))?;
            column.push(value);
        }
    }

    let mut series = PriceSeries::new().with_dates(dates);
    for ((column, _), data) in value_columns.into_iter().zip(values) {
        series = series.with_column(column, data);
    }
    Ok(series.normalized())
}

impl PriceSource for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
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

        let path = self
            .csv_path(ticker)
            .ok_or_else(|| FetchError::new(ticker, FetchCause::UnknownTicker))?;
        log::debug!("{ticker}: reading {}", path.display());

        let content = fs::read_to_string(&path).map_err(|e| {
            FetchError::new(
                ticker,
                FetchCause::Source(format!("failed to read {}: {}", path.display(), e)),
            )
        })?;

        let series = read_series(&content, start_date, end_date)
            .map_err(|cause| FetchError::new(ticker, cause))?;
        if series.has(Column::Date) && series.is_empty() {
            return Err(FetchError::new(ticker, FetchCause::Empty));
        }
        Ok(series)
    }
}

/// Write the combined dataset as CSV with a leading `stock` column.
pub fn write_combined_dataset(
    dataset: &CombinedDataset,
    output_path: &Path,
) -> Result<(), TickercastError> {
    let output_err = |reason: String| TickercastError::Output {
        path: output_path.display().to_string(),
        reason,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_err(e.to_string()))?;
    }
    let mut wtr = csv::Writer::from_path(output_path).map_err(|e| output_err(e.to_string()))?;
    wtr.write_record(["stock", "date", "open", "close", "adjusted_close"])
        .map_err(|e| output_err(e.to_string()))?;

    let cell = |v: Option<f64>| v.filter(|x| x.is_finite()).map(|x| x.to_string()).unwrap_or_default();
    for row in dataset.rows() {
        wtr.write_record([
            row.stock.to_string(),
            row.date.to_string(),
            cell(row.open),
            cell(row.close),
            cell(row.adjusted_close),
        ])
        .map_err(|e| output_err(e.to_string()))?;
    }
    wtr.flush().map_err(|e| output_err(e.to_string()))?;
    Ok(())
}
