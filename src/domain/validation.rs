//! Series schema validation.
//!
//! Checks that a series carries the columns a pipeline stage needs, that all
//! columns have the same length and that dates are strictly increasing.
//! Validation never alters the series.

use crate::domain::error::SchemaError;
use crate::domain::series::{Column, PriceSeries};
use crate::domain::ticker::TickerSymbol;

/// Column set a stage depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// `date` and `adjustedClose`; enough for forecasting.
    Forecast,
    /// Additionally `open` and `close`, for the raw chart view.
    OpenClose,
}

impl Requirement {
    pub fn columns(self) -> &'static [Column] {
        match self {
            Requirement::Forecast => &[Column::Date, Column::AdjustedClose],
            Requirement::OpenClose => &[
                Column::Date,
                Column::Open,
                Column::Close,
                Column::AdjustedClose,
            ],
        }
    }
}

pub fn validate(
    ticker: &TickerSymbol,
    series: &PriceSeries,
    requirement: Requirement,
) -> Result<PriceSeries, SchemaError> {
    let missing: Vec<Column> = requirement
        .columns()
        .iter()
        .copied()
        .filter(|c| !series.has(*c))
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns {
            ticker: ticker.clone(),
            columns: missing,
        });
    }

    let expected = series.column_len(Column::Date).unwrap_or(0);
    for column in series.columns() {
        let actual = series.column_len(column).unwrap_or(0);
        if actual != expected {
            return Err(SchemaError::LengthMismatch {
                ticker: ticker.clone(),
                column,
                expected,
                actual,
            });
        }
    }

    let dates = series.dates().unwrap_or(&[]);
    if let Some(row) = dates.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SchemaError::UnorderedDates {
            ticker: ticker.clone(),
            row: row + 1,
            date: dates[row + 1],
        });
    }

    Ok(series.clone())
}
