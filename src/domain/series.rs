//! Daily price series for a single ticker.
//!
//! Stored column-wise. Every column is optional so a source that omits one
//! (no adjusted close, say) can still be represented and then rejected by
//! [`crate::domain::validation::validate`] with an exact diagnostic. Rows are
//! addressed by zero-based position; there is no separate index.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Date,
    Open,
    Close,
    AdjustedClose,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Date,
        Column::Open,
        Column::Close,
        Column::AdjustedClose,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Open => "open",
            Column::Close => "close",
            Column::AdjustedClose => "adjustedClose",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One observation. Missing cells of present columns are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    dates: Option<Vec<NaiveDate>>,
    open: Option<Vec<f64>>,
    close: Option<Vec<f64>>,
    adjusted_close: Option<Vec<f64>>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = Some(dates);
        self
    }

    /// Attach a value column. `Column::Date` is ignored; use [`Self::with_dates`].
    pub fn with_column(mut self, column: Column, values: Vec<f64>) -> Self {
        if let Some(slot) = self.slot_mut(column) {
            *slot = Some(values);
        }
        self
    }

    pub fn without(mut self, column: Column) -> Self {
        match column {
            Column::Date => self.dates = None,
            other => {
                if let Some(slot) = self.slot_mut(other) {
                    *slot = None;
                }
            }
        }
        self
    }

    fn slot_mut(&mut self, column: Column) -> Option<&mut Option<Vec<f64>>> {
        match column {
            Column::Date => None,
            Column::Open => Some(&mut self.open),
            Column::Close => Some(&mut self.close),
            Column::AdjustedClose => Some(&mut self.adjusted_close),
        }
    }

    pub fn has(&self, column: Column) -> bool {
        self.column_len(column).is_some()
    }

    pub fn columns(&self) -> Vec<Column> {
        Column::ALL.into_iter().filter(|c| self.has(*c)).collect()
    }

    pub fn column_len(&self, column: Column) -> Option<usize> {
        match column {
            Column::Date => self.dates.as_ref().map(Vec::len),
            other => self.values(other).map(<[f64]>::len),
        }
    }

    pub fn dates(&self) -> Option<&[NaiveDate]> {
        self.dates.as_deref()
    }

    pub fn values(&self, column: Column) -> Option<&[f64]> {
        match column {
            Column::Date => None,
            Column::Open => self.open.as_deref(),
            Column::Close => self.close.as_deref(),
            Column::AdjustedClose => self.adjusted_close.as_deref(),
        }
    }

    /// Row count, taken from the date column when present.
    pub fn len(&self) -> usize {
        Column::ALL
            .into_iter()
            .find_map(|c| self.column_len(c))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates().and_then(|d| d.first().copied())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates().and_then(|d| d.last().copied())
    }

    /// Rows in order. Yields nothing when the date column is absent.
    pub fn rows(&self) -> impl Iterator<Item = PriceRow> + '_ {
        let dates = self.dates.as_deref().unwrap_or(&[]);
        dates.iter().enumerate().map(move |(i, &date)| PriceRow {
            date,
            open: value_at(&self.open, i),
            close: value_at(&self.close, i),
            adjusted_close: value_at(&self.adjusted_close, i),
        })
    }

    /// Sort by date and drop repeated dates, keeping the first occurrence.
    ///
    /// Sources call this before handing a series out; the validator only
    /// checks ordering and never reorders.
    pub fn normalized(self) -> Self {
        if self.dates.is_none() {
            return self;
        }
        let dates = self.dates.as_deref().unwrap_or(&[]);

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        order.dedup_by_key(|i| dates[*i]);

        let pick = |col: &Option<Vec<f64>>| {
            col.as_ref().map(|v| {
                order
                    .iter()
                    .map(|&i| v.get(i).copied().unwrap_or(f64::NAN))
                    .collect()
            })
        };

        Self {
            dates: Some(order.iter().map(|&i| dates[i]).collect()),
            open: pick(&self.open),
            close: pick(&self.close),
            adjusted_close: pick(&self.adjusted_close),
        }
    }
}

fn value_at(column: &Option<Vec<f64>>, i: usize) -> Option<f64> {
    column.as_ref().and_then(|v| v.get(i).copied())
}
