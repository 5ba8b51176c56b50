//! Price source port trait.

use crate::domain::error::FetchError;
use crate::domain::series::PriceSeries;
use crate::domain::ticker::TickerSymbol;
use chrono::NaiveDate;

/// A source of daily price history.
///
/// Implementations return a date-sorted series with duplicate dates removed
/// (see [`PriceSeries::normalized`]) and report every failure, including an
/// inverted date range or an empty result, as a [`FetchError`].
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(
        &self,
        ticker: &TickerSymbol,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FetchError>;
}
