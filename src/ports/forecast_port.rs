//! Forecast engine port trait.
//!
//! The engine speaks its own column vocabulary: `ds` for the timestamp and
//! `y` for the value on the way in, `yhat` with `yhat_lower`/`yhat_upper` on
//! the way out. [`crate::domain::forecast::Forecaster`] does the relabelling.

use crate::domain::error::EngineError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFrame {
    pub ds: Vec<NaiveDate>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub ds: Vec<NaiveDate>,
    pub yhat: Vec<f64>,
    pub yhat_lower: Vec<f64>,
    pub yhat_upper: Vec<f64>,
}

pub trait ForecastEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Fit a fresh model to `history`. Rows with non-finite `y` are ignored.
    fn fit(&self, history: &ModelFrame) -> Result<Box<dyn FittedModel>, EngineError>;
}

pub trait FittedModel: Send {
    fn predict(&self, ds: &[NaiveDate]) -> Result<ModelForecast, EngineError>;
}
