//! Trend + Fourier seasonality forecast engine.
//!
//! y(t) = a + b*t + weekly(t) + yearly(t), where each seasonal term is a
//! truncated Fourier series:
//!   s(t) = sum(alpha_k * sin(2*pi*k*d/P) + beta_k * cos(2*pi*k*d/P)) for k in 1..=order
//! with `d` the day number and `P` the period in days. `t` is time rescaled to
//! [0, 1] over the history so the trend coefficient stays well scaled.
//!
//! Coefficients are fitted by ridge-regularized least squares: the normal
//! equations (X'X + ridge*I') beta = X'y are solved by Cholesky factorization,
//! with the intercept left out of the penalty. The uncertainty
//! band is yhat +/- z * sigma * sqrt(1 + k/n) where sigma is the residual
//! standard error, `n` the number of observations and `k` the number of days
//! past the last observation (0 inside the history).

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use linfa_linalg::cholesky::SolveC;
use ndarray::{Array1, Array2, Axis};

use crate::domain::error::EngineError;
use crate::ports::forecast_port::{FittedModel, ForecastEngine, ModelForecast, ModelFrame};

pub const WEEKLY_PERIOD: f64 = 7.0;
pub const YEARLY_PERIOD: f64 = 365.25;
pub const WEEKLY_ORDER: usize = 3;
pub const YEARLY_ORDER: usize = 10;
/// Minimum history span (days) before auto weekly seasonality switches on.
pub const WEEKLY_MIN_SPAN_DAYS: i64 = 14;
/// Minimum history span (days) before auto yearly seasonality switches on.
pub const YEARLY_MIN_SPAN_DAYS: i64 = 730;
pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.8;
pub const DEFAULT_RIDGE: f64 = 1e-6;
pub const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seasonality {
    Auto,
    On,
    Off,
}

impl Seasonality {
    fn enabled(self, span_days: i64, min_span_days: i64) -> bool {
        match self {
            Seasonality::Auto => span_days >= min_span_days,
            Seasonality::On => true,
            Seasonality::Off => false,
        }
    }
}

impl FromStr for Seasonality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Seasonality::Auto),
            "true" | "yes" | "on" | "1" => Ok(Seasonality::On),
            "false" | "no" | "off" | "0" => Ok(Seasonality::Off),
            other => Err(format!("expected auto, true or false, got {other:?}")),
        }
    }
}

impl fmt::Display for Seasonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seasonality::Auto => write!(f, "auto"),
            Seasonality::On => write!(f, "true"),
            Seasonality::Off => write!(f, "false"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeasonalTrendModel {
    pub weekly: Seasonality,
    pub yearly: Seasonality,
    pub interval_width: f64,
    pub ridge: f64,
}

impl Default for SeasonalTrendModel {
    fn default() -> Self {
        Self {
            weekly: Seasonality::Auto,
            yearly: Seasonality::Auto,
            interval_width: DEFAULT_INTERVAL_WIDTH,
            ridge: DEFAULT_RIDGE,
        }
    }
}

impl SeasonalTrendModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weekly(mut self, weekly: Seasonality) -> Self {
        self.weekly = weekly;
        self
    }

    pub fn with_yearly(mut self, yearly: Seasonality) -> Self {
        self.yearly = yearly;
        self
    }

    /// Width in (0, 1); values outside are clamped into that range.
    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge.max(0.0);
        self
    }
}

/// Feature layout shared between fit and predict.
#[derive(Debug, Clone)]
struct Design {
    origin: NaiveDate,
    span_days: f64,
    weekly_order: usize,
    yearly_order: usize,
}

impl Design {
    fn width(&self) -> usize {
        2 + 2 * self.weekly_order + 2 * self.yearly_order
    }

    fn row(&self, date: NaiveDate) -> Array1<f64> {
        let day = (date - self.origin).num_days() as f64;
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(day / self.span_days);
        push_fourier(&mut row, day, WEEKLY_PERIOD, self.weekly_order);
        push_fourier(&mut row, day, YEARLY_PERIOD, self.yearly_order);
        Array1::from(row)
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

impl ForecastEngine for SeasonalTrendModel {
    fn name(&self) -> &str {
        "seasonal-trend"
    }

    fn fit(&self, history: &ModelFrame) -> Result<Box<dyn FittedModel>, EngineError> {
        if history.ds.len() != history.y.len() {
            return Err(EngineError::ShapeMismatch {
                expected: history.ds.len(),
                actual: history.y.len(),
            });
        }

        let observations: Vec<(NaiveDate, f64)> = history
            .ds
            .iter()
            .copied()
            .zip(history.y.iter().copied())
            .filter(|(_, y)| y.is_finite())
            .collect();
        let n = observations.len();
        if n < MIN_OBSERVATIONS {
            return Err(EngineError::TooFewObservations {
                have: n,
                need: MIN_OBSERVATIONS,
            });
        }

        let first = observations[0].0;
        let origin = observations.iter().map(|(d, _)| *d).fold(first, NaiveDate::min);
        let last = observations.iter().map(|(d, _)| *d).fold(first, NaiveDate::max);
        let span = (last - origin).num_days();

        let design = Design {
            origin,
            span_days: span.max(1) as f64,
            weekly_order: if self.weekly.enabled(span, WEEKLY_MIN_SPAN_DAYS) {
                WEEKLY_ORDER
            } else {
                0
            },
            yearly_order: if self.yearly.enabled(span, YEARLY_MIN_SPAN_DAYS) {
                YEARLY_ORDER
            } else {
                0
            },
        };

        let scale = observations
            .iter()
            .map(|(_, y)| y.abs())
            .fold(0.0_f64, f64::max);
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let p = design.width();
        let mut x = Array2::<f64>::zeros((n, p));
        for (mut row, (date, _)) in x.rows_mut().into_iter().zip(&observations) {
            row.assign(&design.row(*date));
        }
        let targets: Array1<f64> = observations.iter().map(|(_, y)| y / scale).collect();

        let coefficients = solve_ridge(&x, &targets, self.ridge)?;

        let residuals = &targets - &x.dot(&coefficients);
        let ssr = residuals.dot(&residuals);
        let dof = n.saturating_sub(p).max(1);
        let sigma = (ssr / dof as f64).sqrt() * scale;

        log::debug!(
            "fitted {} terms to {n} observations over {span} days, sigma {sigma:.4}",
            p
        );

        Ok(Box::new(FittedSeasonal {
            design,
            coefficients,
            scale,
            sigma,
            z: z_score(self.interval_width),
            last_observed: last,
            n,
        }))
    }
}

pub struct FittedSeasonal {
    design: Design,
    coefficients: Array1<f64>,
    scale: f64,
    sigma: f64,
    z: f64,
    last_observed: NaiveDate,
    n: usize,
}

impl FittedSeasonal {
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl FittedModel for FittedSeasonal {
    fn predict(&self, ds: &[NaiveDate]) -> Result<ModelForecast, EngineError> {
        let mut yhat = Vec::with_capacity(ds.len());
        let mut yhat_lower = Vec::with_capacity(ds.len());
        let mut yhat_upper = Vec::with_capacity(ds.len());

        for &date in ds {
            let value = self.design.row(date).dot(&self.coefficients) * self.scale;
            let steps = (date - self.last_observed).num_days().max(0) as f64;
            let half_width = self.z * self.sigma * (1.0 + steps / self.n as f64).sqrt();
            yhat.push(value);
            yhat_lower.push(value - half_width);
            yhat_upper.push(value + half_width);
        }

        Ok(ModelForecast {
            ds: ds.to_vec(),
            yhat,
            yhat_lower,
            yhat_upper,
        })
    }
}

/// Solve (X'X + ridge*I') beta = X'y, with the intercept left unpenalized.
///
/// A design whose normal matrix is not positive definite is `Singular`.
fn solve_ridge(
    x: &Array2<f64>,
    targets: &Array1<f64>,
    ridge: f64,
) -> Result<Array1<f64>, EngineError> {
    let mut xtx = x.t().dot(x);
    for i in 1..xtx.nrows() {
        xtx[(i, i)] += ridge;
    }
    let xty = x.t().dot(targets).insert_axis(Axis(1));

    let solution = xtx.solvec(&xty).map_err(|_| EngineError::Singular)?;
    let beta = solution.column(0).to_owned();
    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(EngineError::Singular)
    }
}

/// Two-sided normal quantile for a central interval of `width`.
///
/// Rational approximation from Abramowitz & Stegun 26.2.23, |error| < 4.5e-4.
pub fn z_score(width: f64) -> f64 {
    let width = width.clamp(1e-6, 1.0 - 1e-9);
    let q = (1.0 - width) / 2.0;
    let t = (-2.0 * q.ln()).sqrt();
    let num = 2.515517 + 0.802853 * t + 0.010328 * t * t;
    let den = 1.0 + 1.432788 * t + 0.189269 * t * t + 0.001308 * t * t * t;
    (t - num / den).max(0.0)
}
