//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod plotly_adapter;
pub mod seasonal_model;
#[cfg(feature = "yahoo")]
pub mod yahoo_adapter;
