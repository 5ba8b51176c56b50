//! Port traits the domain depends on.

pub mod chart_port;
pub mod config_port;
pub mod data_port;
pub mod forecast_port;
