//! Core domain types and pipeline logic.

pub mod ticker;
pub mod ticker_map;
pub mod series;
pub mod validation;
pub mod ingest;
pub mod forecast;
pub mod aggregate;
pub mod chart;
pub mod describe;
pub mod pipeline;
pub mod error;
