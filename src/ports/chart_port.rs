//! Chart output port trait.

use crate::domain::chart::Chart;
use crate::domain::error::TickercastError;
use std::path::Path;

/// Port for writing a chart to an external rendering surface.
pub trait ChartPort {
    /// File extension of the written artifact, without the dot.
    fn extension(&self) -> &'static str;

    fn write(&self, chart: &Chart, output_path: &Path) -> Result<(), TickercastError>;
}
