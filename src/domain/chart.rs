//! Chart-ready traces and presentation hints.
//!
//! Nothing here renders; adapters behind [`crate::ports::chart_port::ChartPort`]
//! turn a [`Chart`] into something a charting surface can display.

use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_TITLE: &str = "Time Series data with Range slider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    Lines,
    Markers,
}

/// Area fill between a trace and the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Tonexty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<NaiveDate>,
    pub y: Vec<f64>,
    pub mode: TraceMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
}

impl Trace {
    pub fn line(name: impl Into<String>, x: Vec<NaiveDate>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            mode: TraceMode::Lines,
            fill: None,
        }
    }

    pub fn markers(name: impl Into<String>, x: Vec<NaiveDate>, y: Vec<f64>) -> Self {
        Self {
            mode: TraceMode::Markers,
            ..Self::line(name, x, y)
        }
    }

    pub fn filled(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Guide line drawn from the cursor to an axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeLine {
    pub color: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap: Option<String>,
    pub thickness: u32,
}

impl SpikeLine {
    fn crosshair(snap_to_cursor: bool) -> Self {
        Self {
            color: "grey".into(),
            mode: "across".into(),
            snap: snap_to_cursor.then(|| "cursor".to_string()),
            thickness: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LayoutHints {
    pub range_slider: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_spikes: Option<SpikeLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_spikes: Option<SpikeLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub traces: Vec<Trace>,
    pub hints: LayoutHints,
}

impl Chart {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            traces: Vec::new(),
            hints: LayoutHints::default(),
        }
    }

    pub fn with_traces(mut self, traces: Vec<Trace>) -> Self {
        self.traces.extend(traces);
        self
    }

    pub fn with_range_slider(mut self) -> Self {
        self.hints.range_slider = true;
        self
    }

    /// Crosshair spike lines on both axes with unified x hover.
    pub fn with_crosshair(mut self) -> Self {
        self.hints.x_spikes = Some(SpikeLine::crosshair(true));
        self.hints.y_spikes = Some(SpikeLine::crosshair(false));
        self.hints.hover_mode = Some("x".into());
        self
    }

    pub fn trace_names(&self) -> Vec<&str> {
        self.traces.iter().map(|t| t.name.as_str()).collect()
    }
}
