//! Plotly chart adapters implementing ChartPort.
//!
//! [`figure_json`] maps a [`Chart`] onto a plotly.js figure
//! (`{"data": [...], "layout": {...}}`). The JSON adapter writes that figure
//! as-is; the HTML adapter embeds it in a standalone page rendered with
//! Askama that loads plotly.js from its CDN.

use std::fs;
use std::path::Path;

use askama::Template;
use serde_json::{json, Map, Value};

use crate::domain::chart::{Chart, SpikeLine};
use crate::domain::error::TickercastError;
use crate::ports::chart_port::ChartPort;

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

fn spike_axis(spikes: Option<&SpikeLine>) -> Map<String, Value> {
    let mut axis = Map::new();
    if let Some(s) = spikes {
        axis.insert("showspikes".into(), Value::Bool(true));
        axis.insert("spikecolor".into(), json!(s.color));
        axis.insert("spikemode".into(), json!(s.mode));
        if let Some(snap) = &s.snap {
            axis.insert("spikesnap".into(), json!(snap));
        }
        axis.insert("spikethickness".into(), json!(s.thickness));
    }
    axis
}

/// Plotly figure for `chart`. Non-finite values become `null` gaps.
pub fn figure_json(chart: &Chart) -> Value {
    let data: Vec<Value> = chart
        .traces
        .iter()
        .map(|t| {
            let mut trace = json!({
                "type": "scatter",
                "name": t.name,
                "x": t.x,
                "y": t.y.iter().map(|v| v.is_finite().then_some(*v)).collect::<Vec<_>>(),
                "mode": t.mode,
            });
            if let (Some(fill), Some(obj)) = (t.fill, trace.as_object_mut()) {
                obj.insert("fill".into(), json!(fill));
            }
            trace
        })
        .collect();

    let mut xaxis = spike_axis(chart.hints.x_spikes.as_ref());
    xaxis.insert(
        "rangeslider".into(),
        json!({ "visible": chart.hints.range_slider }),
    );
    xaxis.insert("type".into(), json!("date"));
    let yaxis = spike_axis(chart.hints.y_spikes.as_ref());

    let mut layout = Map::new();
    layout.insert("title".into(), json!({ "text": chart.title }));
    layout.insert("xaxis".into(), Value::Object(xaxis));
    layout.insert("yaxis".into(), Value::Object(yaxis));
    if let Some(mode) = &chart.hints.hover_mode {
        layout.insert("hovermode".into(), json!(mode));
    }

    json!({ "data": data, "layout": Value::Object(layout) })
}

fn output_error(path: &Path, reason: impl ToString) -> TickercastError {
    TickercastError::Output {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn write_file(path: &Path, contents: String) -> Result<(), TickercastError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_error(path, e))?;
    }
    fs::write(path, contents).map_err(|e| output_error(path, e))
}

#[derive(Debug, Default)]
pub struct PlotlyJsonAdapter;

impl PlotlyJsonAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ChartPort for PlotlyJsonAdapter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write(&self, chart: &Chart, output_path: &Path) -> Result<(), TickercastError> {
        let body = serde_json::to_string_pretty(&figure_json(chart))
            .map_err(|e| output_error(output_path, e))?;
        write_file(output_path, body)
    }
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<script src="{{ cdn }}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
var figure = {{ figure|safe }};
Plotly.newPlot("chart", figure.data, figure.layout, {responsive: true});
</script>
</body>
</html>
"#
)]
struct ChartPage<'a> {
    title: &'a str,
    cdn: &'a str,
    figure: String,
}

#[derive(Debug, Default)]
pub struct PlotlyHtmlAdapter;

impl PlotlyHtmlAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, chart: &Chart) -> Result<String, askama::Error> {
        // "</" would close the script element early.
        let figure = figure_json(chart).to_string().replace("</", "<\\/");
        ChartPage {
            title: &chart.title,
            cdn: PLOTLY_CDN,
            figure,
        }
        .render()
    }
}

impl ChartPort for PlotlyHtmlAdapter {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn write(&self, chart: &Chart, output_path: &Path) -> Result<(), TickercastError> {
        let html = self
            .render(chart)
            .map_err(|e| output_error(output_path, e))?;
        write_file(output_path, html)
    }
}
