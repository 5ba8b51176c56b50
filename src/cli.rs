//! CLI definition and dispatch.

use chrono::{Days, Local, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::{write_combined_dataset, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::plotly_adapter::{PlotlyHtmlAdapter, PlotlyJsonAdapter};
use crate::adapters::seasonal_model::{
    Seasonality, SeasonalTrendModel, DEFAULT_INTERVAL_WIDTH,
};
use crate::domain::chart::DEFAULT_TITLE;
use crate::domain::describe::DescriptionTable;
use crate::domain::error::TickercastError;
use crate::domain::ingest::DEFAULT_MAX_CONCURRENT_FETCHES;
use crate::domain::pipeline::{self, PipelineConfig, RequestFailure};
use crate::domain::ticker::{parse_tickers, TickerSymbol, TICKER_MENU};
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceSource;

pub const DEFAULT_START_DATE: &str = "2015-01-01";
pub const DEFAULT_CSV_DIR: &str = "./data";

#[derive(Parser, Debug)]
#[command(name = "tickercast", about = "Stock price viewer and forecaster")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

/// Options shared by commands that load prices.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Comma-separated ticker symbols, e.g. AAPL,MSFT
    #[arg(short, long)]
    pub tickers: String,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Overrides [data] start_date
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    /// Overrides [data] end_date
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chart open and close prices for the selected tickers
    View {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long, default_value = "chart.html")]
        output: PathBuf,
        /// Also write the plotly figure as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Also write the combined dataset as CSV
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Forecast adjusted close prices 1 to 5 years ahead
    Predict {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        years: u32,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Show company name and description
    Describe {
        #[arg(short, long)]
        tickers: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the ticker menu
    ListTickers,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::View {
            data,
            output,
            json,
            dataset,
        } => run_view(&data, &output, json.as_deref(), dataset.as_deref()),
        Command::Predict {
            data,
            years,
            output_dir,
        } => run_predict(&data, years, &output_dir),
        Command::Describe { tickers, config } => run_describe(&tickers, config.as_deref()),
        Command::ListTickers => run_list_tickers(),
    }
}

fn fail(err: &TickercastError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn report_failure(failure: RequestFailure) -> ExitCode {
    print_diagnostics(&failure.diagnostics);
    fail(&failure.error)
}

fn print_diagnostics(diagnostics: &[String]) {
    for d in diagnostics {
        eprintln!("warning: {d}");
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, TickercastError> {
    match path {
        Some(path) => {
            FileConfigAdapter::from_file(path).map_err(|e| TickercastError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// Parse the ticker list, warning about symbols outside the menu.
pub fn resolve_tickers(input: &str) -> Result<Vec<TickerSymbol>, TickercastError> {
    let tickers = parse_tickers(input)?;
    for t in tickers.iter().filter(|t| !t.in_menu()) {
        log::warn!("{t} is not in the ticker menu");
    }
    Ok(tickers)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TickercastError {
    TickercastError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn parse_date_key(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, TickercastError> {
    adapter
        .get_string(section, key)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| invalid(section, key, "invalid date format (expected YYYY-MM-DD)"))
        })
        .transpose()
}

fn non_negative(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<u64, TickercastError> {
    let value = adapter.get_int(section, key, default as i64);
    u64::try_from(value).map_err(|_| invalid(section, key, format!("must be >= 0, got {value}")))
}

/// Build the pipeline settings from config. `today` anchors the default end
/// date (the day before).
pub fn build_pipeline_config(
    adapter: &dyn ConfigPort,
    today: NaiveDate,
) -> Result<PipelineConfig, TickercastError> {
    let start_date = match parse_date_key(adapter, "data", "start_date")? {
        Some(d) => d,
        None => NaiveDate::parse_from_str(DEFAULT_START_DATE, "%Y-%m-%d")
            .map_err(|_| invalid("data", "start_date", "bad built-in default"))?,
    };
    let end_date = match parse_date_key(adapter, "data", "end_date")? {
        Some(d) => d,
        None => today.checked_sub_days(Days::new(1)).unwrap_or(today),
    };
    if start_date > end_date {
        return Err(invalid(
            "data",
            "start_date",
            format!("start_date ({start_date}) is after end_date ({end_date})"),
        ));
    }

    let max_concurrent_fetches = non_negative(
        adapter,
        "data",
        "max_concurrent_fetches",
        DEFAULT_MAX_CONCURRENT_FETCHES as u64,
    )?;
    let forecast_workers = non_negative(adapter, "forecast", "workers", 0)?;

    Ok(PipelineConfig {
        start_date,
        end_date,
        max_concurrent_fetches: max_concurrent_fetches as usize,
        forecast_workers: forecast_workers as usize,
        chart_title: adapter
            .get_string("chart", "title")
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    })
}

/// Apply `--start-date`/`--end-date` on top of the config values.
pub fn apply_overrides(
    mut config: PipelineConfig,
    args: &DataArgs,
) -> Result<PipelineConfig, TickercastError> {
    if let Some(start) = args.start_date {
        config.start_date = start;
    }
    if let Some(end) = args.end_date {
        config.end_date = end;
    }
    if config.start_date > config.end_date {
        return Err(invalid(
            "data",
            "start_date",
            format!(
                "start_date ({}) is after end_date ({})",
                config.start_date, config.end_date
            ),
        ));
    }
    Ok(config)
}

fn seasonality(adapter: &dyn ConfigPort, key: &str) -> Result<Seasonality, TickercastError> {
    match adapter.get_string("forecast", key) {
        Some(raw) => Seasonality::from_str(&raw).map_err(|e| invalid("forecast", key, e)),
        None => Ok(Seasonality::Auto),
    }
}

pub fn build_model(adapter: &dyn ConfigPort) -> Result<SeasonalTrendModel, TickercastError> {
    let width = adapter.get_double("forecast", "interval_width", DEFAULT_INTERVAL_WIDTH);
    if !(width > 0.0 && width < 1.0) {
        return Err(invalid(
            "forecast",
            "interval_width",
            format!("must be between 0 and 1 exclusive, got {width}"),
        ));
    }
    Ok(SeasonalTrendModel::new()
        .with_interval_width(width)
        .with_weekly(seasonality(adapter, "weekly_seasonality")?)
        .with_yearly(seasonality(adapter, "yearly_seasonality")?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Yahoo,
    Csv,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(SourceKind::Yahoo),
            "csv" => Ok(SourceKind::Csv),
            other => Err(format!("unknown source {other:?} (expected yahoo or csv)")),
        }
    }
}

pub fn source_kind(adapter: &dyn ConfigPort) -> Result<SourceKind, TickercastError> {
    match adapter.get_string("data", "source") {
        Some(raw) => SourceKind::from_str(&raw).map_err(|e| invalid("data", "source", e)),
        None => Ok(SourceKind::Yahoo),
    }
}

pub fn build_source(adapter: &dyn ConfigPort) -> Result<Box<dyn PriceSource>, TickercastError> {
    match source_kind(adapter)? {
        SourceKind::Csv => {
            let dir = adapter
                .get_string("data", "csv_dir")
                .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string());
            let dir = PathBuf::from(dir);
            if !dir.is_dir() {
                return Err(TickercastError::DataSource {
                    reason: format!("CSV directory {} does not exist", dir.display()),
                });
            }
            Ok(Box::new(CsvAdapter::new(dir)))
        }
        SourceKind::Yahoo => build_yahoo_source(adapter),
    }
}

#[cfg(feature = "yahoo")]
fn build_yahoo_source(adapter: &dyn ConfigPort) -> Result<Box<dyn PriceSource>, TickercastError> {
    use crate::adapters::yahoo_adapter::{YahooAdapter, YahooSettings};

    let defaults = YahooSettings::default();
    let requests_per_second = non_negative(
        adapter,
        "data",
        "requests_per_second",
        u64::from(defaults.requests_per_second),
    )?;
    let max_retries = non_negative(adapter, "data", "max_retries", u64::from(defaults.max_retries))?;
    let settings = YahooSettings {
        timeout_secs: non_negative(adapter, "data", "timeout_secs", defaults.timeout_secs)?,
        max_retries: u32::try_from(max_retries)
            .map_err(|_| invalid("data", "max_retries", "too large"))?,
        requests_per_second: u32::try_from(requests_per_second)
            .map_err(|_| invalid("data", "requests_per_second", "too large"))?,
        lowercase_symbols: adapter.get_bool("data", "lowercase_symbols", defaults.lowercase_symbols),
        base_url: adapter
            .get_string("data", "yahoo_url")
            .unwrap_or(defaults.base_url),
    };
    Ok(Box::new(YahooAdapter::from_settings(settings)?))
}

#[cfg(not(feature = "yahoo"))]
fn build_yahoo_source(_adapter: &dyn ConfigPort) -> Result<Box<dyn PriceSource>, TickercastError> {
    Err(TickercastError::DataSource {
        reason: "built without the yahoo feature; set [data] source = csv".into(),
    })
}

struct Setup {
    tickers: Vec<TickerSymbol>,
    config: FileConfigAdapter,
    pipeline: PipelineConfig,
    source: Box<dyn PriceSource>,
}

fn setup(args: &DataArgs) -> Result<Setup, TickercastError> {
    let tickers = resolve_tickers(&args.tickers)?;
    let config = load_config(args.config.as_deref())?;
    let today = Local::now().date_naive();
    let pipeline = apply_overrides(build_pipeline_config(&config, today)?, args)?;
    let source = build_source(&config)?;
    log::info!(
        "loading {} tickers from {} ({} to {})",
        tickers.len(),
        source.name(),
        pipeline.start_date,
        pipeline.end_date
    );
    Ok(Setup {
        tickers,
        config,
        pipeline,
        source,
    })
}

fn write_chart(
    port: &dyn ChartPort,
    chart: &crate::domain::chart::Chart,
    path: &Path,
) -> Result<(), TickercastError> {
    port.write(chart, path)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn run_view(
    args: &DataArgs,
    output: &Path,
    json: Option<&Path>,
    dataset: Option<&Path>,
) -> ExitCode {
    let setup = match setup(args) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let out = match pipeline::run_view(setup.source.as_ref(), &setup.tickers, &setup.pipeline) {
        Ok(out) => out,
        Err(failure) => return report_failure(failure),
    };
    print_diagnostics(&out.diagnostics);

    let written = write_chart(&PlotlyHtmlAdapter::new(), &out.chart, output)
        .and_then(|_| match json {
            Some(path) => write_chart(&PlotlyJsonAdapter::new(), &out.chart, path),
            None => Ok(()),
        })
        .and_then(|_| match dataset {
            Some(path) => {
                write_combined_dataset(&out.dataset, path)?;
                eprintln!("Wrote {}", path.display());
                Ok(())
            }
            None => Ok(()),
        });
    if let Err(e) = written {
        return fail(&e);
    }

    println!(
        "{} rows for {} tickers",
        out.dataset.len(),
        out.dataset.stocks().len()
    );
    ExitCode::SUCCESS
}

fn run_predict(args: &DataArgs, years: u32, output_dir: &Path) -> ExitCode {
    if let Err(e) = pipeline::horizon_days(years) {
        return fail(&e);
    }
    let setup = match setup(args) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let model = match build_model(&setup.config) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };

    let out = match pipeline::run_predict(
        setup.source.as_ref(),
        &model,
        &setup.tickers,
        years,
        &setup.pipeline,
    ) {
        Ok(out) => out,
        Err(failure) => return report_failure(failure),
    };
    print_diagnostics(&out.diagnostics);

    let html = PlotlyHtmlAdapter::new();
    let mut written = write_chart(&html, &out.chart, &output_dir.join("forecast.html"))
        .and_then(|_| {
            write_chart(
                &PlotlyJsonAdapter::new(),
                &out.chart,
                &output_dir.join("forecast.json"),
            )
        })
        .and_then(|_| {
            let path = output_dir.join("forecast.csv");
            write_combined_dataset(&out.dataset, &path)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        });
    for (ticker, artifact) in out.artifacts.iter() {
        if written.is_err() {
            break;
        }
        let path = output_dir.join(format!("{ticker}_forecast.{}", html.extension()));
        written = write_chart(&html, artifact.chart(), &path);
    }
    if let Err(e) = written {
        return fail(&e);
    }

    println!("Forecast horizon: {} days", out.horizon_days);
    for (ticker, forecast) in out.forecasts.iter() {
        let last = forecast.len().checked_sub(1);
        match (forecast.last_date(), last) {
            (Some(date), Some(i)) => println!(
                "{ticker}: {date} {:.2} [{:.2}, {:.2}]",
                forecast.values()[i],
                forecast.lower()[i],
                forecast.upper()[i]
            ),
            _ => println!("{ticker}: no forecast rows"),
        }
    }
    ExitCode::SUCCESS
}

fn run_describe(tickers: &str, config_path: Option<&Path>) -> ExitCode {
    let tickers = match resolve_tickers(tickers) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let table = DescriptionTable::from_config(&config);
    for (ticker, info) in pipeline::run_describe(&table, &tickers) {
        println!("{ticker}: {}", info.name);
        println!("  {}", info.description);
    }
    ExitCode::SUCCESS
}

fn run_list_tickers() -> ExitCode {
    for ticker in TICKER_MENU {
        println!("{ticker}");
    }
    ExitCode::SUCCESS
}
