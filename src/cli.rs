//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::binance_adapter::BinanceAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::tushare_adapter::TushareAdapter;
use crate::domain::config::AppConfig;
use crate::domain::error::MarketDataError;
use crate::domain::lookback::required_days;
use crate::domain::request::{MarketDataRequest, RequestContext};
use crate::domain::service::{MarketDataResult, MarketDataService};
use crate::domain::spec_parser::parse_indicator_list;

#[derive(Parser, Debug)]
#[command(
    name = "quantseries",
    about = "Normalized market data with forward adjustment and technical indicators"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch daily bars and indicators, printed as JSON
    Fetch {
        /// cn, us, hk, fx, futures, fund, repo, convertible_bond, options, crypto
        #[arg(short, long)]
        market: String,
        #[arg(long)]
        code: String,
        /// First date, YYYYMMDD (default: one month before end)
        #[arg(long)]
        start: Option<String>,
        /// Last date, YYYYMMDD (default: today)
        #[arg(long)]
        end: Option<String>,
        /// Space-separated list, e.g. "macd(12,26,9) rsi(14) ma(20)"
        #[arg(short, long)]
        indicators: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, env = "TUSHARE_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Read CSV batches from this directory instead of the upstream APIs
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Parse an indicator list and show the warm-up it needs
    Validate {
        #[arg(short, long)]
        indicators: String,
    },
}

pub async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Fetch {
            market,
            code,
            start,
            end,
            indicators,
            config,
            token,
            data_dir,
        } => {
            let request = match MarketDataRequest::parse(
                &market,
                &code,
                start.as_deref(),
                end.as_deref(),
                indicators.as_deref(),
            ) {
                Ok(r) => r,
                Err(e) => return report(&e),
            };
            let ctx = RequestContext::new(token);
            match run_fetch(&request, &ctx, config.as_ref(), data_dir).await {
                Ok(result) => print_result(&result),
                Err(e) => report(&e),
            }
        }
        Command::Validate { indicators } => run_validate(&indicators),
    }
}

/// Print an error to stderr and map it to its exit code. Indicator spec
/// errors are shown with a caret under the offending position.
fn report(err: &MarketDataError) -> ExitCode {
    match err {
        MarketDataError::IndicatorSpec { token, source } => {
            eprintln!(
                "error: invalid indicator:\n{}",
                source.display_with_context(token)
            );
        }
        other => eprintln!("error: {other}"),
    }
    err.into()
}

pub fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, MarketDataError> {
    let adapter = match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading config");
            FileConfigAdapter::from_file(p)?
        }
        None => FileConfigAdapter::empty(),
    };
    AppConfig::from_port(&adapter)
}

pub async fn run_fetch(
    request: &MarketDataRequest,
    ctx: &RequestContext,
    config_path: Option<&PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<MarketDataResult, MarketDataError> {
    let config = load_config(config_path)?;
    tracing::info!(market = request.market.title(), code = %request.code, "fetch requested");

    match data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "reading offline CSV data");
            let csv = CsvAdapter::new(dir);
            MarketDataService::new(&csv, &csv, config.page_size)
                .fetch(ctx, request)
                .await
        }
        None => {
            let tushare = TushareAdapter::new(&config.tushare)?;
            let binance = BinanceAdapter::new(&config.binance)?;
            MarketDataService::new(&tushare, &binance, config.page_size)
                .fetch(ctx, request)
                .await
        }
    }
}

fn print_result(result: &MarketDataResult) -> ExitCode {
    match serde_json::to_string_pretty(result) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            ExitCode::from(1)
        }
    }
}

pub fn run_validate(indicators: &str) -> ExitCode {
    let requests = match parse_indicator_list(indicators) {
        Ok(r) => r,
        Err(e) => return report(&e),
    };
    if requests.is_empty() {
        eprintln!("error: no indicators given");
        return ExitCode::from(4);
    }

    println!("Indicators (parsed):");
    for request in &requests {
        println!("  {:<8} {}", request.result_key(), request);
    }
    println!(
        "Lookback: {} calendar days before the start date",
        required_days(&requests)
    );
    ExitCode::SUCCESS
}
