use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use revenue_engine::{
    artifacts,
    commands::{forecast, inspect, optimize, predict, simulate},
    config::{self, EngineDefaults},
    models::{weekday_name, Frequency, OptimizationMetric, PredictionRequest},
    predictor::Predictor,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "revenue-engine")]
#[command(about = "Retail revenue prediction and forecasting over a pre-trained model")]
struct Cli {
    /// Directory holding model.txt, encoders.json and reference.bin
    #[arg(long = "artifacts", value_name = "PATH", global = true)]
    artifact_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RequestArgs {
    /// Unit selling price
    #[arg(long)]
    price: f64,
    /// Unit cost
    #[arg(long)]
    cost: f64,
    /// Product identifier
    #[arg(long)]
    product: String,
    /// Store location, or "All" to aggregate every known location
    #[arg(long)]
    location: String,
    /// Transaction date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,
}

impl RequestArgs {
    fn into_request(self) -> PredictionRequest {
        use chrono::Datelike;
        PredictionRequest {
            unit_price: self.price,
            unit_cost: self.cost,
            product_id: self.product,
            location: self.location,
            year: self.date.year(),
            month: self.date.month(),
            day: self.date.day(),
            weekday: weekday_name(self.date).to_string(),
        }
    }
}

#[derive(Args)]
struct SweepArgs {
    /// Lowest price multiplier to try
    #[arg(long, default_value_t = 0.5)]
    min_factor: f64,
    /// Highest price multiplier to try
    #[arg(long, default_value_t = 2.0)]
    max_factor: f64,
    /// Number of evenly spaced price points
    #[arg(long, default_value_t = 20)]
    steps: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict revenue, quantity and profit for a single transaction
    Predict {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Forecast revenue over a date range
    Forecast {
        #[command(flatten)]
        request: RequestArgs,
        /// Forecast start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Forecast end date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Bucket size: daily, weekly or monthly
        #[arg(long, default_value = "daily")]
        frequency: Frequency,
        /// Confidence level for revenue bounds, in (0, 1)
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Sweep price multipliers and report the revenue curve
    Simulate {
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Find the price that maximizes revenue or profit
    Optimize {
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        sweep: SweepArgs,
        /// Metric to maximize: revenue or profit
        #[arg(long, default_value = "revenue")]
        metric: OptimizationMetric,
    },
    /// Print a summary of the loaded artifacts
    Inspect,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli {
        artifact_dir,
        command,
    } = cli;

    let dir = config::resolve_artifact_dir(artifact_dir);
    info!("Using artifacts from {}", dir.display());
    let artifacts = artifacts::init(&dir)?;
    let predictor = Predictor::new(artifacts.clone());
    let defaults = EngineDefaults::default();

    match command {
        Commands::Predict { request } => {
            predict::run(&predictor, &request.into_request())?;
        }
        Commands::Forecast {
            request,
            start,
            end,
            frequency,
            confidence,
        } => {
            let level = confidence.unwrap_or(defaults.confidence_level);
            forecast::run(
                &predictor,
                &request.into_request(),
                start,
                end,
                frequency,
                level,
            )?;
        }
        Commands::Simulate { request, sweep } => {
            simulate::run(
                &predictor,
                &request.into_request(),
                sweep.min_factor,
                sweep.max_factor,
                sweep.steps,
            )?;
        }
        Commands::Optimize {
            request,
            sweep,
            metric,
        } => {
            optimize::run(
                &predictor,
                &request.into_request(),
                metric,
                sweep.min_factor,
                sweep.max_factor,
                sweep.steps,
            )?;
        }
        Commands::Inspect => {
            inspect::run(&artifacts)?;
        }
    }

    Ok(())
}
