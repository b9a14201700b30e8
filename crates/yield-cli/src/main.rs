//! Crop yield prediction CLI
//!
//! Fits the feature engineer on labelled data, runs predictions with
//! advisory against saved artifacts, and inspects the bound model.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{fit, inspect, predict};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yield_core::QuickEstimateRequest;

/// Crop yield prediction and advisory CLI
#[derive(Parser)]
#[command(name = "yieldctl")]
#[command(author, version, about = "CLI for Crop Yield Prediction and Advisory", long_about = None)]
pub struct Cli {
    /// Configuration file (can also be set via YIELDCTL_CONFIG env var)
    #[arg(long, short, env = "YIELDCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Paths of the artifacts a pipeline is built from
#[derive(clap::Args)]
pub struct ArtifactArgs {
    /// Fitted feature engineer state
    #[arg(long, env = "YIELDCTL_STATE")]
    pub state: PathBuf,

    /// Model artifact
    #[arg(long, env = "YIELDCTL_MODEL")]
    pub model: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the feature engineer on labelled records
    Fit {
        /// Training rows as a JSON array or JSON lines
        #[arg(long)]
        data: PathBuf,

        /// Where to write the fitted state
        #[arg(long, short, default_value = "feature_state.json")]
        out: PathBuf,
    },

    /// Predict yield and generate advisory for one field record
    Predict {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        /// Field record as JSON
        #[arg(long, short)]
        input: PathBuf,

        /// Provider weather/soil data to merge into the record
        #[arg(long)]
        external: Option<PathBuf>,

        /// Calendar month for seasonal advice (defaults to the current month)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Include yield gap analysis
        #[arg(long)]
        gap: bool,

        /// Potential yield in t/ha for the gap analysis
        #[arg(long)]
        potential_yield: Option<f64>,
    },

    /// Quick estimate from a handful of inputs
    Quick {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        #[arg(long)]
        crop: String,

        #[arg(long)]
        soil_type: Option<String>,

        /// Seasonal rainfall in mm
        #[arg(long)]
        rainfall: f64,

        /// Mean temperature in °C
        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,

        /// Mean relative humidity in %
        #[arg(long)]
        humidity: f64,

        #[arg(long)]
        year: Option<i32>,
    },

    /// Show model metadata and feature importances
    Inspect {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        /// Show the N most important features
        #[arg(long, value_name = "N")]
        importances: Option<usize>,

        /// Print Prometheus metrics after inspection
        #[arg(long)]
        metrics: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = config::CliConfig::load(cli.config.as_deref())?;
    debug!(top_k = config.top_k, select_k = config.features.select_k, "Configuration loaded");

    match cli.command {
        Commands::Fit { data, out } => {
            fit::fit(&config, &data, &out, cli.format)?;
        }
        Commands::Predict {
            artifacts,
            input,
            external,
            month,
            gap,
            potential_yield,
        } => {
            let pipeline = commands::load_pipeline(&config, &artifacts.state, &artifacts.model)?;
            predict::predict(
                &pipeline,
                predict::PredictArgs {
                    input: &input,
                    external: external.as_deref(),
                    month,
                    potential_yield,
                    with_gap: gap,
                },
                cli.format,
            )?;
        }
        Commands::Quick {
            artifacts,
            crop,
            soil_type,
            rainfall,
            temperature,
            humidity,
            year,
        } => {
            let pipeline = commands::load_pipeline(&config, &artifacts.state, &artifacts.model)?;
            let request = QuickEstimateRequest {
                crop,
                soil_type,
                rainfall_mm: rainfall,
                temperature_c: temperature,
                humidity_pct: humidity,
                year,
            };
            predict::quick(&pipeline, &request, cli.format)?;
        }
        Commands::Inspect {
            artifacts,
            importances,
            metrics,
        } => {
            let pipeline = commands::load_pipeline(&config, &artifacts.state, &artifacts.model)?;
            inspect::inspect(&pipeline, importances, cli.format)?;
            if metrics {
                inspect::print_metrics();
            }
        }
    }

    Ok(())
}
