//! iota CLI
//!
//! Interval robustness certification for single-layer linear classifiers.
//!
//! # Commands
//!
//! - `iota verify <model> <property>` - Certify local robustness
//! - `iota bounds <model> <property>` - Print the propagated output box
//! - `iota inspect <model>` - Show layer dimensions
//!
//! Exit codes: 0 robust, 1 not certified, 2 error.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use iota_core::Precision;
use iota_onnx::{load_model, read_vnnlib, LoadedModel};
use iota_propagate::{DecisionMode, VerificationReport, Verifier, VerifierConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iota")]
#[command(about = "Interval arithmetic robustness verifier for linear classifiers")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Model file (.onnx, .json, optionally .gz)
    model: PathBuf,
    /// VNNLIB property file
    property: PathBuf,
    /// Working precision in bits (32 or 64)
    #[arg(long)]
    precision: Option<u32>,
    /// Numeric tolerance, overriding the precision default
    #[arg(long)]
    tolerance: Option<f64>,
    /// Expected label, overriding the property file
    #[arg(long)]
    label: Option<usize>,
    /// JSON file with a verifier configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Certify that every input in the property box gets the expected label
    Verify {
        #[command(flatten)]
        args: RunArgs,
        /// Decision procedure: auto, simple or full
        #[arg(long)]
        mode: Option<DecisionMode>,
        /// Wall-clock budget in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Print the output box obtained by interval propagation
    Bounds {
        #[command(flatten)]
        args: RunArgs,
    },
    /// Show model dimensions and parameter ranges
    Inspect {
        /// Model file (.onnx, .json, optionally .gz)
        model: PathBuf,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Verify {
            args,
            mode,
            timeout,
        } => verify(&args, mode, timeout),
        Commands::Bounds { args } => bounds(&args),
        Commands::Inspect { model, json } => inspect(&model, json),
    }
}

/// Config file first, then command-line overrides.
fn build_config(args: &RunArgs, mode: Option<DecisionMode>) -> Result<VerifierConfig> {
    let mut config = match &args.config {
        Some(path) => VerifierConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if let Some(bits) = args.precision {
        config = config.with_precision(Precision::from_bits(bits)?);
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(mode) = mode {
        config = config.with_mode(mode);
    }
    config.validate()?;
    Ok(config)
}

fn load(path: &Path) -> Result<LoadedModel> {
    load_model(path).with_context(|| format!("Failed to load model {}", path.display()))
}

fn verify(args: &RunArgs, mode: Option<DecisionMode>, timeout: Option<f64>) -> Result<ExitCode> {
    let budget = timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid timeout {secs}"))
        })
        .transpose()?;

    let config = build_config(args, mode)?;
    let model = load(&args.model)?;
    let property = read_vnnlib(&args.property, args.label)
        .with_context(|| format!("Failed to read property {}", args.property.display()))?;
    info!(
        "Verifying {} against {} (label {})",
        model.name,
        args.property.display(),
        property.label
    );

    let verifier = Verifier::new(config);
    let layer = verifier.build_layer(model.weight.clone(), model.bias.clone())?;
    let report = verifier.verify(&layer, &property)?;

    let timed_out = budget.is_some_and(|b| report.elapsed_secs >= b.as_secs_f64());
    if timed_out {
        warn!("Verification exceeded the {:?} budget", budget);
    }

    if args.json {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            model: &'a str,
            timed_out: bool,
            #[serde(flatten)]
            report: &'a VerificationReport,
        }
        let out = JsonOutput {
            model: &model.name,
            timed_out,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&model, &report);
        if timed_out {
            println!("Result: timeout");
        }
    }

    Ok(if report.is_robust() && !timed_out {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_report(model: &LoadedModel, report: &VerificationReport) {
    println!(
        "Model: {} ({} outputs, {} inputs)",
        model.name,
        model.output_dim(),
        model.input_dim()
    );
    println!("Label: {}", report.label);
    for v in &report.verdicts {
        println!(
            "  class {:>3}: {:<5} range [{:e}, {:e}]",
            v.class,
            v.verdict.to_string(),
            v.lower,
            v.upper
        );
    }
    println!("Result: {}", report.outcome);
    println!("Decided by: {:?}", report.decided_by);
    println!("Elapsed: {:.6}s", report.elapsed_secs);
}

fn bounds(args: &RunArgs) -> Result<ExitCode> {
    let config = build_config(args, None)?;
    let model = load(&args.model)?;
    // Bounds do not depend on the label; an absent one should not be an error.
    let property = read_vnnlib(&args.property, Some(args.label.unwrap_or(0)))
        .with_context(|| format!("Failed to read property {}", args.property.display()))?;

    let verifier = Verifier::new(config);
    let layer = verifier.build_layer(model.weight.clone(), model.bias.clone())?;
    let output = verifier.output_bounds(&layer, &property)?;

    if args.json {
        let out = serde_json::json!({
            "lower": output.lower_ends(),
            "upper": output.upper_ends(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (j, range) in output.ranges().iter().enumerate() {
            println!("y[{j}] in {range}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(path: &Path, json: bool) -> Result<ExitCode> {
    let model = load(path)?;
    if model.weight.is_empty() {
        bail!("Model {} has an empty weight matrix", path.display());
    }
    let (w_min, w_max) = model
        .weight
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &w| {
            (lo.min(w), hi.max(w))
        });

    if json {
        let out = serde_json::json!({
            "name": model.name,
            "inputs": model.input_dim(),
            "outputs": model.output_dim(),
            "parameters": model.weight.len() + model.bias.len(),
            "weight_range": [w_min, w_max],
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Model: {}", model.name);
        println!("Layer: Linear {} -> {}", model.input_dim(), model.output_dim());
        println!("Parameters: {}", model.weight.len() + model.bias.len());
        println!("Weight range: [{w_min}, {w_max}]");
    }
    Ok(ExitCode::SUCCESS)
}
