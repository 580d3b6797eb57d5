//! Ember CLI - run and validate particle effects headlessly

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{simulate, validate};
use ember_particles::ParamValue;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Headless runner for Ember particle effects", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an effect for a span of simulated time and print statistics
    Simulate {
        /// Path to effect TOML file
        effect: PathBuf,

        /// Simulated seconds to run
        #[arg(long, default_value = "5.0")]
        seconds: f64,

        /// Fixed time step in seconds (capped at 0.25)
        #[arg(long, default_value = "0.016666667")]
        dt: f64,

        /// Parameter edit applied before starting (repeatable), e.g. scale=2
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, ParamValue)>,

        /// Pace frames against the wall clock instead of stepping
        #[arg(long)]
        realtime: bool,

        /// Seconds between statistics lines
        #[arg(long, default_value = "1.0")]
        report_every: f64,
    },

    /// Build an effect and report configuration errors
    Validate {
        /// Path to effect TOML file
        effect: PathBuf,
    },
}

/// Parse `key=value` into a parameter edit
fn parse_assignment(s: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", s));
    }
    let value: ParamValue = value.parse()?;
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Simulate {
            effect,
            seconds,
            dt,
            set,
            realtime,
            report_every,
        } => simulate::run(simulate::SimulateArgs {
            effect,
            seconds,
            dt,
            set,
            realtime,
            report_every,
        }),
        Commands::Validate { effect } => validate::run(&effect),
    }
}
