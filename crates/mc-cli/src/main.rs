//! The model checker's CLI front end.
//!
//! Provides the `mc-cli` command with the following subcommands:
//!
//! - `mc-cli list` - list the built-in demo scenarios
//! - `mc-cli run <name>` - drive one scenario to a settled outcome and
//!   print its failure report (if any)
//!
//! Options:
//! - `--config` - path to a TOML file overriding the default `EngineConfig`
//! - `--seed` - use a seeded `RandomOracle` instead of `RoundRobinOracle`

mod scenarios;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use mc_common::EngineConfig;
use mc_engine::oracle::{Oracle, RandomOracle, RoundRobinOracle};
use mc_engine::report;

#[derive(Parser)]
#[command(name = "mc-cli", version, about = "Managed concurrency model checker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in demo scenarios.
    List,
    /// Drive one scenario to a settled outcome.
    Run {
        /// Scenario name, as printed by `mc-cli list`.
        name: String,

        /// Path to a TOML file overriding the default engine configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed a deterministic `RandomOracle` instead of round-robin.
        #[arg(long)]
        seed: Option<u64>,

        /// Print the outcome as JSON instead of the human-readable report.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Run { name, config, seed, json } => run(&name, config.as_deref(), seed, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn list() {
    for s in scenarios::all() {
        println!("{:<18} {}", s.name, s.description);
    }
}

fn run(name: &str, config_path: Option<&std::path::Path>, seed: Option<u64>, json: bool) -> Result<(), String> {
    let scenario = scenarios::by_name(name)
        .ok_or_else(|| format!("no such scenario '{name}' (see `mc-cli list`)"))?;

    let config = match config_path {
        Some(path) => EngineConfig::from_toml_file(path).map_err(|e| e.to_string())?,
        None => EngineConfig::default(),
    };

    let make_oracle: Box<dyn FnMut() -> Box<dyn Oracle>> = match seed {
        Some(seed) => Box::new(move || Box::new(RandomOracle::new(seed))),
        None => Box::new(|| Box::new(RoundRobinOracle::new())),
    };

    let verifier = scenario.verifier.as_ref().map(|v| v as &dyn mc_engine::oracle::Verifier);
    let drive_report = scenario.driver.drive(config, 2, make_oracle, verifier);

    if json {
        print_json(name, &drive_report);
    } else {
        print_human(name, &drive_report);
    }

    match &drive_report.outcome {
        mc_common::InvocationOutcome::Completed(_) => Ok(()),
        mc_common::InvocationOutcome::Failed(err) => Err(err.to_string()),
    }
}

fn print_human(name: &str, drive_report: &mc_engine::DriveReport) {
    match &drive_report.outcome {
        mc_common::InvocationOutcome::Completed(results) => {
            println!("{name}: completed");
            for (idx, result) in results.iter().enumerate() {
                println!("  worker-{idx}: {result:?}");
            }
        }
        mc_common::InvocationOutcome::Failed(err) => {
            println!("{name}: failed ({err})");
            if !drive_report.trace.is_empty() {
                let results: Vec<_> = Vec::new();
                println!("{}", report::render(&drive_report.trace, &results));
            }
        }
    }
}

fn print_json(name: &str, drive_report: &mc_engine::DriveReport) {
    let body = match &drive_report.outcome {
        mc_common::InvocationOutcome::Completed(results) => serde_json::json!({
            "scenario": name,
            "outcome": "completed",
            "results": results.iter().map(|r| format!("{r:?}")).collect::<Vec<_>>(),
        }),
        mc_common::InvocationOutcome::Failed(err) => serde_json::json!({
            "scenario": name,
            "outcome": "failed",
            "error": err.to_string(),
            "trace_events": drive_report.trace.len(),
        }),
    };
    println!("{body}");
}
