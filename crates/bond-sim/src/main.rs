//! Scenario runner for the bonding protocol engines.
//!
//! Runs a JSON scenario against an in-memory ledger and clock and prints a
//! JSON report of emitted events and final balances.
//!
//! Usage:
//!   bond-sim [--config FILE] SCENARIO.json
//!
//! Without `--config`, the file named by `BOND_SIM_CONFIG` is used, falling
//! back to built-in defaults.

mod config;
mod scenario;
mod sim;

use std::path::PathBuf;

use anyhow::{bail, Context};

use crate::config::SimConfig;
use crate::scenario::Scenario;
use crate::sim::Simulator;

const USAGE: &str = "usage: bond-sim [--config FILE] SCENARIO.json";

struct Args {
    config: Option<PathBuf>,
    scenario: PathBuf,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut config = None;
    let mut scenario = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
            path => {
                if scenario.replace(PathBuf::from(path)).is_some() {
                    bail!("more than one scenario given\n{USAGE}");
                }
            }
        }
    }
    let scenario = scenario.context(USAGE)?;
    Ok(Some(Args { config, scenario }))
}

fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = SimConfig::load(args.config.as_deref()).context("loading config")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let content = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&content).context("parsing scenario")?;
    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        "bond-sim starting"
    );

    let report = Simulator::new(config, scenario.start)?.run(&scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
