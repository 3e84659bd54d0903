#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless driver that builds a world and advances it tick by tick.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use wanderers_core::TickReport;
use wanderers_world::{query, World, WorldConfig};

/// Ticks between two progress summaries.
const SUMMARY_INTERVAL: u64 = 50;

/// Command-line arguments accepted by the driver.
#[derive(Debug, Parser)]
#[command(name = "wanderers")]
#[command(about = "Advance a population of wandering agents headlessly", version)]
struct Cli {
    /// TOML file describing the world; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the world seed.
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i64>,

    /// Overrides the number of agents.
    #[arg(long)]
    agents: Option<usize>,

    /// Number of ticks to advance.
    #[arg(long, default_value_t = 200)]
    ticks: u64,

    /// Simulated duration of a tick in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Advance agents on the calling thread instead of the rayon pool.
    #[arg(long)]
    serial: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json: bool,

    /// Writes the final world snapshot as JSON to this path.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Cli {
    fn world_config(&self) -> Result<WorldConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let source = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                WorldConfig::from_toml_str(&source)
                    .with_context(|| format!("invalid world configuration in {}", path.display()))?
            }
            None => WorldConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if self.serial {
            config.parallel = false;
        }
        Ok(config)
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn run(cli: &Cli) -> Result<TickReport> {
    let mut world = World::new(cli.world_config()?).context("failed to build the world")?;
    let dt = Duration::from_millis(cli.tick_ms);

    let mut last = TickReport::default();
    for _ in 0..cli.ticks {
        last = world.tick(dt);
        if last.tick % SUMMARY_INTERVAL == 0 {
            let without_path = query::agents(&world)
                .iter()
                .filter(|agent| agent.no_path())
                .count();
            tracing::info!(
                tick = last.tick,
                changed = last.updated.len(),
                without_path,
                "progress"
            );
        }
    }

    if let Some(path) = &cli.snapshot {
        let json = serde_json::to_string_pretty(&query::snapshot(&world))
            .context("failed to serialize the world snapshot")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(last)
}

/// Entry point for the wanderers command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let report = run(&cli)?;
    println!(
        "advanced {} ticks, {} agents moved in the last tick",
        report.tick,
        report.updated.len()
    );
    Ok(())
}
