#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays scripted pointer gestures on a tactical grid.

mod demo;

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use civ_tactics_session::Session;
use civ_tactics_world::TerrainConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use demo::{DemoReport, DemoScript, GestureOutcome};

/// Replays a demo script against a fresh tactical grid session.
#[derive(Parser, Debug)]
#[command(author, version, about = "Tactical grid demo runner", long_about = None)]
struct Cli {
    /// TOML demo script holding a `[session]` table and `[[gestures]]` entries.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Overrides the number of grid rows.
    #[arg(long)]
    height: Option<u32>,
    /// Overrides the number of grid columns.
    #[arg(long)]
    width: Option<u32>,
    /// Replaces the terrain with seeded random terrain.
    #[arg(long)]
    seed: Option<u64>,
    /// Chance, in percent, that seeded terrain places water.
    #[arg(long, default_value_t = 20)]
    water_percent: u32,
    /// Milliseconds of simulated time per frame.
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
    /// Frames a single move command may run before it is abandoned.
    #[arg(long, default_value_t = 600)]
    max_ticks: usize,
    /// Prints the replay report as JSON.
    #[arg(long)]
    json: bool,
    /// Enables debug logging when `RUST_LOG` is unset.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut script = match &cli.script {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read demo script {}", path.display()))?;
            DemoScript::parse(&text)?
        }
        None => DemoScript::default(),
    };
    if let Some(height) = cli.height {
        script.session.height = height;
    }
    if let Some(width) = cli.width {
        script.session.width = width;
    }
    if let Some(seed) = cli.seed {
        script.session.terrain = TerrainConfig::Seeded {
            seed,
            water_percent: cli.water_percent,
        };
    }

    let mut session = Session::new(script.session.clone()).context("failed to start session")?;
    info!(gestures = script.gestures.len(), "replaying demo script");
    let report = demo::replay(
        &mut session,
        &script.gestures,
        Duration::from_millis(cli.frame_ms),
        cli.max_ticks,
    );

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &DemoReport) {
    for (index, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            GestureOutcome::Placed { unit, cell } => {
                println!("#{index}: placed unit {} at {cell}", unit.get());
            }
            GestureOutcome::Moved {
                unit,
                from,
                to,
                ticks,
            } => {
                println!(
                    "#{index}: moved unit {} from {from} to {to} in {ticks} frames",
                    unit.get()
                );
            }
            GestureOutcome::Abandoned { unit, ticks } => {
                println!(
                    "#{index}: abandoned move of unit {} after {ticks} frames",
                    unit.get()
                );
            }
            GestureOutcome::Rejected { cell, reason } => {
                println!("#{index}: rejected at {cell}: {reason}");
            }
        }
    }
    println!(
        "{} events over {} frames, {} units on the grid",
        report.events.len(),
        report.ticks,
        report.units.len()
    );
}
