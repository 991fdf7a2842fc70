//! `autoaim` CLI: scenario runs, replay, seed sweeps, single trajectory solves.

use aim_core::config::AimConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use sim::replay::{load_replay, save_replay};
use sim::runner::{evaluate, RunSummary};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "autoaim", about = "Armor tracking and aiming harness")]
struct Cli {
    /// YAML configuration file (defaults for every missing field)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Muzzle speed (m/s)
        #[arg(long, default_value_t = 25.0)]
        bullet_speed: f64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the full replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Load and replay a previously recorded log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[arg(long, default_value_t = 25.0)]
        bullet_speed: f64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a scenario over many seeds in parallel and aggregate metrics.
    Sweep {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Number of seeds, starting at 0
        #[arg(long, default_value_t = 16)]
        seeds: u64,
        #[arg(long, default_value_t = 25.0)]
        bullet_speed: f64,
        /// Output per-seed metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Solve a single trajectory.
    Solve {
        /// Muzzle speed (m/s)
        #[arg(long)]
        speed: f64,
        /// Horizontal distance to the target (m)
        #[arg(long)]
        distance: f64,
        /// Target height above the muzzle (m)
        #[arg(long, default_value_t = 0.0)]
        height: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AimConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AimConfig::default(),
    };

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            bullet_speed,
            output,
            save_replay: save_path,
        } => {
            run_scenario(&config, scenario, seed, bullet_speed, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Replay {
            input,
            bullet_speed,
            output,
        } => {
            run_replay(&config, &input, bullet_speed, output.as_deref())?;
        }
        Commands::Sweep {
            scenario,
            seeds,
            bullet_speed,
            output,
        } => {
            run_sweep(&config, scenario, seeds, bullet_speed, output.as_deref())?;
        }
        Commands::Solve {
            speed,
            distance,
            height,
        } => solve(&config, speed, distance, height),
    }

    Ok(())
}

fn run_scenario(
    config: &AimConfig,
    kind: ScenarioKind,
    seed: u64,
    bullet_speed: f64,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.1}s)...",
        scenario.name, seed, scenario.duration
    );

    let log = scenario.run()?;
    let start = std::time::Instant::now();
    let summary = evaluate(&log, config, bullet_speed);
    let elapsed = start.elapsed();
    print_summary(&summary, elapsed.as_secs_f64());

    // Save replay if requested
    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        write_json(opath, &summary)?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}

fn run_replay(config: &AimConfig, input: &Path, bullet_speed: f64, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input).with_context(|| format!("loading replay {}", input.display()))?;
    println!(
        "Replaying '{}' ({} frames, {} observations)...",
        log.scenario_name,
        log.frames.len(),
        log.observation_count()
    );

    let start = std::time::Instant::now();
    let summary = evaluate(&log, config, bullet_speed);
    print_summary(&summary, start.elapsed().as_secs_f64());

    if let Some(opath) = output_path {
        write_json(opath, &summary)?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}

fn run_sweep(
    config: &AimConfig,
    kind: ScenarioKind,
    seeds: u64,
    bullet_speed: f64,
    output_path: Option<&Path>,
) -> Result<()> {
    println!("Sweeping {kind:?} over {seeds} seeds...");
    let start = std::time::Instant::now();

    let summaries = (0..seeds)
        .into_par_iter()
        .map(|seed| -> Result<RunSummary> {
            let log = Scenario::build(kind, seed).run()?;
            Ok(evaluate(&log, config, bullet_speed))
        })
        .collect::<Result<Vec<RunSummary>>>()?;

    let n = summaries.len().max(1) as f64;
    let mean = |f: fn(&RunSummary) -> f64| summaries.iter().map(f).sum::<f64>() / n;
    println!(
        "Done in {:.2}s: center RMSE {:.3} m, yaw-rate RMSE {:.3} rad/s, radius RMSE {:.3} m",
        start.elapsed().as_secs_f64(),
        mean(|s| s.metrics.rmse_center()),
        mean(|s| s.metrics.rmse_yaw_rate()),
        mean(|s| s.metrics.rmse_radius()),
    );
    println!(
        "  recall {:.3}, precision {:.3}, recreations {:.1}/run, solved shots {:.1}%",
        mean(|s| s.metrics.recall()),
        mean(|s| s.metrics.precision()),
        mean(|s| s.metrics.recreations as f64),
        100.0 * mean(shot_rate),
    );

    if let Some(opath) = output_path {
        write_json(opath, &summaries)?;
        println!("Metrics saved to {}", opath.display());
    }
    Ok(())
}

fn solve(config: &AimConfig, speed: f64, distance: f64, height: f64) {
    match config.trajectory.solve(speed, distance, height) {
        Ok(traj) => println!(
            "pitch {:.4} rad ({:.2} deg), fly time {:.4} s",
            traj.pitch,
            traj.pitch.to_degrees(),
            traj.fly_time
        ),
        Err(e) => println!("unsolvable: {e}"),
    }
}

fn shot_rate(s: &RunSummary) -> f64 {
    let attempts = s.shots_solved + s.shots_unsolvable;
    if attempts == 0 {
        0.0
    } else {
        s.shots_solved as f64 / attempts as f64
    }
}

fn print_summary(s: &RunSummary, elapsed: f64) {
    println!(
        "Done: {} frames, {} observations, {} targets alive, elapsed={:.3}s",
        s.frames, s.observations, s.final_targets, elapsed
    );
    println!(
        "Targets: {} created, {} confirmed, {} removed, {} recreated",
        s.targets_created, s.targets_confirmed, s.targets_removed, s.metrics.recreations
    );
    println!(
        "Errors: center RMSE {:.3} m, yaw-rate RMSE {:.3} rad/s, radius RMSE {:.3} m",
        s.metrics.rmse_center(),
        s.metrics.rmse_yaw_rate(),
        s.metrics.rmse_radius()
    );
    println!(
        "Shots: {} solved, {} unsolvable, mean fly time {:.3}s",
        s.shots_solved, s.shots_unsolvable, s.mean_fly_time
    );
    if s.filter_resets + s.reinitialized + s.rejected_observations > 0 {
        println!(
            "Recoveries: {} filter resets, {} re-initializations, {} rejected observations",
            s.filter_resets, s.reinitialized, s.rejected_observations
        );
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
