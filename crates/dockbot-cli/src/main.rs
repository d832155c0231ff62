//! `dockbot` – run the docking procedure against the simulated robot.
//!
//! The binary:
//!
//! 1. Loads `~/.dockbot/config.toml` (or `--config <path>`), applies
//!    `DOCKBOT_*` environment overrides, then command-line flags.
//! 2. Builds a [`SimRobot`] for the configured scenario.
//! 3. Runs [`DockingSequencer::dock`], printing world events as they happen.
//! 4. Cancels the run on **Ctrl-C**; any active search behavior is stopped as
//!    the sequence unwinds.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use dockbot_hal::{RobotSession, SimRobot};
use dockbot_runtime::{DockOutcome, DockingSequencer, init_tracing};
use dockbot_types::{Distance, WorldEventPayload};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use config::{ChargerMemory, Config, SimConfig};

#[derive(Parser, Debug)]
#[command(name = "dockbot", version, about = "Drive the robot back onto its charger")]
struct Cli {
    /// Config file (defaults to ~/.dockbot/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the default config to the config path and exit.
    #[arg(long)]
    init_config: bool,

    /// Start seated on the charger.
    #[arg(long)]
    on_charger: bool,

    /// What the robot remembers about the charger.
    #[arg(long, value_enum)]
    charger: Option<ChargerMemory>,

    /// The charger is never seen while looking around.
    #[arg(long)]
    hidden: bool,

    /// Reverse travel after the approach needed to seat on the contacts.
    #[arg(long, value_name = "MM")]
    docks_after: Option<f32>,

    /// Reversing never seats the robot.
    #[arg(long, conflicts_with = "docks_after")]
    never_docks: bool,

    /// Multiplier on simulated action durations (0 = instant).
    #[arg(long, value_parser = parse_time_scale)]
    time_scale: Option<f32>,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, sim: &mut SimConfig) {
        if self.on_charger {
            sim.start_on_charger = true;
        }
        if let Some(memory) = self.charger {
            sim.charger_memory = memory;
        }
        if self.hidden {
            sim.charger_visible = false;
        }
        if let Some(mm) = self.docks_after {
            sim.docks_after_mm = mm;
            sim.dock_succeeds = true;
        }
        if self.never_docks {
            sim.dock_succeeds = false;
        }
        if let Some(scale) = self.time_scale {
            sim.time_scale = scale;
        }
    }
}

fn parse_time_scale(raw: &str) -> Result<f32, String> {
    let scale: f32 = raw.parse().map_err(|e| format!("{e}"))?;
    if config::is_valid_time_scale(scale) {
        Ok(scale)
    } else {
        Err(format!("expected a number between 0 and {}", config::MAX_TIME_SCALE))
    }
}

#[derive(Serialize)]
struct RunReport {
    outcome: DockOutcome,
    on_charger: bool,
    elapsed_secs: f64,
    commands: usize,
}

fn main() -> ExitCode {
    let tracing_guard = init_tracing("dockbot");
    if tracing_guard.is_exporting() {
        info!("exporting traces over OTLP");
    }
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(config::config_path);

    if cli.init_config {
        return match config::save_to(&Config::default(), &path) {
            Ok(()) => {
                println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cli.apply(&mut cfg.sim);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg, cli.json))
}

async fn run(cfg: Config, json: bool) -> ExitCode {
    let robot = build_robot(&cfg.sim);
    print_scenario(&cfg.sim);

    let mut events = robot.subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.payload {
                    WorldEventPayload::ChargerObserved(charger) => {
                        println!("  {} spotted {}", "◉".cyan(), charger);
                    }
                    WorldEventPayload::ChargerContact { on_charger: true } => {
                        println!("  {} charger contacts engaged", "⚡".green());
                    }
                    WorldEventPayload::ChargerContact { on_charger: false } => {
                        println!("  {} charger contacts released", "○".dimmed());
                    }
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let sequencer = DockingSequencer::new(cfg.docking);
    let started = Instant::now();
    let result = tokio::select! {
        result = sequencer.dock(&robot) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    watcher.abort();

    match result {
        None => {
            println!();
            println!("{}", "⚠  Ctrl-C received – docking cancelled.".yellow().bold());
            ExitCode::from(130)
        }
        Some(Err(e)) => {
            error!(error = %e, "docking sequence failed");
            println!("{}: {}", "Docking failed".red().bold(), e);
            ExitCode::FAILURE
        }
        Some(Ok(outcome)) => {
            let report = RunReport {
                outcome,
                on_charger: robot.is_on_charger(),
                elapsed_secs: started.elapsed().as_secs_f64(),
                commands: robot.commands().len(),
            };
            print_report(&robot, &report, json);
            ExitCode::SUCCESS
        }
    }
}

fn build_robot(sim: &SimConfig) -> SimRobot {
    let builder = SimRobot::builder()
        .on_charger(sim.start_on_charger)
        .charger_visible(sim.charger_visible)
        .docks_after(sim.dock_succeeds.then(|| Distance::mm(sim.docks_after_mm)))
        .time_scale(sim.time_scale);
    let builder = match sim.charger_memory {
        ChargerMemory::Known => builder.remembers_charger(),
        ChargerMemory::Stale => builder.remembers_stale_charger(),
        ChargerMemory::Unknown => builder,
    };
    builder.build()
}

fn print_scenario(sim: &SimConfig) {
    println!();
    println!("  {} {}", "dockbot".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!(
        "  start on charger: {}  charger memory: {:?}  visible: {}  time scale: {}",
        sim.start_on_charger, sim.charger_memory, sim.charger_visible, sim.time_scale
    );
    println!();
}

fn print_report(robot: &SimRobot, report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(s) => println!("{s}"),
            Err(e) => error!(error = %e, "failed to serialise report"),
        }
        return;
    }

    println!();
    println!("  {}", "Command log".bold());
    for (at, command) in robot.timeline() {
        println!("    {:>7.2}s  {:?}", at.as_secs_f32(), command);
    }
    println!();
    let summary = format!("  Outcome: {}", report.outcome);
    if report.outcome.is_docked() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.yellow().bold());
    }
    println!("  Elapsed: {:.1}s", report.elapsed_secs);
}
