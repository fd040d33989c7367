//! # Cardfeed
//!
//! Postcard scanner: feeds a card, captures it upright, waits for the
//! operator's verdict and collects or returns the card.
//!
//! # Usage
//!
//! ```bash
//! # Hardware rig, configuration from /etc/cardfeed/cardfeed.toml
//! cardfeed
//!
//! # Simulated rig with operator-driven card (sim insert, sim marker near, ...)
//! cardfeed --config config/cardfeed.toml --simulate
//!
//! # Verbose JSON logs
//! cardfeed -c config/cardfeed.toml -v --json
//! ```

#![deny(warnings)]

use cardfeed::command::HELP;
use cardfeed::{ConsoleCommand, SimCommand, Supervisor};
use cardfeed_common::config::{CardfeedConfig, ConfigError, LogLevel, load_config};
use cardfeed_common::consts::DEFAULT_CONFIG_PATH;
use cardfeed_control_unit::{CaptureOutcome, Controller};
use cardfeed_hal::DriverRegistry;
use cardfeed_hal::drivers::simulation::{self, SimulationHandles, SimulationRig};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the console loop re-checks the running flag.
const CONSOLE_POLL: Duration = Duration::from_millis(200);

/// Cardfeed - postcard feeding scanner controller
#[derive(Parser, Debug)]
#[command(name = "cardfeed")]
#[command(version)]
#[command(about = "Postcard feeding scanner controller")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the simulation driver and enable the `sim` console commands
    #[arg(short = 's', long)]
    simulate: bool,

    /// Driver to load, overrides `hardware.driver`
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Cardfeed startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_config(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("Cardfeed v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) if args.simulate => {
            warn!("{:?} not found, simulating with defaults", args.config);
            CardfeedConfig::default()
        }
        Err(e) => return Err(format!("{}: {}", args.config.display(), e).into()),
    };

    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        simulation::DRIVER_NAME.to_string()
    } else {
        args.driver
            .clone()
            .unwrap_or_else(|| config.hardware.driver.clone())
    };

    let registry = DriverRegistry::with_builtin();
    if !registry.contains(&driver_name) {
        return Err(format!(
            "Unknown driver '{}' (available: {:?})",
            driver_name,
            registry.list_drivers()
        )
        .into());
    }

    // The simulated rig keeps its handles for the `sim` console commands.
    let (rig, sim) = if driver_name == simulation::DRIVER_NAME {
        let (rig, handles) = SimulationRig::build(&config);
        handles.track.set_pace(true);
        (rig, Some(handles))
    } else {
        (registry.create_rig(&driver_name, &config)?, None)
    };
    info!("Driver '{}' ready", rig.driver);

    let controller = Controller::new(rig.sensors, rig.actuator, rig.camera, &config)
        .with_callback(log_outcome);
    let supervisor = Supervisor::start(controller, &config.supervisor)?;

    let running = supervisor.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let mut console = Some(spawn_console()?);
    while supervisor.is_running() {
        let Some(lines) = console.as_ref() else {
            thread::sleep(CONSOLE_POLL);
            continue;
        };
        match lines.recv_timeout(CONSOLE_POLL) {
            Ok(line) => {
                if !handle_line(&supervisor, sim.as_ref(), &line) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Console closed, running until interrupted");
                console = None;
            }
        }
    }

    supervisor.shutdown()?;
    info!("Cardfeed shutdown complete");
    Ok(())
}

/// Forward stdin lines from a reader thread.
fn spawn_console() -> std::io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("cardfeed-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Execute one console line. Returns `false` on `quit`.
fn handle_line(supervisor: &Supervisor, sim: Option<&SimulationHandles>, line: &str) -> bool {
    let command = match line.parse::<ConsoleCommand>() {
        Ok(command) => command,
        Err(cardfeed::CommandError::Empty) => return true,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    match command {
        ConsoleCommand::Enable => supervisor.enable(),
        ConsoleCommand::Disable => supervisor.disable(),
        ConsoleCommand::Accept => {
            if !supervisor.accept() {
                println!("decision already recorded");
            }
        }
        ConsoleCommand::Reject => {
            if !supervisor.reject() {
                println!("decision already recorded");
            }
        }
        ConsoleCommand::Simulate(None) => supervisor.simulate_capture(None),
        ConsoleCommand::Simulate(Some(path)) => match image::open(&path) {
            Ok(image) => supervisor.simulate_capture(Some(image)),
            Err(e) => warn!("Cannot load {:?}: {}", path, e),
        },
        ConsoleCommand::Status => match serde_json::to_string(&supervisor.status()) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Status serialization failed: {}", e),
        },
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Sim(command) => match sim {
            Some(handles) => apply_sim(handles, command),
            None => println!("'sim' commands need --simulate"),
        },
    }
    true
}

fn apply_sim(handles: &SimulationHandles, command: SimCommand) {
    match command {
        SimCommand::Insert => handles.track.insert_card(),
        SimCommand::Remove => handles.track.remove_card(),
        SimCommand::Marker(placement) => handles.camera.set_marker(placement),
        SimCommand::Jam(jammed) => handles.track.set_jammed(jammed),
    }
    info!("sim: {:?}", command);
}

fn log_outcome(outcome: CaptureOutcome) {
    match (&outcome.image, outcome.success) {
        (Some(image), true) => info!(
            "Captured {}x{} card{}, awaiting accept/reject",
            image.width(),
            image.height(),
            if outcome.orientation_applied { " (rotated)" } else { "" }
        ),
        (Some(_), false) => warn!("Captured card without marker, returning it"),
        (None, _) => warn!("Capture failed, returning card"),
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        configured.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
