//! TransitWatch CLI - command-line interface
//!
//! Watches live transit vehicles from a backend and shows how far each one is
//! from you on foot.

mod commands;
mod error;
mod render;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use transitwatch::config::{config_file_path, ConfigFile};
use transitwatch::scheduler::PollMode;

use commands::config::ConfigCommands;
use commands::distance::DistanceArgs;
use commands::track::TrackArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "transitwatch")]
#[command(version = transitwatch::VERSION)]
#[command(about = "Live transit vehicles with walking distance and ETA", long_about = None)]
struct Cli {
    /// Configuration file (default: platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch every vehicle the backend reports
    #[command(allow_negative_numbers = true)]
    Watch {
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Your latitude
        #[arg(long, requires = "lon")]
        lat: Option<f64>,

        /// Your longitude
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },

    /// Follow a single vehicle
    #[command(allow_negative_numbers = true)]
    Follow {
        /// Vehicle id
        vehicle_id: String,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Your latitude
        #[arg(long, requires = "lon")]
        lat: Option<f64>,

        /// Your longitude
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },

    /// Walking distance and ETA between two points
    #[command(allow_negative_numbers = true)]
    Distance {
        /// Start latitude
        from_lat: f64,
        /// Start longitude
        from_lon: f64,
        /// Destination latitude
        to_lat: f64,
        /// Destination longitude
        to_lon: f64,

        /// Walking speed in m/s (default: walking.speed_mps)
        #[arg(long)]
        speed: Option<f64>,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Watch {
            interval_ms,
            lat,
            lon,
        } => {
            let runner = CliRunner::new(&config_path, cli.verbose)?;
            runner.log_startup("watch");
            commands::track::run(
                &runner,
                TrackArgs {
                    mode: PollMode::All,
                    interval_ms,
                    lat,
                    lon,
                },
            )
        }

        Commands::Follow {
            vehicle_id,
            interval_ms,
            lat,
            lon,
        } => {
            let runner = CliRunner::new(&config_path, cli.verbose)?;
            runner.log_startup("follow");
            commands::track::run(
                &runner,
                TrackArgs {
                    mode: PollMode::Single(vehicle_id),
                    interval_ms,
                    lat,
                    lon,
                },
            )
        }

        Commands::Distance {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
            speed,
        } => {
            let config = ConfigFile::load_from(&config_path)?;
            commands::distance::run(
                DistanceArgs {
                    from_lat,
                    from_lon,
                    to_lat,
                    to_lon,
                    speed,
                },
                &config,
            )
        }

        Commands::Config { command } => commands::config::run(command, &config_path),
    }
}
