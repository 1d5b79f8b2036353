//! Watch and follow commands - run a poll session in the terminal.
//!
//! While a session runs, simple commands are read from stdin so the user can
//! switch modes and move their own position without restarting:
//!
//! ```text
//! follow <id>        follow one vehicle
//! all                watch every vehicle
//! stop               pause polling
//! here <lat> <lon>   set your position
//! clear-position     forget your position
//! quit               exit
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use transitwatch::config::ConfigFile;
use transitwatch::geo::Position;
use transitwatch::location::{SharedUserPosition, UserPositionProvider};
use transitwatch::observer::{ChannelObserver, SyncEvent};
use transitwatch::scheduler::{PollMode, PollingScheduler};
use transitwatch::source::{HttpVehicleSource, ReqwestClient};

use crate::error::CliError;
use crate::render;
use crate::runner::CliRunner;

/// How long to wait for blocked stdin reads after the session ends.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Arguments shared by `watch` and `follow`.
pub struct TrackArgs {
    /// Initial mode.
    pub mode: PollMode,
    /// Poll interval override in milliseconds.
    pub interval_ms: Option<u64>,
    /// User latitude override.
    pub lat: Option<f64>,
    /// User longitude override.
    pub lon: Option<f64>,
}

impl TrackArgs {
    /// Position from the command line, falling back to the config file.
    fn user_position(&self, config: &ConfigFile) -> Result<Option<Position>, CliError> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => parse_position(lat, lon).map(Some),
            (None, None) => Ok(config.user.position()),
            _ => Err(CliError::Config(
                "--lat and --lon must be given together".to_string(),
            )),
        }
    }
}

/// Run a tracking session until Ctrl+C or `quit`.
pub fn run(runner: &CliRunner, args: TrackArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let result = runtime.block_on(track(runner.config(), args));

    // tokio's stdin reader blocks a thread that cannot be cancelled
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

async fn track(config: &ConfigFile, args: TrackArgs) -> Result<(), CliError> {
    let client = ReqwestClient::with_timeout(config.request_timeout())?;
    let source = HttpVehicleSource::new(client, config.source_config());

    let position = SharedUserPosition::with_position(args.user_position(config)?);
    let (observer, mut events) = ChannelObserver::new();

    let scheduler = PollingScheduler::builder(Arc::new(source))
        .observer(Arc::new(observer))
        .user_position(Arc::new(position.clone()))
        .icons(Arc::new(config.icon_resolver()))
        .config(config.scheduler_config())
        .build()?;

    let intervals = Intervals {
        all: args
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(scheduler.config().all_interval),
        single: args
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(scheduler.config().single_interval),
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!("TransitWatch v{}", transitwatch::VERSION);
    println!("Backend: {}", config.backend.base_url);
    match position.user_position() {
        Some(p) => println!("Your position: {}", p),
        None => println!("Your position: unknown (use 'here <lat> <lon>')"),
    }
    println!("Type 'help' for commands, Ctrl+C to exit");
    println!();

    let session = match args.mode {
        PollMode::All => scheduler.start_all(intervals.all),
        PollMode::Single(id) => scheduler.start_single(id, intervals.single),
    };
    render::session_started(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                render::notice("Received shutdown signal, stopping...");
                break;
            }

            Some(event) = events.recv() => match event {
                SyncEvent::VehiclesChanged(vehicles) => render::vehicles(&vehicles),
                SyncEvent::CycleError { kind, detail } => render::cycle_error(kind, &detail),
            },

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if execute(command, &scheduler, &position, &intervals) == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => render::notice(&message),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin, ignoring further input");
                    stdin_open = false;
                }
            },
        }
    }

    scheduler.shutdown().await;
    render::summary(&scheduler.metrics().snapshot());
    Ok(())
}

// =============================================================================
// Interactive commands
// =============================================================================

struct Intervals {
    all: Duration,
    single: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// A command typed while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Follow(String),
    All,
    Stop,
    Here(Position),
    ClearPosition,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match (verb.to_lowercase().as_str(), rest.as_slice()) {
            ("follow" | "f", [id]) => Command::Follow(id.to_string()),
            ("follow" | "f", _) => return Err("usage: follow <vehicle-id>".to_string()),
            ("all" | "a", []) => Command::All,
            ("stop" | "s", []) => Command::Stop,
            ("here", [lat, lon]) => {
                let lat = lat.parse::<f64>().map_err(|_| format!("invalid latitude '{}'", lat))?;
                let lon = lon.parse::<f64>().map_err(|_| format!("invalid longitude '{}'", lon))?;
                Command::Here(parse_position(lat, lon).map_err(|e| e.to_string())?)
            }
            ("here", _) => return Err("usage: here <lat> <lon>".to_string()),
            ("clear-position", []) => Command::ClearPosition,
            ("status", []) => Command::Status,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit" | "q", []) => Command::Quit,
            (other, _) => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn execute(
    command: Command,
    scheduler: &PollingScheduler,
    position: &SharedUserPosition,
    intervals: &Intervals,
) -> Flow {
    match command {
        Command::Follow(id) => {
            render::session_started(&scheduler.start_single(id, intervals.single));
        }
        Command::All => {
            render::session_started(&scheduler.start_all(intervals.all));
        }
        Command::Stop => {
            if scheduler.stop() {
                render::notice("Polling stopped; 'all' or 'follow <id>' to resume");
            } else {
                render::notice("Not polling");
            }
        }
        Command::Here(p) => {
            position.set(p);
            render::notice(&format!("Your position: {} (applies from the next update)", p));
        }
        Command::ClearPosition => {
            position.clear();
            render::notice("Your position cleared");
        }
        Command::Status => {
            match scheduler.current_session() {
                Some(session) => render::notice(&format!(
                    "Session {} polling {} every {} ms",
                    session.id,
                    session.mode,
                    session.interval.as_millis()
                )),
                None => render::notice("Not polling"),
            }
            render::notice(&scheduler.metrics().snapshot().to_string());
        }
        Command::Help => {
            for line in [
                "follow <id>        follow one vehicle",
                "all                watch every vehicle",
                "stop               pause polling",
                "here <lat> <lon>   set your position",
                "clear-position     forget your position",
                "status             show the session and counters",
                "quit               exit",
            ] {
                println!("  {}", line);
            }
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Validate a latitude/longitude pair.
pub fn parse_position(lat: f64, lon: f64) -> Result<Position, CliError> {
    if !(lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
        return Err(CliError::Config(format!("latitude {} out of range", lat)));
    }
    if !(lon.is_finite() && (-180.0..=180.0).contains(&lon)) {
        return Err(CliError::Config(format!("longitude {} out of range", lon)));
    }
    Ok(Position::new(lat, lon))
}
