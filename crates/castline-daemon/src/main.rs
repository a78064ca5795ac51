//! castline-daemon: headless driver for a castline session.
//!
//! Reads line commands from stdin, runs them against a SessionController
//! backed by the simulated transport, and prints every notification to
//! stdout as one JSON line.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use castline_core::event_bus::BroadcastEvent;
use castline_core::paths;
use castline_core::{ControllerConfig, Outcome, SessionController, SimulatedTransport};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use commands::{DaemonCommand, HELP};

#[derive(Parser, Debug)]
#[command(name = "castline-daemon", about = "Drive a castline session from the terminal")]
struct Args {
    /// Config file (defaults to ~/.castline/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Name the simulated server reports on connect
    #[arg(long, default_value = "Studio")]
    server_name: String,

    /// Delay of every simulated transport call, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Probability (0-1) that a simulated connect fails
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Write a transport transcript to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let config_path = match args.config {
        Some(path) => path,
        None => paths::default_config_path()?,
    };
    let mut config = ControllerConfig::load(&config_path).map_err(|e| e.to_string())?;
    if args.log_dir.is_some() {
        config.log_dir = args.log_dir;
    }

    let grace = drain_grace(&config);
    let transport = SimulatedTransport::new(args.server_name)
        .with_delay(Duration::from_millis(args.delay_ms))
        .with_failure_rate(args.failure_rate);
    let controller = SessionController::spawn(Arc::new(transport), config);
    log::info!("Session {} ready, type 'help' for commands", controller.id());

    let printer = tokio::spawn(print_events(controller.subscribe()));

    let mut interrupted = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| format!("Failed to read stdin: {}", e))?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                interrupted = true;
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match commands::parse(&line) {
            Ok(Some(DaemonCommand::Quit)) => break,
            Ok(Some(command)) => dispatch(&controller, command),
            Ok(None) => {}
            Err(e) => log::warn!("{}", e),
        }
    }

    if interrupted {
        controller.shutdown();
        printer.abort();
        return Ok(());
    }

    if drain(controller, printer, grace).await.is_none() {
        log::warn!("Gave up waiting for pending commands after {:?}", grace);
    }
    Ok(())
}

/// Longest a pending command can take, plus slack for the last notifications.
fn drain_grace(config: &ControllerConfig) -> Duration {
    config
        .connect_timeout()
        .max(config.teardown_timeout())
        .max(config.control_timeout())
        + Duration::from_secs(1)
}

/// Release our handle and wait for the printer to see the bus close.
///
/// The bus closes once every in-flight command has dropped its controller
/// clone and the actor has exited. Returns the number of events printed, or
/// `None` if that took longer than `grace`.
async fn drain(
    controller: SessionController,
    printer: JoinHandle<usize>,
    grace: Duration,
) -> Option<usize> {
    drop(controller);
    match tokio::time::timeout(grace, printer).await {
        Ok(Ok(printed)) => Some(printed),
        Ok(Err(e)) => {
            log::warn!("Event printer failed: {}", e);
            None
        }
        Err(_) => None,
    }
}

/// Run a command without blocking stdin, so a second `connect` can race the first.
fn dispatch(controller: &SessionController, command: DaemonCommand) {
    match command {
        DaemonCommand::Status => {
            let state = controller.state();
            let status = serde_json::json!({
                "session": state,
                "connectionStatusText": state.connection_status_text(),
                "playPauseLabel": state.play_pause_label(),
                "playbackStatusText": state.playback_status_text(),
            });
            println!("{}", status);
            return;
        }
        DaemonCommand::Help => {
            println!("{}", HELP);
            return;
        }
        DaemonCommand::Quit => return,
        _ => {}
    }

    let controller = controller.clone();
    tokio::spawn(async move {
        let (name, outcome): (&str, Outcome) = match command {
            DaemonCommand::Connect => ("connect", controller.connect().await),
            DaemonCommand::Disconnect => ("disconnect", controller.disconnect().await),
            DaemonCommand::Toggle => ("toggle", controller.toggle_play_pause().await),
            DaemonCommand::Track { title, artist } => (
                "track",
                controller.receive_track_update(title, artist).await,
            ),
            DaemonCommand::Volume(volume) => ("volume", controller.set_volume(volume).await),
            DaemonCommand::Device(device) => (
                "device",
                controller.select_output_device(device).await,
            ),
            DaemonCommand::RemoteConnected(name) => (
                "remote-connected",
                controller.receive_connection_update(true, name).await,
            ),
            DaemonCommand::RemoteDisconnected => (
                "remote-disconnected",
                controller.receive_connection_update(false, None).await,
            ),
            DaemonCommand::RemotePaused(paused) => (
                "remote-playback",
                controller.receive_playback_update(paused).await,
            ),
            DaemonCommand::Status | DaemonCommand::Help | DaemonCommand::Quit => return,
        };
        log::info!("{}: {}", name, outcome);
    });
}

/// Print every event as a JSON line until the bus closes. Returns how many were printed.
async fn print_events(mut rx: broadcast::Receiver<BroadcastEvent>) -> usize {
    let mut printed = 0;
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => {
                    println!("{}", line);
                    printed += 1;
                }
                Err(e) => log::warn!("Failed to serialize event: {}", e),
            },
            Err(RecvError::Lagged(missed)) => log::warn!("Missed {} notifications", missed),
            Err(RecvError::Closed) => break,
        }
    }
    printed
}

// ============================================================================
// TESTS
// ============================================================================
