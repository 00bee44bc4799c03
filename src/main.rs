//! blindctl - Main Entry Point
//!
//! Runs the MQTT control session and logs every target position handed to
//! motor control.

use blindctl::config::ControllerConfig;
use blindctl::ingress::{ConnectionEventHandler, PathSpec, PayloadDecoder, PositionHandoff};
use blindctl::observability::{init_default_logging, init_logging, metrics, LogFormat};
use blindctl::transport::mqtt::start_session;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn, Level};

/// How long `run` waits for the first ConnAck before only logging a warning
const INITIAL_CONNECT_WAIT: Duration = Duration::from_secs(10);

/// MQTT control ingress for a window-blind controller
#[derive(Parser)]
#[command(name = "blindctl")]
#[command(about = "MQTT control ingress for a window-blind controller")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "BLINDCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and feed target positions to motor control
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Decode a control payload and print the position
    Decode {
        /// JSON payload, e.g. '{"value": 42}'
        payload: String,
        /// Slash-separated path to the position field
        #[arg(long, default_value = "value")]
        path: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_cli_logging(cli.verbose);

    info!("Starting blindctl v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Run => match load_configuration(&cli.config) {
            Ok(config) => run_controller(config).await,
            Err(e) => Err(e),
        },
        Commands::Config { show } => match load_configuration(&cli.config) {
            Ok(config) => handle_config_command(&config, show),
            Err(e) => Err(e),
        },
        Commands::Decode { payload, path } => handle_decode_command(&payload, &path),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn init_cli_logging(verbose: u8) {
    let level = match verbose {
        0 => return init_default_logging(),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    init_logging(level, LogFormat::parse(&format), false);
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(ControllerConfig::load_from_file(path)?);
    }

    // Try default locations
    let default_paths = ["blindctl.toml", "config/blindctl.toml"];
    for path_str in default_paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(ControllerConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create blindctl.toml".into())
}

async fn run_controller(config: ControllerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Controller starting with device ID: {}", config.device.id);

    let session_config = config.session_config()?;
    let handoff = Arc::new(PositionHandoff::new());
    let handler = ConnectionEventHandler::new(
        config.control_topic(),
        config.payload_decoder()?,
        Arc::clone(&handoff),
    );

    let mut session = start_session(session_config, handler)?;

    // Motor-control side: drain the handoff as targets arrive
    let consumer = tokio::spawn({
        let handoff = Arc::clone(&handoff);
        async move {
            loop {
                let position = handoff.recv().await;
                info!(position = position.percent(), "New target position for motor control");
            }
        }
    });

    // Set up signal handling for graceful shutdown before the first connect wait
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let early_signal = tokio::select! {
        result = session.wait_until_connected(INITIAL_CONNECT_WAIT) => {
            if let Err(e) = result {
                warn!("Broker not connected yet, continuing to retry: {}", e);
            }
            None
        }
        name = next_shutdown_signal(&mut sigint, &mut sigterm) => Some(name),
    };

    let signal_name = match early_signal {
        Some(name) => name,
        None => {
            info!("Controller is running and waiting for control messages on MQTT...");
            next_shutdown_signal(&mut sigint, &mut sigterm).await
        }
    };
    info!("Received {}, shutting down gracefully...", signal_name);

    consumer.abort();
    let shutdown_result = session.shutdown().await;

    match serde_json::to_string(&metrics().snapshot()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Final ingress metrics"),
        Err(e) => warn!("Could not render metrics snapshot: {}", e),
    }

    shutdown_result.map_err(Into::into)
}

fn handle_config_command(
    config: &ControllerConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.broker_endpoint()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
        println!("# broker: {}:{} (tls: {})", endpoint.host, endpoint.port, endpoint.tls);
        println!(
            "# subscription: {}",
            config.control_topic().subscription_filter()
        );
    }

    info!("Configuration validation complete");
    Ok(())
}

fn handle_decode_command(payload: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let decoder = PayloadDecoder::new(PathSpec::parse(path)?);

    match decoder.decode(payload.as_bytes()) {
        Ok(position) => {
            println!("{position}");
            Ok(())
        }
        Err(e) => {
            println!("rejected: {}", e.kind());
            Err(e.into())
        }
    }
}

async fn next_shutdown_signal(
    sigint: &mut signal::unix::Signal,
    sigterm: &mut signal::unix::Signal,
) -> &'static str {
    tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}
