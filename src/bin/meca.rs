//! Meca command-line client
//!
//! One-shot commands against a Meca500: status queries, lifecycle commands,
//! moves, raw command execution and feedback monitoring.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use meca::{
    CommandDispatcher, Config, ConsoleTelemetry, PositionRef, ProgramRecorder, RobotError,
    TelemetryPublisher,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meca")]
#[command(about = "Command-line client for Mecademic Meca500 robots")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Robot address, overrides the configuration
    #[arg(long, global = true)]
    host: Option<String>,

    /// Append every transmitted command to this file
    #[arg(long, global = true)]
    record: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the robot status flags
    Status,
    /// Activate the motors
    Activate,
    /// Home the robot
    Home,
    /// Deactivate the motors
    Deactivate,
    /// Print current joint angles
    Joints,
    /// Print current end-effector pose
    Pose,
    /// Move in joint space to six angles or a named joint set
    MoveJoints {
        #[arg(required = true, num_args = 1..=6, allow_hyphen_values = true)]
        target: Vec<String>,
    },
    /// Move to six pose values or a named pose
    MovePose {
        #[arg(required = true, num_args = 1..=6, allow_hyphen_values = true)]
        target: Vec<String>,
    },
    /// Send any known command with numeric arguments
    Exec {
        name: String,
        #[arg(allow_hyphen_values = true)]
        args: Vec<f64>,
    },
    /// Stream joints and pose from the feedback channel
    Monitor {
        /// Stop after this many samples
        #[arg(short, long)]
        samples: Option<u64>,
    },
    /// Wait until the current motion has finished
    Wait {
        /// Give up after this many seconds
        #[arg(short, long, default_value = "60")]
        timeout: f64,
    },
}

impl Args {
    fn load_config(&self) -> Result<Config> {
        let path = self
            .config
            .clone()
            .or_else(|| std::env::var("MECA_CONFIG").ok());
        let mut config = match path {
            Some(path) => Config::load(&path).with_context(|| format!("Failed to load config {}", path))?,
            None => Config::default(),
        };
        if let Some(host) = &self.host {
            config.robot.host = host.clone();
        }
        Ok(config)
    }
}

/// Six numbers are a literal target, a single word is a registry name.
fn parse_target(target: &[String]) -> Result<PositionRef> {
    if let [name] = target {
        if name.parse::<f64>().is_err() {
            return Ok(PositionRef::from(name.as_str()));
        }
    }
    if target.len() != 6 {
        bail!("Expected six values or a name, got {} argument(s)", target.len());
    }
    let mut values = [0.0; 6];
    for (slot, text) in values.iter_mut().zip(target) {
        *slot = text
            .parse()
            .with_context(|| format!("Invalid number: {}", text))?;
    }
    Ok(PositionRef::Literal(values))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = args.load_config()?;
    if matches!(args.command, Commands::Monitor { .. }) {
        config.robot.connection.feedback = true;
    }

    let mut dispatcher = CommandDispatcher::new(&config);
    if let Some(path) = &args.record {
        let recorder = ProgramRecorder::create(path)
            .with_context(|| format!("Failed to create recording {}", path))?;
        dispatcher = dispatcher.with_sink(Box::new(recorder));
    }

    let telemetry = if args.pretty {
        ConsoleTelemetry::pretty()
    } else {
        ConsoleTelemetry::new()
    };

    dispatcher
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", config.robot.host))?;

    let outcome = run(&args.command, &dispatcher, &telemetry).await;
    if let Err(e) = &outcome {
        if e.downcast_ref::<RobotError>().is_some_and(RobotError::is_connection_fault) {
            warn!("Connection to {} is faulted; the next run will reconnect", config.robot.host);
        }
    }
    dispatcher.disconnect().await;
    outcome
}

async fn run(command: &Commands, dispatcher: &CommandDispatcher, telemetry: &ConsoleTelemetry) -> Result<()> {
    match command {
        Commands::Status => {
            let status = dispatcher.get_status().await?;
            telemetry.publish_status(&status).await
        }
        Commands::Activate => {
            let result = dispatcher.activate().await?;
            telemetry.publish_command(&result).await
        }
        Commands::Home => {
            let result = dispatcher.home().await?;
            telemetry.publish_command(&result).await
        }
        Commands::Deactivate => {
            let result = dispatcher.deactivate().await?;
            telemetry.publish_command(&result).await
        }
        Commands::Joints => {
            let joints = dispatcher.get_joints().await?;
            telemetry.publish_custom("JOINTS", &serde_json::json!(joints)).await
        }
        Commands::Pose => {
            let pose = dispatcher.get_pose().await?;
            telemetry.publish_custom("POSE", &serde_json::json!(pose)).await
        }
        Commands::MoveJoints { target } => {
            let result = dispatcher.move_joints(parse_target(target)?).await?;
            telemetry.publish_command(&result).await
        }
        Commands::MovePose { target } => {
            let result = dispatcher.move_pose(parse_target(target)?).await?;
            telemetry.publish_command(&result).await
        }
        Commands::Exec { name, args } => {
            let result = dispatcher
                .execute(name, args)
                .await
                .with_context(|| format!("{} failed", name))?;
            telemetry.publish_command(&result).await
        }
        Commands::Monitor { samples } => monitor(dispatcher, telemetry, *samples).await,
        Commands::Wait { timeout } => {
            if !timeout.is_finite() || *timeout <= 0.0 {
                bail!("Timeout must be a positive number of seconds");
            }
            let status = dispatcher
                .wait_motion_complete(Duration::from_secs_f64(*timeout), Duration::from_millis(100))
                .await?;
            telemetry.publish_status(&status).await
        }
    }
}

async fn monitor(dispatcher: &CommandDispatcher, telemetry: &ConsoleTelemetry, samples: Option<u64>) -> Result<()> {
    let mut subscriber = dispatcher.feedback_reader().subscribe();
    let mut received = 0u64;

    info!("Monitoring feedback, press Ctrl+C to stop");
    loop {
        tokio::select! {
            sample = subscriber.next_sample() => {
                let Some(sample) = sample else {
                    warn!("Feedback stream ended after {} samples", received);
                    break;
                };
                telemetry.publish_feedback(&sample).await?;
                received += 1;
                if samples.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}
