//! Meca - async client for Mecademic Meca500 arms
//!
//! Speaks the robot's NUL-terminated ASCII protocol over its control and
//! feedback TCP ports. Commands are checked against the firmware's accepted
//! reply codes and the arm's hardware limits before anything is sent.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meca::{CommandDispatcher, Config};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config/robot.yaml")?;
//!     let robot = CommandDispatcher::new(&config);
//!
//!     robot.activate().await?;
//!     robot.home().await?;
//!     robot.move_joints("stow").await?;
//!     robot.wait_motion_complete(Duration::from_secs(30), Duration::from_millis(100)).await?;
//!
//!     println!("Pose: {:?}", robot.get_pose().await?);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **CommandDispatcher**: validation, guards, error recovery, one command at a time
//! - **ConnectionManager**: control and feedback sockets with their handshakes
//! - **CommandTable**: accepted reply codes per command
//! - **FeedbackReader**: joints/pose telemetry from the feedback port
//! - **TelemetryPublisher**: transport-agnostic output of samples and results

pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod frames;
pub mod identity;
pub mod limits;
pub mod protocol;
pub mod sink;
pub mod status;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod mock;

pub use commands::CommandTable;
pub use config::{Config, RobotConfig};
pub use connection::{Channel, ConnectionManager, ConnectionState};
pub use dispatcher::{CommandDispatcher, CommandResult, CommandStatus};
pub use error::{Result, RobotError};
pub use feedback::{FeedbackReader, FeedbackSample, FeedbackSubscriber};
pub use frames::{FrameKind, FrameRegistry, PositionRef, Vector6};
pub use identity::{FirmwareVersion, RobotIdentity};
pub use protocol::Frame;
pub use sink::{CommandSink, ProgramRecorder};
pub use status::{StatusField, StatusRecord};
pub use telemetry::{ConsoleTelemetry, NoOpTelemetry, TelemetryPublisher};
