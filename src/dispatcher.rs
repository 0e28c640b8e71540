//! CommandDispatcher - validated, serialized command execution
//!
//! Every command goes through the same path: resolve named positions,
//! validate arguments against the hardware limits, connect if needed, run
//! the idempotency and paused-motion guards, send, then check the reply code
//! against the command table. A rejected command triggers one `ResetError`
//! before the rejection is returned.
//!
//! The control channel carries no request identifiers, so the whole path
//! runs under a single session lock: one command is outstanding at a time.

use crate::commands::CommandTable;
use crate::config::Config;
use crate::connection::{Channel, ConnectionManager, ConnectionState};
use crate::feedback::FeedbackReader;
use crate::frames::{FrameKind, FrameRegistry, PositionRef, Vector6};
use crate::identity::{FirmwareVersion, RobotIdentity};
use crate::limits;
use crate::protocol::{self, Frame};
use crate::sink::CommandSink;
use crate::status::{StatusField, StatusRecord};
use crate::{Result, RobotError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandStatus {
    /// The robot answered with an accepted code
    Acknowledged,
    /// The target state already held; nothing was sent
    AlreadySatisfied,
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub status: CommandStatus,
    pub code: Option<i32>,
    pub payload: Option<String>,
}

impl CommandResult {
    fn acknowledged(command: &str, frame: Frame) -> Self {
        Self {
            command: command.to_string(),
            status: CommandStatus::Acknowledged,
            code: Some(frame.code),
            payload: Some(frame.payload),
        }
    }

    fn already_satisfied(command: &str) -> Self {
        Self {
            command: command.to_string(),
            status: CommandStatus::AlreadySatisfied,
            code: None,
            payload: None,
        }
    }

    pub fn payload(&self) -> &str {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// State guarded by the session lock.
struct Session {
    registry: FrameRegistry,
    sink: Option<Box<dyn CommandSink>>,
    identity: RobotIdentity,
    /// Last brake state we caused, if any
    brakes_engaged: Option<bool>,
}

pub struct CommandDispatcher {
    connection: Arc<ConnectionManager>,
    table: Arc<CommandTable>,
    feedback_enabled: bool,
    expected_firmware: Option<FirmwareVersion>,
    session: Mutex<Session>,
}

impl CommandDispatcher {
    pub fn new(config: &Config) -> Self {
        let expected_firmware = config.robot.firmware.as_deref().and_then(|text| {
            let version = FirmwareVersion::parse(text);
            if version.is_none() {
                warn!("Ignoring unparseable firmware version in config: {}", text);
            }
            version
        });

        Self {
            connection: Arc::new(ConnectionManager::new(&config.robot)),
            table: Arc::new(CommandTable::standard()),
            feedback_enabled: config.robot.connection.feedback,
            expected_firmware,
            session: Mutex::new(Session {
                registry: FrameRegistry::from_config(&config.frames),
                sink: None,
                identity: RobotIdentity::default(),
                brakes_engaged: None,
            }),
        }
    }

    /// Attach a sink that sees every transmitted command.
    pub fn with_sink(mut self, sink: Box<dyn CommandSink>) -> Self {
        self.session.get_mut().sink = Some(sink);
        self
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn table(&self) -> &Arc<CommandTable> {
        &self.table
    }

    /// A reader for the feedback channel sharing this dispatcher's connection.
    pub fn feedback_reader(&self) -> FeedbackReader {
        FeedbackReader::new(Arc::clone(&self.connection), Arc::clone(&self.table))
    }

    pub async fn state(&self, channel: Channel) -> ConnectionState {
        self.connection.state(channel).await
    }

    pub async fn identity(&self) -> RobotIdentity {
        self.session.lock().await.identity.clone()
    }

    // ----- connection lifecycle -----

    /// Connect both channels and prepare the robot session.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.connect_session(&mut session).await
    }

    pub async fn disconnect(&self) {
        let _session = self.session.lock().await;
        self.connection.disconnect().await;
    }

    /// Explicit recovery after a fault or rejection.
    pub async fn reconnect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        info!("Reconnecting to {}", self.connection.host());
        self.connection.disconnect().await;
        self.connect_session(&mut session).await
    }

    async fn connect_session(&self, session: &mut Session) -> Result<()> {
        // brake state is only known for commands sent in this session
        session.brakes_engaged = None;
        self.connection.connect_control().await?;

        let status = self.query_status(session).await?;
        if status.error {
            warn!("Robot is in error at connect, resetting");
            self.checked(session, "ResetError").await?;
        }

        let firmware = self.checked(session, "GetFwVersion").await?;
        let product = self.checked(session, "GetProductType").await?;
        session.identity = RobotIdentity {
            firmware: FirmwareVersion::parse(&firmware.payload),
            product: Some(product.payload),
        };
        info!(
            "Robot: {} firmware {}",
            session.identity.product.as_deref().unwrap_or("unknown"),
            firmware.payload
        );
        if let (Some(expected), Some(actual)) = (self.expected_firmware, session.identity.firmware) {
            if expected != actual {
                warn!("Robot firmware {} differs from configured {}", actual, expected);
            }
        }

        if self.feedback_enabled {
            self.connection.connect_feedback().await?;
        }
        Ok(())
    }

    /// Connect from `Disconnected`; a faulted or rejected channel needs an explicit reconnect.
    async fn ensure_connected(&self, session: &mut Session) -> Result<()> {
        match self.connection.state(Channel::Control).await {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => {
                info!("Not connected, connecting to {}", self.connection.host());
                self.connect_session(session).await
            }
            state => Err(RobotError::NotConnected {
                channel: Channel::Control,
                state,
            }),
        }
    }

    // ----- dispatch core -----

    /// Execute `command` with numeric arguments.
    pub async fn execute(&self, command: &str, args: &[f64]) -> Result<CommandResult> {
        let mut session = self.session.lock().await;
        self.dispatch(&mut session, command, args).await
    }

    async fn execute_position(&self, command: &str, kind: FrameKind, position: &PositionRef) -> Result<CommandResult> {
        let mut session = self.session.lock().await;
        let vector = session.registry.resolve(kind, position)?;
        self.dispatch(&mut session, command, &vector).await
    }

    async fn dispatch(&self, session: &mut Session, command: &str, args: &[f64]) -> Result<CommandResult> {
        // nothing below touches the network until all three checks pass
        let accepted = self.table.accepted_codes(command)?;
        limits::validate_command(command, args)?;
        let text = protocol::format_command(command, args)?;

        self.ensure_connected(session).await?;

        if self.already_satisfied(session, command).await? {
            info!("{} skipped: robot already in target state", command);
            return Ok(CommandResult::already_satisfied(command));
        }

        if command.starts_with("Move") {
            self.resume_if_paused(session).await?;
        }

        if let Some(sink) = session.sink.as_mut() {
            sink.record(&text).map_err(|e| RobotError::Sink(e.to_string()))?;
        }

        let frame = self.transact(&text, command, accepted).await?;
        self.note_success(session, command);
        Ok(CommandResult::acknowledged(command, frame))
    }

    /// Idempotency guards for lifecycle commands.
    async fn already_satisfied(&self, session: &mut Session, command: &str) -> Result<bool> {
        let satisfied = match command {
            "ActivateRobot" => self.query_status(session).await?.activated,
            "Home" => self.query_status(session).await?.homed,
            "DeactivateRobot" => !self.query_status(session).await?.activated,
            "BrakesOn" => {
                let status = self.query_status(session).await?;
                !status.activated && session.brakes_engaged == Some(true)
            }
            "BrakesOff" => {
                // activation releases the brakes
                let status = self.query_status(session).await?;
                status.activated || session.brakes_engaged == Some(false)
            }
            _ => false,
        };
        Ok(satisfied)
    }

    async fn resume_if_paused(&self, session: &mut Session) -> Result<()> {
        if self.query_status(session).await?.paused {
            info!("Motion is paused, resuming before queueing move");
            self.checked(session, "ResumeMotion").await?;
        }
        Ok(())
    }

    fn note_success(&self, session: &mut Session, command: &str) {
        match command {
            "ActivateRobot" | "BrakesOff" => session.brakes_engaged = Some(false),
            "DeactivateRobot" | "BrakesOn" => session.brakes_engaged = Some(true),
            _ => {}
        }
    }

    async fn query_status(&self, session: &mut Session) -> Result<StatusRecord> {
        let frame = self.checked(session, "GetStatusRobot").await?;
        StatusRecord::decode(&frame.payload)
    }

    /// Send an argument-less internal command (guard, recovery, identity query).
    async fn checked(&self, _session: &mut Session, command: &str) -> Result<Frame> {
        let accepted = self.table.accepted_codes(command)?;
        self.transact(command, command, accepted).await
    }

    /// One request/reply on the control channel, with rejection recovery.
    async fn transact(&self, text: &str, command: &str, accepted: &[i32]) -> Result<Frame> {
        let frame = self.round_trip(text).await?;
        if accepted.contains(&frame.code) {
            return Ok(frame);
        }

        warn!(
            "{} answered with code {} (expected {:?}): {}",
            command, frame.code, accepted, frame.payload
        );
        if command != "ResetError" {
            self.recover().await;
        }
        Err(RobotError::CommandRejected {
            command: command.to_string(),
            code: frame.code,
            payload: frame.payload,
        })
    }

    async fn round_trip(&self, text: &str) -> Result<Frame> {
        self.connection
            .send(Channel::Control, &protocol::encode(text))
            .await?;
        self.connection.receive_frame(Channel::Control).await
    }

    /// Single `ResetError` after a rejection. Its own failure is logged, and
    /// the original rejection is what the caller sees.
    async fn recover(&self) {
        let outcome = match self.table.accepted_codes("ResetError") {
            Ok(accepted) => self.round_trip("ResetError").await.map(|frame| (accepted.contains(&frame.code), frame)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((true, frame)) => debug!("Error reset: {}", frame.payload),
            Ok((false, frame)) => warn!("ResetError answered with code {}: {}", frame.code, frame.payload),
            Err(e) => error!("ResetError failed: {}", e),
        }
    }

    // ----- frames -----

    pub async fn add_frame(&self, kind: FrameKind, name: &str, vector: Vector6) -> Option<Vector6> {
        self.session.lock().await.registry.add(kind, name, vector)
    }

    pub async fn add_pose(&self, name: &str, pose: Vector6) -> Option<Vector6> {
        self.add_frame(FrameKind::Pose, name, pose).await
    }

    pub async fn add_joints(&self, name: &str, joints: Vector6) -> Option<Vector6> {
        self.add_frame(FrameKind::Joints, name, joints).await
    }

    pub async fn add_tool(&self, name: &str, frame: Vector6) -> Option<Vector6> {
        self.add_frame(FrameKind::Tool, name, frame).await
    }

    pub async fn add_work(&self, name: &str, frame: Vector6) -> Option<Vector6> {
        self.add_frame(FrameKind::Work, name, frame).await
    }

    pub async fn resolve(&self, kind: FrameKind, position: &PositionRef) -> Result<Vector6> {
        self.session.lock().await.registry.resolve(kind, position)
    }

    // ----- lifecycle commands -----

    pub async fn activate(&self) -> Result<CommandResult> {
        self.execute("ActivateRobot", &[]).await
    }

    pub async fn deactivate(&self) -> Result<CommandResult> {
        self.execute("DeactivateRobot", &[]).await
    }

    pub async fn home(&self) -> Result<CommandResult> {
        self.execute("Home", &[]).await
    }

    pub async fn brakes_on(&self) -> Result<CommandResult> {
        self.execute("BrakesOn", &[]).await
    }

    pub async fn brakes_off(&self) -> Result<CommandResult> {
        self.execute("BrakesOff", &[]).await
    }

    pub async fn reset_error(&self) -> Result<CommandResult> {
        self.execute("ResetError", &[]).await
    }

    pub async fn activate_sim(&self) -> Result<CommandResult> {
        self.execute("ActivateSim", &[]).await
    }

    pub async fn deactivate_sim(&self) -> Result<CommandResult> {
        self.execute("DeactivateSim", &[]).await
    }

    pub async fn pause_motion(&self) -> Result<CommandResult> {
        self.execute("PauseMotion", &[]).await
    }

    pub async fn resume_motion(&self) -> Result<CommandResult> {
        self.execute("ResumeMotion", &[]).await
    }

    pub async fn clear_motion(&self) -> Result<CommandResult> {
        self.execute("ClearMotion", &[]).await
    }

    pub async fn delay(&self, seconds: f64) -> Result<CommandResult> {
        self.execute("Delay", &[seconds]).await
    }

    pub async fn gripper_open(&self) -> Result<CommandResult> {
        self.execute("GripperOpen", &[]).await
    }

    pub async fn gripper_close(&self) -> Result<CommandResult> {
        self.execute("GripperClose", &[]).await
    }

    // ----- motion -----

    pub async fn move_joints(&self, joints: impl Into<PositionRef>) -> Result<CommandResult> {
        self.execute_position("MoveJoints", FrameKind::Joints, &joints.into()).await
    }

    pub async fn move_pose(&self, pose: impl Into<PositionRef>) -> Result<CommandResult> {
        self.execute_position("MovePose", FrameKind::Pose, &pose.into()).await
    }

    pub async fn move_lin(&self, pose: impl Into<PositionRef>) -> Result<CommandResult> {
        self.execute_position("MoveLin", FrameKind::Pose, &pose.into()).await
    }

    pub async fn move_lin_rel_trf(&self, offset: Vector6) -> Result<CommandResult> {
        self.execute("MoveLinRelTRF", &offset).await
    }

    pub async fn move_lin_rel_wrf(&self, offset: Vector6) -> Result<CommandResult> {
        self.execute("MoveLinRelWRF", &offset).await
    }

    pub async fn move_joints_vel(&self, velocities: Vector6) -> Result<CommandResult> {
        self.execute("MoveJointsVel", &velocities).await
    }

    pub async fn move_lin_vel_trf(&self, velocity: Vector6) -> Result<CommandResult> {
        self.execute("MoveLinVelTRF", &velocity).await
    }

    pub async fn move_lin_vel_wrf(&self, velocity: Vector6) -> Result<CommandResult> {
        self.execute("MoveLinVelWRF", &velocity).await
    }

    pub async fn set_trf(&self, tool: impl Into<PositionRef>) -> Result<CommandResult> {
        self.execute_position("SetTRF", FrameKind::Tool, &tool.into()).await
    }

    pub async fn set_wrf(&self, work: impl Into<PositionRef>) -> Result<CommandResult> {
        self.execute_position("SetWRF", FrameKind::Work, &work.into()).await
    }

    // ----- parameters -----

    pub async fn set_cart_acc(&self, percent: f64) -> Result<CommandResult> {
        self.execute("SetCartAcc", &[percent]).await
    }

    pub async fn set_cart_ang_vel(&self, deg_per_s: f64) -> Result<CommandResult> {
        self.execute("SetCartAngVel", &[deg_per_s]).await
    }

    pub async fn set_cart_lin_vel(&self, mm_per_s: f64) -> Result<CommandResult> {
        self.execute("SetCartLinVel", &[mm_per_s]).await
    }

    pub async fn set_blending(&self, percent: f64) -> Result<CommandResult> {
        self.execute("SetBlending", &[percent]).await
    }

    pub async fn set_joint_vel(&self, percent: f64) -> Result<CommandResult> {
        self.execute("SetJointVel", &[percent]).await
    }

    pub async fn set_joint_acc(&self, percent: f64) -> Result<CommandResult> {
        self.execute("SetJointAcc", &[percent]).await
    }

    pub async fn set_vel_timeout(&self, seconds: f64) -> Result<CommandResult> {
        self.execute("SetVelTimeout", &[seconds]).await
    }

    pub async fn set_monitoring_interval(&self, seconds: f64) -> Result<CommandResult> {
        self.execute("SetMonitoringInterval", &[seconds]).await
    }

    // ----- queries -----

    pub async fn get_status(&self) -> Result<StatusRecord> {
        let result = self.execute("GetStatusRobot", &[]).await?;
        StatusRecord::decode(result.payload())
    }

    /// Single status flag by name; the name is checked before any I/O.
    pub async fn get_status_field(&self, name: &str) -> Result<bool> {
        let field: StatusField = name.parse()?;
        Ok(self.get_status().await?.field(field))
    }

    pub async fn get_joints(&self) -> Result<Vector6> {
        let result = self.execute("GetJoints", &[]).await?;
        protocol::parse_vector(result.payload())
    }

    pub async fn get_pose(&self) -> Result<Vector6> {
        let result = self.execute("GetPose", &[]).await?;
        protocol::parse_vector(result.payload())
    }

    pub async fn get_fw_version(&self) -> Result<String> {
        let result = self.execute("GetFwVersion", &[]).await?;
        Ok(result.payload().to_string())
    }

    pub async fn get_product_type(&self) -> Result<String> {
        let result = self.execute("GetProductType", &[]).await?;
        Ok(result.payload().to_string())
    }

    /// Poll status until end-of-movement or an error flag.
    ///
    /// Each poll takes the session lock separately, so other commands can
    /// interleave. Hitting `timeout` does not fault the connection.
    pub async fn wait_motion_complete(&self, timeout: Duration, poll_interval: Duration) -> Result<StatusRecord> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.get_status().await?;
            if status.error {
                return Err(RobotError::RobotFault(status));
            }
            if status.end_of_movement {
                return Ok(status);
            }
            if Instant::now() + poll_interval > deadline {
                return Err(RobotError::MotionTimeout(timeout));
            }
            sleep(poll_interval).await;
        }
    }
}
