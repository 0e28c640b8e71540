//! Scripted robot for exercising the client over real localhost sockets

use crate::commands::{CODE_CONNECTED, CODE_EOB, CODE_FEEDBACK_CONNECTED};
use crate::config::Config;
use crate::protocol::{Frame, TERMINATOR};
use crate::status::StatusRecord;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct MockState {
    status: StatusRecord,
    commands: Vec<String>,
    pending_polls: u32,
}

struct Shared {
    greeting: Frame,
    feedback_greeting: Frame,
    feedback_frames: Vec<Frame>,
    silent: bool,
    overrides: Vec<(String, Frame)>,
    motion_polls: u32,
    firmware: String,
    state: Mutex<MockState>,
}

impl Shared {
    fn respond(&self, command: &str) -> Option<Frame> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        if self.silent {
            return None;
        }
        if let Some((_, frame)) = self.overrides.iter().find(|(prefix, _)| command.starts_with(prefix.as_str())) {
            return Some(frame.clone());
        }

        let name = command.split('(').next().unwrap_or_default();
        let frame = match name {
            "GetStatusRobot" => {
                if state.pending_polls > 0 {
                    state.pending_polls -= 1;
                    if state.pending_polls == 0 {
                        state.status.end_of_movement = true;
                    }
                }
                Frame::new(2007, state.status.to_payload())
            }
            "ActivateRobot" => {
                state.status.activated = true;
                Frame::new(2000, "Motors activated.")
            }
            "Home" => {
                state.status.homed = true;
                Frame::new(2002, "Homing done.")
            }
            "DeactivateRobot" => {
                state.status.activated = false;
                state.status.homed = false;
                Frame::new(2004, "Motors deactivated.")
            }
            "ResetError" => {
                state.status.error = false;
                Frame::new(2005, "The error was reset.")
            }
            "PauseMotion" => {
                state.status.paused = true;
                Frame::new(2042, "Motion paused.")
            }
            "ResumeMotion" => {
                state.status.paused = false;
                Frame::new(2043, "Motion resumed.")
            }
            "ClearMotion" => Frame::new(2044, "The motion was cleared."),
            "BrakesOn" => Frame::new(2010, "All brakes set."),
            "BrakesOff" => Frame::new(2008, "All brakes released."),
            "ActivateSim" => {
                state.status.simulating = true;
                Frame::new(2045, "The simulation mode is enabled.")
            }
            "DeactivateSim" => {
                state.status.simulating = false;
                Frame::new(2046, "The simulation mode is disabled.")
            }
            "GetFwVersion" => Frame::new(2081, self.firmware.clone()),
            "GetProductType" => Frame::new(2084, "Meca500"),
            "GetJoints" => Frame::new(2026, "0,-60,60,0,0,0"),
            "GetPose" => Frame::new(2027, "190,0,308,0,90,0"),
            name if name.starts_with("Move") => {
                state.status.end_of_movement = self.motion_polls == 0;
                state.pending_polls = self.motion_polls;
                Frame::new(CODE_EOB, "")
            }
            name if name.starts_with("Set") || name == "Delay" || name.starts_with("Gripper") => {
                Frame::new(CODE_EOB, "")
            }
            _ => Frame::new(1000, "Unknown command."),
        };
        Some(frame)
    }
}

pub(crate) struct MockRobotBuilder {
    greeting: Frame,
    feedback_greeting: Frame,
    feedback_frames: Vec<Frame>,
    feedback_enabled: bool,
    silent: bool,
    status: StatusRecord,
    overrides: Vec<(String, Frame)>,
    motion_polls: u32,
    firmware: String,
    timeout: f64,
}

impl MockRobotBuilder {
    pub fn greeting(mut self, code: i32, payload: &str) -> Self {
        self.greeting = Frame::new(code, payload);
        self
    }

    /// Also enables the feedback channel in the generated config.
    pub fn feedback_greeting(mut self, code: i32, payload: &str) -> Self {
        self.feedback_greeting = Frame::new(code, payload);
        self.feedback_enabled = true;
        self
    }

    /// Frames written in one burst after the feedback handshake.
    pub fn feedback_frames(mut self, frames: Vec<Frame>) -> Self {
        self.feedback_frames = frames;
        self.feedback_enabled = true;
        self
    }

    /// Record commands but never answer them.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn status(mut self, status: StatusRecord) -> Self {
        self.status = status;
        self
    }

    /// Answer any command starting with `prefix` with the given frame.
    pub fn reply(mut self, prefix: &str, code: i32, payload: &str) -> Self {
        self.overrides.push((prefix.to_string(), Frame::new(code, payload)));
        self
    }

    /// Status polls after a move before end-of-movement is reported.
    pub fn motion_polls(mut self, polls: u32) -> Self {
        self.motion_polls = polls;
        self
    }

    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_string();
        self
    }

    pub fn timeout(mut self, seconds: f64) -> Self {
        self.timeout = seconds;
        self
    }

    pub async fn spawn(self) -> MockRobot {
        let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feedback = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let control_addr = control.local_addr().unwrap();
        let feedback_addr = feedback.local_addr().unwrap();

        let shared = Arc::new(Shared {
            greeting: self.greeting,
            feedback_greeting: self.feedback_greeting,
            feedback_frames: self.feedback_frames,
            silent: self.silent,
            overrides: self.overrides,
            motion_polls: self.motion_polls,
            firmware: self.firmware,
            state: Mutex::new(MockState {
                status: self.status,
                commands: Vec::new(),
                pending_polls: 0,
            }),
        });

        let control_task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((socket, _)) = control.accept().await {
                    tokio::spawn(serve_control(socket, Arc::clone(&shared)));
                }
            })
        };
        let feedback_task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Ok((socket, _)) = feedback.accept().await {
                    tokio::spawn(serve_feedback(socket, Arc::clone(&shared)));
                }
            })
        };

        let mut config = Config::for_host("127.0.0.1");
        config.robot.ports.control = control_addr.port();
        config.robot.ports.feedback = feedback_addr.port();
        config.robot.connection.timeout = self.timeout;
        config.robot.connection.feedback = self.feedback_enabled;

        MockRobot {
            shared,
            config,
            tasks: vec![control_task, feedback_task],
        }
    }
}

pub(crate) struct MockRobot {
    shared: Arc<Shared>,
    config: Config,
    tasks: Vec<JoinHandle<()>>,
}

impl MockRobot {
    pub fn builder() -> MockRobotBuilder {
        MockRobotBuilder {
            greeting: Frame::new(CODE_CONNECTED, "Connected to Meca500 R3 v8.1.9."),
            feedback_greeting: Frame::new(CODE_FEEDBACK_CONNECTED, "Connected to monitoring port."),
            feedback_frames: Vec::new(),
            feedback_enabled: false,
            silent: false,
            status: StatusRecord::default(),
            overrides: Vec::new(),
            motion_polls: 0,
            firmware: "v8.1.9".to_string(),
            timeout: 2.0,
        }
    }

    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Every command received so far, terminator stripped.
    pub fn commands(&self) -> Vec<String> {
        self.shared.state.lock().unwrap().commands.clone()
    }

    pub fn status(&self) -> StatusRecord {
        self.shared.state.lock().unwrap().status
    }
}

impl Drop for MockRobot {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn serve_control(mut socket: TcpStream, shared: Arc<Shared>) {
    if socket.write_all(&shared.greeting.to_wire()).await.is_err() {
        return;
    }
    if shared.greeting.code != CODE_CONNECTED {
        return;
    }

    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buffer.extend_from_slice(&chunk[..n]);
        while let Some(end) = buffer.iter().position(|&b| b == TERMINATOR) {
            let raw: Vec<u8> = buffer.drain(..=end).collect();
            let command = String::from_utf8_lossy(&raw[..raw.len() - 1]).to_string();
            if let Some(frame) = shared.respond(&command) {
                if socket.write_all(&frame.to_wire()).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn serve_feedback(mut socket: TcpStream, shared: Arc<Shared>) {
    let mut burst = shared.feedback_greeting.to_wire();
    for frame in &shared.feedback_frames {
        burst.extend(frame.to_wire());
    }
    if socket.write_all(&burst).await.is_err() {
        return;
    }
    // hold the link open until the client goes away
    let mut chunk = [0u8; 64];
    while let Ok(n) = socket.read(&mut chunk).await {
        if n == 0 {
            return;
        }
    }
}
