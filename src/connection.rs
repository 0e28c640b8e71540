//! Control and feedback channel ownership
//!
//! The connection manager holds both TCP links, runs the connect handshakes
//! and exposes blocking send/receive primitives bounded by the configured
//! read timeout. Each channel has its own lock, so the feedback channel can be
//! drained while a control command is outstanding.

use crate::commands::{CODE_ALREADY_CONNECTED, CODE_CONNECTED, CODE_FEEDBACK_CONNECTED};
use crate::config::RobotConfig;
use crate::protocol::{self, Frame, TERMINATOR};
use crate::{Result, RobotError};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 1024;
/// Longest unterminated frame tolerated before the link is faulted.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// Another session owns the robot
    Rejected,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Control,
    Feedback,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Control => f.write_str("control"),
            Channel::Feedback => f.write_str("feedback"),
        }
    }
}

/// One TCP link and its receive buffer.
struct Link {
    stream: Option<TcpStream>,
    state: ConnectionState,
    /// Bytes after the last terminator seen so far
    partial: Vec<u8>,
    /// Complete frames decoded but not yet handed out
    pending: VecDeque<Frame>,
}

impl Link {
    fn new() -> Self {
        Self {
            stream: None,
            state: ConnectionState::Disconnected,
            partial: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    fn reset(&mut self, state: ConnectionState) {
        self.stream = None;
        self.state = state;
        self.partial.clear();
        self.pending.clear();
    }

    fn fault(&mut self, channel: Channel, error: RobotError) -> RobotError {
        warn!("{} channel faulted: {}", channel, error);
        self.reset(ConnectionState::Faulted);
        error
    }
}

/// Owner of the control and feedback sockets.
pub struct ConnectionManager {
    host: String,
    control_port: u16,
    feedback_port: u16,
    read_timeout: Duration,
    nodelay: bool,
    control: Mutex<Link>,
    feedback: Mutex<Link>,
}

impl ConnectionManager {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            host: config.host.clone(),
            control_port: config.ports.control,
            feedback_port: config.ports.feedback,
            read_timeout: config.connection.read_timeout(),
            nodelay: config.connection.nodelay,
            control: Mutex::new(Link::new()),
            feedback: Mutex::new(Link::new()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn link(&self, channel: Channel) -> &Mutex<Link> {
        match channel {
            Channel::Control => &self.control,
            Channel::Feedback => &self.feedback,
        }
    }

    fn port(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Control => self.control_port,
            Channel::Feedback => self.feedback_port,
        }
    }

    pub async fn state(&self, channel: Channel) -> ConnectionState {
        self.link(channel).lock().await.state
    }

    /// Open the control channel and read its handshake.
    ///
    /// `3000` connects, `3001` leaves the channel `Rejected` and returns
    /// `PeerAlreadyConnected`, anything else faults the channel.
    pub async fn connect_control(&self) -> Result<Frame> {
        self.open(Channel::Control, false).await?;
        let frame = self.receive_frame(Channel::Control).await?;

        let mut link = self.control.lock().await;
        match frame.code {
            CODE_CONNECTED => {
                link.state = ConnectionState::Connected;
                info!("Control channel connected: {}", frame.payload);
                Ok(frame)
            }
            CODE_ALREADY_CONNECTED => {
                warn!("Another user is already connected: {}", frame.payload);
                link.reset(ConnectionState::Rejected);
                Err(RobotError::PeerAlreadyConnected(frame.payload))
            }
            code => Err(link.fault(
                Channel::Control,
                RobotError::UnexpectedHandshakeCode {
                    channel: Channel::Control,
                    code,
                    payload: frame.payload,
                },
            )),
        }
    }

    /// Open the feedback channel (with TCP no-delay) and read its handshake.
    ///
    /// A failure here only affects the feedback channel's state.
    pub async fn connect_feedback(&self) -> Result<Frame> {
        self.open(Channel::Feedback, self.nodelay).await?;
        let frame = self.receive_frame(Channel::Feedback).await?;

        let mut link = self.feedback.lock().await;
        if frame.code == CODE_FEEDBACK_CONNECTED {
            link.state = ConnectionState::Connected;
            info!("Feedback channel connected: {}", frame.payload);
            Ok(frame)
        } else {
            Err(link.fault(
                Channel::Feedback,
                RobotError::UnexpectedHandshakeCode {
                    channel: Channel::Feedback,
                    code: frame.code,
                    payload: frame.payload,
                },
            ))
        }
    }

    /// Connect the socket; the link stays `Disconnected` until the handshake is read.
    async fn open(&self, channel: Channel, nodelay: bool) -> Result<()> {
        let port = self.port(channel);
        let mut link = self.link(channel).lock().await;
        link.reset(ConnectionState::Disconnected);

        info!("Connecting {} channel to {}:{}", channel, self.host, port);
        let connect = TcpStream::connect((self.host.as_str(), port));
        let stream = match timeout(self.read_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(link.fault(channel, RobotError::Io(e))),
            Err(_) => {
                return Err(link.fault(
                    channel,
                    RobotError::IoTimeout {
                        channel,
                        timeout: self.read_timeout,
                    },
                ))
            }
        };

        if nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                return Err(link.fault(channel, RobotError::Io(e)));
            }
        }

        link.stream = Some(stream);
        Ok(())
    }

    /// Write raw bytes to a channel.
    pub async fn send(&self, channel: Channel, bytes: &[u8]) -> Result<()> {
        let mut guard = self.link(channel).lock().await;
        let link = &mut *guard;
        let Some(stream) = link.stream.as_mut() else {
            return Err(RobotError::NotConnected {
                channel,
                state: link.state,
            });
        };

        debug!("{} >> {:?}", channel, String::from_utf8_lossy(bytes));
        let written = match timeout(self.read_timeout, stream.write_all(bytes)).await {
            Ok(result) => result.map_err(RobotError::Io),
            Err(_) => Err(RobotError::IoTimeout {
                channel,
                timeout: self.read_timeout,
            }),
        };
        written.map_err(|e| link.fault(channel, e))
    }

    /// Read the next frame from a channel.
    ///
    /// Several frames delivered in one read are queued and handed out in
    /// arrival order. A timeout, I/O error, closed peer or malformed frame
    /// faults the channel; it is not retried.
    pub async fn receive_frame(&self, channel: Channel) -> Result<Frame> {
        let mut guard = self.link(channel).lock().await;
        let link = &mut *guard;
        loop {
            if let Some(frame) = link.pending.pop_front() {
                debug!("{} << [{}][{}]", channel, frame.code, frame.payload);
                return Ok(frame);
            }

            let Some(stream) = link.stream.as_mut() else {
                return Err(RobotError::NotConnected {
                    channel,
                    state: link.state,
                });
            };

            let mut chunk = [0u8; READ_CHUNK];
            let read = match timeout(self.read_timeout, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => Err(RobotError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} channel closed by peer", channel),
                ))),
                Ok(Ok(n)) => Ok(n),
                Ok(Err(e)) => Err(RobotError::Io(e)),
                Err(_) => Err(RobotError::IoTimeout {
                    channel,
                    timeout: self.read_timeout,
                }),
            };
            let n = match read {
                Ok(n) => n,
                Err(e) => return Err(link.fault(channel, e)),
            };

            link.partial.extend_from_slice(&chunk[..n]);
            if let Some(last) = link.partial.iter().rposition(|&b| b == TERMINATOR) {
                let complete: Vec<u8> = link.partial.drain(..=last).collect();
                match protocol::decode_all(&complete) {
                    Ok(frames) => link.pending.extend(frames),
                    Err(e) => return Err(link.fault(channel, e)),
                }
            }
            if link.partial.len() > MAX_FRAME_BYTES {
                let error = RobotError::FrameDecode(format!(
                    "no terminator within {} bytes on {} channel",
                    MAX_FRAME_BYTES, channel
                ));
                return Err(link.fault(channel, error));
            }
        }
    }

    /// Close one channel and return it to `Disconnected`.
    pub async fn close(&self, channel: Channel) {
        let mut link = self.link(channel).lock().await;
        if let Some(mut stream) = link.stream.take() {
            let _ = stream.shutdown().await; // Best effort
        }
        link.reset(ConnectionState::Disconnected);
    }

    pub async fn disconnect(&self) {
        info!("Disconnecting from {}", self.host);
        self.close(Channel::Control).await;
        self.close(Channel::Feedback).await;
    }
}
