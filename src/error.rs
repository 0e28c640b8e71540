//! Error types for Meca protocol operations

use crate::connection::{Channel, ConnectionState};
use crate::status::StatusRecord;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RobotError>;

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("Malformed frame: {0}")]
    FrameDecode(String),

    /// Well-framed reply whose payload is not the expected shape
    #[error("Malformed payload: {0}")]
    PayloadDecode(String),

    #[error("Unexpected handshake code {code} on {channel} channel: {payload}")]
    UnexpectedHandshakeCode {
        channel: Channel,
        code: i32,
        payload: String,
    },

    #[error("Another session is already connected to the robot: {0}")]
    PeerAlreadyConnected(String),

    #[error("{parameter} = {value} is outside [{min}, {max}]")]
    LimitViolation {
        parameter: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{command} expects {expected} argument(s), got {got}")]
    InvalidArguments {
        command: String,
        expected: usize,
        got: usize,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid command name: {0:?}")]
    InvalidCommandName(String),

    #[error("Unknown status field '{0}' (expected one of: activated, homed, simulating, error, paused, eob, eom)")]
    UnknownStatusField(String),

    #[error("No {kind} named '{name}'")]
    UnknownFrame { kind: &'static str, name: String },

    #[error("Robot rejected {command} with code {code}: {payload}")]
    CommandRejected {
        command: String,
        code: i32,
        payload: String,
    },

    #[error("Timed out after {timeout:?} waiting on {channel} channel")]
    IoTimeout { channel: Channel, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{channel} channel is not connected (state: {state:?})")]
    NotConnected {
        channel: Channel,
        state: ConnectionState,
    },

    #[error("Robot reported an error state: {0:?}")]
    RobotFault(StatusRecord),

    #[error("Motion did not complete within {0:?}")]
    MotionTimeout(Duration),

    #[error("Command sink failed: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RobotError {
    /// True for failures that leave the channel unusable until reconnect.
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            RobotError::FrameDecode(_)
                | RobotError::IoTimeout { .. }
                | RobotError::Io(_)
                | RobotError::UnexpectedHandshakeCode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_decode_is_not_a_connection_fault() {
        assert!(!RobotError::PayloadDecode("expected 6 values".into()).is_connection_fault());
        assert!(!crate::protocol::parse_vector("1,2,3").unwrap_err().is_connection_fault());
        assert!(!StatusRecord::decode("1,1,0").unwrap_err().is_connection_fault());
        assert!(RobotError::FrameDecode("missing ']['".into()).is_connection_fault());
        assert!(RobotError::IoTimeout {
            channel: Channel::Control,
            timeout: Duration::from_secs(1),
        }
        .is_connection_fault());
    }
}
