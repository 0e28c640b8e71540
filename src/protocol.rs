//! Wire framing for the Meca text protocol
//!
//! Every message is ASCII text of the form `[<code>][<payload>]` followed by a
//! single NUL byte. Outgoing commands are plain text terminated the same way.

use crate::{Result, RobotError};

/// Message terminator on both channels.
pub const TERMINATOR: u8 = 0;

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: i32,
    pub payload: String,
}

impl Frame {
    pub fn new(code: i32, payload: impl Into<String>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Render this frame in the robot's reply format, terminator included.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = format!("[{}][{}]", self.code, self.payload).into_bytes();
        bytes.push(TERMINATOR);
        bytes
    }
}

/// Append the terminator to a command. No escaping is done.
pub fn encode(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(TERMINATOR);
    bytes
}

/// Decode a single frame.
///
/// The input is split on the first `][`. The left side must start with `[`
/// and hold an integer; the right side must end with `]` once trailing
/// terminators are removed.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RobotError::FrameDecode(format!("non-ASCII frame: {}", e)))?;
    let text = text.trim_end_matches(char::from(TERMINATOR));

    let (raw_code, raw_payload) = text
        .split_once("][")
        .ok_or_else(|| RobotError::FrameDecode(format!("missing '][' delimiter in {:?}", text)))?;

    let code = raw_code
        .strip_prefix('[')
        .ok_or_else(|| RobotError::FrameDecode(format!("missing '[' before code in {:?}", text)))?
        .parse::<i32>()
        .map_err(|_| RobotError::FrameDecode(format!("non-numeric code in {:?}", text)))?;

    let payload = raw_payload
        .strip_suffix(']')
        .ok_or_else(|| RobotError::FrameDecode(format!("missing ']' after payload in {:?}", text)))?;

    Ok(Frame::new(code, payload))
}

/// Decode every NUL-terminated frame in `buffer`, in arrival order.
///
/// Empty segments between terminators are skipped. Bytes after the last
/// terminator are treated as one more frame.
pub fn decode_all(buffer: &[u8]) -> Result<Vec<Frame>> {
    buffer
        .split(|&b| b == TERMINATOR)
        .filter(|segment| !segment.is_empty())
        .map(decode)
        .collect()
}

/// Render `Name(v1,v2,...)`, or the bare name when there are no arguments.
///
/// Numbers use Rust's shortest round-trip `Display`, which is independent of
/// locale: `-60.0` renders as `-60`, `0.5` as `0.5`.
pub fn format_command(name: &str, args: &[f64]) -> Result<String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RobotError::InvalidCommandName(name.to_string()));
    }
    if args.is_empty() {
        return Ok(name.to_string());
    }
    let rendered: Vec<String> = args.iter().map(|value| format_number(*value)).collect();
    Ok(format!("{}({})", name, rendered.join(",")))
}

fn format_number(value: f64) -> String {
    // Avoid "-0" on the wire
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Parse a comma-separated payload of exactly six numbers.
pub fn parse_vector(payload: &str) -> Result<[f64; 6]> {
    let values = payload
        .split(',')
        .map(|token| token.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|e| RobotError::PayloadDecode(format!("bad number in {:?}: {}", payload, e)))?;

    values
        .try_into()
        .map_err(|v: Vec<f64>| RobotError::PayloadDecode(format!("expected 6 values, got {} in {:?}", v.len(), payload)))
}
