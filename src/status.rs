//! Robot status bitfield
//!
//! `GetStatusRobot` answers with seven comma-separated 0/1 flags. The meaning
//! of each flag is fixed by its position.

use crate::{Result, RobotError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decoded `GetStatusRobot` payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub activated: bool,
    pub homed: bool,
    pub simulating: bool,
    pub error: bool,
    pub paused: bool,
    pub end_of_block: bool,
    pub end_of_movement: bool,
}

/// Named status flag, in payload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Activated,
    Homed,
    Simulating,
    Error,
    Paused,
    EndOfBlock,
    EndOfMovement,
}

impl StatusField {
    pub const ALL: [StatusField; 7] = [
        StatusField::Activated,
        StatusField::Homed,
        StatusField::Simulating,
        StatusField::Error,
        StatusField::Paused,
        StatusField::EndOfBlock,
        StatusField::EndOfMovement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatusField::Activated => "activated",
            StatusField::Homed => "homed",
            StatusField::Simulating => "simulating",
            StatusField::Error => "error",
            StatusField::Paused => "paused",
            StatusField::EndOfBlock => "eob",
            StatusField::EndOfMovement => "eom",
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StatusField {
    type Err = RobotError;

    /// Accepts the short names plus `endOfBlock`/`endOfMovement`, case-insensitively.
    fn from_str(name: &str) -> Result<Self> {
        let field = match name.to_ascii_lowercase().as_str() {
            "activated" => StatusField::Activated,
            "homed" => StatusField::Homed,
            "simulating" => StatusField::Simulating,
            "error" => StatusField::Error,
            "paused" => StatusField::Paused,
            "eob" | "endofblock" => StatusField::EndOfBlock,
            "eom" | "endofmovement" => StatusField::EndOfMovement,
            _ => return Err(RobotError::UnknownStatusField(name.to_string())),
        };
        Ok(field)
    }
}

impl StatusRecord {
    /// Decode the flag payload. Fewer than seven flags, or any flag other
    /// than `0`/`1`, is a decode error. Extra trailing flags are ignored.
    pub fn decode(payload: &str) -> Result<Self> {
        let flags = payload
            .split(',')
            .map(|token| match token.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                other => Err(RobotError::PayloadDecode(format!(
                    "status flag {:?} is not 0 or 1 in {:?}",
                    other, payload
                ))),
            })
            .collect::<Result<Vec<bool>>>()?;

        if flags.len() < StatusField::ALL.len() {
            return Err(RobotError::PayloadDecode(format!(
                "status payload has {} flags, expected {}: {:?}",
                flags.len(),
                StatusField::ALL.len(),
                payload
            )));
        }

        Ok(Self {
            activated: flags[0],
            homed: flags[1],
            simulating: flags[2],
            error: flags[3],
            paused: flags[4],
            end_of_block: flags[5],
            end_of_movement: flags[6],
        })
    }

    pub fn field(&self, field: StatusField) -> bool {
        match field {
            StatusField::Activated => self.activated,
            StatusField::Homed => self.homed,
            StatusField::Simulating => self.simulating,
            StatusField::Error => self.error,
            StatusField::Paused => self.paused,
            StatusField::EndOfBlock => self.end_of_block,
            StatusField::EndOfMovement => self.end_of_movement,
        }
    }

    /// Look up a flag by name; unrecognized names are an error.
    pub fn get(&self, name: &str) -> Result<bool> {
        Ok(self.field(name.parse()?))
    }

    /// Render back into the wire payload.
    pub fn to_payload(&self) -> String {
        StatusField::ALL
            .iter()
            .map(|&f| if self.field(f) { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(",")
    }
}
