//! Command to acknowledgement-code table
//!
//! The robot answers each command with a code; which codes mean success
//! depends on the command. Motion commands (`Move*`) are acknowledged by
//! end-of-movement or end-of-block, parameter setters (`Set*`) by
//! end-of-block, and everything else by its own entry in the table.

use crate::{Result, RobotError};
use std::collections::HashMap;

/// Handshake code sent on the control channel after a successful connect.
pub const CODE_CONNECTED: i32 = 3000;
/// Handshake code sent when another client already owns the robot.
pub const CODE_ALREADY_CONNECTED: i32 = 3001;
/// Handshake code expected when the feedback channel opens.
pub const CODE_FEEDBACK_CONNECTED: i32 = 2079;
/// End of movement.
pub const CODE_EOM: i32 = 3004;
/// End of block.
pub const CODE_EOB: i32 = 3012;

const MOVE_CODES: &[i32] = &[CODE_EOM, CODE_EOB];
const SET_CODES: &[i32] = &[CODE_EOB];

const LITERAL_CODES: &[(&str, &[i32])] = &[
    ("ActivateRobot", &[2000, 2001]),
    ("Home", &[2002, 2003]),
    ("DeactivateRobot", &[2004]),
    ("ResetError", &[2005, 2006]),
    ("GetStatusRobot", &[2007]),
    ("BrakesOff", &[2008]),
    ("BrakesOn", &[2010]),
    ("GetJoints", &[2026]),
    ("GetPose", &[2027]),
    ("GetConf", &[2029]),
    ("PauseMotion", &[2042]),
    ("ResumeMotion", &[2043]),
    ("ClearMotion", &[2044]),
    ("ActivateSim", &[2045]),
    ("DeactivateSim", &[2046]),
    ("GetFwVersion", &[2081]),
    ("GetProductType", &[2084]),
    ("Delay", &[CODE_EOB]),
    ("GripperOpen", &[CODE_EOM, CODE_EOB]),
    ("GripperClose", &[CODE_EOM, CODE_EOB]),
];

/// Immutable lookup from command name to accepted reply codes.
#[derive(Debug, Clone)]
pub struct CommandTable {
    literal: HashMap<&'static str, &'static [i32]>,
}

impl CommandTable {
    /// The table for the robot's standard command set.
    pub fn standard() -> Self {
        Self {
            literal: LITERAL_CODES.iter().copied().collect(),
        }
    }

    /// Codes that acknowledge `command`.
    ///
    /// The `Move` and `Set` prefixes take precedence over literal entries.
    /// A name that matches neither prefix nor entry is an error.
    pub fn accepted_codes(&self, command: &str) -> Result<&'static [i32]> {
        if command.starts_with("Move") {
            return Ok(MOVE_CODES);
        }
        if command.starts_with("Set") {
            return Ok(SET_CODES);
        }
        self.literal
            .get(command)
            .copied()
            .ok_or_else(|| RobotError::UnknownCommand(command.to_string()))
    }

    pub fn accepts(&self, command: &str, code: i32) -> Result<bool> {
        Ok(self.accepted_codes(command)?.contains(&code))
    }

    /// Literal command names, sorted.
    pub fn literal_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.literal.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}
