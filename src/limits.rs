//! Hardware limits checked before any command leaves the client
//!
//! Every check returns `LimitViolation` naming the parameter and the bound it
//! broke. Nothing here clamps.

use crate::{Result, RobotError};

/// Joint position range per axis, degrees.
pub const JOINT_POSITION_LIMITS: [(f64, f64); 6] = [
    (-175.0, 175.0),
    (-70.0, 90.0),
    (-135.0, 70.0),
    (-170.0, 170.0),
    (-115.0, 115.0),
    (-180.0, 180.0),
];

/// Maximum absolute joint velocity per axis, deg/s.
pub const JOINT_VELOCITY_LIMITS: [f64; 6] = [150.0, 150.0, 180.0, 300.0, 300.0, 500.0];

/// Maximum absolute Cartesian velocity per axis: mm/s for x/y/z, deg/s for
/// rx/ry/rz. Axis 5 is bounded at 500 while axis 4 is bounded at 300.
pub const CARTESIAN_VELOCITY_LIMITS: [f64; 6] = [1000.0, 1000.0, 1000.0, 300.0, 300.0, 500.0];

/// Inclusive range for a single-valued parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn check(&self, parameter: &str, value: f64) -> Result<()> {
        if value.is_nan() || value < self.min || value > self.max {
            return Err(RobotError::LimitViolation {
                parameter: parameter.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Range of a scalar setter, or `None` if the command is not one.
pub fn scalar_range(command: &str) -> Option<Range> {
    let range = match command {
        "SetCartAcc" => Range::new(0.001, 600.0),
        "SetCartAngVel" => Range::new(0.001, 300.0),
        "SetCartLinVel" => Range::new(0.001, 1000.0),
        "SetBlending" => Range::new(0.0, 100.0),
        "SetJointVel" => Range::new(0.001, 100.0),
        "SetJointAcc" => Range::new(0.001, 150.0),
        "SetVelTimeout" => Range::new(0.001, 1.0),
        "SetMonitoringInterval" => Range::new(0.001, 1.0),
        "Delay" => Range::new(0.0, f64::INFINITY),
        _ => return None,
    };
    Some(range)
}

pub fn check_joints(joints: &[f64; 6]) -> Result<()> {
    for (axis, (&value, &(min, max))) in joints.iter().zip(JOINT_POSITION_LIMITS.iter()).enumerate() {
        Range::new(min, max).check(&format!("joint {} position", axis), value)?;
    }
    Ok(())
}

pub fn check_joint_velocities(velocities: &[f64; 6]) -> Result<()> {
    for (axis, (&value, &max)) in velocities.iter().zip(JOINT_VELOCITY_LIMITS.iter()).enumerate() {
        Range::new(-max, max).check(&format!("joint {} velocity", axis), value)?;
    }
    Ok(())
}

/// Each component is bounded by its absolute maximum only. Zero and negative
/// components are valid: a velocity vector may stop or reverse an axis, so
/// the 0.001 floor of the scalar speed setters does not apply here.
pub fn check_cartesian_velocity(velocity: &[f64; 6]) -> Result<()> {
    for (axis, (&value, &max)) in velocity.iter().zip(CARTESIAN_VELOCITY_LIMITS.iter()).enumerate() {
        Range::new(-max, max).check(&format!("cartesian axis {} velocity", axis), value)?;
    }
    Ok(())
}

/// Poses have no hardware table, but must be finite numbers.
pub fn check_pose(pose: &[f64; 6]) -> Result<()> {
    for (axis, &value) in pose.iter().enumerate() {
        if !value.is_finite() {
            return Err(RobotError::LimitViolation {
                parameter: format!("pose axis {}", axis),
                value,
                min: f64::MIN,
                max: f64::MAX,
            });
        }
    }
    Ok(())
}

/// Commands whose arguments are one 6-vector.
fn vector_check(command: &str) -> Option<fn(&[f64; 6]) -> Result<()>> {
    let check: fn(&[f64; 6]) -> Result<()> = match command {
        "MoveJoints" => check_joints,
        "MoveJointsVel" => check_joint_velocities,
        "MoveLinVelTRF" | "MoveLinVelWRF" => check_cartesian_velocity,
        "MovePose" | "MoveLin" | "MoveLinRelTRF" | "MoveLinRelWRF" | "SetTRF" | "SetWRF" => check_pose,
        _ => return None,
    };
    Some(check)
}

/// `Move*`/`Set*` commands the firmware accepts without a fixed signature here
/// (`SetEOB`, `SetConf`, `SetGripperForce`, ...).
fn is_open_signature(command: &str) -> bool {
    command.starts_with("Move") || command.starts_with("Set")
}

/// Validate the argument list of `command` against its signature and limits.
///
/// Open-signature `Move*`/`Set*` commands pass any number of finite
/// arguments; every other command without a known signature takes none.
pub fn validate_command(command: &str, args: &[f64]) -> Result<()> {
    if let Some(check) = vector_check(command) {
        let vector: &[f64; 6] = args.try_into().map_err(|_| RobotError::InvalidArguments {
            command: command.to_string(),
            expected: 6,
            got: args.len(),
        })?;
        return check(vector);
    }

    if let Some(range) = scalar_range(command) {
        return match args {
            [value] => range.check(command, *value),
            _ => Err(RobotError::InvalidArguments {
                command: command.to_string(),
                expected: 1,
                got: args.len(),
            }),
        };
    }

    if is_open_signature(command) {
        for (index, &value) in args.iter().enumerate() {
            if !value.is_finite() {
                return Err(RobotError::LimitViolation {
                    parameter: format!("{} argument {}", command, index),
                    value,
                    min: f64::MIN,
                    max: f64::MAX,
                });
            }
        }
        return Ok(());
    }

    if !args.is_empty() {
        return Err(RobotError::InvalidArguments {
            command: command.to_string(),
            expected: 0,
            got: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violated_parameter(result: Result<()>) -> String {
        match result {
            Err(RobotError::LimitViolation { parameter, .. }) => parameter,
            other => panic!("expected limit violation, got {:?}", other),
        }
    }

    #[test]
    fn joint_extremes_pass() {
        assert!(check_joints(&[175.0, -70.0, 70.0, 170.0, 115.0, 180.0]).is_ok());
        assert!(check_joints(&[-175.0, 90.0, -135.0, -170.0, -115.0, -180.0]).is_ok());
    }

    #[test]
    fn joint_violations_name_the_axis() {
        assert_eq!(
            violated_parameter(check_joints(&[175.1, 0.0, 0.0, 0.0, 0.0, 0.0])),
            "joint 0 position"
        );
        assert_eq!(
            violated_parameter(check_joints(&[0.0, 91.0, 0.0, 0.0, 0.0, 0.0])),
            "joint 1 position"
        );
        // axis 2 is asymmetric: 70 is the upper bound, -135 the lower
        assert_eq!(
            violated_parameter(check_joints(&[0.0, 0.0, 70.5, 0.0, 0.0, 0.0])),
            "joint 2 position"
        );
        assert_eq!(
            violated_parameter(check_joints(&[0.0, -70.5, 0.0, 0.0, 0.0, 0.0])),
            "joint 1 position"
        );
    }

    #[test]
    fn violation_carries_bounds() {
        match check_joints(&[0.0, 0.0, -136.0, 0.0, 0.0, 0.0]) {
            Err(RobotError::LimitViolation { value, min, max, .. }) => {
                assert_eq!(value, -136.0);
                assert_eq!(min, -135.0);
                assert_eq!(max, 70.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nan_never_passes() {
        assert!(check_joints(&[f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
        assert!(check_pose(&[0.0, 0.0, f64::INFINITY, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn joint_velocity_is_symmetric() {
        assert!(check_joint_velocities(&[-150.0, 150.0, 180.0, -300.0, 300.0, 500.0]).is_ok());
        assert_eq!(
            violated_parameter(check_joint_velocities(&[0.0, 0.0, -180.5, 0.0, 0.0, 0.0])),
            "joint 2 velocity"
        );
        assert_eq!(
            violated_parameter(check_joint_velocities(&[0.0, 0.0, 0.0, 0.0, 0.0, 501.0])),
            "joint 5 velocity"
        );
    }

    #[test]
    fn cartesian_velocity_literal_bounds() {
        assert!(check_cartesian_velocity(&[1000.0, -1000.0, 0.0, 300.0, 300.0, 500.0]).is_ok());
        assert_eq!(
            violated_parameter(check_cartesian_velocity(&[0.0, 0.0, 0.0, 0.0, 300.1, 0.0])),
            "cartesian axis 4 velocity"
        );
        assert!(check_cartesian_velocity(&[0.0, 0.0, 0.0, 0.0, 0.0, 499.9]).is_ok());
        assert_eq!(
            violated_parameter(check_cartesian_velocity(&[1000.5, 0.0, 0.0, 0.0, 0.0, 0.0])),
            "cartesian axis 0 velocity"
        );
    }

    #[test]
    fn scalar_setters_reject_out_of_range() {
        assert!(validate_command("SetCartAcc", &[600.0]).is_ok());
        assert_eq!(violated_parameter(validate_command("SetCartAcc", &[600.1])), "SetCartAcc");
        assert_eq!(violated_parameter(validate_command("SetCartLinVel", &[0.0])), "SetCartLinVel");
        assert!(validate_command("SetCartLinVel", &[0.001]).is_ok());
        assert_eq!(violated_parameter(validate_command("SetCartAngVel", &[301.0])), "SetCartAngVel");
        assert!(validate_command("SetBlending", &[0.0]).is_ok());
        assert_eq!(violated_parameter(validate_command("SetBlending", &[100.5])), "SetBlending");
        assert_eq!(
            violated_parameter(validate_command("SetMonitoringInterval", &[2.0])),
            "SetMonitoringInterval"
        );
        assert_eq!(violated_parameter(validate_command("Delay", &[-1.0])), "Delay");
    }

    #[test]
    fn arity_is_enforced() {
        assert!(matches!(
            validate_command("MoveJoints", &[0.0; 5]),
            Err(RobotError::InvalidArguments { expected: 6, got: 5, .. })
        ));
        assert!(matches!(
            validate_command("SetCartAcc", &[]),
            Err(RobotError::InvalidArguments { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            validate_command("Home", &[1.0]),
            Err(RobotError::InvalidArguments { expected: 0, got: 1, .. })
        ));
        assert!(validate_command("Home", &[]).is_ok());
    }

    #[test]
    fn move_joints_goes_through_joint_table() {
        assert!(validate_command("MoveJoints", &[0.0, -60.0, 60.0, 0.0, 0.0, 0.0]).is_ok());
        assert!(validate_command("MoveJoints", &[0.0, 91.0, 0.0, 0.0, 0.0, 0.0]).is_err());
        assert!(validate_command("MoveJointsVel", &[151.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn open_signature_setters_pass_arguments_through() {
        assert!(validate_command("SetEOB", &[1.0]).is_ok());
        assert!(validate_command("SetConf", &[1.0, 1.0, -1.0]).is_ok());
        assert!(validate_command("SetAutoConf", &[1.0]).is_ok());
        assert!(validate_command("SetGripperForce", &[50.0]).is_ok());
        assert_eq!(
            violated_parameter(validate_command("SetConf", &[1.0, f64::NAN, 1.0])),
            "SetConf argument 1"
        );
        // literal-table commands keep their zero-argument signature
        assert!(matches!(
            validate_command("GetJoints", &[1.0]),
            Err(RobotError::InvalidArguments { expected: 0, got: 1, .. })
        ));
    }

    #[test]
    fn cartesian_velocity_allows_stop_and_reverse() {
        assert!(validate_command("MoveLinVelWRF", &[0.0; 6]).is_ok());
        assert!(validate_command("MoveLinVelTRF", &[-10.0, 0.0, 0.0, 0.0, 0.0, -5.0]).is_ok());
    }
}
