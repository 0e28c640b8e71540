//! Configuration loading for the Meca client

use crate::frames::FramesConfig;
use crate::{Result, RobotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default control channel port.
pub const CONTROL_PORT: u16 = 10000;
/// Default feedback channel port.
pub const FEEDBACK_PORT: u16 = 10001;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub robot: RobotConfig,
    pub frames: FramesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    pub host: String,
    pub ports: PortConfig,
    /// Expected firmware version, e.g. "8.1.9"
    pub firmware: Option<String>,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortConfig {
    pub control: u16,
    pub feedback: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Read timeout in seconds, applied to both channels
    pub timeout: f64,
    /// Open the feedback channel as part of connecting
    pub feedback: bool,
    /// TCP no-delay on the feedback channel
    pub nodelay: bool,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: "192.168.0.100".to_string(),
            ports: PortConfig::default(),
            firmware: None,
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            control: CONTROL_PORT,
            feedback: FEEDBACK_PORT,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: 5.0,
            feedback: true,
            nodelay: true,
        }
    }
}

impl ConnectionConfig {
    /// Read timeout as a `Duration`; non-positive or non-finite values fall back to the default.
    pub fn read_timeout(&self) -> Duration {
        if self.timeout.is_finite() && self.timeout > 0.0 {
            Duration::from_secs_f64(self.timeout)
        } else {
            Duration::from_secs_f64(Self::default().timeout)
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| RobotError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Configuration for a robot at `host` with everything else defaulted.
    pub fn for_host(host: &str) -> Self {
        let mut config = Self::default();
        config.robot.host = host.to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.robot.ports.control, 10000);
        assert_eq!(config.robot.ports.feedback, 10001);
        assert!(config.robot.connection.feedback);
        assert_eq!(config.robot.connection.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let yaml = r#"
robot:
  host: 192.168.1.36
  firmware: "8.1.9"
  connection:
    timeout: 2.5
frames:
  joints:
    ready: [0, -20, 20, 0, 30, 0]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.robot.host, "192.168.1.36");
        assert_eq!(config.robot.firmware.as_deref(), Some("8.1.9"));
        assert_eq!(config.robot.connection.read_timeout(), Duration::from_millis(2500));
        assert!(config.robot.connection.nodelay);
        assert_eq!(config.robot.ports.control, 10000);
        assert_eq!(config.frames.joints["ready"], [0.0, -20.0, 20.0, 0.0, 30.0, 0.0]);
    }

    #[test]
    fn bad_timeout_falls_back() {
        let mut connection = ConnectionConfig::default();
        connection.timeout = 0.0;
        assert_eq!(connection.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            Config::from_yaml("robot: [1, 2"),
            Err(RobotError::Yaml(_))
        ));
        assert!(matches!(
            Config::load("/nonexistent/meca.yaml"),
            Err(RobotError::Config(_))
        ));
    }
}
