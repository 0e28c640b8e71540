//! Firmware and product identification

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    /// Find the first `major.minor.patch` in `text`, e.g. `v8.1.9` or
    /// `Connected to Meca500 R3 v9.0.0.`.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = version_pattern()?.captures(text)?;
        let part = |i: usize| captures.get(i)?.as_str().parse::<u32>().ok();
        Some(Self {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What the robot reported about itself while connecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RobotIdentity {
    pub firmware: Option<FirmwareVersion>,
    pub product: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_from_reply_text() {
        let version = FirmwareVersion::parse("v8.1.9").unwrap();
        assert_eq!(version, FirmwareVersion { major: 8, minor: 1, patch: 9 });
        assert_eq!(version.to_string(), "8.1.9");

        let greeting = FirmwareVersion::parse("Connected to Meca500 R3 v9.0.0.").unwrap();
        assert!(greeting > version);
    }

    #[test]
    fn no_version_in_text() {
        assert!(FirmwareVersion::parse("Meca500").is_none());
        assert!(FirmwareVersion::parse("8.1").is_none());
    }
}
