//! Named positions and reference frames
//!
//! Commands that take a position accept either a name registered here or a
//! literal 6-vector. Names are resolved once, before formatting; a missing
//! name is an error and never falls back to a default.

use crate::{Result, RobotError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A 6-component vector: `[x, y, z, rx, ry, rz]` or `[j1..j6]`.
pub type Vector6 = [f64; 6];

/// Position argument: a registered name or a literal vector.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionRef {
    Named(String),
    Literal(Vector6),
}

impl From<Vector6> for PositionRef {
    fn from(vector: Vector6) -> Self {
        PositionRef::Literal(vector)
    }
}

impl From<&str> for PositionRef {
    fn from(name: &str) -> Self {
        PositionRef::Named(name.to_string())
    }
}

impl From<String> for PositionRef {
    fn from(name: String) -> Self {
        PositionRef::Named(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Pose,
    Joints,
    Tool,
    Work,
}

impl FrameKind {
    pub fn label(self) -> &'static str {
        match self {
            FrameKind::Pose => "pose",
            FrameKind::Joints => "joint set",
            FrameKind::Tool => "tool frame",
            FrameKind::Work => "work frame",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Extra named vectors from configuration, merged over the seeded defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FramesConfig {
    pub poses: BTreeMap<String, Vector6>,
    pub joints: BTreeMap<String, Vector6>,
    pub tools: BTreeMap<String, Vector6>,
    pub works: BTreeMap<String, Vector6>,
}

/// Name-to-vector tables for poses, joint sets, tool frames and work frames.
///
/// Not internally synchronized.
#[derive(Debug, Clone)]
pub struct FrameRegistry {
    poses: BTreeMap<String, Vector6>,
    joints: BTreeMap<String, Vector6>,
    tools: BTreeMap<String, Vector6>,
    works: BTreeMap<String, Vector6>,
}

impl FrameRegistry {
    /// Registry with no entries at all.
    pub fn empty() -> Self {
        Self {
            poses: BTreeMap::new(),
            joints: BTreeMap::new(),
            tools: BTreeMap::new(),
            works: BTreeMap::new(),
        }
    }

    /// Registry seeded with the standard names.
    pub fn seeded() -> Self {
        let mut registry = Self::empty();
        registry.add_joints("home", [0.0; 6]);
        registry.add_joints("stow", [0.0, -60.0, 60.0, 0.0, 0.0, 0.0]);
        registry.add_pose("home", [190.0, 0.0, 308.0, 0.0, 90.0, 0.0]);
        registry.add_tool("flange", [0.0; 6]);
        registry.add_work("base", [0.0; 6]);
        registry
    }

    pub fn from_config(config: &FramesConfig) -> Self {
        let mut registry = Self::seeded();
        registry.merge(config);
        registry
    }

    pub fn merge(&mut self, config: &FramesConfig) {
        for (kind, entries) in [
            (FrameKind::Pose, &config.poses),
            (FrameKind::Joints, &config.joints),
            (FrameKind::Tool, &config.tools),
            (FrameKind::Work, &config.works),
        ] {
            for (name, vector) in entries {
                self.add(kind, name, *vector);
            }
        }
    }

    fn table(&self, kind: FrameKind) -> &BTreeMap<String, Vector6> {
        match kind {
            FrameKind::Pose => &self.poses,
            FrameKind::Joints => &self.joints,
            FrameKind::Tool => &self.tools,
            FrameKind::Work => &self.works,
        }
    }

    fn table_mut(&mut self, kind: FrameKind) -> &mut BTreeMap<String, Vector6> {
        match kind {
            FrameKind::Pose => &mut self.poses,
            FrameKind::Joints => &mut self.joints,
            FrameKind::Tool => &mut self.tools,
            FrameKind::Work => &mut self.works,
        }
    }

    /// Insert or replace; returns the previous vector for that name.
    pub fn add(&mut self, kind: FrameKind, name: &str, vector: Vector6) -> Option<Vector6> {
        self.table_mut(kind).insert(name.to_string(), vector)
    }

    pub fn add_pose(&mut self, name: &str, pose: Vector6) -> Option<Vector6> {
        self.add(FrameKind::Pose, name, pose)
    }

    pub fn add_joints(&mut self, name: &str, joints: Vector6) -> Option<Vector6> {
        self.add(FrameKind::Joints, name, joints)
    }

    pub fn add_tool(&mut self, name: &str, frame: Vector6) -> Option<Vector6> {
        self.add(FrameKind::Tool, name, frame)
    }

    pub fn add_work(&mut self, name: &str, frame: Vector6) -> Option<Vector6> {
        self.add(FrameKind::Work, name, frame)
    }

    pub fn get(&self, kind: FrameKind, name: &str) -> Option<Vector6> {
        self.table(kind).get(name).copied()
    }

    pub fn names(&self, kind: FrameKind) -> Vec<&str> {
        self.table(kind).keys().map(String::as_str).collect()
    }

    pub fn resolve(&self, kind: FrameKind, position: &PositionRef) -> Result<Vector6> {
        match position {
            PositionRef::Literal(vector) => Ok(*vector),
            PositionRef::Named(name) => self.get(kind, name).ok_or_else(|| RobotError::UnknownFrame {
                kind: kind.label(),
                name: name.clone(),
            }),
        }
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}
