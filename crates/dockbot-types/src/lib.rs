use std::fmt;
use std::ops::Neg;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Units
// ────────────────────────────────────────────────────────────────────────────

/// Signed straight-line distance in millimetres.  Negative values drive the
/// robot backwards.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Distance(f32);

impl Distance {
    pub const fn mm(mm: f32) -> Self {
        Self(mm)
    }

    pub fn as_mm(self) -> f32 {
        self.0
    }
}

impl Neg for Distance {
    type Output = Distance;

    fn neg(self) -> Self::Output {
        Distance(-self.0)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}mm", self.0)
    }
}

/// Linear speed in millimetres per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Speed(f32);

impl Speed {
    pub const fn mmps(mmps: f32) -> Self {
        Self(mmps)
    }

    pub fn as_mmps(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}mm/s", self.0)
    }
}

/// A rotation, stored in radians.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Angle(f32);

impl Angle {
    pub fn degrees(deg: f32) -> Self {
        Self(deg.to_radians())
    }

    pub const fn radians(rad: f32) -> Self {
        Self(rad)
    }

    pub fn as_degrees(self) -> f32 {
        self.0.to_degrees()
    }

    pub fn as_radians(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.as_degrees())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// World model
// ────────────────────────────────────────────────────────────────────────────

/// Position and heading of a robot or object in the world model.
///
/// Every pose is expressed relative to an origin.  The robot starts a new
/// origin whenever it loses track of where it is (picked up, delocalized), so
/// two poses can only be compared or navigated between when they share the
/// same `origin_id`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: Angle,
    pub origin_id: u32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: Angle, origin_id: u32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            heading,
            origin_id,
        }
    }

    /// `true` when both poses are expressed in the same coordinate frame.
    pub fn is_comparable(&self, other: &Pose) -> bool {
        self.origin_id == other.origin_id
    }

    /// Planar distance to `other`.  Only meaningful for comparable poses.
    pub fn distance_to(&self, other: &Pose) -> Distance {
        Distance::mm((self.x - other.x).hypot(self.y - other.y))
    }
}

/// The world model's record of the charging dock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Charger {
    pub object_id: u32,
    pub pose: Pose,
}

impl fmt::Display for Charger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Charger(id={} at ({:.1}, {:.1}) origin={})",
            self.object_id, self.pose.x, self.pose.y, self.pose.origin_id
        )
    }
}

/// Autonomous behaviors the robot platform can run on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorType {
    /// Spin in place, panning the head, to find objects nearby.
    LookAroundInPlace,
}

impl fmt::Display for BehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorType::LookAroundInPlace => write!(f, "look_around_in_place"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Events
// ────────────────────────────────────────────────────────────────────────────

/// An event emitted by the robot's world model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "dockbot-hal::sim"
    pub source: String,
    pub payload: WorldEventPayload,
}

impl WorldEvent {
    pub fn new(source: impl Into<String>, payload: WorldEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldEventPayload {
    /// The charger came into view; its pose shares the robot's current origin.
    ChargerObserved(Charger),
    /// The charging contacts were made or broken.
    ChargerContact { on_charger: bool },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failures surfaced by a robot session.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DockError {
    #[error("Action {action} failed: {details}")]
    ActionFailed { action: String, details: String },

    #[error("Action {0} was dropped before it completed")]
    ActionAborted(String),

    #[error("Timed out after {after:?} waiting for {waiting_for}")]
    Timeout { waiting_for: String, after: Duration },

    #[error("Robot connection lost: {0}")]
    ConnectionLost(String),
}

impl DockError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DockError::Timeout { .. })
    }
}
