//! The robot session boundary.
//!
//! dockbot never talks to a robot SDK directly.  Everything the docking
//! sequence needs is expressed as the [`RobotSession`] trait, so a real SDK
//! binding and the in-process [`SimRobot`][crate::sim::SimRobot] are
//! interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use dockbot_types::{Angle, BehaviorType, Charger, Distance, DockError, Pose, Speed};

use crate::action::ActionHandle;
use crate::behavior::BehaviorHandle;

/// A connected robot.
///
/// # Contract
///
/// * Queries return the session's latest view of the robot and world model.
/// * Commands return as soon as the action has been issued.  The returned
///   [`ActionHandle`] resolves when the robot finishes it.  An `Err` from the
///   command itself means the action could not be issued at all.
/// * [`wait_for_observed_charger`][Self::wait_for_observed_charger] returns
///   [`DockError::Timeout`] when no charger is seen in time.
///
/// Callers issue one command at a time; sessions are not required to queue
/// overlapping actions.
#[async_trait]
pub trait RobotSession: Send + Sync {
    /// `true` while the charging contacts are engaged.
    fn is_on_charger(&self) -> bool;

    /// The robot's current pose.
    fn pose(&self) -> Pose;

    /// The charger the world model currently remembers, if any.  The pose may
    /// belong to an older origin; check [`Pose::is_comparable`] before use.
    fn known_charger(&self) -> Option<Charger>;

    /// Drive forward just far enough to break contact with the charger.
    fn drive_off_charger_contacts(&self) -> Result<ActionHandle, DockError>;

    /// Drive straight by a signed distance.
    fn drive_straight(&self, distance: Distance, speed: Speed) -> Result<ActionHandle, DockError>;

    /// Rotate in place by a signed angle.
    fn turn_in_place(&self, angle: Angle) -> Result<ActionHandle, DockError>;

    /// Tilt the head to an absolute angle.
    fn set_head_angle(&self, angle: Angle) -> Result<ActionHandle, DockError>;

    /// Move the lift by a relative amount.  Negative values lower it.
    fn move_lift(&self, amount: f32) -> Result<ActionHandle, DockError>;

    /// Speak `text` through the robot's speaker.
    fn say_text(&self, text: &str) -> Result<ActionHandle, DockError>;

    /// Navigate to within `distance` of `charger`.
    fn go_to_object(&self, charger: &Charger, distance: Distance) -> Result<ActionHandle, DockError>;

    /// Start an autonomous behavior.  It runs until the handle is stopped or
    /// dropped.
    fn start_behavior(&self, behavior: BehaviorType) -> Result<BehaviorHandle, DockError>;

    /// Wait up to `timeout` for the world model to observe the charger.
    async fn wait_for_observed_charger(&self, timeout: Duration) -> Result<Charger, DockError>;
}
