//! `dockbot-hal` – Robot Session Abstraction
//!
//! The boundary between the docking logic and whatever is actually driving
//! the robot.
//!
//! # Modules
//!
//! - [`session`] – [`RobotSession`][session::RobotSession]: queries (pose,
//!   charger contact, remembered charger) and commands (drive, turn, head,
//!   lift, speech, navigation, behaviors) exposed by a connected robot.
//! - [`action`] – [`ActionHandle`][action::ActionHandle]: the completion
//!   future returned by every command.  Await it with
//!   `wait_for_completed`, or `detach` it to let the action finish on its own.
//! - [`behavior`] – [`BehaviorHandle`][behavior::BehaviorHandle]: an RAII
//!   guard that stops a running autonomous behavior when stopped or dropped.
//! - [`sim`] – [`SimRobot`][sim::SimRobot]: an in-process simulated session
//!   for tests and headless demos, configured through
//!   [`SimRobotBuilder`][sim::SimRobotBuilder].

pub mod action;
pub mod behavior;
pub mod session;
pub mod sim;

pub use action::{ActionCompleter, ActionHandle};
pub use behavior::BehaviorHandle;
pub use session::RobotSession;
pub use sim::{SimCommand, SimRobot, SimRobotBuilder};
