//! `dockbot-runtime` – Docking Procedure
//!
//! Sequences robot actions to get the robot back onto its charging dock.
//!
//! # Modules
//!
//! - [`docking`] – [`DockingSequencer`][docking::DockingSequencer]: the full
//!   disengage / resolve / approach / reverse-onto-dock procedure, configured
//!   by [`DockingConfig`][docking::DockingConfig] and reporting a
//!   [`DockOutcome`][docking::DockOutcome].
//! - [`search`] – charger resolution: trust a remembered charger only when its
//!   pose shares the robot's origin, otherwise run a bounded look-around that
//!   is always stopped afterwards.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.
//!
//! The sequencer is generic over [`RobotSession`][dockbot_hal::RobotSession];
//! use [`SimRobot`][dockbot_hal::SimRobot] to run it without hardware.

pub mod docking;
pub mod search;
pub mod telemetry;

pub use docking::{DockOutcome, DockingConfig, DockingSequencer};
pub use search::resolve_charger;
pub use telemetry::{TracerProviderGuard, init_tracing};
