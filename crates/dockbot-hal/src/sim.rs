//! In-process simulated robot for tests and headless demos.
//!
//! [`SimRobot`] implements [`RobotSession`] without any hardware.  It keeps a
//! tiny kinematic state (pose, head, lift, charger contact), records every
//! command it receives, and completes actions from spawned tokio tasks after
//! a plausible duration.  Scenarios are assembled with [`SimRobotBuilder`].
//!
//! Commands must be issued from inside a tokio runtime.
//!
//! # Example
//!
//! ```rust
//! use dockbot_hal::sim::SimRobot;
//! use dockbot_hal::RobotSession;
//!
//! let robot = SimRobot::builder()
//!     .on_charger(true)
//!     .remembers_charger()
//!     .build();
//!
//! assert!(robot.is_on_charger());
//! assert!(robot.known_charger().is_some());
//! ```

use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dockbot_types::{
    Angle, BehaviorType, Charger, Distance, DockError, Pose, Speed, WorldEvent, WorldEventPayload,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::{ActionCompleter, ActionHandle};
use crate::behavior::BehaviorHandle;
use crate::session::RobotSession;

/// Value of [`WorldEvent::source`] for events emitted by the simulator.
pub const SIM_SOURCE: &str = "dockbot-hal::sim";

const EVENT_CAPACITY: usize = 64;
const ROBOT_ORIGIN: u32 = 1;
const CHARGER_OBJECT_ID: u32 = 1;
const CONTACT_CLEARANCE_MM: f32 = 30.0;
const TURN_RATE_RAD_PER_SEC: f32 = PI;
const NAVIGATION_SPEED_MMPS: f32 = 100.0;

// ────────────────────────────────────────────────────────────────────────────
// Command log
// ────────────────────────────────────────────────────────────────────────────

/// A command received by the simulator, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    DriveOffChargerContacts,
    DriveStraight { distance: Distance, speed: Speed },
    TurnInPlace(Angle),
    SetHeadAngle(Angle),
    MoveLift(f32),
    SayText(String),
    GoToObject { object_id: u32, distance: Distance },
    StartBehavior(BehaviorType),
    StopBehavior(BehaviorType),
}

impl SimCommand {
    /// The action name used in [`ActionHandle`]s and error reports.
    pub fn action(&self) -> &'static str {
        match self {
            SimCommand::DriveOffChargerContacts => "drive_off_charger_contacts",
            SimCommand::DriveStraight { .. } => "drive_straight",
            SimCommand::TurnInPlace(_) => "turn_in_place",
            SimCommand::SetHeadAngle(_) => "set_head_angle",
            SimCommand::MoveLift(_) => "move_lift",
            SimCommand::SayText(_) => "say_text",
            SimCommand::GoToObject { .. } => "go_to_object",
            SimCommand::StartBehavior(_) => "start_behavior",
            SimCommand::StopBehavior(_) => "stop_behavior",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal state
// ────────────────────────────────────────────────────────────────────────────

struct SimState {
    pose: Pose,
    on_charger: bool,
    head_angle: Angle,
    lift_height: f32,
    known_charger: Option<Charger>,
    /// Set by `go_to_object`; backing up only counts towards docking after it.
    approached: bool,
    reversed_mm: f32,
    log: Vec<(Duration, SimCommand)>,
    sighting: Option<JoinHandle<()>>,
    /// Completers of actions configured never to finish.
    stalled: Vec<ActionCompleter>,
}

struct SimSettings {
    charger: Charger,
    charger_visible: bool,
    sighting_delay: Duration,
    docks_after: Option<Distance>,
    time_scale: f32,
    failing: Vec<&'static str>,
    stalled: Vec<&'static str>,
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobot
// ────────────────────────────────────────────────────────────────────────────

/// A simulated robot session.
pub struct SimRobot {
    state: Arc<Mutex<SimState>>,
    settings: SimSettings,
    events: broadcast::Sender<WorldEvent>,
    started: Instant,
}

impl SimRobot {
    pub fn builder() -> SimRobotBuilder {
        SimRobotBuilder::default()
    }

    /// Subscribe to world events (charger sightings, contact changes).
    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }

    /// Every command received so far, in issue order.
    pub fn commands(&self) -> Vec<SimCommand> {
        self.state.lock().log.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Every command received so far with its issue time relative to
    /// construction.
    pub fn timeline(&self) -> Vec<(Duration, SimCommand)> {
        self.state.lock().log.clone()
    }

    pub fn head_angle(&self) -> Angle {
        self.state.lock().head_angle
    }

    pub fn lift_height(&self) -> f32 {
        self.state.lock().lift_height
    }

    fn record(&self, command: SimCommand) {
        let at = self.started.elapsed();
        debug!(?command, "sim command");
        self.state.lock().log.push((at, command));
    }

    /// Wall-clock duration of an action that nominally takes `secs`.
    fn scaled(&self, action: &str, secs: f32) -> Result<Duration, DockError> {
        let scale = self.settings.time_scale;
        Duration::try_from_secs_f32(secs * scale).map_err(|e| DockError::ActionFailed {
            action: action.to_string(),
            details: format!("cannot simulate {secs}s at time scale {scale}: {e}"),
        })
    }

    fn publish(&self, payload: WorldEventPayload) {
        // No subscribers is a normal condition.
        let _ = self.events.send(WorldEvent::new(SIM_SOURCE, payload));
    }

    fn set_contact(&self, state: &mut SimState, on_charger: bool) {
        if state.on_charger != on_charger {
            state.on_charger = on_charger;
            info!(on_charger, "charger contact changed");
            self.publish(WorldEventPayload::ChargerContact { on_charger });
        }
    }

    /// Record `command` and return a handle that resolves after `duration`
    /// (already scaled).
    fn issue(&self, command: SimCommand, duration: Duration) -> ActionHandle {
        let action = command.action();
        self.record(command);

        let (completer, handle) = ActionHandle::pending(action);
        if self.settings.stalled.contains(&action) {
            self.state.lock().stalled.push(completer);
            return handle;
        }

        let result = if self.settings.failing.contains(&action) {
            Err(DockError::ActionFailed {
                action: action.to_string(),
                details: "simulated fault".to_string(),
            })
        } else {
            Ok(())
        };
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            completer.complete(result);
        });
        handle
    }
}

#[async_trait]
impl RobotSession for SimRobot {
    fn is_on_charger(&self) -> bool {
        self.state.lock().on_charger
    }

    fn pose(&self) -> Pose {
        self.state.lock().pose
    }

    fn known_charger(&self) -> Option<Charger> {
        self.state.lock().known_charger
    }

    fn drive_off_charger_contacts(&self) -> Result<ActionHandle, DockError> {
        let duration = self.scaled("drive_off_charger_contacts", 1.0)?;
        {
            let mut state = self.state.lock();
            advance(&mut state.pose, CONTACT_CLEARANCE_MM);
            self.set_contact(&mut state, false);
        }
        Ok(self.issue(SimCommand::DriveOffChargerContacts, duration))
    }

    fn drive_straight(&self, distance: Distance, speed: Speed) -> Result<ActionHandle, DockError> {
        if speed.as_mmps() <= 0.0 {
            return Err(DockError::ActionFailed {
                action: "drive_straight".to_string(),
                details: format!("speed must be positive, got {speed}"),
            });
        }
        let mm = distance.as_mm();
        let duration = self.scaled("drive_straight", mm.abs() / speed.as_mmps())?;
        {
            let mut state = self.state.lock();
            advance(&mut state.pose, mm);
            if mm > 0.0 {
                self.set_contact(&mut state, false);
            } else if state.approached {
                state.reversed_mm += -mm;
                let docked = self
                    .settings
                    .docks_after
                    .is_some_and(|needed| state.reversed_mm >= needed.as_mm());
                if docked {
                    self.set_contact(&mut state, true);
                }
            }
        }
        Ok(self.issue(SimCommand::DriveStraight { distance, speed }, duration))
    }

    fn turn_in_place(&self, angle: Angle) -> Result<ActionHandle, DockError> {
        let duration = self.scaled("turn_in_place", angle.as_radians().abs() / TURN_RATE_RAD_PER_SEC)?;
        {
            let mut state = self.state.lock();
            let heading = state.pose.heading.as_radians() + angle.as_radians();
            state.pose.heading = Angle::radians(heading.rem_euclid(2.0 * PI));
        }
        Ok(self.issue(SimCommand::TurnInPlace(angle), duration))
    }

    fn set_head_angle(&self, angle: Angle) -> Result<ActionHandle, DockError> {
        let duration = self.scaled("set_head_angle", 0.3)?;
        self.state.lock().head_angle = angle;
        Ok(self.issue(SimCommand::SetHeadAngle(angle), duration))
    }

    fn move_lift(&self, amount: f32) -> Result<ActionHandle, DockError> {
        let duration = self.scaled("move_lift", 0.8)?;
        {
            let mut state = self.state.lock();
            state.lift_height = (state.lift_height + amount).max(0.0);
        }
        Ok(self.issue(SimCommand::MoveLift(amount), duration))
    }

    fn say_text(&self, text: &str) -> Result<ActionHandle, DockError> {
        let duration = self.scaled("say_text", 0.5 + 0.06 * text.chars().count() as f32)?;
        info!(%text, "robot says");
        Ok(self.issue(SimCommand::SayText(text.to_string()), duration))
    }

    fn go_to_object(&self, charger: &Charger, distance: Distance) -> Result<ActionHandle, DockError> {
        let duration = {
            let mut state = self.state.lock();
            if !charger.pose.is_comparable(&state.pose) {
                return Err(DockError::ActionFailed {
                    action: "go_to_object".to_string(),
                    details: format!("{charger} is not in the robot's current origin"),
                });
            }
            // Stop `distance` in front of the charger, facing it.
            let facing = charger.pose.heading.as_radians();
            let target = Pose {
                x: charger.pose.x + distance.as_mm() * facing.cos(),
                y: charger.pose.y + distance.as_mm() * facing.sin(),
                z: charger.pose.z,
                heading: Angle::radians((facing + PI).rem_euclid(2.0 * PI)),
                origin_id: state.pose.origin_id,
            };
            let travelled = state.pose.distance_to(&target);
            let duration = self.scaled("go_to_object", 1.0 + travelled.as_mm() / NAVIGATION_SPEED_MMPS)?;
            state.pose = target;
            state.approached = true;
            state.reversed_mm = 0.0;
            duration
        };
        Ok(self.issue(
            SimCommand::GoToObject {
                object_id: charger.object_id,
                distance,
            },
            duration,
        ))
    }

    fn start_behavior(&self, behavior: BehaviorType) -> Result<BehaviorHandle, DockError> {
        let delay = self.scaled("start_behavior", self.settings.sighting_delay.as_secs_f32())?;
        self.record(SimCommand::StartBehavior(behavior));

        if behavior == BehaviorType::LookAroundInPlace && self.settings.charger_visible {
            let state = Arc::clone(&self.state);
            let events = self.events.clone();
            let charger = self.settings.charger;
            let sighting = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let observed = {
                    let mut state = state.lock();
                    let observed = Charger {
                        pose: Pose {
                            origin_id: state.pose.origin_id,
                            ..charger.pose
                        },
                        ..charger
                    };
                    state.known_charger = Some(observed);
                    observed
                };
                debug!(%observed, "charger sighted");
                let _ = events.send(WorldEvent::new(
                    SIM_SOURCE,
                    WorldEventPayload::ChargerObserved(observed),
                ));
            });
            self.state.lock().sighting = Some(sighting);
        }

        let state = Arc::clone(&self.state);
        let started = self.started;
        Ok(BehaviorHandle::new(behavior, move |behavior| {
            let mut state = state.lock();
            if let Some(sighting) = state.sighting.take() {
                sighting.abort();
            }
            let at = started.elapsed();
            state.log.push((at, SimCommand::StopBehavior(behavior)));
        }))
    }

    async fn wait_for_observed_charger(&self, timeout: Duration) -> Result<Charger, DockError> {
        let mut rx = self.events.subscribe();
        let observed = async {
            loop {
                match rx.recv().await {
                    Ok(WorldEvent {
                        payload: WorldEventPayload::ChargerObserved(charger),
                        ..
                    }) => return Ok(charger),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "world event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        return Err(DockError::ConnectionLost(
                            "world event channel closed".to_string(),
                        ));
                    }
                }
            }
        };
        tokio::time::timeout(timeout, observed)
            .await
            .map_err(|_| DockError::Timeout {
                waiting_for: "observed charger".to_string(),
                after: timeout,
            })?
    }
}

fn advance(pose: &mut Pose, mm: f32) {
    let heading = pose.heading.as_radians();
    pose.x += mm * heading.cos();
    pose.y += mm * heading.sin();
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Scenario builder for [`SimRobot`].
///
/// Defaults: the robot is off the charger, remembers nothing, will see the
/// charger two seconds into a look-around, and docks once it has backed
/// 150 mm after approaching.
pub struct SimRobotBuilder {
    on_charger: bool,
    memory: ChargerMemory,
    charger_visible: bool,
    sighting_delay: Duration,
    docks_after: Option<Distance>,
    time_scale: f32,
    failing: Vec<&'static str>,
    stalled: Vec<&'static str>,
}

#[derive(Clone, Copy)]
enum ChargerMemory {
    None,
    Current,
    Stale,
}

impl Default for SimRobotBuilder {
    fn default() -> Self {
        Self {
            on_charger: false,
            memory: ChargerMemory::None,
            charger_visible: true,
            sighting_delay: Duration::from_secs(2),
            docks_after: Some(Distance::mm(150.0)),
            time_scale: 1.0,
            failing: Vec::new(),
            stalled: Vec::new(),
        }
    }
}

impl SimRobotBuilder {
    /// Start seated on the charger contacts.
    pub fn on_charger(mut self, on_charger: bool) -> Self {
        self.on_charger = on_charger;
        self
    }

    /// The world model remembers the charger in the robot's current origin.
    pub fn remembers_charger(mut self) -> Self {
        self.memory = ChargerMemory::Current;
        self
    }

    /// The world model remembers the charger, but from an older origin.
    pub fn remembers_stale_charger(mut self) -> Self {
        self.memory = ChargerMemory::Stale;
        self
    }

    /// Whether a look-around will ever spot the charger.
    pub fn charger_visible(mut self, visible: bool) -> Self {
        self.charger_visible = visible;
        self
    }

    /// How long into a look-around the charger is spotted.
    pub fn sighting_delay(mut self, delay: Duration) -> Self {
        self.sighting_delay = delay;
        self
    }

    /// Total reverse travel after approaching needed to seat on the contacts.
    /// `None` means the robot never docks.
    pub fn docks_after(mut self, distance: Option<Distance>) -> Self {
        self.docks_after = distance;
        self
    }

    /// Multiplier applied to every simulated action duration.  Negative values
    /// count as zero.  A scale that overflows a [`Duration`] makes actions
    /// fail with [`DockError::ActionFailed`].
    pub fn time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale.max(0.0);
        self
    }

    /// Make every action with this name complete with a fault.
    pub fn fail_action(mut self, action: &'static str) -> Self {
        self.failing.push(action);
        self
    }

    /// Make every action with this name run forever.
    pub fn stall_action(mut self, action: &'static str) -> Self {
        self.stalled.push(action);
        self
    }

    pub fn build(self) -> SimRobot {
        let charger = Charger {
            object_id: CHARGER_OBJECT_ID,
            pose: Pose::new(0.0, 0.0, Angle::degrees(0.0), ROBOT_ORIGIN),
        };
        let pose = if self.on_charger {
            charger.pose
        } else {
            Pose::new(400.0, 150.0, Angle::degrees(90.0), ROBOT_ORIGIN)
        };
        let known_charger = match self.memory {
            ChargerMemory::None => None,
            ChargerMemory::Current => Some(charger),
            ChargerMemory::Stale => Some(Charger {
                pose: Pose {
                    origin_id: ROBOT_ORIGIN - 1,
                    ..charger.pose
                },
                ..charger
            }),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        SimRobot {
            state: Arc::new(Mutex::new(SimState {
                pose,
                on_charger: self.on_charger,
                head_angle: Angle::degrees(-10.0),
                lift_height: 0.5,
                known_charger,
                approached: false,
                reversed_mm: 0.0,
                log: Vec::new(),
                sighting: None,
                stalled: Vec::new(),
            })),
            settings: SimSettings {
                charger,
                charger_visible: self.charger_visible,
                sighting_delay: self.sighting_delay,
                docks_after: self.docks_after,
                time_scale: self.time_scale,
                failing: self.failing,
                stalled: self.stalled,
            },
            events,
            started: Instant::now(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
