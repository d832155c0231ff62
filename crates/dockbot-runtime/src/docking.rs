//! [`DockingSequencer`] – drive back onto the charging dock.
//!
//! One call to [`DockingSequencer::dock`] runs the whole procedure:
//!
//! 1. **Disengage** – if the robot is sitting on the charger, drive off the
//!    contacts, clear the dock, lower the lift (without waiting), turn around,
//!    level the head, pause so the charger can be re-acquired, then back away
//!    a little.
//! 2. **Resolve** – use the remembered charger if its pose shares the robot's
//!    origin, otherwise look around for it (see [`crate::search`]).
//! 3. **Approach and dock** – announce the charger, navigate to a short
//!    standoff, turn around and reverse onto the contacts.  If the robot is not
//!    seated it reverses once more by a shorter distance.  There is no further
//!    retry.
//!
//! Every action except the lift adjustment is awaited before the next one is
//! issued.  Only the search timeout is absorbed; all other session failures
//! propagate to the caller.
//!
//! # Example
//!
//! ```rust
//! use dockbot_hal::sim::SimRobot;
//! use dockbot_runtime::docking::{DockOutcome, DockingConfig, DockingSequencer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let robot = SimRobot::builder().remembers_charger().time_scale(0.0).build();
//! let sequencer = DockingSequencer::new(DockingConfig::default());
//! let outcome = sequencer.dock(&robot).await.unwrap();
//! assert_eq!(outcome, DockOutcome::Docked { attempts: 1 });
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use dockbot_hal::RobotSession;
use dockbot_types::{Angle, Charger, Distance, DockError, Speed};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::search;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for [`DockingSequencer`].  Distances are millimetres, speeds
/// millimetres per second, angles degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockingConfig {
    /// How far to drive forward after leaving the contacts.
    pub clear_distance_mm: f32,
    /// Speed for every straight drive.
    pub drive_speed_mmps: f32,
    /// Relative lift movement issued while disengaging.  Not awaited.
    pub lift_adjust: f32,
    /// Turn used both to face the dock and to back onto it.
    pub turn_around_deg: f32,
    /// Head angle while looking for the charger.
    pub head_angle_deg: f32,
    /// Fixed pause before backing away from the dock.
    pub settle_ms: u64,
    /// Reverse distance after the settle pause.
    pub back_away_mm: f32,
    /// Upper bound on the look-around search.
    pub search_timeout_secs: u64,
    /// Navigation stops this far from the charger.
    pub standoff_mm: f32,
    /// First reverse onto the contacts.
    pub dock_reverse_mm: f32,
    /// The single extra reverse when the first one falls short.
    pub retry_reverse_mm: f32,
    /// Spoken once a charger has been resolved.
    pub found_phrase: String,
    /// Spoken once the contacts are engaged.
    pub docked_phrase: String,
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            clear_distance_mm: 100.0,
            drive_speed_mmps: 50.0,
            lift_adjust: -3.0,
            turn_around_deg: 180.0,
            head_angle_deg: 0.0,
            settle_ms: 500,
            back_away_mm: 60.0,
            search_timeout_secs: 30,
            standoff_mm: 40.0,
            dock_reverse_mm: 150.0,
            retry_reverse_mm: 50.0,
            found_phrase: "There you are.".to_string(),
            docked_phrase: "Home sweet home.".to_string(),
        }
    }
}

impl DockingConfig {
    pub fn drive_speed(&self) -> Speed {
        Speed::mmps(self.drive_speed_mmps)
    }

    pub fn turn_around(&self) -> Angle {
        Angle::degrees(self.turn_around_deg)
    }

    pub fn head_angle(&self) -> Angle {
        Angle::degrees(self.head_angle_deg)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn standoff(&self) -> Distance {
        Distance::mm(self.standoff_mm)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// How a docking run ended.  Informational only: a run that does not dock is
/// still `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DockOutcome {
    /// Seated on the contacts after `attempts` reverse moves (1 or 2).
    Docked { attempts: u8 },
    /// The charger was reached but both reverse moves fell short.
    NotDocked,
    /// No usable charger was remembered or observed.
    ChargerNotFound,
}

impl DockOutcome {
    pub fn is_docked(&self) -> bool {
        matches!(self, DockOutcome::Docked { .. })
    }
}

impl fmt::Display for DockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockOutcome::Docked { attempts: 1 } => write!(f, "docked"),
            DockOutcome::Docked { attempts } => write!(f, "docked after {attempts} attempts"),
            DockOutcome::NotDocked => write!(f, "reached the charger but did not dock"),
            DockOutcome::ChargerNotFound => write!(f, "charger not found"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DockingSequencer
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the docking procedure against any [`RobotSession`].
#[derive(Debug, Clone, Default)]
pub struct DockingSequencer {
    config: DockingConfig,
}

impl DockingSequencer {
    pub fn new(config: DockingConfig) -> Self {
        Self { config }
    }

    /// Run the full procedure once.
    ///
    /// # Errors
    ///
    /// Propagates any session failure.  Not finding the charger, or not
    /// seating on it, is reported through [`DockOutcome`] instead.
    #[instrument(name = "dock", skip_all)]
    pub async fn dock<S>(&self, robot: &S) -> Result<DockOutcome, DockError>
    where
        S: RobotSession + ?Sized,
    {
        if robot.is_on_charger() {
            info!("robot is on the charger; driving off first");
            self.disengage(robot).await?;
        }

        let outcome = match search::resolve_charger(robot, self.config.search_timeout()).await? {
            Some(charger) => self.approach_and_dock(robot, &charger).await?,
            None => DockOutcome::ChargerNotFound,
        };
        info!(%outcome, "docking sequence finished");
        Ok(outcome)
    }

    /// Leave the charger and turn to face it.
    pub async fn disengage<S>(&self, robot: &S) -> Result<(), DockError>
    where
        S: RobotSession + ?Sized,
    {
        let cfg = &self.config;
        robot.drive_off_charger_contacts()?.wait_for_completed().await?;
        robot
            .drive_straight(Distance::mm(cfg.clear_distance_mm), cfg.drive_speed())?
            .wait_for_completed()
            .await?;
        robot.move_lift(cfg.lift_adjust)?.detach();
        robot.turn_in_place(cfg.turn_around())?.wait_for_completed().await?;
        robot.set_head_angle(cfg.head_angle())?.wait_for_completed().await?;
        // Give the vision pipeline time to spot the charger.
        tokio::time::sleep(cfg.settle()).await;
        robot
            .drive_straight(-Distance::mm(cfg.back_away_mm), cfg.drive_speed())?
            .wait_for_completed()
            .await?;
        debug!("disengaged from charger");
        Ok(())
    }

    /// Approach `charger`, turn around and reverse onto it, retrying once.
    pub async fn approach_and_dock<S>(&self, robot: &S, charger: &Charger) -> Result<DockOutcome, DockError>
    where
        S: RobotSession + ?Sized,
    {
        let cfg = &self.config;
        robot.say_text(&cfg.found_phrase)?.wait_for_completed().await?;
        robot.go_to_object(charger, cfg.standoff())?.wait_for_completed().await?;
        robot.turn_in_place(cfg.turn_around())?.wait_for_completed().await?;

        let reverses = [cfg.dock_reverse_mm, cfg.retry_reverse_mm];
        for (attempt, reverse_mm) in (1u8..).zip(reverses) {
            robot
                .drive_straight(-Distance::mm(reverse_mm), cfg.drive_speed())?
                .wait_for_completed()
                .await?;
            if robot.is_on_charger() {
                robot.say_text(&cfg.docked_phrase)?.wait_for_completed().await?;
                return Ok(DockOutcome::Docked { attempts: attempt });
            }
            debug!(attempt, reverse_mm, "not on the contacts yet");
        }
        Ok(DockOutcome::NotDocked)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dockbot_hal::{SimCommand, SimRobot};
    use dockbot_types::BehaviorType;

    fn drive(mm: f32) -> SimCommand {
        SimCommand::DriveStraight {
            distance: Distance::mm(mm),
            speed: Speed::mmps(50.0),
        }
    }

    fn count(robot: &SimRobot, wanted: &SimCommand) -> usize {
        robot.commands().iter().filter(|c| *c == wanted).count()
    }

    fn docked_phrase() -> SimCommand {
        SimCommand::SayText("Home sweet home.".to_string())
    }

    #[test]
    fn default_config_matches_procedure_constants() {
        let cfg = DockingConfig::default();
        assert_eq!(cfg.search_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.settle(), Duration::from_millis(500));
        assert_eq!(cfg.standoff(), Distance::mm(40.0));
        assert_eq!(cfg.drive_speed(), Speed::mmps(50.0));
        assert_eq!(cfg.dock_reverse_mm, 150.0);
        assert_eq!(cfg.retry_reverse_mm, 50.0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: DockingConfig = toml::from_str("standoff_mm = 55.0\nfound_phrase = \"Hi dock\"").unwrap();
        assert_eq!(cfg.standoff_mm, 55.0);
        assert_eq!(cfg.found_phrase, "Hi dock");
        assert_eq!(cfg.search_timeout_secs, 30);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(DockOutcome::Docked { attempts: 1 }.to_string(), "docked");
        assert_eq!(
            DockOutcome::Docked { attempts: 2 }.to_string(),
            "docked after 2 attempts"
        );
        assert!(!DockOutcome::ChargerNotFound.is_docked());
    }

    #[tokio::test(start_paused = true)]
    async fn disengage_issues_actions_in_order() {
        let robot = SimRobot::builder().on_charger(true).remembers_charger().build();
        DockingSequencer::default().dock(&robot).await.unwrap();

        let commands = robot.commands();
        assert_eq!(
            commands[..6],
            [
                SimCommand::DriveOffChargerContacts,
                drive(100.0),
                SimCommand::MoveLift(-3.0),
                SimCommand::TurnInPlace(Angle::degrees(180.0)),
                SimCommand::SetHeadAngle(Angle::degrees(0.0)),
                drive(-60.0),
            ]
        );
        assert_eq!(commands[6], SimCommand::SayText("There you are.".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_pause_precedes_backing_away() {
        let robot = SimRobot::builder().on_charger(true).build();
        DockingSequencer::default().disengage(&robot).await.unwrap();

        let timeline = robot.timeline();
        let head = timeline
            .iter()
            .find(|(_, c)| matches!(c, SimCommand::SetHeadAngle(_)))
            .map(|(at, _)| *at)
            .unwrap();
        let (backed, last) = timeline.last().unwrap();
        assert_eq!(*last, drive(-60.0));
        assert!(*backed - head >= Duration::from_millis(500));
        assert_eq!(robot.head_angle(), Angle::degrees(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn lift_adjustment_is_not_awaited() {
        let robot = SimRobot::builder()
            .on_charger(true)
            .remembers_charger()
            .stall_action("move_lift")
            .build();
        let outcome = DockingSequencer::default().dock(&robot).await.unwrap();
        assert_eq!(outcome, DockOutcome::Docked { attempts: 1 });
        assert_eq!(robot.lift_height(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn off_charger_start_skips_disengage() {
        let robot = SimRobot::builder().remembers_charger().build();
        DockingSequencer::default().dock(&robot).await.unwrap();
        assert_eq!(count(&robot, &SimCommand::DriveOffChargerContacts), 0);
        assert_eq!(count(&robot, &SimCommand::MoveLift(-3.0)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn comparable_memory_means_no_search() {
        let robot = SimRobot::builder().remembers_charger().build();
        DockingSequencer::default().dock(&robot).await.unwrap();
        assert!(
            !robot
                .commands()
                .iter()
                .any(|c| matches!(c, SimCommand::StartBehavior(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_memory_triggers_search() {
        let robot = SimRobot::builder().remembers_stale_charger().build();
        let outcome = DockingSequencer::default().dock(&robot).await.unwrap();
        assert_eq!(
            count(&robot, &SimCommand::StartBehavior(BehaviorType::LookAroundInPlace)),
            1
        );
        assert_eq!(outcome, DockOutcome::Docked { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn search_timeout_stops_once_and_skips_docking() {
        let robot = SimRobot::builder().charger_visible(false).build();
        let outcome = DockingSequencer::default().dock(&robot).await.unwrap();

        assert_eq!(outcome, DockOutcome::ChargerNotFound);
        assert_eq!(
            robot.commands(),
            vec![
                SimCommand::StartBehavior(BehaviorType::LookAroundInPlace),
                SimCommand::StopBehavior(BehaviorType::LookAroundInPlace),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_first_reverse_is_retried_once() {
        let robot = SimRobot::builder()
            .remembers_charger()
            .docks_after(Some(Distance::mm(200.0)))
            .build();
        let outcome = DockingSequencer::default().dock(&robot).await.unwrap();

        assert_eq!(outcome, DockOutcome::Docked { attempts: 2 });
        let commands = robot.commands();
        let tail = &commands[commands.len() - 3..];
        assert_eq!(tail, [drive(-150.0), drive(-50.0), docked_phrase()]);
        assert_eq!(count(&robot, &docked_phrase()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry_beyond_the_second_reverse() {
        let robot = SimRobot::builder().remembers_charger().docks_after(None).build();
        let outcome = DockingSequencer::default().dock(&robot).await.unwrap();

        assert_eq!(outcome, DockOutcome::NotDocked);
        assert_eq!(count(&robot, &drive(-150.0)), 1);
        assert_eq!(count(&robot, &drive(-50.0)), 1);
        assert_eq!(count(&robot, &docked_phrase()), 0);
        assert_eq!(robot.commands().last(), Some(&drive(-50.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn approach_uses_configured_standoff_and_phrase() {
        let robot = SimRobot::builder().remembers_charger().build();
        let cfg = DockingConfig {
            standoff_mm: 60.0,
            found_phrase: "Found it.".to_string(),
            ..DockingConfig::default()
        };
        DockingSequencer::new(cfg).dock(&robot).await.unwrap();

        let commands = robot.commands();
        assert_eq!(commands[0], SimCommand::SayText("Found it.".to_string()));
        assert_eq!(
            commands[1],
            SimCommand::GoToObject {
                object_id: robot.known_charger().unwrap().object_id,
                distance: Distance::mm(60.0),
            }
        );
        assert_eq!(commands[2], SimCommand::TurnInPlace(Angle::degrees(180.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_fault_propagates() {
        let robot = SimRobot::builder()
            .remembers_charger()
            .fail_action("go_to_object")
            .build();
        let err = DockingSequencer::default().dock(&robot).await.unwrap_err();

        assert!(matches!(err, DockError::ActionFailed { ref action, .. } if action == "go_to_object"));
        assert!(
            !robot
                .commands()
                .iter()
                .any(|c| matches!(c, SimCommand::TurnInPlace(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_during_search_stops_behavior() {
        let robot = SimRobot::builder().charger_visible(false).build();
        let sequencer = DockingSequencer::default();
        let cancelled = tokio::time::timeout(Duration::from_secs(10), sequencer.dock(&robot)).await;

        assert!(cancelled.is_err());
        assert_eq!(
            count(&robot, &SimCommand::StopBehavior(BehaviorType::LookAroundInPlace)),
            1
        );
    }
}
