//! Charger resolution.
//!
//! A remembered charger is used only when its pose shares the robot's
//! current origin.  Anything else (no memory, or memory from an older origin
//! after the robot was moved) falls back to an active look-around search
//! bounded by a timeout.  The look-around behavior is stopped on every exit
//! path: success, timeout, session error, or cancellation of the caller.

use std::time::Duration;

use dockbot_hal::RobotSession;
use dockbot_types::{BehaviorType, Charger, DockError};
use tracing::{debug, info, warn};

/// Resolve a usable charger, searching for it if memory is absent or stale.
///
/// Returns `Ok(None)` when the search times out.
///
/// # Errors
///
/// Propagates any session failure other than the search timeout.
pub async fn resolve_charger<S>(robot: &S, timeout: Duration) -> Result<Option<Charger>, DockError>
where
    S: RobotSession + ?Sized,
{
    if let Some(charger) = remembered_charger(robot) {
        info!(%charger, "charger location already known");
        return Ok(Some(charger));
    }
    search_for_charger(robot, timeout).await
}

/// The world model's charger, if it is comparable to the robot's pose.
pub fn remembered_charger<S>(robot: &S) -> Option<Charger>
where
    S: RobotSession + ?Sized,
{
    let charger = robot.known_charger()?;
    let pose = robot.pose();
    if charger.pose.is_comparable(&pose) {
        Some(charger)
    } else {
        debug!(
            charger_origin = charger.pose.origin_id,
            robot_origin = pose.origin_id,
            "remembered charger is from another origin; ignoring it"
        );
        None
    }
}

/// Look around in place until the charger is observed or `timeout` elapses.
pub async fn search_for_charger<S>(robot: &S, timeout: Duration) -> Result<Option<Charger>, DockError>
where
    S: RobotSession + ?Sized,
{
    let look_around = robot.start_behavior(BehaviorType::LookAroundInPlace)?;
    info!(timeout_secs = timeout.as_secs_f32(), "looking around for the charger");

    let observed = robot.wait_for_observed_charger(timeout).await;
    look_around.stop();

    match observed {
        Ok(charger) => {
            info!(%charger, "found charger");
            Ok(Some(charger))
        }
        Err(e) if e.is_timeout() => {
            warn!("didn't see the charger");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dockbot_hal::{ActionHandle, BehaviorHandle, SimCommand, SimRobot};
    use dockbot_types::{Angle, Distance, Pose, Speed};

    const LOOK: BehaviorType = BehaviorType::LookAroundInPlace;

    fn stops(robot: &SimRobot) -> usize {
        robot
            .commands()
            .iter()
            .filter(|c| matches!(c, SimCommand::StopBehavior(_)))
            .count()
    }

    #[test]
    fn comparable_memory_is_used() {
        let robot = SimRobot::builder().remembers_charger().build();
        assert_eq!(remembered_charger(&robot), robot.known_charger());
    }

    #[test]
    fn stale_memory_is_ignored() {
        let robot = SimRobot::builder().remembers_stale_charger().build();
        assert!(robot.known_charger().is_some());
        assert_eq!(remembered_charger(&robot), None);
    }

    #[tokio::test(start_paused = true)]
    async fn known_charger_skips_search() {
        let robot = SimRobot::builder().remembers_charger().build();
        let charger = resolve_charger(&robot, Duration::from_secs(30)).await.unwrap();
        assert!(charger.is_some());
        assert!(robot.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_charger_is_searched_for() {
        let robot = SimRobot::builder().remembers_stale_charger().build();
        let charger = resolve_charger(&robot, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert!(charger.pose.is_comparable(&robot.pose()));
        assert_eq!(
            robot.commands(),
            vec![SimCommand::StartBehavior(LOOK), SimCommand::StopBehavior(LOOK)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_none_and_stops_once() {
        let robot = SimRobot::builder().charger_visible(false).build();
        let start = tokio::time::Instant::now();
        let charger = search_for_charger(&robot, Duration::from_secs(30)).await.unwrap();
        assert!(charger.is_none());
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(stops(&robot), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sighting_after_timeout_is_missed() {
        let robot = SimRobot::builder()
            .sighting_delay(Duration::from_secs(45))
            .build();
        let charger = search_for_charger(&robot, Duration::from_secs(30)).await.unwrap();
        assert!(charger.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_search_still_stops_behavior() {
        let robot = SimRobot::builder().charger_visible(false).build();
        let cancelled =
            tokio::time::timeout(Duration::from_secs(5), search_for_charger(&robot, Duration::from_secs(30)))
                .await;
        assert!(cancelled.is_err());
        assert_eq!(stops(&robot), 1);
    }

    /// Session whose world-event stream dies during the search.
    struct DisconnectingSession(SimRobot);

    #[async_trait]
    impl RobotSession for DisconnectingSession {
        fn is_on_charger(&self) -> bool {
            self.0.is_on_charger()
        }
        fn pose(&self) -> Pose {
            self.0.pose()
        }
        fn known_charger(&self) -> Option<Charger> {
            self.0.known_charger()
        }
        fn drive_off_charger_contacts(&self) -> Result<ActionHandle, DockError> {
            self.0.drive_off_charger_contacts()
        }
        fn drive_straight(&self, distance: Distance, speed: Speed) -> Result<ActionHandle, DockError> {
            self.0.drive_straight(distance, speed)
        }
        fn turn_in_place(&self, angle: Angle) -> Result<ActionHandle, DockError> {
            self.0.turn_in_place(angle)
        }
        fn set_head_angle(&self, angle: Angle) -> Result<ActionHandle, DockError> {
            self.0.set_head_angle(angle)
        }
        fn move_lift(&self, amount: f32) -> Result<ActionHandle, DockError> {
            self.0.move_lift(amount)
        }
        fn say_text(&self, text: &str) -> Result<ActionHandle, DockError> {
            self.0.say_text(text)
        }
        fn go_to_object(&self, charger: &Charger, distance: Distance) -> Result<ActionHandle, DockError> {
            self.0.go_to_object(charger, distance)
        }
        fn start_behavior(&self, behavior: BehaviorType) -> Result<BehaviorHandle, DockError> {
            self.0.start_behavior(behavior)
        }
        async fn wait_for_observed_charger(&self, _timeout: Duration) -> Result<Charger, DockError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err(DockError::ConnectionLost("socket closed".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_error_propagates_after_stopping_behavior() {
        let session = DisconnectingSession(SimRobot::builder().build());
        let err = search_for_charger(&session, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(err, DockError::ConnectionLost("socket closed".to_string()));
        assert_eq!(stops(&session.0), 1);
    }
}
