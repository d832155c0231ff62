//! [`ActionHandle`] – completion future for a robot action.
//!
//! Every motion or speech command issued through a
//! [`RobotSession`][crate::session::RobotSession] returns immediately with an
//! [`ActionHandle`].  The action runs on the robot while the caller decides
//! whether to wait for it:
//!
//! * `handle.wait_for_completed().await?` blocks the sequence until the robot
//!   reports the action finished (or failed).
//! * `handle.detach()` lets the action complete on its own; its result is
//!   discarded.
//!
//! Session implementations create the pair with [`ActionHandle::pending`] and
//! resolve it through the returned [`ActionCompleter`].

use dockbot_types::DockError;
use tokio::sync::oneshot;
use tracing::debug;

/// Handle to an in-flight robot action.
#[must_use = "wait for the action with `wait_for_completed` or discard it with `detach`"]
pub struct ActionHandle {
    action: &'static str,
    completion: oneshot::Receiver<Result<(), DockError>>,
}

/// The session side of an [`ActionHandle`].  Resolving it wakes the waiter.
pub struct ActionCompleter {
    action: &'static str,
    sender: oneshot::Sender<Result<(), DockError>>,
}

impl ActionHandle {
    /// Create a handle together with the completer that resolves it.
    pub fn pending(action: &'static str) -> (ActionCompleter, ActionHandle) {
        let (sender, completion) = oneshot::channel();
        (
            ActionCompleter { action, sender },
            ActionHandle { action, completion },
        )
    }

    /// Wait until the robot reports the action finished.
    ///
    /// # Errors
    ///
    /// Returns the failure reported by the session, or
    /// [`DockError::ActionAborted`] if the session dropped the action without
    /// reporting a result.
    pub async fn wait_for_completed(self) -> Result<(), DockError> {
        match self.completion.await {
            Ok(result) => result,
            Err(_) => Err(DockError::ActionAborted(self.action.to_string())),
        }
    }

    /// Let the action finish in the background.  Its outcome is discarded.
    pub fn detach(self) {
        debug!(action = self.action, "action detached");
    }
}

impl ActionCompleter {
    /// Report the action's outcome.  A no-op if the handle was detached.
    pub fn complete(self, result: Result<(), DockError>) {
        debug!(action = self.action, ok = result.is_ok(), "action completed");
        let _ = self.sender.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_handle_resolves_ok() {
        let (completer, handle) = ActionHandle::pending("say_text");
        completer.complete(Ok(()));
        handle.wait_for_completed().await.unwrap();
    }

    #[tokio::test]
    async fn failure_is_reported_to_waiter() {
        let (completer, handle) = ActionHandle::pending("go_to_object");
        completer.complete(Err(DockError::ActionFailed {
            action: "go_to_object".to_string(),
            details: "path blocked".to_string(),
        }));
        let err = handle.wait_for_completed().await.unwrap_err();
        assert!(matches!(err, DockError::ActionFailed { .. }));
    }

    #[tokio::test]
    async fn dropped_completer_aborts_action() {
        let (completer, handle) = ActionHandle::pending("turn_in_place");
        drop(completer);
        assert_eq!(
            handle.wait_for_completed().await,
            Err(DockError::ActionAborted("turn_in_place".to_string()))
        );
    }

    #[tokio::test]
    async fn completing_a_detached_action_is_harmless() {
        let (completer, handle) = ActionHandle::pending("move_lift");
        handle.detach();
        completer.complete(Ok(()));
    }
}
