//! [`BehaviorHandle`] – RAII guard over a running autonomous behavior.
//!
//! A behavior started with
//! [`RobotSession::start_behavior`][crate::session::RobotSession::start_behavior]
//! keeps running until its handle is stopped.  Calling [`BehaviorHandle::stop`]
//! stops it explicitly; dropping the handle without stopping it (early `?`
//! return, cancelled future, panic) stops it as well.  Either way the
//! session's stop hook runs exactly once.

use dockbot_types::BehaviorType;
use tracing::debug;

type StopHook = Box<dyn FnOnce(BehaviorType) + Send>;

/// Guard that stops a running behavior when stopped or dropped.
pub struct BehaviorHandle {
    behavior: BehaviorType,
    on_stop: Option<StopHook>,
}

impl BehaviorHandle {
    /// Wrap a running behavior.  `on_stop` is invoked once, when the handle is
    /// stopped or dropped.
    pub fn new(behavior: BehaviorType, on_stop: impl FnOnce(BehaviorType) + Send + 'static) -> Self {
        Self {
            behavior,
            on_stop: Some(Box::new(on_stop)),
        }
    }

    pub fn behavior(&self) -> BehaviorType {
        self.behavior
    }

    /// Stop the behavior now.
    pub fn stop(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(hook) = self.on_stop.take() {
            debug!(behavior = %self.behavior, "stopping behavior");
            hook(self.behavior);
        }
    }
}

impl Drop for BehaviorHandle {
    fn drop(&mut self) {
        self.fire();
    }
}
