use crate::SupervisorState;

/// Status-change notifications for the host (toasts, tray icons, ...).
pub trait StatusListener: Send + Sync {
    fn on_status(&self, state: &SupervisorState, message: &str);
}

impl<F> StatusListener for F
where
    F: Fn(&SupervisorState, &str) + Send + Sync,
{
    fn on_status(&self, state: &SupervisorState, message: &str) {
        self(state, message)
    }
}
