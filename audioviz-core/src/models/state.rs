/// Capture source state machine.
///
/// State transitions:
/// ```text
/// stopped ──start()──→ running
///    ↑                    │
///    └── stop() / stream fault / dispose()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Stopped,
    Running,
}

impl CaptureState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
