#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The observable progress changed; push a snapshot to the observer.
    PublishProgress,
    /// Raise the session's cancellation signal.
    SignalStop,
}
