use crate::types::ActionKind;
use std::time::Duration;

/// Errors raised while registering plans or running response actions.
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// The plan is missing a name or triggers.
    #[error("Incident: invalid response plan: {0}")]
    InvalidPlan(String),

    /// No handler is registered for the action kind.
    #[error("Incident: no handler registered for action '{0}'")]
    NoHandler(ActionKind),

    /// A custom action names a handler that was never registered.
    #[error("Incident: unknown custom action '{0}'")]
    UnknownCustomAction(String),

    /// The handler did not finish within the action timeout.
    #[error("Incident: action timed out after {0:?}")]
    Timeout(Duration),

    /// The handler task panicked or was cancelled.
    #[error("Incident: action handler panicked: {0}")]
    HandlerPanicked(String),

    /// The handler returned an error.
    #[error("Incident: action handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// Constructed outside a tokio runtime.
    #[error("Incident: no tokio runtime available")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, IncidentError>;
