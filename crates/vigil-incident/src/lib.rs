//! Incident lifecycle and automated response.
//!
//! Triggered alerts are matched against [`types::ResponsePlan`] triggers.
//! A match opens an [`types::Incident`] (or merges into the open incident
//! for the same rule) and every matching plan runs as its own task. Plan
//! actions are delegated to pluggable [`ActionHandler`]s registered per
//! [`types::ActionKind`]; once a plan finishes, optional escalation and
//! auto-resolve timers are scheduled.
//!
//! Timers live in the process only: a restart silently drops every pending
//! escalation and auto-resolve.

pub mod actions;
pub mod error;
mod executor;
pub mod manager;
pub mod types;


use async_trait::async_trait;

pub use actions::{ActionContext, ActionRegistry};
pub use error::{IncidentError, Result};
pub use manager::{IncidentManager, ResponseConfig};
pub use types::{
    ActionKind, ActionOutcome, ActionParams, ExecutionRecord, Incident, IncidentStatus,
    ResponseAction, ResponsePlan, ResponseSummary,
};

/// A remediation backend for one [`ActionKind`] (scaler, notifier, cache
/// client, ...).
///
/// Handlers run in their own task under the action's timeout; an error,
/// a timeout or a panic marks the action as failed without affecting the
/// rest of the plan.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the remediation could not be carried out.
    async fn execute(&self, ctx: &ActionContext, params: &ActionParams) -> anyhow::Result<()>;
}

/// Receives incidents that are still unresolved once their plan's
/// escalation delay has elapsed.
#[async_trait]
pub trait EscalationHandler: Send + Sync {
    async fn escalate(&self, incident: &Incident) -> anyhow::Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "escalation"
    }
}

/// Decides whether an action's guard condition holds for an incident.
pub trait GuardCondition: Send + Sync {
    fn evaluate(&self, condition: &str, incident: &Incident) -> bool;
}

/// Decides whether an auto-resolving incident may be closed.
pub trait ResolutionCheck: Send + Sync {
    fn is_resolved(&self, incident: &Incident) -> bool;
}

/// Guard that admits every action.
pub struct AlwaysPass;

impl GuardCondition for AlwaysPass {
    fn evaluate(&self, _condition: &str, _incident: &Incident) -> bool {
        true
    }
}

/// Resolution check that always passes.
pub struct AlwaysResolved;

impl ResolutionCheck for AlwaysResolved {
    fn is_resolved(&self, _incident: &Incident) -> bool {
        true
    }
}

impl<F> GuardCondition for F
where
    F: Fn(&str, &Incident) -> bool + Send + Sync,
{
    fn evaluate(&self, condition: &str, incident: &Incident) -> bool {
        self(condition, incident)
    }
}

impl<F> ResolutionCheck for F
where
    F: Fn(&Incident) -> bool + Send + Sync,
{
    fn is_resolved(&self, incident: &Incident) -> bool {
        self(incident)
    }
}
