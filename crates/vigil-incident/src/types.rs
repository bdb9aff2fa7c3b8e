use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vigil_common::types::{Alert, Severity};

/// Parameters passed verbatim to an action handler.
pub type ActionParams = BTreeMap<String, String>;

/// Incident status. Only `Identified` is never reached by the automated
/// path; operators may still set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl IncidentStatus {
    pub fn is_resolved(self) -> bool {
        self == Self::Resolved
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Identified => "identified",
            Self::Monitoring => "monitoring",
            Self::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "investigating" => Ok(Self::Investigating),
            "identified" => Ok(Self::Identified),
            "monitoring" => Ok(Self::Monitoring),
            "resolved" => Ok(Self::Resolved),
            _ => Err(format!("unknown incident status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[serde(alias = "notification")]
    Notify,
    ScaleUp,
    ScaleDown,
    #[serde(alias = "restart_service")]
    Restart,
    ClearCache,
    #[serde(alias = "circuit_breaker")]
    CircuitBreak,
    RateLimit,
    #[serde(alias = "runbook")]
    RunRunbook,
    /// Dispatched by the `action_name` parameter to a handler registered
    /// with [`crate::ActionRegistry::register_custom`].
    Custom,
}

impl ActionKind {
    /// Every kind that has a built-in handler.
    pub const BUILT_IN: [ActionKind; 8] = [
        ActionKind::Notify,
        ActionKind::ScaleUp,
        ActionKind::ScaleDown,
        ActionKind::Restart,
        ActionKind::ClearCache,
        ActionKind::CircuitBreak,
        ActionKind::RateLimit,
        ActionKind::RunRunbook,
    ];
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Notify => "notify",
            Self::ScaleUp => "scale_up",
            Self::ScaleDown => "scale_down",
            Self::Restart => "restart",
            Self::ClearCache => "clear_cache",
            Self::CircuitBreak => "circuit_break",
            Self::RateLimit => "rate_limit",
            Self::RunRunbook => "run_runbook",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notify" | "notification" => Ok(Self::Notify),
            "scale_up" => Ok(Self::ScaleUp),
            "scale_down" => Ok(Self::ScaleDown),
            "restart" | "restart_service" => Ok(Self::Restart),
            "clear_cache" => Ok(Self::ClearCache),
            "circuit_break" | "circuit_breaker" => Ok(Self::CircuitBreak),
            "rate_limit" => Ok(Self::RateLimit),
            "run_runbook" | "runbook" => Ok(Self::RunRunbook),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("unknown action kind: {s}")),
        }
    }
}

/// One step of a [`ResponsePlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAction {
    pub kind: ActionKind,
    #[serde(default)]
    pub params: ActionParams,
    /// Seconds to wait before this step runs.
    #[serde(default)]
    pub delay_secs: u64,
    /// Opaque guard predicate; the step is skipped when it does not hold.
    #[serde(default)]
    pub condition: Option<String>,
    /// Extra attempts after a failed one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ResponseAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: ActionParams::new(),
            delay_secs: 0,
            condition: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn delay(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Ordered remediation recipe bound to one or more alert rule names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Alert rule names this plan reacts to.
    pub triggers: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ResponseAction>,
    /// Seconds after the plan finishes before an unresolved incident is
    /// escalated; 0 disables escalation.
    #[serde(default)]
    pub escalation_secs: u64,
    #[serde(default)]
    pub auto_resolve: bool,
    /// Overrides the manager's default auto-resolve delay.
    #[serde(default)]
    pub auto_resolve_delay_secs: Option<u64>,
}

impl ResponsePlan {
    pub fn new<I, S>(name: impl Into<String>, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: String::new(),
            triggers: triggers.into_iter().map(Into::into).collect(),
            actions: Vec::new(),
            escalation_secs: 0,
            auto_resolve: false,
            auto_resolve_delay_secs: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn action(mut self, action: ResponseAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn escalate_after(mut self, secs: u64) -> Self {
        self.escalation_secs = secs;
        self
    }

    pub fn auto_resolve(mut self, delay_secs: Option<u64>) -> Self {
        self.auto_resolve = true;
        self.auto_resolve_delay_secs = delay_secs;
        self
    }

    pub fn is_triggered_by(&self, rule_name: &str) -> bool {
        self.triggers.iter().any(|t| t == rule_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    Failed { error: String },
    Skipped { reason: String },
}

/// History entry for one plan step. Every step of an executed plan gets
/// exactly one entry, skipped steps included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub incident_id: String,
    pub plan: String,
    /// Index of the step within its plan.
    pub step: usize,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
    /// Handler invocations made; 0 for skipped steps.
    pub attempts: u32,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn success(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Succeeded)
    }

    pub fn skipped(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Rule whose alerts this incident aggregates.
    pub rule_name: String,
    /// Highest severity among the associated alerts.
    pub severity: Severity,
    pub status: IncidentStatus,
    pub alerts: Vec<Alert>,
    pub executions: Vec<ExecutionRecord>,
    /// Names of every response plan that matched.
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Counters for a health or status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub total_incidents: usize,
    pub open_incidents: usize,
    pub response_plans: usize,
    /// Actions whose handler is currently running.
    pub active_responses: usize,
    /// Steps recorded in the last hour.
    pub recent_responses: usize,
}
