use crate::error::{IncidentError, Result};
use crate::types::{ActionKind, ActionParams};
use crate::ActionHandler;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vigil_common::types::Severity;

/// Parameter consulted to pick the handler of an [`ActionKind::Custom`] step.
pub const CUSTOM_ACTION_PARAM: &str = "action_name";

/// What a handler knows about the step it is executing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionContext {
    pub incident_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub plan: String,
    pub step: usize,
    pub kind: ActionKind,
}

/// Lookup table from [`ActionKind`] to its handler.
///
/// # Examples
///
/// ```
/// use vigil_incident::{ActionKind, ActionRegistry};
///
/// let registry = ActionRegistry::default();
/// assert!(registry.has_handler(ActionKind::ScaleUp));
/// assert!(!registry.has_handler(ActionKind::Custom));
/// assert!(!ActionRegistry::new().has_handler(ActionKind::Notify));
/// ```
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    custom: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry with no handlers at all.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            custom: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Register (or replace) a named handler reachable through
    /// [`ActionKind::Custom`] steps whose `action_name` parameter is `name`.
    pub fn register_custom(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.custom.insert(name.into(), handler);
    }

    pub fn has_handler(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn custom_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Pick the handler for a step.
    ///
    /// # Errors
    ///
    /// Fails when nothing is registered for `kind`, or for a custom step
    /// whose `action_name` is missing or unknown.
    pub fn resolve(&self, kind: ActionKind, params: &ActionParams) -> Result<Arc<dyn ActionHandler>> {
        if kind == ActionKind::Custom {
            let name = params
                .get(CUSTOM_ACTION_PARAM)
                .map(String::as_str)
                .unwrap_or_default();
            if let Some(handler) = self.custom.get(name) {
                return Ok(Arc::clone(handler));
            }
            if let Some(handler) = self.handlers.get(&kind) {
                return Ok(Arc::clone(handler));
            }
            return Err(IncidentError::UnknownCustomAction(name.to_string()));
        }

        self.handlers
            .get(&kind)
            .map(Arc::clone)
            .ok_or(IncidentError::NoHandler(kind))
    }
}

impl Default for ActionRegistry {
    /// A registry with a logging handler for every built-in kind.
    fn default() -> Self {
        let mut registry = Self::new();
        for kind in ActionKind::BUILT_IN {
            registry.register(kind, Arc::new(LoggingAction));
        }
        registry
    }
}

/// Built-in handler that logs the remediation it stands for and succeeds.
/// Replace it with a real backend through [`ActionRegistry::register`].
pub struct LoggingAction;

#[async_trait]
impl ActionHandler for LoggingAction {
    async fn execute(&self, ctx: &ActionContext, params: &ActionParams) -> anyhow::Result<()> {
        let param = |key: &str, default: &'static str| -> String {
            params.get(key).cloned().unwrap_or_else(|| default.to_string())
        };

        match ctx.kind {
            ActionKind::Notify => tracing::info!(
                incident_id = %ctx.incident_id,
                channels = %param("channels", ""),
                message = %param("message", "Incident notification"),
                "Notification sent"
            ),
            ActionKind::ScaleUp | ActionKind::ScaleDown => tracing::info!(
                incident_id = %ctx.incident_id,
                service = %param("service", "unknown"),
                replicas = %param("replicas", "1"),
                direction = if ctx.kind == ActionKind::ScaleUp { "up" } else { "down" },
                "Scaling service"
            ),
            ActionKind::Restart => tracing::info!(
                incident_id = %ctx.incident_id,
                service = %param("service", "unknown"),
                "Restarting service"
            ),
            ActionKind::ClearCache => tracing::info!(
                incident_id = %ctx.incident_id,
                cache_type = %param("cache_type", "all"),
                "Clearing cache"
            ),
            ActionKind::CircuitBreak => tracing::info!(
                incident_id = %ctx.incident_id,
                service = %param("service", "unknown"),
                duration_secs = %param("duration", "300"),
                "Activating circuit breaker"
            ),
            ActionKind::RateLimit => tracing::info!(
                incident_id = %ctx.incident_id,
                limit = %param("limit", "100/minute"),
                duration_secs = %param("duration", "600"),
                "Applying rate limit"
            ),
            ActionKind::RunRunbook => tracing::info!(
                incident_id = %ctx.incident_id,
                runbook_url = %param("runbook_url", ""),
                "Executing runbook"
            ),
            ActionKind::Custom => tracing::info!(
                incident_id = %ctx.incident_id,
                action_name = %param(CUSTOM_ACTION_PARAM, ""),
                "Executing custom action"
            ),
        }
        Ok(())
    }
}
