use crate::actions::ActionContext;
use crate::error::IncidentError;
use crate::manager::{read, Shared};
use crate::types::{
    ActionOutcome, ActionParams, ExecutionRecord, Incident, IncidentStatus, ResponseAction,
    ResponsePlan,
};
use crate::ActionHandler;
use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const AUTO_RESOLVE_NOTE: &str = "Auto-resolved - conditions normalized";

/// Counts a running handler for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    /// Run one plan for one incident: steps in order, each after its delay,
    /// then the escalation and auto-resolve timers.
    pub(crate) async fn execute_plan(self: Arc<Self>, incident_id: String, plan: Arc<ResponsePlan>) {
        tracing::info!(
            plan = %plan.name,
            incident_id = %incident_id,
            "Executing response plan"
        );
        self.transition(&incident_id, IncidentStatus::Investigating);

        for (step, action) in plan.actions.iter().enumerate() {
            if action.delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(action.delay_secs)).await;
            }

            let Some(incident) = self.snapshot(&incident_id) else {
                return;
            };

            let (outcome, attempts) = if incident.status.is_resolved() {
                (
                    ActionOutcome::Skipped {
                        reason: "incident resolved".to_string(),
                    },
                    0,
                )
            } else if let Some(condition) = action
                .condition
                .as_deref()
                .filter(|c| !self.guard_holds(c, &incident))
            {
                tracing::debug!(
                    plan = %plan.name,
                    step,
                    condition,
                    "Skipping response action - condition not met"
                );
                (
                    ActionOutcome::Skipped {
                        reason: format!("condition not met: {condition}"),
                    },
                    0,
                )
            } else {
                self.run_action(&incident, &plan, step, action).await
            };

            self.append_execution(ExecutionRecord {
                incident_id: incident_id.clone(),
                plan: plan.name.clone(),
                step,
                kind: action.kind,
                outcome,
                attempts,
                executed_at: Utc::now(),
            });
        }

        if !self.transition(&incident_id, IncidentStatus::Monitoring) {
            tracing::debug!(
                plan = %plan.name,
                incident_id = %incident_id,
                "Incident resolved during plan execution, no timers scheduled"
            );
            return;
        }

        if plan.escalation_secs > 0 {
            let shared = Arc::clone(&self);
            let id = incident_id.clone();
            let delay = Duration::from_secs(plan.escalation_secs);
            self.runtime
                .spawn(async move { shared.escalate_after(id, delay).await });
        }

        if plan.auto_resolve {
            let secs = plan
                .auto_resolve_delay_secs
                .unwrap_or(self.config.auto_resolve_delay_secs);
            let shared = Arc::clone(&self);
            self.runtime.spawn(async move {
                shared
                    .auto_resolve_after(incident_id, Duration::from_secs(secs))
                    .await
            });
        }
    }

    fn guard_holds(&self, condition: &str, incident: &Incident) -> bool {
        let guard = Arc::clone(&*read(&self.guard));
        catch_unwind(AssertUnwindSafe(|| guard.evaluate(condition, incident))).unwrap_or_else(|_| {
            tracing::error!(condition, "Guard condition panicked, treating as not met");
            false
        })
    }

    async fn run_action(
        &self,
        incident: &Incident,
        plan: &ResponsePlan,
        step: usize,
        action: &ResponseAction,
    ) -> (ActionOutcome, u32) {
        let resolved = read(&self.actions).resolve(action.kind, &action.params);
        let handler = match resolved {
            Ok(handler) => handler,
            Err(e) => {
                tracing::error!(
                    incident_id = %incident.id,
                    action = %action.kind,
                    error = %e,
                    "Response action has no handler"
                );
                return (ActionOutcome::Failed { error: e.to_string() }, 0);
            }
        };

        let ctx = ActionContext {
            incident_id: incident.id.clone(),
            rule_name: incident.rule_name.clone(),
            severity: incident.severity,
            plan: plan.name.clone(),
            step,
            kind: action.kind,
        };
        let limit = (action.timeout_secs > 0).then(|| Duration::from_secs(action.timeout_secs));
        let max_attempts = action.max_retries.saturating_add(1);

        let _in_flight = InFlight::enter(&self.in_flight);
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            match invoke(Arc::clone(&handler), ctx.clone(), action.params.clone(), limit).await {
                Ok(()) => {
                    tracing::info!(
                        incident_id = %incident.id,
                        action = %action.kind,
                        attempt,
                        params = ?action.params,
                        "Response action succeeded"
                    );
                    return (ActionOutcome::Succeeded, attempt);
                }
                Err(e) => {
                    tracing::warn!(
                        incident_id = %incident.id,
                        action = %action.kind,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Response action attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(
            incident_id = %incident.id,
            action = %action.kind,
            error = %error,
            "Response action failed"
        );
        (ActionOutcome::Failed { error }, max_attempts)
    }

    async fn escalate_after(self: Arc<Self>, incident_id: String, delay: Duration) {
        tokio::time::sleep(delay).await;

        let Some(incident) = self.snapshot(&incident_id) else {
            return;
        };
        if incident.status.is_resolved() {
            tracing::debug!(incident_id = %incident_id, "Incident resolved before escalation");
            return;
        }

        tracing::warn!(
            incident_id = %incident_id,
            incident_age_secs = (Utc::now() - incident.created_at).num_seconds(),
            "Escalating incident"
        );

        let handlers = read(&self.escalations).clone();
        for handler in handlers {
            let name = handler.name().to_string();
            let incident = incident.clone();
            let result = tokio::spawn(async move { handler.escalate(&incident).await }).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(handler = %name, error = %e, "Escalation callback failed");
                }
                Err(e) => {
                    tracing::error!(handler = %name, error = %e, "Escalation callback panicked");
                }
            }
        }
    }

    async fn auto_resolve_after(self: Arc<Self>, incident_id: String, delay: Duration) {
        tokio::time::sleep(delay).await;

        let Some(incident) = self.snapshot(&incident_id) else {
            return;
        };
        if incident.status.is_resolved() {
            return;
        }

        let check = Arc::clone(&*read(&self.resolution));
        let passed = catch_unwind(AssertUnwindSafe(|| check.is_resolved(&incident))).unwrap_or_else(|_| {
            tracing::error!(incident_id = %incident_id, "Resolution check panicked");
            false
        });

        if passed {
            self.resolve(&incident_id, AUTO_RESOLVE_NOTE);
        } else {
            tracing::info!(
                incident_id = %incident_id,
                "Auto-resolve check did not pass, incident stays open"
            );
        }
    }
}

/// Run a handler in its own task so that a panic is contained, bounded by
/// `limit` when set.
async fn invoke(
    handler: Arc<dyn ActionHandler>,
    ctx: ActionContext,
    params: ActionParams,
    limit: Option<Duration>,
) -> Result<(), IncidentError> {
    let mut task = tokio::spawn(async move { handler.execute(&ctx, &params).await });

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(IncidentError::Timeout(limit));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(IncidentError::Handler(e)),
        Err(e) => Err(IncidentError::HandlerPanicked(e.to_string())),
    }
}
