use crate::actions::ActionRegistry;
use crate::error::{IncidentError, Result};
use crate::types::{ExecutionRecord, Incident, IncidentStatus, ResponsePlan, ResponseSummary};
use crate::{ActionHandler, AlwaysPass, AlwaysResolved, EscalationHandler, GuardCondition, ResolutionCheck};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use vigil_common::types::{format_labels, Alert};

/// Seconds an auto-resolving incident waits before its resolution check
/// unless the plan overrides it.
pub const DEFAULT_AUTO_RESOLVE_DELAY_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ResponseConfig {
    pub auto_resolve_delay_secs: u64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            auto_resolve_delay_secs: DEFAULT_AUTO_RESOLVE_DELAY_SECS,
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the manager and the tasks it spawns.
pub(crate) struct Shared {
    pub(crate) incidents: Mutex<HashMap<String, Incident>>,
    pub(crate) plans: RwLock<Vec<Arc<ResponsePlan>>>,
    pub(crate) actions: RwLock<ActionRegistry>,
    pub(crate) escalations: RwLock<Vec<Arc<dyn EscalationHandler>>>,
    pub(crate) guard: RwLock<Arc<dyn GuardCondition>>,
    pub(crate) resolution: RwLock<Arc<dyn ResolutionCheck>>,
    pub(crate) history: Mutex<Vec<ExecutionRecord>>,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) config: ResponseConfig,
    pub(crate) runtime: Handle,
}

/// Owns every [`Incident`] and drives response plans for triggered alerts.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct IncidentManager {
    shared: Arc<Shared>,
}

impl IncidentManager {
    /// Create a manager bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::NoRuntime`] outside a runtime.
    pub fn new(config: ResponseConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| IncidentError::NoRuntime)?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a manager that spawns plan executions and timers on `runtime`.
    pub fn with_runtime(config: ResponseConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                incidents: Mutex::new(HashMap::new()),
                plans: RwLock::new(Vec::new()),
                actions: RwLock::new(ActionRegistry::default()),
                escalations: RwLock::new(Vec::new()),
                guard: RwLock::new(Arc::new(AlwaysPass)),
                resolution: RwLock::new(Arc::new(AlwaysResolved)),
                history: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                config,
                runtime,
            }),
        }
    }

    /// Add a response plan. A plan with the same name replaces the old one.
    ///
    /// # Errors
    ///
    /// Rejects plans without a name or without triggers.
    pub fn add_plan(&self, plan: ResponsePlan) -> Result<()> {
        if plan.name.trim().is_empty() {
            return Err(IncidentError::InvalidPlan("plan name must not be empty".into()));
        }
        if plan.triggers.is_empty() {
            return Err(IncidentError::InvalidPlan(format!(
                "plan '{}' has no triggers",
                plan.name
            )));
        }

        tracing::info!(
            plan = %plan.name,
            triggers = ?plan.triggers,
            actions = plan.actions.len(),
            "Added response plan"
        );

        let mut plans = write(&self.shared.plans);
        let plan = Arc::new(plan);
        match plans.iter_mut().find(|p| p.name == plan.name) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
        Ok(())
    }

    pub fn plans(&self) -> Vec<ResponsePlan> {
        read(&self.shared.plans).iter().map(|p| (**p).clone()).collect()
    }

    pub fn register_action_handler(&self, kind: crate::ActionKind, handler: Arc<dyn ActionHandler>) {
        write(&self.shared.actions).register(kind, handler);
    }

    pub fn register_custom_action(&self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        write(&self.shared.actions).register_custom(name, handler);
    }

    pub fn add_escalation_handler(&self, handler: Arc<dyn EscalationHandler>) {
        write(&self.shared.escalations).push(handler);
    }

    /// Replace the guard used for action conditions.
    pub fn set_guard(&self, guard: Arc<dyn GuardCondition>) {
        *write(&self.shared.guard) = guard;
    }

    /// Replace the check consulted by auto-resolve timers.
    pub fn set_resolution_check(&self, check: Arc<dyn ResolutionCheck>) {
        *write(&self.shared.resolution) = check;
    }

    /// Route a triggered alert to its response plans.
    ///
    /// The alert is merged into the unresolved incident of the same rule,
    /// or opens a new incident. Every matching plan is then spawned as an
    /// independent task. Returns the incident id, or `None` when no plan
    /// reacts to the alert's rule.
    pub fn handle_alert(&self, alert: &Alert) -> Option<String> {
        let plans: Vec<Arc<ResponsePlan>> = read(&self.shared.plans)
            .iter()
            .filter(|p| p.is_triggered_by(&alert.rule_name))
            .cloned()
            .collect();

        if plans.is_empty() {
            tracing::debug!(rule = %alert.rule_name, "No response plan for alert");
            return None;
        }

        let incident_id = self.shared.open_or_merge(alert, &plans);

        for plan in plans {
            let shared = Arc::clone(&self.shared);
            let id = incident_id.clone();
            self.shared
                .runtime
                .spawn(async move { shared.execute_plan(id, plan).await });
        }

        Some(incident_id)
    }

    /// Resolve an incident. Unknown or already resolved ids are a no-op and
    /// return `false`.
    pub fn resolve(&self, incident_id: &str, note: &str) -> bool {
        self.shared.resolve(incident_id, note)
    }

    /// Set the operator responsible for an incident.
    pub fn assign(&self, incident_id: &str, assignee: impl Into<String>) -> bool {
        let mut incidents = lock(&self.shared.incidents);
        match incidents.get_mut(incident_id) {
            Some(incident) => {
                incident.assignee = Some(assignee.into());
                incident.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, incident_id: &str) -> Option<Incident> {
        self.shared.snapshot(incident_id)
    }

    /// Incidents newest first, optionally restricted to one status and to
    /// those created within `since` of now.
    pub fn list(&self, status: Option<IncidentStatus>, since: Option<std::time::Duration>) -> Vec<Incident> {
        let cutoff = since
            .and_then(|d| Duration::from_std(d).ok())
            .and_then(|d| Utc::now().checked_sub_signed(d));

        let mut incidents: Vec<Incident> = lock(&self.shared.incidents)
            .values()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .filter(|i| cutoff.map_or(true, |c| i.created_at >= c))
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        incidents
    }

    pub fn open_count(&self) -> usize {
        lock(&self.shared.incidents)
            .values()
            .filter(|i| !i.status.is_resolved())
            .count()
    }

    /// Every recorded plan step across all incidents, oldest first.
    pub fn history(&self) -> Vec<ExecutionRecord> {
        lock(&self.shared.history).clone()
    }

    pub fn status(&self) -> ResponseSummary {
        let (total_incidents, open_incidents) = {
            let incidents = lock(&self.shared.incidents);
            let open = incidents.values().filter(|i| !i.status.is_resolved()).count();
            (incidents.len(), open)
        };
        let hour_ago = Utc::now() - Duration::hours(1);
        let recent_responses = lock(&self.shared.history)
            .iter()
            .filter(|r| r.executed_at >= hour_ago)
            .count();

        ResponseSummary {
            total_incidents,
            open_incidents,
            response_plans: read(&self.shared.plans).len(),
            active_responses: self.shared.in_flight.load(Ordering::SeqCst),
            recent_responses,
        }
    }
}

impl Shared {
    fn open_or_merge(&self, alert: &Alert, plans: &[Arc<ResponsePlan>]) -> String {
        let now = Utc::now();
        let mut incidents = lock(&self.incidents);

        if let Some(incident) = incidents
            .values_mut()
            .find(|i| !i.status.is_resolved() && i.rule_name == alert.rule_name)
        {
            incident.alerts.push(alert.clone());
            incident.updated_at = now;
            incident.severity = incident.severity.max(alert.severity);
            for plan in plans {
                if !incident.tags.contains(&plan.name) {
                    incident.tags.push(plan.name.clone());
                }
            }
            tracing::info!(
                incident_id = %incident.id,
                rule = %alert.rule_name,
                labels = %format_labels(&alert.labels),
                severity = %incident.severity,
                alerts = incident.alerts.len(),
                "Updated incident"
            );
            return incident.id.clone();
        }

        let id = vigil_common::id::next_id();
        let incident = Incident {
            id: id.clone(),
            title: format!("Incident: {}", alert.rule_name),
            description: alert.description.clone(),
            rule_name: alert.rule_name.clone(),
            severity: alert.severity,
            status: IncidentStatus::Open,
            alerts: vec![alert.clone()],
            executions: Vec::new(),
            tags: plans.iter().map(|p| p.name.clone()).collect(),
            assignee: None,
            metadata: BTreeMap::new(),
            resolution_note: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        tracing::error!(
            incident_id = %id,
            title = %incident.title,
            severity = %incident.severity,
            rule = %alert.rule_name,
            "New incident created"
        );
        incidents.insert(id.clone(), incident);
        id
    }

    pub(crate) fn snapshot(&self, incident_id: &str) -> Option<Incident> {
        lock(&self.incidents).get(incident_id).cloned()
    }

    /// Move an unresolved incident to `status`. Returns `false` if the
    /// incident is missing or already resolved.
    pub(crate) fn transition(&self, incident_id: &str, status: IncidentStatus) -> bool {
        let mut incidents = lock(&self.incidents);
        match incidents.get_mut(incident_id) {
            Some(incident) if !incident.status.is_resolved() => {
                incident.status = status;
                incident.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn append_execution(&self, record: ExecutionRecord) {
        {
            let mut incidents = lock(&self.incidents);
            if let Some(incident) = incidents.get_mut(&record.incident_id) {
                if record.success() {
                    incident.updated_at = record.executed_at;
                }
                incident.executions.push(record.clone());
            }
        }
        lock(&self.history).push(record);
    }

    pub(crate) fn resolve(&self, incident_id: &str, note: &str) -> bool {
        let mut incidents = lock(&self.incidents);
        let Some(incident) = incidents.get_mut(incident_id) else {
            tracing::debug!(incident_id, "Resolve requested for unknown incident");
            return false;
        };
        if incident.status.is_resolved() {
            return false;
        }

        let now = Utc::now();
        incident.status = IncidentStatus::Resolved;
        incident.resolved_at = Some(now);
        incident.updated_at = now;
        if !note.is_empty() {
            incident.resolution_note = Some(note.to_string());
        }
        tracing::info!(
            incident_id,
            duration_secs = (now - incident.created_at).num_seconds(),
            resolution_note = note,
            "Incident resolved"
        );
        true
    }
}
