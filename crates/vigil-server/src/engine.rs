use crate::config::{EngineConfig, ResolutionCheckKind};
use crate::defaults;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::runtime::Handle;
use vigil_alert::{AlertEngine, AlertRule, AlertTransition};
use vigil_collector::{BackgroundSampler, Reading, SampleSink};
use vigil_common::types::{Alert, Labels, MetricDefinition, Sample};
use vigil_incident::types::{ActionKind, Incident, IncidentStatus, ResponsePlan};
use vigil_incident::{ActionHandler, EscalationHandler, IncidentManager};
use vigil_metrics::MetricStore;

/// Receives every newly triggered alert, synchronously and in
/// registration order, before `record` returns. Resolutions are silent.
pub trait AlertSubscriber: Send + Sync {
    /// # Errors
    ///
    /// An error is logged; delivery continues with the next subscriber.
    fn on_alert(&self, alert: &Alert) -> anyhow::Result<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "subscriber"
    }
}

impl<F> AlertSubscriber for F
where
    F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync,
{
    fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        self(alert)
    }
}

/// Counts and names for a health or status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub registered_metrics: usize,
    pub alert_rules: usize,
    pub active_alerts: usize,
    pub open_incidents: usize,
    pub total_incidents: usize,
    pub response_plans: usize,
    /// Actions whose handler is running right now.
    pub active_responses: usize,
    /// Plan steps recorded in the last hour.
    pub recent_responses: usize,
    pub metrics: Vec<String>,
    /// Rule names of the active alerts, oldest first.
    pub active_alert_rules: Vec<String>,
}

struct Inner {
    store: Mutex<MetricStore>,
    alerts: Mutex<AlertEngine>,
    subscribers: RwLock<Vec<Arc<dyn AlertSubscriber>>>,
    incidents: IncidentManager,
    sampler: BackgroundSampler,
    runtime: Handle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The alerting and incident-response engine.
///
/// `record` appends a sample, evaluates the rules on its metric and, for
/// every newly triggered alert, notifies the subscribers and then the
/// incident manager. Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Build an engine bound to the current tokio runtime and seed it from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime.
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Like [`Engine::new`], spawning plan executions, timers and the
    /// sampler on `runtime`.
    pub fn with_runtime(config: &EngineConfig, runtime: Handle) -> Self {
        let incidents =
            IncidentManager::with_runtime(config.executor.response_config(), runtime.clone());
        let sampler = BackgroundSampler::new(
            config.sampler.sampler_config(),
            vigil_collector::default_collectors(),
        );

        let engine = Self {
            inner: Arc::new(Inner {
                store: Mutex::new(MetricStore::new(config.history_capacity)),
                alerts: Mutex::new(AlertEngine::new()),
                subscribers: RwLock::new(Vec::new()),
                incidents,
                sampler,
                runtime,
            }),
        };

        if config.resolution_check == ResolutionCheckKind::NoActiveAlerts {
            engine.install_no_active_alerts_check();
        }
        engine.seed(config);
        engine
    }

    fn seed(&self, config: &EngineConfig) {
        if config.load_defaults {
            for metric in defaults::metrics() {
                self.register_metric(metric);
            }
            for rule in defaults::rules() {
                self.add_rule(rule);
            }
            for plan in defaults::plans() {
                self.add_plan(plan);
            }
        }

        for metric in &config.metrics {
            self.register_metric(metric.clone());
        }
        for rule in &config.rules {
            self.add_rule(rule.clone());
        }
        for plan in &config.plans {
            self.add_plan(plan.clone().into_plan(&config.executor));
        }

        let metrics = lock(&self.inner.store).registry().len();
        let rules = lock(&self.inner.alerts).rule_count();
        let plans = self.inner.incidents.plans().len();
        tracing::info!(metrics, rules, plans, "Engine catalogue loaded");
    }

    /// Auto-resolve only once none of the incident's `(rule, labels)`
    /// alerts is still active.
    fn install_no_active_alerts_check(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner
            .incidents
            .set_resolution_check(Arc::new(move |incident: &Incident| {
                let Some(inner) = weak.upgrade() else {
                    return true;
                };
                let alerts = lock(&inner.alerts);
                !incident
                    .alerts
                    .iter()
                    .any(|a| alerts.is_active(&a.rule_name, &a.labels))
            }));
    }

    /// Register or overwrite a metric definition.
    pub fn register_metric(&self, definition: MetricDefinition) {
        let name = definition.name.clone();
        if lock(&self.inner.store).register(definition).is_some() {
            tracing::info!(metric = %name, "Metric definition overwritten");
        }
    }

    /// Add an alert rule. A malformed rule is logged and ignored.
    pub fn add_rule(&self, rule: AlertRule) -> bool {
        if !lock(&self.inner.store).registry().contains(&rule.metric) {
            tracing::warn!(
                rule = %rule.name,
                metric = %rule.metric,
                "Alert rule targets a metric that is not registered yet"
            );
        }
        match lock(&self.inner.alerts).add_rule(rule) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Alert rule rejected");
                false
            }
        }
    }

    /// Add a response plan. A malformed plan is logged and ignored.
    pub fn add_plan(&self, plan: ResponsePlan) -> bool {
        {
            let alerts = lock(&self.inner.alerts);
            for trigger in plan.triggers.iter().filter(|t| alerts.get_rule(t).is_none()) {
                tracing::warn!(
                    plan = %plan.name,
                    trigger = %trigger,
                    "Response plan trigger does not name a known alert rule"
                );
            }
        }
        match self.inner.incidents.add_plan(plan) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Response plan rejected");
                false
            }
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn AlertSubscriber>) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    pub fn register_action_handler(&self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.inner.incidents.register_action_handler(kind, handler);
    }

    pub fn register_custom_action(&self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.inner.incidents.register_custom_action(name, handler);
    }

    pub fn add_escalation_handler(&self, handler: Arc<dyn EscalationHandler>) {
        self.inner.incidents.add_escalation_handler(handler);
    }

    /// Record a sample. Unknown metrics, undeclared labels and non-finite
    /// values are logged and dropped.
    pub fn record(&self, name: &str, value: f64, labels: Labels) {
        self.inner.record(name, value, labels);
    }

    pub fn status_summary(&self) -> StatusSummary {
        let (registered_metrics, metrics) = {
            let store = lock(&self.inner.store);
            let registry = store.registry();
            let names: Vec<String> = registry.names().into_iter().map(str::to_string).collect();
            (registry.len(), names)
        };
        let (alert_rules, active_alert_rules) = {
            let alerts = lock(&self.inner.alerts);
            let active: Vec<String> = alerts
                .active_alerts()
                .into_iter()
                .map(|a| a.rule_name.clone())
                .collect();
            (alerts.rule_count(), active)
        };
        let responses = self.inner.incidents.status();

        StatusSummary {
            registered_metrics,
            alert_rules,
            active_alerts: active_alert_rules.len(),
            open_incidents: responses.open_incidents,
            total_incidents: responses.total_incidents,
            response_plans: responses.response_plans,
            active_responses: responses.active_responses,
            recent_responses: responses.recent_responses,
            metrics,
            active_alert_rules,
        }
    }

    pub fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
        since: Option<std::time::Duration>,
    ) -> Vec<Incident> {
        self.inner.incidents.list(status, since)
    }

    /// Resolve an incident by hand. Unknown ids are a no-op.
    pub fn resolve_incident(&self, incident_id: &str, note: &str) -> bool {
        self.inner.incidents.resolve(incident_id, note)
    }

    pub fn get_incident(&self, incident_id: &str) -> Option<Incident> {
        self.inner.incidents.get(incident_id)
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        lock(&self.inner.alerts)
            .active_alerts()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Retained samples of one metric, oldest first.
    pub fn history(&self, name: &str) -> Vec<Sample> {
        lock(&self.inner.store)
            .history(name)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn incidents(&self) -> &IncidentManager {
        &self.inner.incidents
    }

    /// Render the sample store in Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Fails if the rendered families cannot be encoded.
    pub fn export_prometheus(&self) -> vigil_metrics::Result<String> {
        vigil_metrics::export::render_prometheus(&lock(&self.inner.store))
    }

    /// Start periodic host sampling. Returns `false` if already running.
    pub fn start_sampler(&self) -> bool {
        let sink: Arc<dyn SampleSink> = Arc::new(EngineSink(Arc::downgrade(&self.inner)));
        self.inner.sampler.start(sink, &self.inner.runtime)
    }

    /// Stop periodic host sampling. Returns `false` if it was not running.
    pub fn stop_sampler(&self) -> bool {
        self.inner.sampler.stop()
    }

    pub fn sampler_running(&self) -> bool {
        self.inner.sampler.is_running()
    }
}

impl Inner {
    fn record(&self, name: &str, value: f64, labels: Labels) {
        // Both locks are released before anyone is notified, so a
        // subscriber may record again without deadlocking.
        let outbox = {
            let mut store = lock(&self.store);
            let sample = match store.record(name, value, labels) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!(metric = name, error = %e, "Sample dropped");
                    return;
                }
            };
            lock(&self.alerts).evaluate_at(name, sample.value, &sample.labels, sample.timestamp)
        };

        for transition in outbox {
            if let AlertTransition::Triggered(alert) = transition {
                self.notify_subscribers(&alert);
                self.incidents.handle_alert(&alert);
            }
        }
    }

    fn notify_subscribers(&self, alert: &Alert) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_alert(alert))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(
                    subscriber = subscriber.name(),
                    rule = %alert.rule_name,
                    error = %e,
                    "Alert subscriber failed"
                ),
                Err(_) => tracing::error!(
                    subscriber = subscriber.name(),
                    rule = %alert.rule_name,
                    "Alert subscriber panicked"
                ),
            }
        }
    }
}

/// Feeds sampler readings back through `record`. Holds the engine weakly
/// so a running sampler does not keep it alive.
struct EngineSink(Weak<Inner>);

impl SampleSink for EngineSink {
    fn accept(&self, reading: Reading) {
        if let Some(inner) = self.0.upgrade() {
            inner.record(&reading.metric, reading.value, reading.labels);
        }
    }
}
