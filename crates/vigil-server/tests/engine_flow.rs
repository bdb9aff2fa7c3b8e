mod common;

use common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_common::types::{labels, Alert, Labels, MetricDefinition, MetricKind};
use vigil_incident::types::{ActionKind, IncidentStatus, ResponseAction, ResponsePlan};
use vigil_server::config::ResolutionCheckKind;
use vigil_server::{AlertSubscriber, Engine, EngineConfig};

fn host(name: &str) -> Labels {
    labels([("host", name)])
}

#[tokio::test]
async fn breach_opens_incident_and_recovery_leaves_it_open() {
    let engine = cpu_engine(&bare_config(), notify_plan());

    engine.record(CPU_METRIC, 90.0, Labels::new());
    let active = engine.active_alerts();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rule_name, CPU_RULE);
    let incidents = engine.list_incidents(None, None);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].status, IncidentStatus::Open);
    assert_eq!(incidents[0].severity, vigil_common::types::Severity::High);

    engine.record(CPU_METRIC, 50.0, Labels::new());
    assert!(engine.active_alerts().is_empty());
    let incident = engine.get_incident(&incidents[0].id).unwrap();
    assert_ne!(incident.status, IncidentStatus::Resolved);
    assert_eq!(engine.status_summary().open_incidents, 1);
}

#[tokio::test]
async fn repeated_breach_notifies_once_until_resolved() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.subscribe(recording("a", &log));

    engine.record(CPU_METRIC, 90.0, host("web-1"));
    engine.record(CPU_METRIC, 95.0, host("web-1"));
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(engine.active_alerts().len(), 1);

    engine.record(CPU_METRIC, 10.0, host("web-1"));
    assert!(engine.active_alerts().is_empty());
    assert_eq!(log.lock().unwrap().len(), 1);

    engine.record(CPU_METRIC, 99.0, host("web-1"));
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(engine.active_alerts()[0].value, 99.0);
}

#[tokio::test]
async fn label_sets_are_tracked_independently() {
    let engine = cpu_engine(&bare_config(), notify_plan());

    engine.record(CPU_METRIC, 90.0, host("web-1"));
    engine.record(CPU_METRIC, 90.0, host("web-2"));
    assert_eq!(engine.active_alerts().len(), 2);

    engine.record(CPU_METRIC, 20.0, host("web-1"));
    let active = engine.active_alerts();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].labels, host("web-2"));

    let incidents = engine.list_incidents(None, None);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].alerts.len(), 2);
}

#[tokio::test]
async fn invalid_samples_are_dropped() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    let before = engine.status_summary();

    engine.record("no_such_metric", 99.0, Labels::new());
    engine.record(CPU_METRIC, 99.0, labels([("region", "eu")]));
    engine.record(CPU_METRIC, f64::NAN, Labels::new());
    engine.record(CPU_METRIC, f64::INFINITY, Labels::new());
    engine.record(CPU_METRIC, f64::NEG_INFINITY, Labels::new());

    assert!(engine.history("no_such_metric").is_empty());
    assert!(engine.history(CPU_METRIC).is_empty());
    assert!(engine.active_alerts().is_empty());
    assert_eq!(engine.status_summary(), before);
}

#[tokio::test]
async fn malformed_rules_and_plans_are_rejected() {
    let engine = cpu_engine(&bare_config(), notify_plan());

    assert!(!engine.add_rule(vigil_alert::AlertRule::new(
        "broken",
        CPU_METRIC,
        "== 3",
        3.0,
        vigil_common::types::Severity::Low,
    )));
    assert!(!engine.add_plan(ResponsePlan::new("no_triggers", Vec::<String>::new())));

    let summary = engine.status_summary();
    assert_eq!(summary.alert_rules, 1);
    assert_eq!(summary.response_plans, 1);
}

struct Failing;

impl AlertSubscriber for Failing {
    fn on_alert(&self, _alert: &Alert) -> anyhow::Result<()> {
        anyhow::bail!("sink offline")
    }
}

struct Panicking;

impl AlertSubscriber for Panicking {
    fn on_alert(&self, _alert: &Alert) -> anyhow::Result<()> {
        panic!("subscriber bug")
    }
}

#[tokio::test]
async fn subscribers_run_in_order_and_failures_are_contained() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.subscribe(recording("first", &log));
    engine.subscribe(Arc::new(Failing));
    engine.subscribe(Arc::new(Panicking));
    engine.subscribe(recording("last", &log));

    engine.record(CPU_METRIC, 90.0, Labels::new());

    assert_eq!(
        *log.lock().unwrap(),
        vec![format!("first:{CPU_RULE}"), format!("last:{CPU_RULE}")]
    );
    // the incident manager still sees the alert
    assert_eq!(engine.list_incidents(None, None).len(), 1);
}

struct Reentrant {
    engine: Engine,
}

impl AlertSubscriber for Reentrant {
    fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        self.engine
            .record("alerts_fired", 1.0, labels([("rule", alert.rule_name.as_str())]));
        Ok(())
    }
}

#[tokio::test]
async fn subscriber_may_record_samples() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    engine.register_metric(
        MetricDefinition::new("alerts_fired", MetricKind::Counter).with_labels(["rule"]),
    );
    engine.subscribe(Arc::new(Reentrant {
        engine: engine.clone(),
    }));

    engine.record(CPU_METRIC, 90.0, Labels::new());

    let history = engine.history("alerts_fired");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].labels, labels([("rule", CPU_RULE)]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_breaches_merge_into_one_incident() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.subscribe(recording("count", &log));

    std::thread::scope(|scope| {
        for i in 0..100 {
            let engine = engine.clone();
            scope.spawn(move || engine.record(CPU_METRIC, 95.0, host(&format!("h{i}"))));
        }
    });

    assert_eq!(engine.active_alerts().len(), 100);
    assert_eq!(log.lock().unwrap().len(), 100);
    let incidents = engine.list_incidents(None, None);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].alerts.len(), 100);
    assert_eq!(engine.history(CPU_METRIC).len(), 100);
}

#[tokio::test(start_paused = true)]
async fn plan_runs_to_monitoring_and_manual_resolve_closes() {
    let engine = cpu_engine(
        &bare_config(),
        notify_plan().action(ResponseAction::new(ActionKind::ScaleUp).delay(30)),
    );

    engine.record(CPU_METRIC, 90.0, Labels::new());
    let id = engine.list_incidents(None, None)[0].id.clone();

    wait_until(|| engine.get_incident(&id).unwrap().status == IncidentStatus::Monitoring).await;
    let incident = engine.get_incident(&id).unwrap();
    assert_eq!(incident.executions.len(), 2);
    assert!(incident.executions.iter().all(|r| r.success()));
    assert_eq!(engine.status_summary().recent_responses, 2);

    assert!(engine.resolve_incident(&id, "load shed"));
    assert!(!engine.resolve_incident(&id, "again"));
    assert!(!engine.resolve_incident("missing", "noop"));
    assert_eq!(
        engine.list_incidents(Some(IncidentStatus::Resolved), None).len(),
        1
    );
    assert_eq!(engine.status_summary().open_incidents, 0);
}

fn no_active_alerts_config() -> EngineConfig {
    let mut config = bare_config();
    config.resolution_check = ResolutionCheckKind::NoActiveAlerts;
    config
}

#[tokio::test(start_paused = true)]
async fn auto_resolve_waits_for_alerts_to_clear() {
    let engine = cpu_engine(&no_active_alerts_config(), notify_plan().auto_resolve(Some(30)));

    engine.record(CPU_METRIC, 90.0, Labels::new());
    let id = engine.list_incidents(None, None)[0].id.clone();
    wait_until(|| engine.get_incident(&id).unwrap().status == IncidentStatus::Monitoring).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        engine.get_incident(&id).unwrap().status,
        IncidentStatus::Monitoring
    );
}

#[tokio::test(start_paused = true)]
async fn auto_resolve_closes_once_alerts_cleared() {
    let engine = cpu_engine(&no_active_alerts_config(), notify_plan().auto_resolve(Some(30)));

    engine.record(CPU_METRIC, 90.0, Labels::new());
    let id = engine.list_incidents(None, None)[0].id.clone();
    engine.record(CPU_METRIC, 40.0, Labels::new());

    wait_until(|| engine.get_incident(&id).unwrap().status == IncidentStatus::Resolved).await;
    assert!(engine.get_incident(&id).unwrap().resolved_at.is_some());
}

#[tokio::test]
async fn summary_and_export_reflect_state() {
    let engine = cpu_engine(&bare_config(), notify_plan());
    engine.record(CPU_METRIC, 91.5, host("web-1"));

    let summary = engine.status_summary();
    assert_eq!(summary.registered_metrics, 1);
    assert_eq!(summary.alert_rules, 1);
    assert_eq!(summary.active_alerts, 1);
    assert_eq!(summary.open_incidents, 1);
    assert_eq!(summary.metrics, vec![CPU_METRIC.to_string()]);
    assert_eq!(summary.active_alert_rules, vec![CPU_RULE.to_string()]);

    let text = engine.export_prometheus().unwrap();
    assert!(text.contains("# TYPE cpu_pct gauge"));
    assert!(text.contains("cpu_pct{host=\"web-1\"} 91.5"));
}

#[tokio::test]
async fn default_catalogue_is_seeded() {
    let mut config = EngineConfig::default();
    config.sampler.enabled = false;
    let engine = Engine::new(&config).unwrap();

    let summary = engine.status_summary();
    assert_eq!(summary.registered_metrics, 10);
    assert_eq!(summary.alert_rules, 6);
    assert_eq!(summary.response_plans, 4);
    assert!(summary.metrics.contains(&"cpu_usage_percent".to_string()));

    engine.record("cpu_usage_percent", 85.0, Labels::new());
    assert_eq!(engine.active_alerts()[0].rule_name, "high_cpu");
    // high_cpu has no response plan in the default catalogue
    assert!(engine.list_incidents(None, None).is_empty());
}

#[tokio::test]
async fn sampler_start_and_stop_are_idempotent() {
    let engine = cpu_engine(&bare_config(), notify_plan());

    assert!(engine.start_sampler());
    assert!(!engine.start_sampler());
    assert!(engine.sampler_running());
    assert!(engine.stop_sampler());
    assert!(!engine.stop_sampler());
    assert!(!engine.sampler_running());
}
