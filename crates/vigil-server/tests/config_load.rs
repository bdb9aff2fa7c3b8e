use std::io::Write;
use vigil_incident::types::ActionKind;
use vigil_server::config::ResolutionCheckKind;
use vigil_server::{Engine, EngineConfig};

const CONFIG: &str = r#"
load_defaults = false
history_capacity = 50
resolution_check = "no_active_alerts"

[sampler]
enabled = false

[executor]
auto_resolve_delay_secs = 120
default_max_retries = 1

[[metrics]]
name = "queue_depth"
kind = "gauge"
labels = ["queue"]

[[rules]]
name = "queue_backlog"
metric = "queue_depth"
condition = ">= 500"
threshold = 500.0
severity = "high"

[[rules]]
name = "broken"
metric = "queue_depth"
condition = "~ 3"
threshold = 3.0
severity = "low"

[[plans]]
name = "queue_backlog_plan"
triggers = ["queue_backlog"]
escalation_secs = 600

  [[plans.actions]]
  kind = "scale_up"
  params = { service = "workers", replicas = "4" }

  [[plans.actions]]
  kind = "notification"
  delay_secs = 60
  max_retries = 5
  timeout_secs = 30
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let config = EngineConfig::load(file.path()).unwrap();

    assert!(config.load_defaults);
    assert_eq!(config.history_capacity, 1000);
    assert_eq!(config.resolution_check, ResolutionCheckKind::Always);
    assert_eq!(config.status_log_interval_secs, 60);
    assert!(config.sampler.enabled);
    assert_eq!(config.sampler.interval_secs, 30);
    assert_eq!(config.sampler.error_backoff_secs, 60);
    assert_eq!(config.executor.auto_resolve_delay_secs, 300);
    assert_eq!(config.executor.default_action_timeout_secs, 300);
    assert_eq!(config.executor.default_max_retries, 3);
}

#[test]
fn full_file_is_parsed() {
    let file = write_config(CONFIG);
    let config = EngineConfig::load(file.path()).unwrap();

    assert!(!config.load_defaults);
    assert_eq!(config.history_capacity, 50);
    assert_eq!(config.resolution_check, ResolutionCheckKind::NoActiveAlerts);
    assert_eq!(config.executor.response_config().auto_resolve_delay_secs, 120);
    assert_eq!(config.metrics[0].labels, vec!["queue".to_string()]);
    assert_eq!(config.rules.len(), 2);

    let plan = config.plans[0].clone().into_plan(&config.executor);
    assert_eq!(plan.escalation_secs, 600);
    assert_eq!(plan.actions[0].kind, ActionKind::ScaleUp);
    assert_eq!(plan.actions[0].params.get("replicas").map(String::as_str), Some("4"));
    assert_eq!(plan.actions[0].max_retries, 1);
    assert_eq!(plan.actions[0].timeout_secs, 300);
    assert_eq!(plan.actions[1].kind, ActionKind::Notify);
    assert_eq!(plan.actions[1].delay_secs, 60);
    assert_eq!(plan.actions[1].max_retries, 5);
    assert_eq!(plan.actions[1].timeout_secs, 30);
}

#[test]
fn missing_or_malformed_file_is_an_error() {
    assert!(EngineConfig::load("/definitely/not/here/vigil.toml").is_err());

    let file = write_config("history_capacity = \"lots\"");
    assert!(EngineConfig::load(file.path()).is_err());
}

#[tokio::test]
async fn engine_is_seeded_from_config() {
    let file = write_config(CONFIG);
    let config = EngineConfig::load(file.path()).unwrap();
    let engine = Engine::new(&config).unwrap();

    let summary = engine.status_summary();
    assert_eq!(summary.registered_metrics, 1);
    // the rule with an unparseable condition is skipped
    assert_eq!(summary.alert_rules, 1);
    assert_eq!(summary.response_plans, 1);

    engine.record(
        "queue_depth",
        500.0,
        vigil_common::types::labels([("queue", "emails")]),
    );
    assert_eq!(engine.active_alerts().len(), 1);
    assert_eq!(engine.list_incidents(None, None).len(), 1);
}
