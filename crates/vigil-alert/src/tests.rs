use crate::engine::{AlertEngine, AlertTransition};
use crate::error::AlertError;
use crate::rule::{AlertRule, CompareOp};
use chrono::{Duration, Utc};
use vigil_common::types::{labels, Labels, Severity};

fn cpu_high() -> AlertRule {
    AlertRule::new("cpu_high", "cpu_pct", "> 80", 80.0, Severity::High)
        .with_description("CPU usage is high")
}

fn engine_with(rule: AlertRule) -> AlertEngine {
    let mut engine = AlertEngine::new();
    engine.add_rule(rule).unwrap();
    engine
}

#[test]
fn parse_condition_reads_leading_operator() {
    assert_eq!(CompareOp::parse_condition("> 2.0"), Some(CompareOp::GreaterThan));
    assert_eq!(CompareOp::parse_condition(" >=90"), Some(CompareOp::GreaterEqual));
    assert_eq!(CompareOp::parse_condition("< 0.95"), Some(CompareOp::LessThan));
    assert_eq!(CompareOp::parse_condition("<="), Some(CompareOp::LessEqual));
    assert_eq!(CompareOp::parse_condition("gte 5"), Some(CompareOp::GreaterEqual));
    assert_eq!(CompareOp::parse_condition("less_than"), Some(CompareOp::LessThan));
    assert_eq!(CompareOp::parse_condition("== 1"), None);
    assert_eq!(CompareOp::parse_condition(""), None);
}

#[test]
fn strict_branch_is_tried_before_inclusive_branch() {
    let ge = CompareOp::GreaterEqual;
    assert_eq!(ge.matched_branch(81.0, 80.0), Some(CompareOp::GreaterThan));
    assert_eq!(ge.matched_branch(80.0, 80.0), Some(CompareOp::GreaterEqual));
    assert_eq!(ge.matched_branch(79.9, 80.0), None);

    let le = CompareOp::LessEqual;
    assert_eq!(le.matched_branch(0.5, 0.95), Some(CompareOp::LessThan));
    assert_eq!(le.matched_branch(0.95, 0.95), Some(CompareOp::LessEqual));
    assert_eq!(le.matched_branch(1.0, 0.95), None);

    assert_eq!(CompareOp::GreaterThan.matched_branch(80.0, 80.0), None);
    assert_eq!(CompareOp::LessThan.matched_branch(80.0, 80.0), None);
}

#[test]
fn add_rule_rejects_malformed_rules() {
    let mut engine = AlertEngine::new();

    let bad_condition = AlertRule::new("r", "m", "~ 5", 5.0, Severity::Low);
    assert!(matches!(
        engine.add_rule(bad_condition),
        Err(AlertError::InvalidCondition { .. })
    ));

    let bad_threshold = AlertRule::new("r", "m", ">", f64::NAN, Severity::Low);
    assert!(matches!(
        engine.add_rule(bad_threshold),
        Err(AlertError::InvalidThreshold(_))
    ));

    let no_name = AlertRule::new(" ", "m", ">", 1.0, Severity::Low);
    assert!(matches!(engine.add_rule(no_name), Err(AlertError::EmptyField("name"))));

    assert_eq!(engine.rule_count(), 0);
}

#[test]
fn readding_rule_name_replaces_it() {
    let mut engine = engine_with(cpu_high());
    let stricter = AlertRule::new("cpu_high", "cpu_pct", "> 95", 95.0, Severity::Critical);
    engine.add_rule(stricter).unwrap();

    assert_eq!(engine.rule_count(), 1);
    assert_eq!(engine.get_rule("cpu_high").map(|r| r.threshold), Some(95.0));
    assert!(engine.evaluate("cpu_pct", 90.0, &Labels::new()).is_empty());
}

#[test]
fn readding_rule_on_another_metric_drops_its_alerts() {
    let mut engine = engine_with(cpu_high());
    engine.add_rule(AlertRule::new("disk_full", "disk_pct", "> 90", 90.0, Severity::High)).unwrap();
    engine.evaluate("cpu_pct", 90.0, &Labels::new());
    engine.evaluate("cpu_pct", 90.0, &labels([("core", "1")]));
    engine.evaluate("disk_pct", 95.0, &Labels::new());
    assert_eq!(engine.active_count(), 3);

    let moved = AlertRule::new("cpu_high", "mem_pct", "> 80", 80.0, Severity::High);
    engine.add_rule(moved).unwrap();

    assert!(!engine.is_active("cpu_high", &Labels::new()));
    assert!(engine.is_active("disk_full", &Labels::new()));
    assert_eq!(engine.active_count(), 1);
    assert!(engine.evaluate("cpu_pct", 10.0, &Labels::new()).is_empty());
}

#[test]
fn readding_rule_on_same_metric_keeps_its_alerts() {
    let mut engine = engine_with(cpu_high());
    engine.evaluate("cpu_pct", 90.0, &Labels::new());

    let reworded = cpu_high().with_description("CPU saturated");
    engine.add_rule(reworded).unwrap();

    assert!(engine.is_active("cpu_high", &Labels::new()));
    let resolved = engine.evaluate("cpu_pct", 10.0, &Labels::new());
    assert_eq!(resolved.len(), 1);
}

#[test]
fn breach_triggers_once_per_label_set() {
    let mut engine = engine_with(cpu_high());

    let first = engine.evaluate("cpu_pct", 90.0, &Labels::new());
    assert_eq!(first.len(), 1);
    let AlertTransition::Triggered(alert) = &first[0] else {
        panic!("expected trigger, got {first:?}");
    };
    assert_eq!(alert.rule_name, "cpu_high");
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.value, 90.0);
    assert_eq!(alert.description, "CPU usage is high");

    // still breaching: no duplicate
    assert!(engine.evaluate("cpu_pct", 95.0, &Labels::new()).is_empty());
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn non_breaching_sample_resolves_and_retrigger_creates_new_alert() {
    let mut engine = engine_with(cpu_high());
    let t0 = Utc::now();

    engine.evaluate_at("cpu_pct", 90.0, &Labels::new(), t0);
    let resolved = engine.evaluate_at("cpu_pct", 50.0, &Labels::new(), t0 + Duration::seconds(30));
    assert_eq!(resolved.len(), 1);
    assert!(matches!(&resolved[0], AlertTransition::Resolved { alert, .. } if alert.rule_name == "cpu_high"));
    assert!(!engine.is_active("cpu_high", &Labels::new()));

    // resolving twice does nothing
    assert!(engine.evaluate("cpu_pct", 40.0, &Labels::new()).is_empty());

    let again = engine.evaluate_at("cpu_pct", 99.0, &Labels::new(), t0 + Duration::seconds(60));
    assert_eq!(again.len(), 1);
    assert!(matches!(&again[0], AlertTransition::Triggered(a) if a.triggered_at == t0 + Duration::seconds(60)));
}

#[test]
fn label_sets_are_tracked_independently() {
    let mut engine = engine_with(
        AlertRule::new("slow", "latency", "> 2.0", 2.0, Severity::High),
    );
    let get = labels([("method", "GET")]);
    let post = labels([("method", "POST")]);

    assert_eq!(engine.evaluate("latency", 3.0, &get).len(), 1);
    assert_eq!(engine.evaluate("latency", 3.0, &post).len(), 1);
    assert_eq!(engine.active_count(), 2);

    // resolving GET leaves POST active
    assert_eq!(engine.evaluate("latency", 1.0, &get).len(), 1);
    assert!(!engine.is_active("slow", &get));
    assert!(engine.is_active("slow", &post));
}

#[test]
fn alert_id_is_stable_fingerprint() {
    let mut engine = engine_with(cpu_high());
    let l = labels([("core", "0")]);
    let first = engine.evaluate("cpu_pct", 90.0, &l);
    engine.evaluate("cpu_pct", 10.0, &l);
    let second = engine.evaluate("cpu_pct", 90.0, &l);
    assert_eq!(first[0].alert().id, second[0].alert().id);
    assert_eq!(first[0].alert().id.len(), 16);
}

#[test]
fn only_rules_for_the_metric_are_evaluated() {
    let mut engine = engine_with(cpu_high());
    engine
        .add_rule(AlertRule::new("mem_high", "mem", "> 0.9", 0.9, Severity::High))
        .unwrap();
    engine
        .add_rule(AlertRule::new("cpu_critical", "cpu_pct", ">= 95", 95.0, Severity::Critical))
        .unwrap();

    let transitions = engine.evaluate("cpu_pct", 95.0, &Labels::new());
    let names: Vec<&str> = transitions.iter().map(|t| t.alert().rule_name.as_str()).collect();
    assert_eq!(names, vec!["cpu_high", "cpu_critical"]);
    assert!(!engine.is_active("mem_high", &Labels::new()));
}

#[test]
fn sustain_duration_is_not_enforced() {
    let mut engine = engine_with(cpu_high().with_duration(300));
    assert_eq!(engine.evaluate("cpu_pct", 81.0, &Labels::new()).len(), 1);
}

#[test]
fn less_than_rule_fires_below_threshold() {
    let mut engine = engine_with(
        AlertRule::new("cache_cold", "cache_hit_rate", "< 0.5", 0.5, Severity::Medium),
    );
    assert!(engine.evaluate("cache_hit_rate", 0.7, &Labels::new()).is_empty());
    assert_eq!(engine.evaluate("cache_hit_rate", 0.2, &Labels::new()).len(), 1);
}

#[test]
fn active_alerts_are_oldest_first() {
    let mut engine = engine_with(cpu_high());
    let t0 = Utc::now();
    engine.evaluate_at("cpu_pct", 90.0, &labels([("core", "1")]), t0 + Duration::seconds(5));
    engine.evaluate_at("cpu_pct", 90.0, &labels([("core", "0")]), t0);

    let cores: Vec<&str> = engine
        .active_alerts()
        .iter()
        .filter_map(|a| a.labels.get("core").map(String::as_str))
        .collect();
    assert_eq!(cores, vec!["0", "1"]);
}
