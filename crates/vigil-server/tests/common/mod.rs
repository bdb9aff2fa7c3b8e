#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_alert::AlertRule;
use vigil_common::types::{Alert, MetricDefinition, MetricKind, Severity};
use vigil_incident::types::{ActionKind, ResponseAction, ResponsePlan};
use vigil_server::{AlertSubscriber, Engine, EngineConfig};

pub const CPU_METRIC: &str = "cpu_pct";
pub const CPU_RULE: &str = "cpu_high";
pub const CPU_PLAN: &str = "cpu_high_plan";

/// Config with no seeded catalogue and no sampler.
pub fn bare_config() -> EngineConfig {
    let mut config = EngineConfig {
        load_defaults: false,
        ..EngineConfig::default()
    };
    config.sampler.enabled = false;
    config
}

/// Engine watching `cpu_pct > 80` with one notify-only plan on the rule.
pub fn cpu_engine(config: &EngineConfig, plan: ResponsePlan) -> Engine {
    vigil_common::id::init(1, 1);
    let engine = Engine::new(config).expect("inside a tokio runtime");
    engine.register_metric(
        MetricDefinition::new(CPU_METRIC, MetricKind::Gauge)
            .with_labels(["host"])
            .with_description("CPU usage"),
    );
    assert!(engine.add_rule(
        AlertRule::new(CPU_RULE, CPU_METRIC, "> 80", 80.0, Severity::High)
            .with_description("CPU is hot")
    ));
    assert!(engine.add_plan(plan));
    engine
}

pub fn notify_plan() -> ResponsePlan {
    ResponsePlan::new(CPU_PLAN, [CPU_RULE]).action(ResponseAction::new(ActionKind::Notify))
}

/// Subscriber that appends `<name>:<rule>` to a shared log.
pub struct Recording {
    pub name: String,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl AlertSubscriber for Recording {
    fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, alert.rule_name));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Recording> {
    Arc::new(Recording {
        name: name.to_string(),
        log: log.clone(),
    })
}

/// Let spawned tasks run, advancing paused time, until `done` holds.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition not reached");
}
