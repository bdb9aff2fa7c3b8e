use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vigil_alert::AlertRule;
use vigil_collector::SamplerConfig;
use vigil_common::types::MetricDefinition;
use vigil_incident::types::{ActionKind, ActionParams, ResponseAction, ResponsePlan};
use vigil_incident::ResponseConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed the built-in metric, rule and plan catalogue.
    #[serde(default = "default_load_defaults")]
    pub load_defaults: bool,
    /// Samples kept per metric.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub resolution_check: ResolutionCheckKind,
    /// Interval of the binary's status summary log; 0 disables it.
    #[serde(default = "default_status_log_interval_secs")]
    pub status_log_interval_secs: u64,

    #[serde(default)]
    pub sampler: SamplerSettings,
    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
}

/// Predicate consulted when an auto-resolve timer fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionCheckKind {
    /// Always resolve.
    #[default]
    Always,
    /// Resolve only once none of the incident's alerts is still active.
    NoActiveAlerts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSettings {
    #[serde(default = "default_sampler_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sampler_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_sampler_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            enabled: default_sampler_enabled(),
            interval_secs: default_sampler_interval_secs(),
            error_backoff_secs: default_sampler_error_backoff_secs(),
        }
    }
}

impl SamplerSettings {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            error_backoff: Duration::from_secs(self.error_backoff_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_auto_resolve_delay_secs")]
    pub auto_resolve_delay_secs: u64,
    /// Applied to configured actions that do not set `timeout_secs`.
    #[serde(default = "default_action_timeout_secs")]
    pub default_action_timeout_secs: u64,
    /// Applied to configured actions that do not set `max_retries`.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            auto_resolve_delay_secs: default_auto_resolve_delay_secs(),
            default_action_timeout_secs: default_action_timeout_secs(),
            default_max_retries: default_max_retries(),
        }
    }
}

impl ExecutorSettings {
    pub fn response_config(&self) -> ResponseConfig {
        ResponseConfig {
            auto_resolve_delay_secs: self.auto_resolve_delay_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub escalation_secs: u64,
    #[serde(default)]
    pub auto_resolve: bool,
    #[serde(default)]
    pub auto_resolve_delay_secs: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub kind: ActionKind,
    #[serde(default)]
    pub params: ActionParams,
    #[serde(default)]
    pub delay_secs: u64,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PlanConfig {
    pub fn into_plan(self, executor: &ExecutorSettings) -> ResponsePlan {
        let actions = self
            .actions
            .into_iter()
            .map(|a| ResponseAction {
                kind: a.kind,
                params: a.params,
                delay_secs: a.delay_secs,
                condition: a.condition,
                max_retries: a.max_retries.unwrap_or(executor.default_max_retries),
                timeout_secs: a.timeout_secs.unwrap_or(executor.default_action_timeout_secs),
            })
            .collect();

        ResponsePlan {
            name: self.name,
            description: self.description,
            triggers: self.triggers,
            actions,
            escalation_secs: self.escalation_secs,
            auto_resolve: self.auto_resolve,
            auto_resolve_delay_secs: self.auto_resolve_delay_secs,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_defaults: default_load_defaults(),
            history_capacity: default_history_capacity(),
            resolution_check: ResolutionCheckKind::default(),
            status_log_interval_secs: default_status_log_interval_secs(),
            sampler: SamplerSettings::default(),
            executor: ExecutorSettings::default(),
            metrics: Vec::new(),
            rules: Vec::new(),
            plans: Vec::new(),
        }
    }
}

fn default_load_defaults() -> bool {
    true
}

fn default_history_capacity() -> usize {
    vigil_metrics::DEFAULT_HISTORY_CAPACITY
}

fn default_status_log_interval_secs() -> u64 {
    60
}

fn default_sampler_enabled() -> bool {
    true
}

fn default_sampler_interval_secs() -> u64 {
    30
}

fn default_sampler_error_backoff_secs() -> u64 {
    60
}

fn default_auto_resolve_delay_secs() -> u64 {
    vigil_incident::manager::DEFAULT_AUTO_RESOLVE_DELAY_SECS
}

fn default_action_timeout_secs() -> u64 {
    vigil_incident::types::DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    vigil_incident::types::DEFAULT_MAX_RETRIES
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
