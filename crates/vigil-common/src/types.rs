use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Label name to label value. Ordered so that equal label sets hash and
/// format identically regardless of insertion order.
pub type Labels = BTreeMap<String, String>;

/// Severity of an alert rule and of the incidents it raises, ordered from
/// lowest to highest.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Medium);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Instrument kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Histogram => write!(f, "histogram"),
            MetricKind::Summary => write!(f, "summary"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            "histogram" => Ok(MetricKind::Histogram),
            "summary" => Ok(MetricKind::Summary),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub description: String,
    /// Label names a sample of this metric may carry.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub help: String,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            labels: Vec::new(),
            unit: String::new(),
            help: String::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub labels: Labels,
}

/// A deduplicated breach of one alert rule for one label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Hex fingerprint of `(rule_name, labels)`.
    pub id: String,
    pub rule_name: String,
    pub metric_name: String,
    /// Value of the sample that triggered the alert.
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub description: String,
    pub runbook_url: Option<String>,
    pub labels: Labels,
    pub triggered_at: DateTime<Utc>,
}

/// Fingerprint of a `(rule, label set)` pair.
///
/// Process-local: `DefaultHasher` output is not guaranteed across builds or
/// Rust releases, so the value must not be persisted or compared between runs.
pub fn alert_fingerprint(rule_name: &str, labels: &Labels) -> u64 {
    let mut hasher = DefaultHasher::new();
    rule_name.hash(&mut hasher);
    labels.hash(&mut hasher);
    hasher.finish()
}

/// Format labels into a human-readable string.
///
/// # Examples
///
/// ```
/// use vigil_common::types::{format_labels, Labels};
///
/// let mut labels = Labels::new();
/// labels.insert("method".to_string(), "GET".to_string());
/// labels.insert("endpoint".to_string(), "/health".to_string());
/// assert_eq!(format_labels(&labels), "endpoint=/health, method=GET");
/// ```
pub fn format_labels(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a [`Labels`] map from string pairs.
///
/// ```
/// let labels = vigil_common::types::labels([("core", "0")]);
/// assert_eq!(labels.get("core").map(String::as_str), Some("0"));
/// ```
pub fn labels<I, K, V>(pairs: I) -> Labels
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
