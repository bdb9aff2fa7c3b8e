use crate::error::{MetricsError, Result};
use crate::history::SampleHistory;
use crate::registry::MetricRegistry;
use crate::DEFAULT_HISTORY_CAPACITY;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vigil_common::types::{Labels, MetricDefinition, Sample};

/// Registry plus per-metric sample history.
pub struct MetricStore {
    registry: MetricRegistry,
    histories: HashMap<String, SampleHistory>,
    history_capacity: usize,
}

impl MetricStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            registry: MetricRegistry::new(),
            histories: HashMap::new(),
            history_capacity,
        }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Register (or overwrite) a metric definition. History already
    /// recorded under the same name is kept.
    pub fn register(&mut self, definition: MetricDefinition) -> Option<MetricDefinition> {
        self.registry.register(definition)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.registry.definitions()
    }

    pub fn record(&mut self, name: &str, value: f64, labels: Labels) -> Result<Sample> {
        self.record_at(name, value, labels, Utc::now())
    }

    /// Validate and append a sample taken at `timestamp`.
    ///
    /// # Errors
    ///
    /// Fails if the metric is unregistered, a label is not declared by the
    /// definition, or the value is NaN or infinite. Nothing is stored on failure.
    pub fn record_at(
        &mut self,
        name: &str,
        value: f64,
        labels: Labels,
        timestamp: DateTime<Utc>,
    ) -> Result<Sample> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))?;

        if let Some(label) = labels.keys().find(|k| !definition.labels.contains(k)) {
            return Err(MetricsError::UndeclaredLabel {
                metric: name.to_string(),
                label: label.clone(),
            });
        }

        if !value.is_finite() {
            return Err(MetricsError::InvalidValue(name.to_string()));
        }

        let sample = Sample {
            timestamp,
            value,
            labels,
        };
        let capacity = self.history_capacity;
        self.histories
            .entry(name.to_string())
            .or_insert_with(|| SampleHistory::new(capacity))
            .push(sample.clone());
        Ok(sample)
    }

    pub fn history(&self, name: &str) -> Option<&SampleHistory> {
        self.histories.get(name)
    }

    pub fn latest(&self, name: &str, labels: &Labels) -> Option<&Sample> {
        self.histories.get(name)?.latest_for(labels)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
