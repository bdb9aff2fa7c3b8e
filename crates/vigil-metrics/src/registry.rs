use vigil_common::types::MetricDefinition;
use std::collections::HashMap;

/// Table of metric definitions keyed by metric name.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    definitions: HashMap<String, MetricDefinition>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Re-registering a name replaces the previous
    /// definition, which is returned.
    pub fn register(&mut self, definition: MetricDefinition) -> Option<MetricDefinition> {
        tracing::debug!(
            metric = %definition.name,
            kind = %definition.kind,
            "Registered metric"
        );
        self.definitions.insert(definition.name.clone(), definition)
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registered metric names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
