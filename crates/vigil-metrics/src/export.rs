//! Prometheus text exposition of the sample store.
//!
//! Gauges expose the latest value per label set, counters the sum of the
//! retained samples, histograms and summaries observe every retained
//! sample into default buckets.

use crate::error::Result;
use crate::history::SampleHistory;
use crate::store::MetricStore;
use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use vigil_common::types::{MetricDefinition, MetricKind, Sample};

pub fn render_prometheus(store: &MetricStore) -> Result<String> {
    let registry = Registry::new();

    let mut definitions: Vec<&MetricDefinition> = store.registry().definitions().collect();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));

    for def in definitions {
        let Some(history) = store.history(&def.name) else {
            continue;
        };
        if history.is_empty() {
            continue;
        }
        register_metric(&registry, def, history)?;
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn help_text(def: &MetricDefinition) -> String {
    [&def.help, &def.description]
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| def.name.clone())
}

fn label_values<'a>(def: &MetricDefinition, sample: &'a Sample) -> Vec<&'a str> {
    def.labels
        .iter()
        .map(|name| sample.labels.get(name).map(String::as_str).unwrap_or(""))
        .collect()
}

fn register_metric(registry: &Registry, def: &MetricDefinition, history: &SampleHistory) -> Result<()> {
    let label_names: Vec<&str> = def.labels.iter().map(String::as_str).collect();
    let help = help_text(def);

    match def.kind {
        MetricKind::Gauge => {
            let vec = GaugeVec::new(Opts::new(def.name.clone(), help), &label_names)?;
            for sample in history.iter() {
                vec.with_label_values(&label_values(def, sample)).set(sample.value);
            }
            registry.register(Box::new(vec))?;
        }
        MetricKind::Counter => {
            let vec = CounterVec::new(Opts::new(def.name.clone(), help), &label_names)?;
            for sample in history.iter().filter(|s| s.value >= 0.0) {
                vec.with_label_values(&label_values(def, sample)).inc_by(sample.value);
            }
            registry.register(Box::new(vec))?;
        }
        MetricKind::Histogram | MetricKind::Summary => {
            let vec = HistogramVec::new(HistogramOpts::new(def.name.clone(), help), &label_names)?;
            for sample in history.iter() {
                vec.with_label_values(&label_values(def, sample)).observe(sample.value);
            }
            registry.register(Box::new(vec))?;
        }
    }
    Ok(())
}
