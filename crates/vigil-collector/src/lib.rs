//! Host resource sampling.
//!
//! Each [`Collector`] reads one category of host metrics and returns them
//! as [`Reading`]s. A [`BackgroundSampler`] runs a set of collectors on a
//! fixed interval and hands every reading to a [`SampleSink`], which in
//! practice records it into the engine like any other producer would.

pub mod cpu;
pub mod memory;
pub mod sampler;


use anyhow::Result;
use vigil_common::types::Labels;

pub use cpu::CpuCollector;
pub use memory::MemoryCollector;
pub use sampler::{BackgroundSampler, SampleSink, SamplerConfig};

/// One value read from the host, addressed to a registered metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub metric: String,
    pub value: f64,
    pub labels: Labels,
}

impl Reading {
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            labels: Labels::new(),
        }
    }
}

/// A host metric collector.
///
/// Collectors are owned by the sampler task and called once per cycle.
pub trait Collector: Send {
    /// Collector name (e.g. `"cpu"`), used for logging.
    fn name(&self) -> &str;

    /// Read current values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn collect(&mut self) -> Result<Vec<Reading>>;
}

/// The collectors the server samples by default.
pub fn default_collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(CpuCollector::new()),
        Box::new(MemoryCollector::new()),
    ]
}
