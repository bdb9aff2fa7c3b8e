use crate::{Collector, Reading};
use anyhow::Result;
use sysinfo::System;

pub const CPU_USAGE_METRIC: &str = "cpu_usage_percent";

/// Global CPU utilisation in percent.
pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        // usage is a delta between two refreshes; prime the first one
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Vec<Reading>> {
        self.system.refresh_cpu_usage();
        let usage = f64::from(self.system.global_cpu_usage());
        if !usage.is_finite() {
            anyhow::bail!("cpu usage is not a number");
        }
        Ok(vec![Reading::new(CPU_USAGE_METRIC, usage)])
    }
}
