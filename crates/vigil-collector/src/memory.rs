use crate::{Collector, Reading};
use anyhow::Result;
use sysinfo::System;

pub const MEMORY_USAGE_METRIC: &str = "memory_usage_bytes";

/// Used physical memory in bytes.
pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Vec<Reading>> {
        self.system.refresh_memory();
        if self.system.total_memory() == 0 {
            anyhow::bail!("memory statistics unavailable");
        }
        Ok(vec![Reading::new(
            MEMORY_USAGE_METRIC,
            self.system.used_memory() as f64,
        )])
    }
}
