//! Metric registry and bounded sample history.
//!
//! Every metric must be registered with a [`MetricDefinition`] before
//! samples can be recorded against it. Each metric keeps the most recent
//! samples in a fixed-capacity ring buffer; the alert engine only ever
//! looks at the sample being recorded, the history exists for inspection
//! and export.
//!
//! [`MetricDefinition`]: vigil_common::types::MetricDefinition

pub mod error;
#[cfg(feature = "prometheus")]
pub mod export;
pub mod history;
pub mod registry;
pub mod store;


pub use error::{MetricsError, Result};
pub use history::SampleHistory;
pub use registry::MetricRegistry;
pub use store::MetricStore;

/// Samples retained per metric unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
