//! Threshold alert evaluation.
//!
//! The [`engine::AlertEngine`] holds the registered [`rule::AlertRule`]s and
//! the map of active alerts. Each recorded sample is evaluated against every
//! rule targeting its metric; a breach creates at most one active alert per
//! `(rule, label set)` and a subsequent non-breaching sample clears it.

pub mod engine;
pub mod error;
pub mod rule;

#[cfg(test)]
mod tests;

pub use engine::{AlertEngine, AlertTransition};
pub use error::{AlertError, Result};
pub use rule::{AlertRule, CompareOp};
