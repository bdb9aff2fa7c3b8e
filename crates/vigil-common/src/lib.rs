//! Shared value types for the vigil alerting and incident-response engine.

pub mod id;
pub mod types;
