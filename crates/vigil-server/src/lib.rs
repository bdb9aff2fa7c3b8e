//! Alerting and incident-response server: the [`Engine`] facade, its TOML
//! configuration and the built-in catalogue.

pub mod config;
pub mod defaults;
pub mod engine;
pub mod escalation;

pub use config::EngineConfig;
pub use engine::{AlertSubscriber, Engine, StatusSummary};
pub use escalation::LoggingEscalation;
