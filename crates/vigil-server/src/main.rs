use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

use vigil_server::{Engine, EngineConfig, LoggingEscalation};

const DEFAULT_CONFIG_PATH: &str = "config/vigil.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vigil-server [config.toml]    Start the engine (default: {DEFAULT_CONFIG_PATH})");
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {path}: {e}")),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => EngineConfig::load(DEFAULT_CONFIG_PATH),
        None => {
            tracing::info!(
                path = DEFAULT_CONFIG_PATH,
                "No config file found, using built-in defaults"
            );
            Ok(EngineConfig::default())
        }
    }
}

fn log_status(engine: &Engine) {
    let summary = engine.status_summary();
    tracing::info!(
        metrics = summary.registered_metrics,
        rules = summary.alert_rules,
        active_alerts = summary.active_alerts,
        open_incidents = summary.open_incidents,
        total_incidents = summary.total_incidents,
        active_responses = summary.active_responses,
        recent_responses = summary.recent_responses,
        "Engine status"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    vigil_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(String::as_str), Some("-h" | "--help")) {
        print_usage();
        return Ok(());
    }

    let config = load_config(args.get(1).map(String::as_str))?;
    tracing::info!(
        load_defaults = config.load_defaults,
        history_capacity = config.history_capacity,
        sampler = config.sampler.enabled,
        "vigil-server starting"
    );

    let engine = Engine::new(&config)?;
    engine.add_escalation_handler(Arc::new(LoggingEscalation));

    if config.sampler.enabled {
        engine.start_sampler();
    }

    let status_enabled = config.status_log_interval_secs > 0;
    let mut status_tick = interval(Duration::from_secs(config.status_log_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = status_tick.tick(), if status_enabled => log_status(&engine),
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    engine.stop_sampler();
    log_status(&engine);
    Ok(())
}
