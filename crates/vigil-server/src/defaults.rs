//! Built-in catalogue seeded when `load_defaults` is set: the core
//! application metrics, the rules watching them and the response plans
//! bound to those rules.

use vigil_alert::AlertRule;
use vigil_common::types::{MetricDefinition, MetricKind, Severity};
use vigil_incident::types::{ActionKind, ResponseAction, ResponsePlan};

pub fn metrics() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("http_requests_total", MetricKind::Counter)
            .with_description("Total HTTP requests")
            .with_labels(["method", "endpoint", "status_code"])
            .with_help("Total number of HTTP requests processed"),
        MetricDefinition::new("http_request_duration_seconds", MetricKind::Histogram)
            .with_description("HTTP request duration")
            .with_labels(["method", "endpoint"])
            .with_unit("seconds")
            .with_help("Time spent processing HTTP requests"),
        MetricDefinition::new("active_connections", MetricKind::Gauge)
            .with_description("Active connections")
            .with_help("Number of active connections"),
        MetricDefinition::new("memory_usage_bytes", MetricKind::Gauge)
            .with_description("Memory usage")
            .with_unit("bytes")
            .with_help("Current memory usage in bytes"),
        MetricDefinition::new("cpu_usage_percent", MetricKind::Gauge)
            .with_description("CPU usage percentage")
            .with_unit("percent")
            .with_help("Current CPU usage percentage"),
        MetricDefinition::new("ai_model_requests_total", MetricKind::Counter)
            .with_description("AI model requests")
            .with_labels(["model", "provider", "status"])
            .with_help("Total AI model requests processed"),
        MetricDefinition::new("ai_model_response_time_seconds", MetricKind::Histogram)
            .with_description("AI model response time")
            .with_labels(["model", "provider"])
            .with_unit("seconds")
            .with_help("Time spent processing AI model requests"),
        MetricDefinition::new("database_connections_active", MetricKind::Gauge)
            .with_description("Active database connections")
            .with_help("Number of active database connections"),
        MetricDefinition::new("cache_hit_rate", MetricKind::Gauge)
            .with_description("Cache hit rate")
            .with_unit("percent")
            .with_help("Cache hit rate percentage"),
        MetricDefinition::new("security_events_total", MetricKind::Counter)
            .with_description("Security events")
            .with_labels(["event_type", "severity"])
            .with_help("Total security events detected"),
    ]
}

pub fn rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "high_response_time",
            "http_request_duration_seconds",
            "> 2.0",
            2.0,
            Severity::High,
        )
        .with_duration(120)
        .with_description("HTTP response time is too high")
        .with_runbook("https://docs.devskyy.com/runbooks/high-response-time"),
        AlertRule::new("high_error_rate", "http_requests_total", "> 0.05", 0.05, Severity::Critical)
            .with_duration(60)
            .with_description("HTTP error rate is too high"),
        // The threshold reads as a ratio, but the memory collector reports used
        // bytes, so this fires on the first sampler cycle. Override it in the
        // config file when running with the sampler enabled.
        AlertRule::new("low_memory", "memory_usage_bytes", "> 0.9", 0.9, Severity::High)
            .with_duration(300)
            .with_description("Memory usage is critically high"),
        AlertRule::new("high_cpu", "cpu_usage_percent", "> 80", 80.0, Severity::Medium)
            .with_duration(300)
            .with_description("CPU usage is high"),
        AlertRule::new("ai_model_failures", "ai_model_requests_total", "> 0.1", 0.1, Severity::High)
            .with_duration(180)
            .with_description("AI model failure rate is too high"),
        AlertRule::new("security_events", "security_events_total", "> 10", 10.0, Severity::Critical)
            .with_duration(60)
            .with_description("High number of security events detected"),
    ]
}

pub fn plans() -> Vec<ResponsePlan> {
    vec![
        ResponsePlan::new("high_response_time_plan", ["high_response_time"])
            .with_description("Response plan for high HTTP response times")
            .action(ResponseAction::new(ActionKind::ClearCache).param("cache_type", "all"))
            .action(
                ResponseAction::new(ActionKind::ScaleUp)
                    .param("service", "web")
                    .param("replicas", "2")
                    .delay(60)
                    .when("response_time > 3.0"),
            )
            .action(
                ResponseAction::new(ActionKind::Notify)
                    .param("channels", "slack,email")
                    .param("message", "High response time detected - auto-scaling initiated")
                    .delay(120),
            )
            .escalate_after(600)
            .auto_resolve(None),
        ResponsePlan::new("high_error_rate_plan", ["high_error_rate"])
            .with_description("Response plan for high error rates")
            .action(
                ResponseAction::new(ActionKind::CircuitBreak)
                    .param("service", "external_apis")
                    .param("duration", "300"),
            )
            .action(
                ResponseAction::new(ActionKind::RateLimit)
                    .param("limit", "100/minute")
                    .param("duration", "600")
                    .delay(30),
            )
            .action(
                ResponseAction::new(ActionKind::Notify)
                    .param("channels", "slack,pagerduty")
                    .param(
                        "message",
                        "Critical: High error rate detected - circuit breaker activated",
                    )
                    .param("severity", "critical"),
            )
            .escalate_after(180),
        ResponsePlan::new("memory_pressure_plan", ["low_memory"])
            .with_description("Response plan for high memory usage")
            .action(ResponseAction::new(ActionKind::ClearCache).param("cache_type", "memory"))
            .action(
                ResponseAction::new(ActionKind::Restart)
                    .param("service", "background_workers")
                    .delay(120)
                    .when("memory_usage > 0.95"),
            )
            .action(
                ResponseAction::new(ActionKind::ScaleUp)
                    .param("service", "web")
                    .param("replicas", "1")
                    .delay(300),
            )
            .escalate_after(900),
        ResponsePlan::new("security_incident_plan", ["security_events"])
            .with_description("Response plan for security events")
            .action(
                ResponseAction::new(ActionKind::RateLimit)
                    .param("limit", "10/minute")
                    .param("duration", "3600"),
            )
            .action(
                ResponseAction::new(ActionKind::Notify)
                    .param("channels", "security_team,pagerduty")
                    .param("message", "Security incident detected - rate limiting activated")
                    .param("severity", "critical"),
            )
            .action(
                ResponseAction::new(ActionKind::RunRunbook)
                    .param("runbook_url", "https://docs.devskyy.com/security-incident")
                    .delay(60),
            )
            .escalate_after(300),
    ]
}
