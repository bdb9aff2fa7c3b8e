/// Errors raised by the metric registry and sample store.
///
/// All of these are configuration errors from the caller's point of view:
/// the engine logs them and treats the offending call as a no-op.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A sample was recorded for a metric that was never registered.
    #[error("Metrics: unknown metric '{0}'")]
    UnknownMetric(String),

    /// A sample carried a label the metric definition does not declare.
    #[error("Metrics: label '{label}' is not declared by metric '{metric}'")]
    UndeclaredLabel { metric: String, label: String },

    /// The sample value was NaN or infinite.
    #[error("Metrics: value for '{0}' is not finite")]
    InvalidValue(String),

    /// Building the Prometheus exposition failed.
    #[cfg(feature = "prometheus")]
    #[error("Metrics: prometheus export failed: {0}")]
    Export(#[from] prometheus::Error),

    /// The encoded exposition was not valid UTF-8.
    #[error("Metrics: exposition is not valid utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Convenience `Result` alias for metric operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
