/// Reasons an alert rule is rejected at registration.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert: rule {0} must not be empty")]
    EmptyField(&'static str),

    #[error("Alert: rule '{rule}' has an unparseable condition '{condition}'")]
    InvalidCondition { rule: String, condition: String },

    #[error("Alert: rule '{0}' has a non-finite threshold")]
    InvalidThreshold(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
