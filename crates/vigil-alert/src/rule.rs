use serde::{Deserialize, Serialize};
use std::str::FromStr;
use vigil_common::types::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" | "greater_than" | "gt" => Ok(Self::GreaterThan),
            "<" | "less_than" | "lt" => Ok(Self::LessThan),
            ">=" | "greater_equal" | "gte" => Ok(Self::GreaterEqual),
            "<=" | "less_equal" | "lte" => Ok(Self::LessEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, ">"),
            Self::LessThan => write!(f, "<"),
            Self::GreaterEqual => write!(f, ">="),
            Self::LessEqual => write!(f, "<="),
        }
    }
}

/// Branch order used when matching a value: `>` is tried before `>=` and
/// `<` before `<=`.
const BRANCH_ORDER: [CompareOp; 4] = [
    CompareOp::GreaterThan,
    CompareOp::LessThan,
    CompareOp::GreaterEqual,
    CompareOp::LessEqual,
];

impl CompareOp {
    /// Parse the operator at the start of a textual condition such as
    /// `"> 2.0"`, `">=90"` or `"gte"`. Anything after the operator is
    /// ignored; the rule's own threshold is authoritative.
    pub fn parse_condition(condition: &str) -> Option<Self> {
        let trimmed = condition.trim();
        for symbol in [">=", "<=", ">", "<"] {
            if trimmed.starts_with(symbol) {
                return symbol.parse().ok();
            }
        }
        trimmed.split_whitespace().next()?.parse().ok()
    }

    pub fn check(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
        }
    }

    /// Whether a condition declared with `self` enters `branch`. A `>=`
    /// condition also starts with `>`, so it enters the `>` branch first.
    fn admits(self, branch: CompareOp) -> bool {
        match branch {
            Self::GreaterThan => matches!(self, Self::GreaterThan | Self::GreaterEqual),
            Self::LessThan => matches!(self, Self::LessThan | Self::LessEqual),
            Self::GreaterEqual | Self::LessEqual => self == branch,
        }
    }

    /// The first branch, in precedence order, that this operator enters and
    /// whose comparison holds. `None` means the value does not breach.
    ///
    /// ```
    /// use vigil_alert::CompareOp;
    ///
    /// let op = CompareOp::GreaterEqual;
    /// assert_eq!(op.matched_branch(91.0, 90.0), Some(CompareOp::GreaterThan));
    /// assert_eq!(op.matched_branch(90.0, 90.0), Some(CompareOp::GreaterEqual));
    /// assert_eq!(op.matched_branch(89.0, 90.0), None);
    /// ```
    pub fn matched_branch(self, value: f64, threshold: f64) -> Option<CompareOp> {
        BRANCH_ORDER
            .into_iter()
            .find(|branch| self.admits(*branch) && branch.check(value, threshold))
    }
}

/// A threshold rule over one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule name; response plans refer to rules by this name.
    pub name: String,
    pub metric: String,
    /// Textual condition, e.g. `"> 80"`. Only the leading operator is used.
    pub condition: String,
    pub threshold: f64,
    pub severity: Severity,
    /// Sustain duration in seconds. Kept on the rule but not enforced:
    /// a single breaching sample triggers immediately.
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub runbook_url: Option<String>,
}

impl AlertRule {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        condition: impl Into<String>,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            condition: condition.into(),
            threshold,
            severity,
            duration_secs: 0,
            description: String::new(),
            runbook_url: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_runbook(mut self, url: impl Into<String>) -> Self {
        self.runbook_url = Some(url.into());
        self
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }
}
