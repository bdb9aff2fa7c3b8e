use crate::error::{AlertError, Result};
use crate::rule::{AlertRule, CompareOp};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vigil_common::types::{alert_fingerprint, format_labels, Alert, Labels};

/// Key: (rule_name, labels)
type AlertKey = (String, Labels);

struct CompiledRule {
    rule: AlertRule,
    op: CompareOp,
}

/// A state change produced by evaluating one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertTransition {
    Triggered(Alert),
    Resolved {
        alert: Alert,
        resolved_at: DateTime<Utc>,
    },
}

impl AlertTransition {
    pub fn alert(&self) -> &Alert {
        match self {
            Self::Triggered(alert) | Self::Resolved { alert, .. } => alert,
        }
    }
}

#[derive(Default)]
pub struct AlertEngine {
    rules: Vec<CompiledRule>,
    active: HashMap<AlertKey, Alert>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. A rule with the same name replaces the existing one in
    /// place. Alerts it already raised stay active unless the replacement
    /// targets a different metric, in which case they are dropped.
    ///
    /// # Errors
    ///
    /// Rejects rules with an empty name or metric, an unparseable
    /// condition, or a non-finite threshold.
    pub fn add_rule(&mut self, rule: AlertRule) -> Result<()> {
        if rule.name.trim().is_empty() {
            return Err(AlertError::EmptyField("name"));
        }
        if rule.metric.trim().is_empty() {
            return Err(AlertError::EmptyField("metric"));
        }
        if !rule.threshold.is_finite() {
            return Err(AlertError::InvalidThreshold(rule.name));
        }
        let op = CompareOp::parse_condition(&rule.condition).ok_or_else(|| {
            AlertError::InvalidCondition {
                rule: rule.name.clone(),
                condition: rule.condition.clone(),
            }
        })?;

        tracing::info!(
            rule = %rule.name,
            metric = %rule.metric,
            operator = %op,
            threshold = rule.threshold,
            severity = %rule.severity,
            "Added alert rule"
        );

        let rule_name = rule.name.clone();
        let compiled = CompiledRule { rule, op };
        match self.rules.iter().position(|r| r.rule.name == rule_name) {
            Some(index) => {
                let metric_changed = self.rules[index].rule.metric != compiled.rule.metric;
                self.rules[index] = compiled;
                if metric_changed {
                    self.drop_active_for(&rule_name);
                }
            }
            None => self.rules.push(compiled),
        }
        Ok(())
    }

    /// Forget every active alert raised by `rule_name`. Used when a rule no
    /// longer watches the metric those alerts were raised on.
    fn drop_active_for(&mut self, rule_name: &str) {
        let before = self.active.len();
        self.active.retain(|(name, _), _| name != rule_name);
        let dropped = before - self.active.len();
        if dropped > 0 {
            tracing::warn!(
                rule = %rule_name,
                dropped,
                "Rule now targets a different metric, dropped its active alerts"
            );
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn get_rule(&self, name: &str) -> Option<&AlertRule> {
        self.rules.iter().find(|r| r.rule.name == name).map(|r| &r.rule)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn evaluate(&mut self, metric: &str, value: f64, labels: &Labels) -> Vec<AlertTransition> {
        self.evaluate_at(metric, value, labels, Utc::now())
    }

    /// Evaluate one sample against every rule targeting `metric`.
    ///
    /// A breach with no active alert for `(rule, labels)` yields
    /// [`AlertTransition::Triggered`]; a breach with an active alert yields
    /// nothing. A non-breaching sample clears the active alert and yields
    /// [`AlertTransition::Resolved`].
    pub fn evaluate_at(
        &mut self,
        metric: &str,
        value: f64,
        labels: &Labels,
        now: DateTime<Utc>,
    ) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();

        for compiled in &self.rules {
            let rule = &compiled.rule;
            if rule.metric != metric {
                continue;
            }

            let key = (rule.name.clone(), labels.clone());
            match compiled.op.matched_branch(value, rule.threshold) {
                Some(branch) => {
                    if self.active.contains_key(&key) {
                        continue;
                    }
                    let alert = Alert {
                        id: format!("{:016x}", alert_fingerprint(&rule.name, labels)),
                        rule_name: rule.name.clone(),
                        metric_name: rule.metric.clone(),
                        value,
                        threshold: rule.threshold,
                        severity: rule.severity,
                        description: rule.description.clone(),
                        runbook_url: rule.runbook_url.clone(),
                        labels: labels.clone(),
                        triggered_at: now,
                    };
                    tracing::error!(
                        rule = %rule.name,
                        metric = %rule.metric,
                        value,
                        threshold = rule.threshold,
                        branch = %branch,
                        severity = %rule.severity,
                        labels = %format_labels(labels),
                        "Alert triggered"
                    );
                    self.active.insert(key, alert.clone());
                    transitions.push(AlertTransition::Triggered(alert));
                }
                None => {
                    if let Some(alert) = self.active.remove(&key) {
                        let duration_secs = (now - alert.triggered_at).num_seconds();
                        tracing::info!(
                            rule = %rule.name,
                            labels = %format_labels(labels),
                            duration_secs,
                            "Alert resolved"
                        );
                        transitions.push(AlertTransition::Resolved {
                            alert,
                            resolved_at: now,
                        });
                    }
                }
            }
        }

        transitions
    }

    /// Active alerts, oldest first.
    pub fn active_alerts(&self) -> Vec<&Alert> {
        let mut alerts: Vec<&Alert> = self.active.values().collect();
        alerts.sort_by(|a, b| {
            a.triggered_at
                .cmp(&b.triggered_at)
                .then_with(|| a.rule_name.cmp(&b.rule_name))
        });
        alerts
    }

    pub fn is_active(&self, rule_name: &str, labels: &Labels) -> bool {
        self.active
            .contains_key(&(rule_name.to_string(), labels.clone()))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
