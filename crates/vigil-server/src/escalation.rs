use async_trait::async_trait;
use chrono::Utc;
use vigil_incident::{EscalationHandler, Incident};

/// Escalation target that writes the escalated incident to the log.
pub struct LoggingEscalation;

#[async_trait]
impl EscalationHandler for LoggingEscalation {
    async fn escalate(&self, incident: &Incident) -> anyhow::Result<()> {
        tracing::warn!(
            incident_id = %incident.id,
            title = %incident.title,
            severity = %incident.severity,
            status = %incident.status,
            alerts = incident.alerts.len(),
            open_secs = (Utc::now() - incident.created_at).num_seconds(),
            assignee = incident.assignee.as_deref().unwrap_or("unassigned"),
            "Incident escalated to on-call"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
