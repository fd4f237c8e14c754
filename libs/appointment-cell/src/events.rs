// libs/appointment-cell/src/events.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted exactly once per lifecycle transition. The
/// notification collaborator consumes these; nothing in this cell sends
/// notifications itself.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppointmentEvent {
    Created {
        appointment_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        scheduled_at: DateTime<Utc>,
    },
    Confirmed {
        appointment_id: Uuid,
        confirmed_at: DateTime<Utc>,
    },
    Rejected {
        appointment_id: Uuid,
        reason: String,
    },
    Cancelled {
        appointment_id: Uuid,
        cancelled_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: AppointmentEvent);
}

/// Default sink: structured log line per event. A real deployment swaps in
/// the notification dispatcher here.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event: AppointmentEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(target: "appointment_events", "{}", payload);
    }
}
