// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::events::{AppointmentEvent, EventSink, LogEventSink};
use crate::models::{Appointment, AppointmentStatus, SchedulingPolicy, SchedulingError};
use crate::repository::AppointmentRepository;

/// Owns the persisted appointment lifecycle once a booking is accepted.
/// Each successful transition emits exactly one domain event.
pub struct AppointmentLifecycleService {
    repository: AppointmentRepository,
    events: Arc<dyn EventSink>,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_event_sink(config, Arc::new(LogEventSink))
    }

    pub fn with_event_sink(config: &AppConfig, events: Arc<dyn EventSink>) -> Self {
        let store = Arc::new(PostgrestClient::new(config));
        let policy = SchedulingPolicy::default();

        Self {
            repository: AppointmentRepository::new(store, policy.lock_timeout_seconds),
            events,
        }
    }

    /// Doctor accepts a pending appointment.
    pub async fn confirm(
        &self,
        appointment_id: Uuid,
        notes: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.repository.find_by_id(appointment_id, auth_token).await?;
        validate_transition(appointment.status, AppointmentStatus::Confirmed)?;

        let confirmed_at = Utc::now();
        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(AppointmentStatus::Confirmed));
        patch.insert("confirmed_at".to_string(), json!(confirmed_at.to_rfc3339()));
        if let Some(notes) = notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        patch.insert("updated_at".to_string(), json!(confirmed_at.to_rfc3339()));

        let saved = self.repository
            .apply_status_patch(appointment_id, patch.into(), auth_token)
            .await?;

        self.events.publish(AppointmentEvent::Confirmed {
            appointment_id,
            confirmed_at,
        }).await;

        info!("Appointment {} confirmed", appointment_id);
        Ok(saved)
    }

    /// Doctor declines a pending appointment. A reason is mandatory; the
    /// patient always learns why.
    pub async fn reject(
        &self,
        appointment_id: Uuid,
        reason: String,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        if reason.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "Rejection reason is required".to_string(),
            ));
        }

        let appointment = self.repository.find_by_id(appointment_id, auth_token).await?;
        if appointment.status != AppointmentStatus::Pending {
            warn!("Reject attempted on appointment {} in status {}", appointment_id, appointment.status);
            return Err(SchedulingError::InvalidStatusTransition(appointment.status));
        }

        let cancelled_at = Utc::now();
        let patch = json!({
            "status": AppointmentStatus::Cancelled,
            "rejection_reason": reason,
            "cancelled_at": cancelled_at.to_rfc3339(),
            "updated_at": cancelled_at.to_rfc3339()
        });

        let saved = self.repository
            .apply_status_patch(appointment_id, patch, auth_token)
            .await?;

        self.events.publish(AppointmentEvent::Rejected {
            appointment_id,
            reason: saved.rejection_reason.clone().unwrap_or_default(),
        }).await;

        info!("Appointment {} rejected", appointment_id);
        Ok(saved)
    }

    /// Patient or companion cancels a pending or confirmed appointment.
    /// Only permitted while the appointment is still in the future.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        notes: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.repository.find_by_id(appointment_id, auth_token).await?;
        can_cancel(appointment.status, appointment.scheduled_at, Utc::now())?;

        let cancelled_at = Utc::now();
        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(AppointmentStatus::Cancelled));
        patch.insert("cancelled_at".to_string(), json!(cancelled_at.to_rfc3339()));
        if let Some(notes) = notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        patch.insert("updated_at".to_string(), json!(cancelled_at.to_rfc3339()));

        let saved = self.repository
            .apply_status_patch(appointment_id, patch.into(), auth_token)
            .await?;

        self.events.publish(AppointmentEvent::Cancelled {
            appointment_id,
            cancelled_at,
        }).await;

        info!("Appointment {} cancelled", appointment_id);
        Ok(saved)
    }
}

/// All valid next statuses for a given current status. Completed, no_show
/// and rescheduled are set by collaborators outside this cell and are
/// terminal here.
pub fn valid_transitions(current: AppointmentStatus) -> Vec<AppointmentStatus> {
    match current {
        AppointmentStatus::Pending => vec![
            AppointmentStatus::Confirmed,
            AppointmentStatus::Cancelled,
        ],
        AppointmentStatus::Confirmed => vec![
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
            AppointmentStatus::Rescheduled,
        ],
        AppointmentStatus::Completed
        | AppointmentStatus::Cancelled
        | AppointmentStatus::NoShow
        | AppointmentStatus::Rescheduled => vec![],
    }
}

pub fn validate_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), SchedulingError> {
    debug!("Validating status transition {} -> {}", current, next);

    if !valid_transitions(current).contains(&next) {
        warn!("Invalid status transition attempted: {} -> {}", current, next);
        return Err(SchedulingError::InvalidStatusTransition(current));
    }

    Ok(())
}

/// Cancellation is open to pending and confirmed appointments whose
/// scheduled time has not passed yet.
pub fn can_cancel(
    status: AppointmentStatus,
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    if !matches!(status, AppointmentStatus::Pending | AppointmentStatus::Confirmed) {
        return Err(SchedulingError::InvalidStatusTransition(status));
    }

    if scheduled_at <= now {
        return Err(SchedulingError::CancellationWindowClosed);
    }

    Ok(())
}
