// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;
use shared_utils::time::day_bounds;

use crate::events::{AppointmentEvent, EventSink, LogEventSink};
use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingDecision,
    BookingOutcome, SchedulingPolicy, SchedulingError,
};
use crate::repository::AppointmentRepository;
use crate::services::conflict::ConflictResolverService;

pub struct BookingService {
    resolver: ConflictResolverService,
    repository: AppointmentRepository,
    events: Arc<dyn EventSink>,
    policy: SchedulingPolicy,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_event_sink(config, Arc::new(LogEventSink))
    }

    pub fn with_event_sink(config: &AppConfig, events: Arc<dyn EventSink>) -> Self {
        let policy = SchedulingPolicy::default();
        let store = Arc::new(PostgrestClient::new(config));

        Self {
            resolver: ConflictResolverService::new(config),
            repository: AppointmentRepository::new(store, policy.lock_timeout_seconds),
            events,
            policy,
        }
    }

    /// Book an appointment: resolve, then reserve through the persistence
    /// guard, then emit the creation event. The resolver alone cannot close
    /// the race window between two concurrent callers; the reserve step is
    /// what actually protects the no-double-booking invariant.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<BookingOutcome, SchedulingError> {
        info!("Booking appointment for patient {} with doctor {}",
              request.patient_id, request.doctor_id);

        if request.reason.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "Booking reason is required".to_string(),
            ));
        }

        let decision = self.resolver.try_book(
            request.doctor_id,
            request.scheduled_at,
            request.duration_minutes,
            auth_token,
        ).await?;

        let rejection = match decision {
            BookingDecision::Accepted => None,
            BookingDecision::Rejected(rejection) => Some(rejection),
        };
        if let Some(rejection) = rejection {
            return Ok(BookingOutcome::Rejected(rejection));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            companion_id: request.companion_id,
            scheduled_at: request.scheduled_at,
            duration_minutes: request.duration_minutes
                .unwrap_or(self.policy.default_duration_minutes),
            mode: request.mode,
            status: AppointmentStatus::Pending,
            reason: request.reason,
            notes: request.notes,
            consultation_fee: request.consultation_fee,
            rejection_reason: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.repository.reserve(&appointment, auth_token).await {
            Ok(saved) => {
                self.events.publish(AppointmentEvent::Created {
                    appointment_id: saved.id,
                    doctor_id: saved.doctor_id,
                    patient_id: saved.patient_id,
                    scheduled_at: saved.scheduled_at,
                }).await;

                info!("Appointment {} booked with doctor {}", saved.id, saved.doctor_id);
                Ok(BookingOutcome::Booked(saved))
            }
            Err(SchedulingError::SlotTaken) => {
                // Lost the race between the check and the insert; re-resolve
                // so the caller gets fresh suggestions instead of a bare 409
                warn!("Reservation lost the race for doctor {} at {}",
                      request.doctor_id, request.scheduled_at);

                match self.resolver.try_book(
                    request.doctor_id,
                    request.scheduled_at,
                    request.duration_minutes,
                    auth_token,
                ).await? {
                    BookingDecision::Rejected(rejection) => Ok(BookingOutcome::Rejected(rejection)),
                    BookingDecision::Accepted => Err(SchedulingError::SlotTaken),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Dry-run decision without any write. Safe to call repeatedly.
    pub async fn check(
        &self,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
        duration_minutes: Option<i32>,
        auth_token: &str,
    ) -> Result<BookingDecision, SchedulingError> {
        self.resolver.try_book(doctor_id, scheduled_at, duration_minutes, auth_token).await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        self.repository.find_by_id(appointment_id, auth_token).await
    }

    /// Doctor's appointments inside an optional range; defaults to today.
    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let (day_start, day_end) = day_bounds(Utc::now().date_naive());
        let from = from.unwrap_or(day_start);
        let to = to.unwrap_or(day_end);

        debug!("Listing appointments for doctor {} from {} to {}", doctor_id, from, to);
        self.repository.find_by_doctor_and_range(doctor_id, from, to, auth_token).await
    }
}
