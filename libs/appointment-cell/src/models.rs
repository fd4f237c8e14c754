// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub companion_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub mode: ConsultationMode,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub rejection_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Scheduled end of the closed-open interval this appointment claims.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Whether this status blocks the appointment's interval from being
    /// rebooked. Everything outside pending/confirmed frees the slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    Video,
    Audio,
    Messaging,
    InPerson,
}

impl fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationMode::Video => write!(f, "video"),
            ConsultationMode::Audio => write!(f, "audio"),
            ConsultationMode::Messaging => write!(f, "messaging"),
            ConsultationMode::InPerson => write!(f, "in_person"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub companion_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to the policy's standard consultation length when absent.
    pub duration_minutes: Option<i32>,
    pub mode: ConsultationMode,
    pub reason: String,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmAppointmentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ==============================================================================
// BOOKING DECISION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    OutsideAvailability,
    SlotConflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRejection {
    pub reason: RejectionReason,
    pub message: String,
    /// The weekday's configured ranges, e.g. "09:00 - 12:00", populated on
    /// availability violations so the caller can render allowed hours.
    pub available_hours: Vec<String>,
    pub conflicting_time: Option<DateTime<Utc>>,
    /// Up to 3 alternative start times, best effort. May be empty.
    pub suggestions: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BookingDecision {
    Accepted,
    Rejected(BookingRejection),
}

/// Result of a booking attempt that went through the persistence guard.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    Booked(Appointment),
    Rejected(BookingRejection),
}

// ==============================================================================
// SCHEDULING POLICY
// ==============================================================================

/// Product policy knobs. These are deliberate decisions, not incidental
/// implementation detail, so they live here with names instead of inline.
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub default_duration_minutes: i32,
    pub max_suggestions: usize,
    pub suggestion_step_minutes: i64,
    pub max_attempts_per_window: usize,
    /// Offsets proposed when a doctor has no windows configured at all.
    pub fallback_offset_hours: [i64; 2],
    pub lock_timeout_seconds: u64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            default_duration_minutes: 50,
            max_suggestions: 3,
            suggestion_step_minutes: 60,
            max_attempts_per_window: 10,
            fallback_offset_hours: [2, 4],
            lock_timeout_seconds: 30,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Only future appointments can be cancelled")]
    CancellationWindowClosed,

    #[error("The requested slot was just taken")]
    SlotTaken,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
