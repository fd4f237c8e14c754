// libs/availability-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime, Duration};

use shared_utils::time::{format_time_range, hhmm, hhmm_option};

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// A doctor's recurring weekly opening. Created and edited by the doctor,
/// never mutated by the scheduling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: i32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    /// Whether a time-of-day falls inside this window, closed-open.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }

    pub fn formatted_range(&self) -> String {
        format_time_range(self.start_time, self.end_time)
    }
}

/// A derived candidate appointment time. Produced fresh on every query,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_available: bool,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
}

/// Projection of an appointment row that already claims time on the
/// doctor's calendar. The store filters to occupying statuses server-side;
/// only the interval matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedInterval {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl BookedInterval {
    pub fn end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes as i64)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub weekday: i32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWindowRequest {
    #[serde(default, with = "hhmm_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option")]
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Availability window not found")]
    WindowNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
