// libs/availability-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;
use shared_utils::time::{day_bounds, intervals_overlap, weekday_index};

use crate::models::{AvailabilityWindow, BookedInterval, TimeSlot, AvailabilityError};
use crate::repository::AvailabilityRepository;

/// Expands a doctor's recurring weekly windows into concrete slots for one
/// calendar date, marking each as free, booked, or past.
pub struct SlotGeneratorService {
    repository: AvailabilityRepository,
}

impl SlotGeneratorService {
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(PostgrestClient::new(config));
        Self {
            repository: AvailabilityRepository::new(store),
        }
    }

    /// Slot calendar for a doctor and date. Store failures degrade to an
    /// empty calendar: the caller's UI treats "no slots" as a normal state,
    /// and an outage must never advertise bookable time.
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Vec<TimeSlot> {
        match self.try_generate_slots(doctor_id, date, auth_token).await {
            Ok(slots) => slots,
            Err(e) => {
                error!("Slot generation failed for doctor {} on {}: {}", doctor_id, date, e);
                Vec::new()
            }
        }
    }

    async fn try_generate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, AvailabilityError> {
        let weekday = weekday_index(date);

        let windows = self.repository
            .find_active_by_doctor_and_weekday(doctor_id, weekday, auth_token)
            .await?;

        // No availability configured is a valid, common state
        if windows.is_empty() {
            debug!("No active windows for doctor {} on weekday {}", doctor_id, weekday);
            return Ok(Vec::new());
        }

        let (start_of_day, end_of_day) = day_bounds(date);
        let busy = self.repository
            .find_busy_intervals(doctor_id, start_of_day, end_of_day, auth_token)
            .await?;

        let slots = expand_windows(&windows, &busy, date, Utc::now());
        debug!("Generated {} slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }
}

/// Expand every window and sort the combined output by start time.
/// Overlapping windows are allowed to produce duplicate start times; they
/// are deliberately not merged.
pub fn expand_windows(
    windows: &[AvailabilityWindow],
    busy: &[BookedInterval],
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let mut slots: Vec<TimeSlot> = windows
        .iter()
        .flat_map(|window| expand_window(window, busy, date, now))
        .collect();

    slots.sort_by(|a, b| a.start.cmp(&b.start));
    slots
}

/// Walk one window from start to end in slot-duration steps. A trailing
/// partial slot that would run past the window end is not emitted.
pub fn expand_window(
    window: &AvailabilityWindow,
    busy: &[BookedInterval],
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let step = Duration::minutes(window.slot_duration_minutes as i64);
    if step <= Duration::zero() {
        return Vec::new();
    }

    let window_start = date.and_time(window.start_time).and_utc();
    let window_end = date.and_time(window.end_time).and_utc();

    let mut slots = Vec::new();
    let mut current = window_start;

    while current + step <= window_end {
        let slot_end = current + step;

        let booked_by = busy.iter()
            .find(|apt| intervals_overlap(current, slot_end, apt.scheduled_at, apt.end()));

        slots.push(TimeSlot {
            start: current,
            end: slot_end,
            is_available: booked_by.is_none() && slot_end > now,
            is_booked: booked_by.is_some(),
            appointment_id: booked_by.map(|apt| apt.id),
        });

        current = slot_end;
    }

    slots
}
