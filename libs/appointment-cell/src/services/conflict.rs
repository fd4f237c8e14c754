// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;
use shared_utils::time::{day_bounds, intervals_overlap, weekday_index};

use availability_cell::models::AvailabilityWindow;
use availability_cell::repository::AvailabilityRepository;

use crate::models::{
    Appointment, BookingDecision, BookingRejection, RejectionReason,
    SchedulingPolicy, SchedulingError,
};
use crate::repository::AppointmentRepository;

/// Decides accept/reject for a proposed appointment using the same
/// availability and overlap rules the slot generator renders from, and on
/// rejection searches for nearby free start times to suggest.
///
/// The resolver is read-only and idempotent; the persistence guard in the
/// repository re-runs the conflict check under its lock before any insert.
pub struct ConflictResolverService {
    windows: AvailabilityRepository,
    appointments: AppointmentRepository,
    policy: SchedulingPolicy,
}

impl ConflictResolverService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_policy(config, SchedulingPolicy::default())
    }

    pub fn with_policy(config: &AppConfig, policy: SchedulingPolicy) -> Self {
        let store = Arc::new(PostgrestClient::new(config));
        Self {
            windows: AvailabilityRepository::new(Arc::clone(&store)),
            appointments: AppointmentRepository::new(store, policy.lock_timeout_seconds),
            policy,
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Validate a proposed booking against availability and existing
    /// appointments. Store failures propagate: a booking must never be
    /// accepted on a guess.
    pub async fn try_book(
        &self,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
        duration_minutes: Option<i32>,
        auth_token: &str,
    ) -> Result<BookingDecision, SchedulingError> {
        let duration = duration_minutes.unwrap_or(self.policy.default_duration_minutes);
        if duration <= 0 {
            return Err(SchedulingError::ValidationError(
                "Duration must be positive".to_string(),
            ));
        }

        debug!("Checking booking for doctor {} at {} ({} min)", doctor_id, scheduled_at, duration);

        let weekday = weekday_index(scheduled_at.date_naive());
        let windows = self.windows
            .find_active_by_doctor_and_weekday(doctor_id, weekday, auth_token)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let (from, to) = day_bounds(scheduled_at.date_naive());
        let existing = self.appointments
            .find_occupying_by_doctor_and_range(doctor_id, from, to, auth_token)
            .await?;

        let decision = decide(&windows, &existing, scheduled_at, duration, Utc::now(), &self.policy);

        if let BookingDecision::Rejected(ref rejection) = decision {
            warn!("Booking rejected for doctor {} at {}: {}", doctor_id, scheduled_at, rejection.message);
        }

        Ok(decision)
    }
}

/// The pure decision core. Availability first, then conflicts.
pub fn decide(
    windows: &[AvailabilityWindow],
    existing: &[Appointment],
    scheduled_at: DateTime<Utc>,
    duration_minutes: i32,
    now: DateTime<Utc>,
    policy: &SchedulingPolicy,
) -> BookingDecision {
    // A doctor with no windows configured for this weekday has not
    // restricted it: absence of configuration means unrestricted, so
    // bookings are not blocked before a schedule exists.
    if !windows.is_empty() {
        let time_of_day = scheduled_at.time();
        if !windows.iter().any(|w| w.contains(time_of_day)) {
            return BookingDecision::Rejected(BookingRejection {
                reason: RejectionReason::OutsideAvailability,
                message: "The requested time is outside the doctor's available hours".to_string(),
                available_hours: windows.iter().map(|w| w.formatted_range()).collect(),
                conflicting_time: None,
                suggestions: Vec::new(),
            });
        }
    }

    let proposed_end = scheduled_at + Duration::minutes(duration_minutes as i64);
    let conflict = existing.iter()
        .filter(|apt| apt.status.occupies_slot())
        .find(|apt| intervals_overlap(scheduled_at, proposed_end, apt.scheduled_at, apt.scheduled_end()));

    if let Some(conflicting) = conflict {
        let suggestions = suggest_alternatives(
            windows,
            existing,
            scheduled_at,
            duration_minutes,
            now,
            policy,
        );

        return BookingDecision::Rejected(BookingRejection {
            reason: RejectionReason::SlotConflict,
            message: format!(
                "Conflicts with an existing appointment on {}",
                conflicting.scheduled_at.format("%Y-%m-%d %H:%M")
            ),
            available_hours: Vec::new(),
            conflicting_time: Some(conflicting.scheduled_at),
            suggestions,
        });
    }

    BookingDecision::Accepted
}

/// Search for up to `max_suggestions` alternative start times after a
/// conflict. Each window is walked from its start in fixed increments with
/// a bounded attempt count; candidates that conflict, are not strictly in
/// the future, or equal the rejected time are skipped. With no windows
/// configured the fallback offsets are proposed unvalidated.
pub fn suggest_alternatives(
    windows: &[AvailabilityWindow],
    existing: &[Appointment],
    rejected_at: DateTime<Utc>,
    duration_minutes: i32,
    now: DateTime<Utc>,
    policy: &SchedulingPolicy,
) -> Vec<DateTime<Utc>> {
    if windows.is_empty() {
        return policy.fallback_offset_hours
            .iter()
            .map(|hours| rejected_at + Duration::hours(*hours))
            .collect();
    }

    let date = rejected_at.date_naive();
    let duration = Duration::minutes(duration_minutes as i64);
    let step = Duration::minutes(policy.suggestion_step_minutes);
    let mut suggestions = Vec::new();

    for window in windows {
        let mut candidate = date.and_time(window.start_time).and_utc();

        for _ in 0..policy.max_attempts_per_window {
            if suggestions.len() >= policy.max_suggestions {
                return suggestions;
            }

            let candidate_end = candidate + duration;
            let conflicts = existing.iter()
                .filter(|apt| apt.status.occupies_slot())
                .any(|apt| intervals_overlap(candidate, candidate_end, apt.scheduled_at, apt.scheduled_end()));

            if !conflicts && candidate > now && candidate != rejected_at {
                suggestions.push(candidate);
            }

            candidate += step;
        }

        if suggestions.len() >= policy.max_suggestions {
            break;
        }
    }

    suggestions
}
