// libs/appointment-cell/tests/conflict_test.rs
use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use availability_cell::models::{AvailabilityWindow, BookedInterval};
use availability_cell::services::slots::expand_windows;
use appointment_cell::models::{
    Appointment, AppointmentStatus, BookingDecision, ConsultationMode,
    RejectionReason, SchedulingPolicy,
};
use appointment_cell::services::conflict::{decide, suggest_alternatives};

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

// A Sunday
fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 6).unwrap()
}

fn before_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    sunday().and_hms_opt(h, m, 0).unwrap().and_utc()
}

fn window(start: (u32, u32), end: (u32, u32), slot_minutes: i32) -> AvailabilityWindow {
    AvailabilityWindow {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        weekday: 0,
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        slot_duration_minutes: slot_minutes,
        is_active: true,
        created_at: before_day(),
        updated_at: before_day(),
    }
}

fn appointment(start: (u32, u32), duration_minutes: i32, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        companion_id: None,
        scheduled_at: at(start.0, start.1),
        duration_minutes,
        mode: ConsultationMode::Video,
        status,
        reason: "Checkup".to_string(),
        notes: None,
        consultation_fee: None,
        rejection_reason: None,
        confirmed_at: None,
        cancelled_at: None,
        created_at: before_day(),
        updated_at: before_day(),
    }
}

fn policy() -> SchedulingPolicy {
    SchedulingPolicy::default()
}

// ==============================================================================
// AVAILABILITY CHECK
// ==============================================================================

#[test]
fn proposal_outside_all_windows_is_rejected_with_allowed_hours() {
    let windows = vec![window((9, 0), (12, 0), 30)];

    let decision = decide(&windows, &[], at(8, 0), 50, before_day(), &policy());

    let rejection = assert_matches!(decision, BookingDecision::Rejected(r) => r);
    assert_eq!(rejection.reason, RejectionReason::OutsideAvailability);
    assert_eq!(rejection.available_hours, vec!["09:00 - 12:00".to_string()]);
    assert!(rejection.conflicting_time.is_none());
}

#[test]
fn proposal_inside_a_window_is_accepted() {
    let windows = vec![window((9, 0), (12, 0), 30)];

    let decision = decide(&windows, &[], at(10, 0), 50, before_day(), &policy());

    assert_matches!(decision, BookingDecision::Accepted);
}

#[test]
fn window_start_is_inside_but_window_end_is_not() {
    let windows = vec![window((9, 0), (12, 0), 30)];

    assert_matches!(
        decide(&windows, &[], at(9, 0), 30, before_day(), &policy()),
        BookingDecision::Accepted
    );
    let rejected = decide(&windows, &[], at(12, 0), 30, before_day(), &policy());
    assert_matches!(rejected, BookingDecision::Rejected(_));
}

#[test]
fn doctor_without_windows_accepts_any_time_of_day() {
    // Absence of configuration means unrestricted, not unavailable
    let decision = decide(&[], &[], at(3, 30), 50, before_day(), &policy());

    assert_matches!(decision, BookingDecision::Accepted);
}

#[test]
fn second_window_can_admit_what_the_first_rejects() {
    let windows = vec![
        window((9, 0), (12, 0), 30),
        window((14, 0), (17, 0), 30),
    ];

    assert_matches!(
        decide(&windows, &[], at(15, 0), 50, before_day(), &policy()),
        BookingDecision::Accepted
    );
}

// ==============================================================================
// CONFLICT CHECK
// ==============================================================================

#[test]
fn overlap_with_confirmed_appointment_is_rejected() {
    let windows = vec![window((9, 0), (12, 0), 30)];
    let existing = vec![appointment((10, 0), 50, AppointmentStatus::Confirmed)];

    let decision = decide(&windows, &existing, at(10, 15), 30, before_day(), &policy());

    let rejection = assert_matches!(decision, BookingDecision::Rejected(r) => r);
    assert_eq!(rejection.reason, RejectionReason::SlotConflict);
    assert_eq!(rejection.conflicting_time, Some(at(10, 0)));
}

#[test]
fn pending_appointments_also_occupy_their_slot() {
    let existing = vec![appointment((10, 0), 50, AppointmentStatus::Pending)];

    let decision = decide(&[], &existing, at(10, 0), 50, before_day(), &policy());

    assert_matches!(decision, BookingDecision::Rejected(_));
}

#[test]
fn cancelled_and_completed_appointments_free_their_slot() {
    let existing = vec![
        appointment((10, 0), 50, AppointmentStatus::Cancelled),
        appointment((10, 0), 50, AppointmentStatus::Completed),
        appointment((10, 0), 50, AppointmentStatus::NoShow),
    ];

    let decision = decide(&[], &existing, at(10, 0), 50, before_day(), &policy());

    assert_matches!(decision, BookingDecision::Accepted);
}

#[test]
fn booking_ending_when_another_starts_is_not_a_conflict() {
    let existing = vec![appointment((10, 0), 60, AppointmentStatus::Confirmed)];

    // 09:00-10:00 against 10:00-11:00: adjacency, not overlap
    assert_matches!(
        decide(&[], &existing, at(9, 0), 60, before_day(), &policy()),
        BookingDecision::Accepted
    );
    // And starting exactly at the other's end
    assert_matches!(
        decide(&[], &existing, at(11, 0), 60, before_day(), &policy()),
        BookingDecision::Accepted
    );
}

// ==============================================================================
// ALTERNATIVE SUGGESTIONS
// ==============================================================================

#[test]
fn suggestions_walk_windows_hourly_and_skip_conflicts() {
    let windows = vec![window((9, 0), (12, 0), 30)];
    let existing = vec![appointment((10, 0), 50, AppointmentStatus::Confirmed)];

    let suggestions = suggest_alternatives(&windows, &existing, at(10, 15), 50, before_day(), &policy());

    // Hourly from the window start: 09:00 free, 10:00 conflicts, 11:00 and
    // 12:00 free
    assert_eq!(suggestions, vec![at(9, 0), at(11, 0), at(12, 0)]);
}

#[test]
fn rejected_time_itself_is_never_suggested() {
    let windows = vec![window((9, 0), (12, 0), 30)];
    let existing = vec![appointment((9, 30), 50, AppointmentStatus::Confirmed)];

    let suggestions = suggest_alternatives(&windows, &existing, at(9, 0), 50, before_day(), &policy());

    assert!(!suggestions.contains(&at(9, 0)));
}

#[test]
fn past_candidates_are_skipped() {
    let windows = vec![window((9, 0), (12, 0), 30)];
    let existing = vec![appointment((11, 0), 50, AppointmentStatus::Confirmed)];
    let now = at(10, 30);

    let suggestions = suggest_alternatives(&windows, &existing, at(11, 15), 50, now, &policy());

    assert!(suggestions.iter().all(|s| *s > now));
}

#[test]
fn suggestions_cap_at_three() {
    let windows = vec![window((9, 0), (18, 0), 30)];

    let suggestions = suggest_alternatives(&windows, &[], at(9, 30), 50, before_day(), &policy());

    assert_eq!(suggestions.len(), 3);
}

#[test]
fn exhausted_attempts_yield_an_empty_list() {
    // One appointment blankets every hourly candidate the walk can reach
    let windows = vec![window((9, 0), (10, 0), 30)];
    let existing = vec![appointment((9, 0), 600, AppointmentStatus::Confirmed)];
    let now = at(23, 0);

    let suggestions = suggest_alternatives(&windows, &existing, at(9, 30), 50, now, &policy());

    assert!(suggestions.is_empty());
}

#[test]
fn no_windows_falls_back_to_fixed_offsets() {
    let suggestions = suggest_alternatives(&[], &[], at(10, 0), 50, before_day(), &policy());

    assert_eq!(suggestions, vec![at(12, 0), at(14, 0)]);
}

// ==============================================================================
// SLOT/BOOKING CONSISTENCY
// ==============================================================================

#[test]
fn every_advertised_slot_would_be_accepted() {
    // The calendar the patient sees and the check that guards the booking
    // must never diverge
    let windows = vec![
        window((9, 0), (12, 0), 30),
        window((14, 0), (16, 0), 30),
    ];
    let existing = vec![
        appointment((10, 0), 50, AppointmentStatus::Confirmed),
        appointment((14, 30), 30, AppointmentStatus::Pending),
    ];
    let busy: Vec<BookedInterval> = existing.iter()
        .map(|apt| BookedInterval {
            id: apt.id,
            scheduled_at: apt.scheduled_at,
            duration_minutes: apt.duration_minutes,
        })
        .collect();
    let now = before_day();

    let slots = expand_windows(&windows, &busy, sunday(), now);
    assert!(slots.iter().any(|s| s.is_available));

    for slot in slots.iter().filter(|s| s.is_available) {
        let duration = (slot.end - slot.start).num_minutes() as i32;
        let decision = decide(&windows, &existing, slot.start, duration, now, &policy());
        assert_matches!(decision, BookingDecision::Accepted,
            "slot at {} was advertised but would be rejected", slot.start);
    }
}

#[test]
fn booked_slots_would_be_rejected() {
    let windows = vec![window((9, 0), (12, 0), 30)];
    let existing = vec![appointment((10, 0), 50, AppointmentStatus::Confirmed)];
    let busy = vec![BookedInterval {
        id: existing[0].id,
        scheduled_at: existing[0].scheduled_at,
        duration_minutes: existing[0].duration_minutes,
    }];
    let now = before_day();

    let slots = expand_windows(&windows, &busy, sunday(), now);

    for slot in slots.iter().filter(|s| s.is_booked) {
        let duration = (slot.end - slot.start).num_minutes() as i32;
        let decision = decide(&windows, &existing, slot.start, duration, now, &policy());
        assert_matches!(decision, BookingDecision::Rejected(_));
    }
}

#[test]
fn default_duration_applies_when_duration_is_omitted() {
    // 50 minutes is product policy, not an incidental constant
    assert_eq!(policy().default_duration_minutes, 50);

    let existing = vec![appointment((10, 0), 50, AppointmentStatus::Confirmed)];
    let end_of_default = at(9, 30) + Duration::minutes(50);
    assert!(end_of_default > at(10, 0));

    // A 09:30 proposal with the default duration runs into the 10:00 booking
    let decision = decide(&[], &existing, at(9, 30), policy().default_duration_minutes, before_day(), &policy());
    assert_matches!(decision, BookingDecision::Rejected(_));
}
