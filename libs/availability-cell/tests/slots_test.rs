// libs/availability-cell/tests/slots_test.rs
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use availability_cell::models::{AvailabilityWindow, BookedInterval};
use availability_cell::services::slots::{expand_window, expand_windows};

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

// A Sunday, far enough ahead that "now" never catches up with it
fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 6).unwrap()
}

fn before_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

fn window(start: (u32, u32), end: (u32, u32), slot_minutes: i32) -> AvailabilityWindow {
    let created = before_day();
    AvailabilityWindow {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        weekday: 0,
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        slot_duration_minutes: slot_minutes,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

fn booked(start: (u32, u32), duration_minutes: i32) -> BookedInterval {
    BookedInterval {
        id: Uuid::new_v4(),
        scheduled_at: sunday().and_hms_opt(start.0, start.1, 0).unwrap().and_utc(),
        duration_minutes,
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    sunday().and_hms_opt(h, m, 0).unwrap().and_utc()
}

// ==============================================================================
// WINDOW EXPANSION
// ==============================================================================

#[test]
fn morning_window_expands_to_six_half_hour_slots() {
    let w = window((9, 0), (12, 0), 30);

    let slots = expand_window(&w, &[], sunday(), before_day());

    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0].start, at(9, 0));
    assert_eq!(slots[0].end, at(9, 30));
    assert_eq!(slots[5].start, at(11, 30));
    assert_eq!(slots[5].end, at(12, 0));
    assert!(slots.iter().all(|s| s.is_available && !s.is_booked));
    assert!(slots.iter().all(|s| s.appointment_id.is_none()));
}

#[test]
fn trailing_partial_slot_is_not_emitted() {
    // 09:00-10:10 with 30-minute slots: 09:00 and 09:30 fit, 10:00 would
    // run past the window end
    let w = window((9, 0), (10, 10), 30);

    let slots = expand_window(&w, &[], sunday(), before_day());

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].end, at(10, 0));
}

#[test]
fn booked_appointment_marks_overlapping_slots() {
    let w = window((9, 0), (12, 0), 30);
    let apt = booked((10, 0), 50);

    let slots = expand_window(&w, &[apt.clone()], sunday(), before_day());

    // 10:00-10:30 and 10:30-11:00 overlap the 10:00-10:50 appointment
    let booked_slots: Vec<_> = slots.iter().filter(|s| s.is_booked).collect();
    assert_eq!(booked_slots.len(), 2);
    assert_eq!(booked_slots[0].start, at(10, 0));
    assert_eq!(booked_slots[1].start, at(10, 30));
    assert!(booked_slots.iter().all(|s| !s.is_available));
    assert!(booked_slots.iter().all(|s| s.appointment_id == Some(apt.id)));

    // Everything else stays free
    let free: Vec<_> = slots.iter().filter(|s| s.is_available).collect();
    assert_eq!(free.len(), 4);
}

#[test]
fn appointment_ending_at_slot_start_does_not_book_it() {
    let w = window((9, 0), (12, 0), 30);
    // Ends exactly at 10:00; the 10:00 slot is untouched
    let apt = booked((9, 30), 30);

    let slots = expand_window(&w, &[apt], sunday(), before_day());

    let ten = slots.iter().find(|s| s.start == at(10, 0)).unwrap();
    assert!(!ten.is_booked);
    assert!(ten.is_available);
}

#[test]
fn slots_entirely_in_the_past_are_unavailable() {
    let w = window((9, 0), (12, 0), 30);
    let now = at(10, 0);

    let slots = expand_window(&w, &[], sunday(), now);

    // 09:00 and 09:30 have ended by 10:00
    assert!(!slots[0].is_available);
    assert!(!slots[1].is_available);
    assert!(!slots[0].is_booked);
    // A slot still in progress or later stays available
    assert!(slots[2].is_available);
    assert!(slots.iter().skip(2).all(|s| s.is_available));
}

#[test]
fn slot_ending_exactly_now_is_unavailable() {
    let w = window((9, 0), (12, 0), 30);
    let now = at(9, 30);

    let slots = expand_window(&w, &[], sunday(), now);

    assert!(!slots[0].is_available);
    assert!(slots[1].is_available);
}

// ==============================================================================
// MULTI-WINDOW OUTPUT
// ==============================================================================

#[test]
fn windows_are_combined_and_sorted_by_start() {
    // Afternoon window listed first; output must still be chronological
    let afternoon = window((14, 0), (16, 0), 60);
    let morning = window((9, 0), (11, 0), 60);

    let slots = expand_windows(&[afternoon, morning], &[], sunday(), before_day());

    assert_eq!(slots.len(), 4);
    let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![at(9, 0), at(10, 0), at(14, 0), at(15, 0)]);
}

#[test]
fn overlapping_windows_keep_duplicate_starts() {
    // Two deliberate offerings over the same hour: one 30-minute, one
    // 60-minute. Both candidate sets survive.
    let half_hour = window((9, 0), (10, 0), 30);
    let full_hour = window((9, 0), (10, 0), 60);

    let slots = expand_windows(&[half_hour, full_hour], &[], sunday(), before_day());

    assert_eq!(slots.len(), 3);
    let nine_starts = slots.iter().filter(|s| s.start == at(9, 0)).count();
    assert_eq!(nine_starts, 2);
}

#[test]
fn no_windows_produce_no_slots() {
    let slots = expand_windows(&[], &[], sunday(), before_day());
    assert!(slots.is_empty());
}
