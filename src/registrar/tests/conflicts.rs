use super::common::*;
use crate::registrar::conflicts::{detect_conflicts, Conflict};
use crate::registrar::domain::{CourseId, DayOfWeek, StudentId};
use crate::registrar::policy::EnrollmentPolicy;

#[test]
fn overlapping_days_and_times_conflict() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    let mut existing = course(10, "MATH-201", 25);
    existing.schedule = Some(schedule(
        &[DayOfWeek::Monday, DayOfWeek::Wednesday],
        time(9, 0),
        time(10, 30),
        None,
    ));
    let mut candidate = course(11, "PHYS-101", 25);
    candidate.schedule = Some(schedule(
        &[DayOfWeek::Wednesday],
        time(10, 0),
        time(11, 30),
        None,
    ));
    store.insert_course(existing);
    store.insert_course(candidate);
    store.seed_enrollment(active_enrollment(1, 10));

    let conflicts = detect_conflicts(
        store.as_ref(),
        &EnrollmentPolicy::default(),
        StudentId(1),
        TERM,
        &[CourseId(11)],
    )
    .expect("store reachable");

    assert!(conflicts.iter().any(|conflict| matches!(
        conflict,
        Conflict::ScheduleOverlap { days, .. } if days == &vec![DayOfWeek::Wednesday]
    )));
}

#[test]
fn same_days_without_time_overlap_do_not_conflict() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    let mut existing = course(10, "MATH-201", 25);
    existing.schedule = Some(schedule(&[DayOfWeek::Monday], time(9, 0), time(10, 0), None));
    let mut candidate = course(11, "PHYS-101", 25);
    // Back to back: 10:00 end touches 10:00 start, half-open windows.
    candidate.schedule = Some(schedule(&[DayOfWeek::Monday], time(10, 0), time(11, 0), None));
    store.insert_course(existing);
    store.insert_course(candidate);
    store.seed_enrollment(active_enrollment(1, 10));

    let conflicts = detect_conflicts(
        store.as_ref(),
        &EnrollmentPolicy::default(),
        StudentId(1),
        TERM,
        &[CourseId(11)],
    )
    .expect("store reachable");

    assert!(conflicts
        .iter()
        .all(|conflict| !matches!(conflict, Conflict::ScheduleOverlap { .. })));
}

#[test]
fn shared_room_conflicts_even_at_disjoint_times() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    let mut existing = course(10, "MATH-201", 25);
    existing.schedule = Some(schedule(
        &[DayOfWeek::Monday],
        time(9, 0),
        time(10, 0),
        Some("B-104"),
    ));
    let mut candidate = course(11, "PHYS-101", 25);
    candidate.schedule = Some(schedule(
        &[DayOfWeek::Friday],
        time(14, 0),
        time(15, 0),
        Some("B-104"),
    ));
    store.insert_course(existing);
    store.insert_course(candidate);
    store.seed_enrollment(active_enrollment(1, 10));

    let conflicts = detect_conflicts(
        store.as_ref(),
        &EnrollmentPolicy::default(),
        StudentId(1),
        TERM,
        &[CourseId(11)],
    )
    .expect("store reachable");

    assert!(conflicts.iter().any(|conflict| matches!(
        conflict,
        Conflict::RoomOverlap { room, .. } if room == "B-104"
    )));
}

#[test]
fn duplicate_candidate_reports_conflict_and_skips_pairwise_checks() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    store.seed_enrollment(active_enrollment(1, 10));

    let conflicts = detect_conflicts(
        store.as_ref(),
        &EnrollmentPolicy::default(),
        StudentId(1),
        TERM,
        &[CourseId(10)],
    )
    .expect("store reachable");

    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        &conflicts[0],
        Conflict::DuplicateEnrollment { course_code, .. } if course_code == "MATH-201"
    ));
}

#[test]
fn term_load_ceiling_counts_existing_plus_requested() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    for id in 10..15 {
        store.insert_course(course(id, &format!("GEN-{id}"), 50));
        store.seed_enrollment(active_enrollment(1, id));
    }
    store.insert_course(course(20, "GEN-20", 50));
    store.insert_course(course(21, "GEN-21", 50));

    // 5 active + 2 requested > default limit of 6.
    let conflicts = detect_conflicts(
        store.as_ref(),
        &EnrollmentPolicy::default(),
        StudentId(1),
        TERM,
        &[CourseId(20), CourseId(21)],
    )
    .expect("store reachable");

    assert!(conflicts.iter().any(|conflict| matches!(
        conflict,
        Conflict::LoadLimit {
            enrolled: 5,
            requested: 2,
            limit: 6
        }
    )));
}
