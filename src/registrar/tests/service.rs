use super::common::*;
use crate::registrar::domain::{
    CourseId, EnrollmentMethod, EnrollmentStatus, RegistrationType, StudentId, TermId,
};
use crate::registrar::service::{
    DropKind, EnrollmentError, EnrollmentOutcome, EnrollmentRequest,
};
use crate::registrar::store::RegistryStore;

fn enroll_request(student: u32, course: u32) -> EnrollmentRequest {
    EnrollmentRequest {
        student_id: StudentId(student),
        course_id: CourseId(course),
        term_id: TERM,
        kind: RegistrationType::Regular,
        requested_by: None,
    }
}

#[test]
fn eligible_enrollment_creates_a_row_and_notifies() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    let (service, notices) = build_service(store.clone());

    let outcome = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");

    let EnrollmentOutcome::Enrolled {
        enrollment_id,
        course_code,
        ..
    } = outcome
    else {
        panic!("expected enrolled outcome, got {outcome:?}");
    };
    assert_eq!(course_code, "MATH-201");

    let row = store
        .enrollment(enrollment_id)
        .expect("store reachable")
        .expect("row exists");
    assert_eq!(row.method, EnrollmentMethod::Regular);
    assert!(row.is_active());

    let events = notices.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, "enrollment.confirmed");
    assert_eq!(events[0].recipient, "S-0001");
}

#[test]
fn closed_registration_window_blocks_before_evaluation() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    let (service, notices) = build_service(store);

    // Late registration has no configured window.
    let mut request = enroll_request(1, 10);
    request.kind = RegistrationType::Late;
    let outcome = service.enroll(request, today()).expect("store reachable");

    assert!(matches!(
        outcome,
        EnrollmentOutcome::RegistrationClosed { .. }
    ));
    assert!(notices.events().is_empty());
}

#[test]
fn ineligible_student_gets_a_rejection_with_reasons() {
    let store = registry();
    store.insert_student(student(1, 1.2, 5));
    let mut demanding = course(10, "PHYS-301", 25);
    demanding.min_gpa = 3.0;
    store.insert_course(demanding);
    let (service, _) = build_service(store.clone());

    let outcome = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");

    let EnrollmentOutcome::Rejected { message, report } = outcome else {
        panic!("expected rejection");
    };
    assert!(message.contains("GPA"));
    assert!(!report.is_eligible);
    assert_eq!(
        store
            .active_enrollment_count(CourseId(10), TERM)
            .expect("store reachable"),
        0
    );
}

#[test]
fn full_course_with_waitlist_queues_the_student() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_student(student(2, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 1));
    store.seed_enrollment(active_enrollment(2, 10));
    let (service, notices) = build_service(store.clone());

    let outcome = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");

    assert!(matches!(
        outcome,
        EnrollmentOutcome::Waitlisted { position: 1, .. }
    ));
    // Capacity is untouched by the queued request.
    assert_eq!(
        store
            .active_enrollment_count(CourseId(10), TERM)
            .expect("store reachable"),
        1
    );
    assert_eq!(notices.events()[0].topic, "enrollment.waitlisted");

    // Asking again reports the held position instead of re-queueing.
    let again = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");
    assert!(matches!(
        again,
        EnrollmentOutcome::AlreadyWaitlisted { position: 1 }
    ));
}

#[test]
fn full_course_without_waitlist_rejects() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_student(student(2, 3.0, 30));
    let mut no_queue = course(10, "MATH-201", 1);
    no_queue.allow_waitlist = false;
    store.insert_course(no_queue);
    store.seed_enrollment(active_enrollment(2, 10));
    let (service, _) = build_service(store);

    let outcome = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");

    let EnrollmentOutcome::Rejected { message, .. } = outcome else {
        panic!("expected rejection");
    };
    assert!(message.contains("full"));
}

#[test]
fn drop_frees_the_seat_and_promotes_the_waitlist_head() {
    // Capacity one: X holds the seat, Y waits. When X drops, Y's promotion
    // lands in the same commit with a processed date on the retired entry.
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_student(student(2, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 1));
    let (service, notices) = build_service(store.clone());

    let first = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");
    let EnrollmentOutcome::Enrolled { enrollment_id, .. } = first else {
        panic!("seat holder enrolls");
    };
    let queued = service
        .enroll(enroll_request(2, 10), today())
        .expect("store reachable");
    assert!(matches!(queued, EnrollmentOutcome::Waitlisted { .. }));

    let drop_day = d(2026, 9, 10);
    let outcome = service
        .drop_enrollment(enrollment_id, DropKind::Dropped, drop_day)
        .expect("drop succeeds");

    assert_eq!(outcome.status, EnrollmentStatus::Dropped);
    assert_eq!(outcome.promotions.len(), 1);
    assert_eq!(outcome.promotions[0].student_id, StudentId(2));

    // Capacity holds at one active seat.
    assert_eq!(
        store
            .active_enrollment_count(CourseId(10), TERM)
            .expect("store reachable"),
        1
    );

    let promoted = store
        .enrollment(outcome.promotions[0].enrollment_id)
        .expect("store reachable")
        .expect("row exists");
    assert_eq!(promoted.method, EnrollmentMethod::WaitlistPromotion);
    assert!(promoted.is_active());

    let dropped = store
        .enrollment(enrollment_id)
        .expect("store reachable")
        .expect("row exists");
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);
    assert_eq!(dropped.history.len(), 1);
    assert_eq!(dropped.history[0].changed_on, drop_day);

    // Queue is empty and the promotion was announced.
    assert!(store
        .waitlist(CourseId(10), TERM)
        .expect("store reachable")
        .is_empty());
    assert!(notices
        .events()
        .iter()
        .any(|notice| notice.topic == "waitlist.promoted"));
}

#[test]
fn dropping_an_unknown_or_inactive_enrollment_errors() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    let row = completed(1, 11, 80.0, 3.0);
    let settled_id = row.id;
    store.seed_enrollment({
        let mut row = row;
        row.status = EnrollmentStatus::Withdrawn;
        row
    });
    let (service, _) = build_service(store);

    assert!(matches!(
        service.drop_enrollment(
            crate::registrar::domain::EnrollmentId(999_999),
            DropKind::Dropped,
            today()
        ),
        Err(EnrollmentError::NotFound(_))
    ));
    assert!(matches!(
        service.drop_enrollment(settled_id, DropKind::Withdrawn, today()),
        Err(EnrollmentError::NotActive(_))
    ));
}

#[test]
fn duplicate_enrollment_is_rejected_not_stored() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    store.seed_enrollment(active_enrollment(1, 10));
    let (service, _) = build_service(store.clone());

    let outcome = service
        .enroll(enroll_request(1, 10), today())
        .expect("store reachable");

    let EnrollmentOutcome::Rejected { message, .. } = outcome else {
        panic!("expected rejection");
    };
    assert!(message.contains("already"));
    assert_eq!(
        store
            .active_enrollment_count(CourseId(10), TERM)
            .expect("store reachable"),
        1
    );
}

#[test]
fn bad_term_in_request_is_a_structured_rejection() {
    let store = registry();
    store.insert_student(student(1, 3.0, 30));
    store.insert_course(course(10, "MATH-201", 25));
    let (service, _) = build_service(store);

    let mut request = enroll_request(1, 10);
    request.term_id = TermId(404);
    let outcome = service.enroll(request, today()).expect("store reachable");

    // No registration window exists for the unknown term.
    assert!(matches!(
        outcome,
        EnrollmentOutcome::RegistrationClosed { .. }
    ));
}
