use std::sync::Arc;

use super::common::*;
use crate::registrar::domain::{CourseId, StudentId};
use crate::registrar::eligibility::EligibilityEvaluator;
use crate::registrar::policy::{EnrollmentPolicy, PromotionPolicy};
use crate::registrar::store::{MemoryRegistry, RegistryStore, WriteBatch, WriteOp};
use crate::registrar::waitlist::{WaitlistManager, WaitlistOutcome};

fn manager(store: Arc<MemoryRegistry>, policy: EnrollmentPolicy) -> WaitlistManager<MemoryRegistry> {
    WaitlistManager::new(store, policy)
}

fn queue_student(store: &Arc<MemoryRegistry>, manager: &WaitlistManager<MemoryRegistry>, id: u32) {
    let mut batch = WriteBatch::new();
    manager
        .join(&mut batch, StudentId(id), CourseId(10), TERM, today())
        .expect("store reachable");
    store.commit(batch).expect("commit succeeds");
}

#[test]
fn join_appends_behind_active_entries() {
    let store = registry();
    store.insert_course(course(10, "MATH-201", 1));
    let manager = manager(store.clone(), EnrollmentPolicy::default());

    queue_student(&store, &manager, 1);

    let mut batch = WriteBatch::new();
    let outcome = manager
        .join(&mut batch, StudentId(2), CourseId(10), TERM, today())
        .expect("store reachable");
    store.commit(batch).expect("commit succeeds");

    match outcome {
        WaitlistOutcome::Queued {
            position,
            expires_on,
        } => {
            assert_eq!(position, 2);
            assert_eq!(expires_on, d(2026, 10, 1));
        }
        other => panic!("expected queued outcome, got {other:?}"),
    }
}

#[test]
fn joining_twice_reports_the_existing_position() {
    let store = registry();
    store.insert_course(course(10, "MATH-201", 1));
    let manager = manager(store.clone(), EnrollmentPolicy::default());
    queue_student(&store, &manager, 1);

    let mut batch = WriteBatch::new();
    let outcome = manager
        .join(&mut batch, StudentId(1), CourseId(10), TERM, today())
        .expect("store reachable");

    assert_eq!(outcome, WaitlistOutcome::AlreadyQueued { position: 1 });
    assert!(batch.is_empty());
}

#[test]
fn retiring_an_entry_keeps_positions_dense() {
    let store = registry();
    store.insert_course(course(10, "MATH-201", 1));
    let manager = manager(store.clone(), EnrollmentPolicy::default());
    for id in 1..=3 {
        queue_student(&store, &manager, id);
    }

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::RetireWaitlistEntry {
        student_id: StudentId(2),
        course_id: CourseId(10),
        term_id: TERM,
        processed_on: None,
    });
    store.commit(batch).expect("commit succeeds");

    let queue = store.waitlist(CourseId(10), TERM).expect("store reachable");
    let positions: Vec<(u32, u32)> = queue
        .iter()
        .map(|entry| (entry.student_id.0, entry.position))
        .collect();
    assert_eq!(positions, vec![(1, 1), (3, 2)]);
}

#[test]
fn process_promotes_in_position_order_until_capacity() {
    let store = registry();
    let course_row = course(10, "MATH-201", 3);
    store.insert_course(course_row.clone());
    for id in 1..=3 {
        store.insert_student(student(id, 3.0, 30));
    }
    let manager = manager(store.clone(), EnrollmentPolicy::default());
    for id in 1..=3 {
        queue_student(&store, &manager, id);
    }

    // One seat occupied, two free.
    let evaluator = EligibilityEvaluator::new(store.clone(), EnrollmentPolicy::default());
    let mut batch = WriteBatch::new();
    let promotions = manager
        .process(&mut batch, &course_row, TERM, 1, today(), &evaluator)
        .expect("store reachable");
    store.commit(batch).expect("commit succeeds");

    let promoted: Vec<u32> = promotions.iter().map(|p| p.student_id.0).collect();
    assert_eq!(promoted, vec![1, 2]);

    let queue = store.waitlist(CourseId(10), TERM).expect("store reachable");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].student_id, StudentId(3));
    assert_eq!(queue[0].position, 1);
}

#[test]
fn expired_entries_are_retired_without_a_processed_date() {
    let store = registry();
    let course_row = course(10, "MATH-201", 2);
    store.insert_course(course_row.clone());
    store.insert_student(student(1, 3.0, 30));
    store.insert_student(student(2, 3.0, 30));
    let manager = manager(store.clone(), EnrollmentPolicy::default());
    queue_student(&store, &manager, 1);
    queue_student(&store, &manager, 2);

    // Run processing well past the 30-day horizon.
    let late = d(2026, 11, 15);
    let evaluator = EligibilityEvaluator::new(store.clone(), EnrollmentPolicy::default());
    let mut batch = WriteBatch::new();
    let promotions = manager
        .process(&mut batch, &course_row, TERM, 2, late, &evaluator)
        .expect("store reachable");
    store.commit(batch).expect("commit succeeds");

    assert!(promotions.is_empty());
    assert!(store
        .waitlist(CourseId(10), TERM)
        .expect("store reachable")
        .is_empty());
}

#[test]
fn revalidate_policy_passes_over_ineligible_entries() {
    let store = registry();
    let mut course_row = course(10, "MATH-201", 2);
    course_row.min_gpa = 3.0;
    store.insert_course(course_row.clone());
    store.insert_student(student(1, 2.0, 30));
    store.insert_student(student(2, 3.5, 30));

    let policy = EnrollmentPolicy {
        promotion: PromotionPolicy::Revalidate,
        ..EnrollmentPolicy::default()
    };
    let manager = manager(store.clone(), policy.clone());
    queue_student(&store, &manager, 1);
    queue_student(&store, &manager, 2);

    let evaluator = EligibilityEvaluator::new(store.clone(), policy);
    let mut batch = WriteBatch::new();
    let promotions = manager
        .process(&mut batch, &course_row, TERM, 1, today(), &evaluator)
        .expect("store reachable");
    store.commit(batch).expect("commit succeeds");

    assert_eq!(promotions.len(), 1);
    assert_eq!(promotions[0].student_id, StudentId(2));

    // The passed-over student keeps the head of the queue.
    let queue = store.waitlist(CourseId(10), TERM).expect("store reachable");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].student_id, StudentId(1));
    assert_eq!(queue[0].position, 1);
}
