use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Course, CourseId, Enrollment, EnrollmentId, EnrollmentMethod, EnrollmentStatus, GradeStatus,
    StudentId, TermId, WaitlistEntry,
};
use super::eligibility::EligibilityEvaluator;
use super::policy::{EnrollmentPolicy, PromotionPolicy};
use super::store::{next_enrollment_id, RegistryStore, StoreError, WriteBatch, WriteOp};

/// Result of asking to join a waitlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaitlistOutcome {
    Queued { position: u32, expires_on: NaiveDate },
    AlreadyQueued { position: u32 },
}

/// A head-of-queue entry promoted into a real enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub student_id: StudentId,
    pub enrollment_id: EnrollmentId,
    pub position: u32,
}

/// Capacity-and-waitlist bookkeeping. All mutations are staged into the
/// caller's [`WriteBatch`] so waitlist changes commit atomically with the
/// enrollment writes that caused them.
pub struct WaitlistManager<S> {
    store: Arc<S>,
    policy: EnrollmentPolicy,
}

impl<S: RegistryStore> WaitlistManager<S> {
    pub fn new(store: Arc<S>, policy: EnrollmentPolicy) -> Self {
        Self { store, policy }
    }

    /// Append the student behind the current active entries, or report the
    /// existing position if the triple is already queued.
    pub fn join(
        &self,
        batch: &mut WriteBatch,
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
        today: NaiveDate,
    ) -> Result<WaitlistOutcome, StoreError> {
        let queue = self.store.waitlist(course_id, term_id)?;
        if let Some(existing) = queue.iter().find(|entry| entry.student_id == student_id) {
            return Ok(WaitlistOutcome::AlreadyQueued {
                position: existing.position,
            });
        }

        let position = queue.len() as u32 + 1;
        let expires_on = today + Duration::days(self.policy.waitlist_expiry_days);
        batch.push(WriteOp::InsertWaitlistEntry(WaitlistEntry {
            student_id,
            course_id,
            term_id,
            position,
            added_on: today,
            expires_on,
            active: true,
            processed_on: None,
        }));

        info!(
            student = student_id.0,
            course = course_id.0,
            position,
            "student queued on waitlist"
        );

        Ok(WaitlistOutcome::Queued {
            position,
            expires_on,
        })
    }

    /// Walk the queue in position order and promote entries while seats
    /// remain, staging the new enrollment rows and entry retirements.
    ///
    /// `occupied` is the seat count the caller knows to be true once its own
    /// staged writes land (e.g. one less than the stored count during a
    /// drop). Expired entries are retired as they are encountered. Under
    /// [`PromotionPolicy::Revalidate`] entries that no longer qualify are
    /// passed over and keep their position.
    pub fn process(
        &self,
        batch: &mut WriteBatch,
        course: &Course,
        term_id: TermId,
        mut occupied: u32,
        today: NaiveDate,
        evaluator: &EligibilityEvaluator<S>,
    ) -> Result<Vec<PromotionRecord>, StoreError> {
        let mut promotions = Vec::new();
        let queue = self.store.waitlist(course.id, term_id)?;

        for entry in queue {
            // Expired entries are retired whether or not a seat is free, so a
            // full course cannot pin stale entries at the head of the queue.
            if entry.expires_on < today {
                batch.push(WriteOp::RetireWaitlistEntry {
                    student_id: entry.student_id,
                    course_id: entry.course_id,
                    term_id: entry.term_id,
                    processed_on: None,
                });
                continue;
            }

            if occupied >= course.max_students {
                break;
            }

            if self.policy.promotion == PromotionPolicy::Revalidate {
                let still_eligible = match self.store.student(entry.student_id)? {
                    Some(student) => {
                        evaluator.meets_standing(&student, course)
                            && evaluator
                                .missing_prerequisites(entry.student_id, course)?
                                .is_empty()
                    }
                    None => false,
                };
                if !still_eligible {
                    continue;
                }
            }

            let enrollment_id = next_enrollment_id();
            batch.push(WriteOp::InsertEnrollment(Enrollment {
                id: enrollment_id,
                student_id: entry.student_id,
                course_id: course.id,
                term_id,
                enrolled_on: today,
                status: EnrollmentStatus::Active,
                method: EnrollmentMethod::WaitlistPromotion,
                approved_by: None,
                grade: None,
                grade_letter: None,
                grade_points: None,
                grade_status: GradeStatus::InProgress,
                history: Vec::new(),
            }));
            batch.push(WriteOp::RetireWaitlistEntry {
                student_id: entry.student_id,
                course_id: entry.course_id,
                term_id: entry.term_id,
                processed_on: Some(today),
            });

            info!(
                student = entry.student_id.0,
                course = course.id.0,
                position = entry.position,
                "waitlist entry promoted"
            );

            promotions.push(PromotionRecord {
                student_id: entry.student_id,
                enrollment_id,
                position: entry.position,
            });
            occupied += 1;
        }

        Ok(promotions)
    }
}
