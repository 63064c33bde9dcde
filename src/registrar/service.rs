use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::domain::{
    CourseId, Enrollment, EnrollmentId, EnrollmentMethod, EnrollmentStatus, GradeStatus,
    RegistrationType, StudentId, TermId, WaitlistEntry,
};
use super::eligibility::{EligibilityEvaluator, EligibilityReport};
use super::notify::{Notice, NoticeError, NoticePublisher};
use super::policy::EnrollmentPolicy;
use super::store::{next_enrollment_id, RegistryStore, StoreError, WriteBatch, WriteOp};
use super::waitlist::{PromotionRecord, WaitlistManager, WaitlistOutcome};

/// Single-enrollment request as received from the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub term_id: TermId,
    pub kind: RegistrationType,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// Structured outcome of a single enrollment attempt. Rule failures are data,
/// not errors; only store/notification faults become `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollmentOutcome {
    Enrolled {
        enrollment_id: EnrollmentId,
        course_code: String,
        report: EligibilityReport,
    },
    Waitlisted {
        position: u32,
        expires_on: NaiveDate,
        report: EligibilityReport,
    },
    AlreadyWaitlisted {
        position: u32,
    },
    Rejected {
        message: String,
        report: EligibilityReport,
    },
    RegistrationClosed {
        message: String,
    },
}

/// Which terminal status a voluntary exit lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    Dropped,
    Withdrawn,
}

impl DropKind {
    fn status(self) -> EnrollmentStatus {
        match self {
            DropKind::Dropped => EnrollmentStatus::Dropped,
            DropKind::Withdrawn => EnrollmentStatus::Withdrawn,
        }
    }
}

/// Result of a drop, including any waitlist promotions the freed seat
/// triggered within the same commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropOutcome {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub promotions: Vec<PromotionRecord>,
}

/// Error raised by the enrollment service.
#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("enrollment {0} not found")]
    NotFound(u64),
    #[error("enrollment {0} is not active")]
    NotActive(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notice(#[from] NoticeError),
}

/// Service composing the eligibility evaluator, waitlist manager, and
/// notification publisher over the transactional store.
pub struct EnrollmentService<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
    policy: EnrollmentPolicy,
    evaluator: EligibilityEvaluator<S>,
    waitlist: WaitlistManager<S>,
}

impl<S, N> EnrollmentService<S, N>
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(store: Arc<S>, notices: Arc<N>, policy: EnrollmentPolicy) -> Self {
        let evaluator = EligibilityEvaluator::new(store.clone(), policy.clone());
        let waitlist = WaitlistManager::new(store.clone(), policy.clone());
        Self {
            store,
            notices,
            policy,
            evaluator,
            waitlist,
        }
    }

    pub fn evaluator(&self) -> &EligibilityEvaluator<S> {
        &self.evaluator
    }

    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    /// Active waitlist entries for a course in position order.
    pub fn waitlist_entries(
        &self,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        self.store.waitlist(course_id, term_id)
    }

    /// Evaluate without writing. Safe to call repeatedly.
    pub fn check_eligibility(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<EligibilityReport, StoreError> {
        self.evaluator.check(student_id, course_id, term_id)
    }

    /// Enroll one student in one course: gate on the registration window,
    /// evaluate eligibility, and either create the enrollment row or fall
    /// back to the waitlist when only seats are missing. Conflicts are
    /// advisory on this path and ride along in the returned report.
    pub fn enroll(
        &self,
        request: EnrollmentRequest,
        today: NaiveDate,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let period = self
            .store
            .registration_period(request.term_id, request.kind)?;
        let window_open = period.map(|period| period.accepts(today)).unwrap_or(false);
        if !window_open {
            return Ok(EnrollmentOutcome::RegistrationClosed {
                message: format!(
                    "{} registration is not open for term {}",
                    request.kind.label(),
                    request.term_id.0
                ),
            });
        }

        let report =
            self.evaluator
                .check(request.student_id, request.course_id, request.term_id)?;

        let blocked = !report.missing_requirements.is_empty()
            || !report.missing_prerequisites.is_empty()
            || report.already_enrolled;
        if blocked {
            let mut reasons = report.missing_requirements.clone();
            if !report.missing_prerequisites.is_empty() {
                let codes: Vec<&str> = report
                    .missing_prerequisites
                    .iter()
                    .map(|missing| missing.course_code.as_str())
                    .collect();
                reasons.push(format!("missing prerequisites: {}", codes.join(", ")));
            }
            if report.already_enrolled {
                reasons.push("already actively enrolled".to_string());
            }
            return Ok(EnrollmentOutcome::Rejected {
                message: reasons.join("; "),
                report,
            });
        }

        let Some(course) = self.store.course(request.course_id)? else {
            return Ok(EnrollmentOutcome::Rejected {
                message: format!("course {} not found", request.course_id.0),
                report,
            });
        };

        if !report.has_available_seats {
            if !course.allow_waitlist {
                return Ok(EnrollmentOutcome::Rejected {
                    message: format!("{} is full and does not keep a waitlist", course.code),
                    report,
                });
            }

            let mut batch = WriteBatch::new();
            let outcome = self.waitlist.join(
                &mut batch,
                request.student_id,
                request.course_id,
                request.term_id,
                today,
            )?;
            return match outcome {
                WaitlistOutcome::Queued {
                    position,
                    expires_on,
                } => {
                    self.store.commit(batch)?;
                    self.notify_student(
                        request.student_id,
                        "enrollment.waitlisted",
                        format!("You are #{position} on the waitlist for {}", course.code),
                    )?;
                    Ok(EnrollmentOutcome::Waitlisted {
                        position,
                        expires_on,
                        report,
                    })
                }
                WaitlistOutcome::AlreadyQueued { position } => {
                    Ok(EnrollmentOutcome::AlreadyWaitlisted { position })
                }
            };
        }

        let enrollment_id = next_enrollment_id();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertEnrollment(Enrollment {
            id: enrollment_id,
            student_id: request.student_id,
            course_id: request.course_id,
            term_id: request.term_id,
            enrolled_on: today,
            status: EnrollmentStatus::Active,
            method: EnrollmentMethod::Regular,
            approved_by: request.requested_by.clone(),
            grade: None,
            grade_letter: None,
            grade_points: None,
            grade_status: GradeStatus::InProgress,
            history: Vec::new(),
        }));
        self.store.commit(batch)?;

        info!(
            student = request.student_id.0,
            course = request.course_id.0,
            term = request.term_id.0,
            "enrollment created"
        );
        self.notify_student(
            request.student_id,
            "enrollment.confirmed",
            format!("You are enrolled in {}", course.code),
        )?;

        Ok(EnrollmentOutcome::Enrolled {
            enrollment_id,
            course_code: course.code,
            report,
        })
    }

    /// Drop or withdraw an active enrollment. When the course keeps a
    /// waitlist, the vacated seat is offered to the queue inside the same
    /// commit, keeping the head entry and the seat consistent.
    pub fn drop_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        kind: DropKind,
        today: NaiveDate,
    ) -> Result<DropOutcome, EnrollmentError> {
        let enrollment = self
            .store
            .enrollment(enrollment_id)?
            .ok_or(EnrollmentError::NotFound(enrollment_id.0))?;
        if !enrollment.is_active() {
            return Err(EnrollmentError::NotActive(enrollment_id.0));
        }

        let status = kind.status();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpdateEnrollmentStatus {
            id: enrollment_id,
            to: status,
            changed_on: today,
            note: format!("student {} request", status.label()),
        });

        let mut promotions = Vec::new();
        if let Some(course) = self.store.course(enrollment.course_id)? {
            if course.allow_waitlist {
                let stored = self
                    .store
                    .active_enrollment_count(enrollment.course_id, enrollment.term_id)?;
                // The drop staged above frees one seat that the stored count
                // still includes.
                let occupied = stored.saturating_sub(1);
                promotions = self.waitlist.process(
                    &mut batch,
                    &course,
                    enrollment.term_id,
                    occupied,
                    today,
                    &self.evaluator,
                )?;
            }
        }

        self.store.commit(batch)?;

        info!(
            enrollment = enrollment_id.0,
            status = status.label(),
            promoted = promotions.len(),
            "enrollment closed"
        );

        for promotion in &promotions {
            if let Err(err) = self.notify_student(
                promotion.student_id,
                "waitlist.promoted",
                "A seat opened up and you have been enrolled".to_string(),
            ) {
                // Promotions are committed; a failed notice must not unwind
                // them.
                warn!(student = promotion.student_id.0, error = %err, "promotion notice failed");
            }
        }

        Ok(DropOutcome {
            enrollment_id,
            status,
            promotions,
        })
    }

    fn notify_student(
        &self,
        student_id: StudentId,
        topic: &str,
        message: String,
    ) -> Result<(), EnrollmentError> {
        let recipient = self
            .store
            .student(student_id)?
            .map(|student| student.code)
            .unwrap_or_else(|| format!("student-{}", student_id.0));
        self.notices.publish(Notice::new(topic, recipient, message))?;
        Ok(())
    }
}
