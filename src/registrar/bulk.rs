use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::domain::{
    Course, CourseId, CoursePrerequisite, Enrollment, EnrollmentMethod, EnrollmentStatus,
    GradeStatus, RegistrationType, Student, StudentId, TermId,
};
use super::policy::EnrollmentPolicy;
use super::store::{next_enrollment_id, RegistryStore, StoreError, WriteBatch, WriteOp};

/// Batch request: every student in `student_ids` is considered for every
/// course in `course_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEnrollmentRequest {
    pub term_id: TermId,
    pub student_ids: Vec<StudentId>,
    pub course_ids: Vec<CourseId>,
    pub kind: RegistrationType,
    pub requested_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request-shape failures reported before any store work happens.
#[derive(Debug, Error)]
pub enum BulkRequestError {
    #[error("bulk enrollment requires at least one student")]
    EmptyStudents,
    #[error("bulk enrollment requires at least one course")]
    EmptyCourses,
    #[error("term {0} not found")]
    UnknownTerm(u32),
}

/// Per-pair outcome: `success` means an enrollment row was created in this
/// batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub success: bool,
    pub message: String,
}

/// Classification of one student across the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentBatchStatus {
    Success,
    Partial,
    Failed,
}

impl StudentBatchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StudentBatchStatus::Success => "Success",
            StudentBatchStatus::Partial => "Partial",
            StudentBatchStatus::Failed => "Failed",
        }
    }
}

/// Per-student detail within the batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentOutcome {
    pub student_id: StudentId,
    pub student_name: String,
    pub student_code: String,
    pub status: StudentBatchStatus,
    pub courses: Vec<CourseOutcome>,
}

/// Aggregate batch result. `successfully_enrolled` counts non-Failed
/// students; `failure` is set only when the whole batch rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEnrollmentReport {
    pub total_students: u32,
    pub successfully_enrolled: u32,
    pub failed_enrollments: u32,
    pub term_name: String,
    pub results: Vec<StudentOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Applies eligibility and capacity across every (student, course) pair in a
/// batch, buffering all writes and committing them as one unit. The only
/// mutable state is a batch-scoped seat counter map; it is never shared
/// across requests.
pub struct BulkEnrollmentOrchestrator<S> {
    store: Arc<S>,
    policy: EnrollmentPolicy,
}

impl<S: RegistryStore> BulkEnrollmentOrchestrator<S> {
    pub fn new(store: Arc<S>, policy: EnrollmentPolicy) -> Self {
        Self { store, policy }
    }

    pub fn process(
        &self,
        request: &BulkEnrollmentRequest,
        today: NaiveDate,
    ) -> Result<BulkEnrollmentReport, BulkRequestError> {
        if request.student_ids.is_empty() {
            return Err(BulkRequestError::EmptyStudents);
        }
        if request.course_ids.is_empty() {
            return Err(BulkRequestError::EmptyCourses);
        }

        let term = match self.store.term(request.term_id) {
            Ok(Some(term)) => term,
            Ok(None) => return Err(BulkRequestError::UnknownTerm(request.term_id.0)),
            Err(err) => return Ok(self.rolled_back(request, String::new(), &err)),
        };

        match self.run(request, &term.name, today) {
            Ok(report) => Ok(report),
            Err(err) => {
                // A store-level fault voids the whole batch: the commit never
                // happened (or was rejected), so zero successes are reported.
                error!(term = request.term_id.0, error = %err, "bulk enrollment rolled back");
                Ok(self.rolled_back(request, term.name, &err))
            }
        }
    }

    fn rolled_back(
        &self,
        request: &BulkEnrollmentRequest,
        term_name: String,
        err: &StoreError,
    ) -> BulkEnrollmentReport {
        let total = request.student_ids.len() as u32;
        BulkEnrollmentReport {
            total_students: total,
            successfully_enrolled: 0,
            failed_enrollments: total,
            term_name,
            results: Vec::new(),
            failure: Some(format!("batch rolled back: {err}")),
        }
    }

    fn run(
        &self,
        request: &BulkEnrollmentRequest,
        term_name: &str,
        today: NaiveDate,
    ) -> Result<BulkEnrollmentReport, StoreError> {
        let term_id = request.term_id;

        // One round trip per entity kind; everything below works off these
        // maps and the batch-local seat counters.
        let students = self.store.students(&request.student_ids)?;
        let courses = self.store.courses(&request.course_ids)?;
        let mut seat_counts = self
            .store
            .active_enrollment_counts(&request.course_ids, term_id)?;

        let mut prerequisite_edges: HashMap<CourseId, Vec<CoursePrerequisite>> = HashMap::new();
        let mut prerequisite_ids: Vec<CourseId> = Vec::new();
        for course_id in &request.course_ids {
            let edges = self.store.prerequisites(*course_id)?;
            prerequisite_ids.extend(edges.iter().map(|edge| edge.prerequisite_id));
            prerequisite_edges.insert(*course_id, edges);
        }
        let prerequisite_courses = self.store.courses(&prerequisite_ids)?;

        let mut batch = WriteBatch::new();
        let mut results = Vec::with_capacity(request.student_ids.len());

        for student_id in &request.student_ids {
            let Some(student) = students.get(student_id) else {
                results.push(StudentOutcome {
                    student_id: *student_id,
                    student_name: "unknown".to_string(),
                    student_code: String::new(),
                    status: StudentBatchStatus::Failed,
                    courses: request
                        .course_ids
                        .iter()
                        .map(|course_id| CourseOutcome {
                            course_id: *course_id,
                            course_code: String::new(),
                            course_name: String::new(),
                            success: false,
                            message: format!("student {} not found", student_id.0),
                        })
                        .collect(),
                });
                continue;
            };

            let history = self.store.student_history(*student_id)?;
            let mut enrolled_courses: HashSet<CourseId> = history
                .iter()
                .filter(|row| row.term_id == term_id && row.is_active())
                .map(|row| row.course_id)
                .collect();

            let mut outcomes = Vec::with_capacity(request.course_ids.len());
            let mut satisfied = 0u32;

            for course_id in &request.course_ids {
                let Some(course) = courses.get(course_id) else {
                    outcomes.push(CourseOutcome {
                        course_id: *course_id,
                        course_code: String::new(),
                        course_name: String::new(),
                        success: false,
                        message: format!("course {} not found", course_id.0),
                    });
                    continue;
                };

                let outcome = self.evaluate_pair(
                    student,
                    course,
                    &history,
                    &enrolled_courses,
                    &prerequisite_edges,
                    &prerequisite_courses,
                    &mut seat_counts,
                );

                match outcome {
                    PairDecision::AlreadyEnrolled => {
                        satisfied += 1;
                        outcomes.push(CourseOutcome {
                            course_id: *course_id,
                            course_code: course.code.clone(),
                            course_name: course.name.clone(),
                            success: false,
                            message: format!("already enrolled in {} for this term", course.code),
                        });
                    }
                    PairDecision::Skip(message) => {
                        outcomes.push(CourseOutcome {
                            course_id: *course_id,
                            course_code: course.code.clone(),
                            course_name: course.name.clone(),
                            success: false,
                            message,
                        });
                    }
                    PairDecision::Enroll => {
                        batch.push(WriteOp::InsertEnrollment(Enrollment {
                            id: next_enrollment_id(),
                            student_id: *student_id,
                            course_id: *course_id,
                            term_id,
                            enrolled_on: today,
                            status: EnrollmentStatus::Active,
                            method: EnrollmentMethod::Bulk,
                            approved_by: Some(request.requested_by.clone()),
                            grade: None,
                            grade_letter: None,
                            grade_points: None,
                            grade_status: GradeStatus::InProgress,
                            history: Vec::new(),
                        }));
                        enrolled_courses.insert(*course_id);
                        satisfied += 1;
                        outcomes.push(CourseOutcome {
                            course_id: *course_id,
                            course_code: course.code.clone(),
                            course_name: course.name.clone(),
                            success: true,
                            message: format!("enrolled in {}", course.code),
                        });
                    }
                }
            }

            let requested = request.course_ids.len() as u32;
            let status = if satisfied == 0 {
                StudentBatchStatus::Failed
            } else if satisfied == requested {
                StudentBatchStatus::Success
            } else {
                StudentBatchStatus::Partial
            };

            results.push(StudentOutcome {
                student_id: *student_id,
                student_name: student.name.clone(),
                student_code: student.code.clone(),
                status,
                courses: outcomes,
            });
        }

        if !batch.is_empty() {
            self.store.commit(batch)?;
        }

        let total_students = results.len() as u32;
        let failed_enrollments = results
            .iter()
            .filter(|outcome| outcome.status == StudentBatchStatus::Failed)
            .count() as u32;
        let successfully_enrolled = total_students - failed_enrollments;

        info!(
            term = term_id.0,
            total_students,
            successfully_enrolled,
            failed_enrollments,
            requested_by = %request.requested_by,
            "bulk enrollment committed"
        );

        Ok(BulkEnrollmentReport {
            total_students,
            successfully_enrolled,
            failed_enrollments,
            term_name: term_name.to_string(),
            results,
            failure: None,
        })
    }

    /// Pair checks in fixed order: duplicate, prerequisites, capacity against
    /// the batch counter, then GPA and passed hours. First failure wins.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_pair(
        &self,
        student: &Student,
        course: &Course,
        history: &[Enrollment],
        enrolled_courses: &HashSet<CourseId>,
        prerequisite_edges: &HashMap<CourseId, Vec<CoursePrerequisite>>,
        prerequisite_courses: &HashMap<CourseId, Course>,
        seat_counts: &mut HashMap<CourseId, u32>,
    ) -> PairDecision {
        if enrolled_courses.contains(&course.id) {
            return PairDecision::AlreadyEnrolled;
        }

        if let Some(edges) = prerequisite_edges.get(&course.id) {
            let mut missing = Vec::new();
            for edge in edges.iter().filter(|edge| edge.required) {
                let floor = edge
                    .minimum_grade
                    .unwrap_or(self.policy.default_prerequisite_floor);
                let met = history.iter().any(|row| {
                    row.course_id == edge.prerequisite_id
                        && row.is_completed()
                        && row.grade.map(|grade| grade >= floor).unwrap_or(false)
                });
                if !met {
                    let code = prerequisite_courses
                        .get(&edge.prerequisite_id)
                        .map(|prereq| prereq.code.clone())
                        .unwrap_or_else(|| format!("course {}", edge.prerequisite_id.0));
                    missing.push(code);
                }
            }
            if !missing.is_empty() {
                return PairDecision::Skip(format!(
                    "missing prerequisites: {}",
                    missing.join(", ")
                ));
            }
        }

        let seats_taken = seat_counts.get(&course.id).copied().unwrap_or(0);
        if seats_taken >= course.max_students {
            return PairDecision::Skip(format!(
                "{} is full ({seats_taken}/{})",
                course.code, course.max_students
            ));
        }

        if student.gpa < course.min_gpa {
            return PairDecision::Skip(format!(
                "GPA {:.2} below required {:.2}",
                student.gpa, course.min_gpa
            ));
        }

        if student.passed_hours < course.min_passed_hours {
            return PairDecision::Skip(format!(
                "{} passed hours below required {}",
                student.passed_hours, course.min_passed_hours
            ));
        }

        *seat_counts.entry(course.id).or_insert(0) += 1;
        PairDecision::Enroll
    }
}

enum PairDecision {
    AlreadyEnrolled,
    Skip(String),
    Enroll,
}
