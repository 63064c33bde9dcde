use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::conflicts::{detect_conflicts, Conflict};
use super::domain::{Course, CourseId, Enrollment, Student, StudentId, TermId};
use super::policy::EnrollmentPolicy;
use super::store::{RegistryStore, StoreError};

/// One named admission check with enough context to render a
/// "why can't I enroll" detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCheck {
    pub name: String,
    pub is_met: bool,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl RequirementCheck {
    fn met(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            is_met: true,
            details: details.into(),
            required: None,
            actual: None,
        }
    }

    fn unmet(
        name: &str,
        details: impl Into<String>,
        required: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            is_met: false,
            details: details.into(),
            required: Some(required.into()),
            actual: Some(actual.into()),
        }
    }
}

/// A required prerequisite the student has not completed at the demanded
/// grade floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingPrerequisite {
    pub course_id: CourseId,
    pub course_code: String,
    pub required_grade: f32,
    pub achieved_grade: Option<f32>,
}

/// Full evaluation for one (student, course, term). All checks run and
/// accumulate; only a missing student/course/term short-circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub term_id: TermId,
    pub is_eligible: bool,
    pub checks: Vec<RequirementCheck>,
    pub missing_requirements: Vec<String>,
    pub missing_prerequisites: Vec<MissingPrerequisite>,
    pub conflicts: Vec<Conflict>,
    pub has_available_seats: bool,
    pub already_enrolled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_gpa: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_passed_hours: Option<u32>,
}

impl EligibilityReport {
    fn not_found(
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
        details: String,
    ) -> Self {
        Self {
            student_id,
            course_id,
            term_id,
            is_eligible: false,
            checks: vec![RequirementCheck {
                name: "record lookup".to_string(),
                is_met: false,
                details: details.clone(),
                required: None,
                actual: None,
            }],
            missing_requirements: vec![details],
            missing_prerequisites: Vec::new(),
            conflicts: Vec::new(),
            has_available_seats: false,
            already_enrolled: false,
            required_gpa: None,
            required_passed_hours: None,
        }
    }
}

/// Stateless evaluator applying the admission rules against the store.
/// Evaluating twice with no intervening writes yields identical reports.
pub struct EligibilityEvaluator<S> {
    store: Arc<S>,
    policy: EnrollmentPolicy,
}

impl<S: RegistryStore> EligibilityEvaluator<S> {
    pub fn new(store: Arc<S>, policy: EnrollmentPolicy) -> Self {
        Self { store, policy }
    }

    pub fn check(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<EligibilityReport, StoreError> {
        let Some(student) = self.store.student(student_id)? else {
            return Ok(EligibilityReport::not_found(
                student_id,
                course_id,
                term_id,
                format!("student {} not found", student_id.0),
            ));
        };
        let Some(course) = self.store.course(course_id)? else {
            return Ok(EligibilityReport::not_found(
                student_id,
                course_id,
                term_id,
                format!("course {} not found", course_id.0),
            ));
        };
        if self.store.term(term_id)?.is_none() {
            return Ok(EligibilityReport::not_found(
                student_id,
                course_id,
                term_id,
                format!("term {} not found", term_id.0),
            ));
        }

        let mut checks = Vec::new();
        let mut required_gpa = None;
        let mut required_passed_hours = None;

        // Grade level is an exact match, not a minimum.
        if student.grade_level == course.grade_level {
            checks.push(RequirementCheck::met(
                "grade level",
                format!("grade level {} matches", course.grade_level),
            ));
        } else {
            checks.push(RequirementCheck::unmet(
                "grade level",
                format!(
                    "course is offered to grade level {}, student is level {}",
                    course.grade_level, student.grade_level
                ),
                course.grade_level.to_string(),
                student.grade_level.to_string(),
            ));
        }

        if student.gpa >= course.min_gpa {
            checks.push(RequirementCheck::met(
                "gpa",
                format!("GPA {:.2} meets minimum {:.2}", student.gpa, course.min_gpa),
            ));
        } else {
            required_gpa = Some(course.min_gpa);
            checks.push(RequirementCheck::unmet(
                "gpa",
                format!(
                    "GPA {:.2} below required {:.2}",
                    student.gpa, course.min_gpa
                ),
                format!("{:.2}", course.min_gpa),
                format!("{:.2}", student.gpa),
            ));
        }

        if student.passed_hours >= course.min_passed_hours {
            checks.push(RequirementCheck::met(
                "passed hours",
                format!(
                    "{} passed hours meet minimum {}",
                    student.passed_hours, course.min_passed_hours
                ),
            ));
        } else {
            required_passed_hours = Some(course.min_passed_hours);
            checks.push(RequirementCheck::unmet(
                "passed hours",
                format!(
                    "{} passed hours below required {}",
                    student.passed_hours, course.min_passed_hours
                ),
                course.min_passed_hours.to_string(),
                student.passed_hours.to_string(),
            ));
        }

        let history = self.store.student_history(student_id)?;
        let missing_prerequisites =
            self.missing_prerequisites_from_history(&course, &history)?;
        if missing_prerequisites.is_empty() {
            checks.push(RequirementCheck::met(
                "prerequisites",
                "all required prerequisites completed",
            ));
        } else {
            let codes: Vec<&str> = missing_prerequisites
                .iter()
                .map(|missing| missing.course_code.as_str())
                .collect();
            checks.push(RequirementCheck::unmet(
                "prerequisites",
                format!("missing prerequisites: {}", codes.join(", ")),
                codes.join(", "),
                "incomplete",
            ));
        }

        let active_count = self.store.active_enrollment_count(course_id, term_id)?;
        let has_available_seats = active_count < course.max_students;
        if has_available_seats {
            checks.push(RequirementCheck::met(
                "capacity",
                format!("{active_count}/{} seats taken", course.max_students),
            ));
        } else {
            checks.push(RequirementCheck::unmet(
                "capacity",
                format!("course is full ({active_count}/{})", course.max_students),
                format!("< {}", course.max_students),
                active_count.to_string(),
            ));
        }

        let already_enrolled = self
            .store
            .student_enrollments(student_id, term_id)?
            .iter()
            .any(|row| row.course_id == course_id && row.is_active());
        if already_enrolled {
            checks.push(RequirementCheck::unmet(
                "duplicate",
                "already actively enrolled in this course for the term",
                "no active enrollment",
                "active enrollment exists",
            ));
        } else {
            checks.push(RequirementCheck::met("duplicate", "no existing enrollment"));
        }

        let conflicts = detect_conflicts(
            self.store.as_ref(),
            &self.policy,
            student_id,
            term_id,
            &[course_id],
        )?;

        // Capacity, duplicates, and prerequisites are reported through their
        // own fields; the requirements list covers the standing checks.
        let missing_requirements: Vec<String> = checks
            .iter()
            .filter(|check| {
                !check.is_met
                    && matches!(check.name.as_str(), "grade level" | "gpa" | "passed hours")
            })
            .map(|check| check.details.clone())
            .collect();

        let is_eligible = missing_requirements.is_empty()
            && missing_prerequisites.is_empty()
            && conflicts.is_empty()
            && has_available_seats
            && !already_enrolled;

        debug!(
            student = student_id.0,
            course = course_id.0,
            term = term_id.0,
            is_eligible,
            "eligibility evaluated"
        );

        Ok(EligibilityReport {
            student_id,
            course_id,
            term_id,
            is_eligible,
            checks,
            missing_requirements,
            missing_prerequisites,
            conflicts,
            has_available_seats,
            already_enrolled,
            required_gpa,
            required_passed_hours,
        })
    }

    /// Required prerequisites the student has not completed with a grade at or
    /// above the per-edge floor (policy default when the edge declares none).
    pub fn missing_prerequisites(
        &self,
        student_id: StudentId,
        course: &Course,
    ) -> Result<Vec<MissingPrerequisite>, StoreError> {
        let history = self.store.student_history(student_id)?;
        self.missing_prerequisites_from_history(course, &history)
    }

    fn missing_prerequisites_from_history(
        &self,
        course: &Course,
        history: &[Enrollment],
    ) -> Result<Vec<MissingPrerequisite>, StoreError> {
        let edges = self.store.prerequisites(course.id)?;
        let mut missing = Vec::new();

        for edge in edges.iter().filter(|edge| edge.required) {
            let floor = edge
                .minimum_grade
                .unwrap_or(self.policy.default_prerequisite_floor);

            let best_completed = history
                .iter()
                .filter(|row| row.course_id == edge.prerequisite_id && row.is_completed())
                .filter_map(|row| row.grade)
                .fold(None::<f32>, |best, grade| match best {
                    Some(current) if current >= grade => Some(current),
                    _ => Some(grade),
                });

            let satisfied = matches!(best_completed, Some(grade) if grade >= floor);
            if !satisfied {
                let code = self
                    .store
                    .course(edge.prerequisite_id)?
                    .map(|prereq| prereq.code)
                    .unwrap_or_else(|| format!("course {}", edge.prerequisite_id.0));
                missing.push(MissingPrerequisite {
                    course_id: edge.prerequisite_id,
                    course_code: code,
                    required_grade: floor,
                    achieved_grade: best_completed,
                });
            }
        }

        Ok(missing)
    }

    /// Direct standing check used by waitlist revalidation, where seat
    /// availability is established by the caller.
    pub(crate) fn meets_standing(&self, student: &Student, course: &Course) -> bool {
        student.grade_level == course.grade_level
            && student.gpa >= course.min_gpa
            && student.passed_hours >= course.min_passed_hours
    }
}
