use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;

use super::domain::{
    Course, CourseId, CoursePrerequisite, Enrollment, EnrollmentId, EnrollmentStatus, GradeStatus,
    RegistrationPeriod, RegistrationType, StatusChange, Student, StudentId, Term, TermId,
    WaitlistEntry,
};

/// Failures raised by the transactional store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("active enrollment already exists for student {student} in course {course} (term {term})")]
    UniqueActiveEnrollment { student: u32, course: u32, term: u32 },
    #[error("course {0} may not list itself as a prerequisite")]
    SelfPrerequisite(u32),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One row-level mutation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    InsertEnrollment(Enrollment),
    UpdateEnrollmentStatus {
        id: EnrollmentId,
        to: EnrollmentStatus,
        changed_on: NaiveDate,
        note: String,
    },
    RecordGrade {
        id: EnrollmentId,
        grade: f32,
        letter: String,
        points: f32,
        status: GradeStatus,
    },
    UpdateStanding {
        student_id: StudentId,
        gpa: f32,
        passed_hours: u32,
    },
    InsertWaitlistEntry(WaitlistEntry),
    /// Deactivate a waitlist entry and compact the positions behind it so the
    /// dense 1..N invariant holds after every commit.
    RetireWaitlistEntry {
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
        processed_on: Option<NaiveDate>,
    },
}

/// Ordered list of writes committed as a single unit: either every op lands
/// or none do.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Query/command boundary to the relational store. Reads are point or batched
/// prefetch lookups; all writes flow through [`RegistryStore::commit`], which
/// is atomic and enforces the one-active-enrollment-per-triple constraint.
pub trait RegistryStore: Send + Sync {
    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;
    fn students(&self, ids: &[StudentId]) -> Result<HashMap<StudentId, Student>, StoreError>;
    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;
    fn courses(&self, ids: &[CourseId]) -> Result<HashMap<CourseId, Course>, StoreError>;
    fn term(&self, id: TermId) -> Result<Option<Term>, StoreError>;
    fn prerequisites(&self, course_id: CourseId) -> Result<Vec<CoursePrerequisite>, StoreError>;
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError>;
    /// Every enrollment row for the student in the term, any status.
    fn student_enrollments(
        &self,
        student_id: StudentId,
        term_id: TermId,
    ) -> Result<Vec<Enrollment>, StoreError>;
    /// Full enrollment history across terms, for prerequisite checks and GPA
    /// recalculation.
    fn student_history(&self, student_id: StudentId) -> Result<Vec<Enrollment>, StoreError>;
    fn active_enrollment_count(
        &self,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<u32, StoreError>;
    fn active_enrollment_counts(
        &self,
        course_ids: &[CourseId],
        term_id: TermId,
    ) -> Result<HashMap<CourseId, u32>, StoreError>;
    /// Active waitlist entries for (course, term), ordered by position.
    fn waitlist(&self, course_id: CourseId, term_id: TermId)
        -> Result<Vec<WaitlistEntry>, StoreError>;
    fn registration_period(
        &self,
        term_id: TermId,
        kind: RegistrationType,
    ) -> Result<Option<RegistrationPeriod>, StoreError>;
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

static ENROLLMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Mint a process-unique enrollment id for a row about to be inserted.
pub fn next_enrollment_id() -> EnrollmentId {
    EnrollmentId(ENROLLMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Default)]
struct RegistryData {
    students: HashMap<StudentId, Student>,
    courses: HashMap<CourseId, Course>,
    terms: HashMap<TermId, Term>,
    prerequisites: Vec<CoursePrerequisite>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    waitlist: Vec<WaitlistEntry>,
    periods: Vec<RegistrationPeriod>,
}

impl RegistryData {
    fn has_active_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        term_id: TermId,
    ) -> bool {
        self.enrollments.values().any(|row| {
            row.student_id == student_id
                && row.course_id == course_id
                && row.term_id == term_id
                && row.is_active()
        })
    }
}

/// In-memory `RegistryStore` used by the demo binary and the test suites.
/// Commit validates the entire batch against current data (and against rows
/// inserted earlier in the same batch) before applying anything, so a failed
/// batch leaves the registry untouched.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: Mutex<RegistryData>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_term(&self, term: Term) {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.terms.insert(term.id, term);
    }

    pub fn insert_student(&self, student: Student) {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.students.insert(student.id, student);
    }

    pub fn insert_course(&self, course: Course) {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.courses.insert(course.id, course);
    }

    /// Add a prerequisite edge, rejecting a course that lists itself.
    pub fn insert_prerequisite(&self, edge: CoursePrerequisite) -> Result<(), StoreError> {
        if edge.course_id == edge.prerequisite_id {
            return Err(StoreError::SelfPrerequisite(edge.course_id.0));
        }
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.prerequisites.push(edge);
        Ok(())
    }

    pub fn insert_period(&self, period: RegistrationPeriod) {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.periods.push(period);
    }

    /// Seed an enrollment row directly, bypassing batch validation. Test and
    /// fixture plumbing only.
    pub fn seed_enrollment(&self, enrollment: Enrollment) {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        data.enrollments.insert(enrollment.id, enrollment);
    }

    fn validate(data: &RegistryData, batch: &WriteBatch) -> Result<(), StoreError> {
        // Track triples inserted earlier in this batch so a single batch
        // cannot smuggle in a duplicate either.
        let mut pending_active: Vec<(StudentId, CourseId, TermId)> = Vec::new();
        let mut pending_waitlist: Vec<(StudentId, CourseId, TermId)> = Vec::new();

        for op in batch.ops() {
            match op {
                WriteOp::InsertEnrollment(row) => {
                    if row.is_active() {
                        let triple = (row.student_id, row.course_id, row.term_id);
                        if data.has_active_enrollment(row.student_id, row.course_id, row.term_id)
                            || pending_active.contains(&triple)
                        {
                            return Err(StoreError::UniqueActiveEnrollment {
                                student: row.student_id.0,
                                course: row.course_id.0,
                                term: row.term_id.0,
                            });
                        }
                        pending_active.push(triple);
                    }
                }
                WriteOp::UpdateEnrollmentStatus { id, .. } | WriteOp::RecordGrade { id, .. } => {
                    if !data.enrollments.contains_key(id) {
                        return Err(StoreError::NotFound(format!("enrollment {}", id.0)));
                    }
                }
                WriteOp::UpdateStanding { student_id, .. } => {
                    if !data.students.contains_key(student_id) {
                        return Err(StoreError::NotFound(format!("student {}", student_id.0)));
                    }
                }
                WriteOp::InsertWaitlistEntry(entry) => {
                    pending_waitlist.push((entry.student_id, entry.course_id, entry.term_id));
                }
                WriteOp::RetireWaitlistEntry {
                    student_id,
                    course_id,
                    term_id,
                    ..
                } => {
                    let triple = (*student_id, *course_id, *term_id);
                    let stored = data.waitlist.iter().any(|entry| {
                        entry.active
                            && entry.student_id == *student_id
                            && entry.course_id == *course_id
                            && entry.term_id == *term_id
                    });
                    if !stored && !pending_waitlist.contains(&triple) {
                        return Err(StoreError::NotFound(format!(
                            "waitlist entry for student {} in course {}",
                            student_id.0, course_id.0
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn apply(data: &mut RegistryData, batch: WriteBatch) {
        for op in batch.ops {
            match op {
                WriteOp::InsertEnrollment(row) => {
                    data.enrollments.insert(row.id, row);
                }
                WriteOp::UpdateEnrollmentStatus {
                    id,
                    to,
                    changed_on,
                    note,
                } => {
                    if let Some(row) = data.enrollments.get_mut(&id) {
                        row.history.push(StatusChange {
                            from: row.status,
                            to,
                            changed_on,
                            note,
                        });
                        row.status = to;
                    }
                }
                WriteOp::RecordGrade {
                    id,
                    grade,
                    letter,
                    points,
                    status,
                } => {
                    if let Some(row) = data.enrollments.get_mut(&id) {
                        row.grade = Some(grade);
                        row.grade_letter = Some(letter);
                        row.grade_points = Some(points);
                        row.grade_status = status;
                    }
                }
                WriteOp::UpdateStanding {
                    student_id,
                    gpa,
                    passed_hours,
                } => {
                    if let Some(student) = data.students.get_mut(&student_id) {
                        student.gpa = gpa;
                        student.passed_hours = passed_hours;
                    }
                }
                WriteOp::InsertWaitlistEntry(entry) => {
                    data.waitlist.push(entry);
                }
                WriteOp::RetireWaitlistEntry {
                    student_id,
                    course_id,
                    term_id,
                    processed_on,
                } => {
                    let mut removed_position = None;
                    for entry in data.waitlist.iter_mut() {
                        if entry.active
                            && entry.student_id == student_id
                            && entry.course_id == course_id
                            && entry.term_id == term_id
                        {
                            entry.active = false;
                            entry.processed_on = processed_on;
                            removed_position = Some(entry.position);
                            break;
                        }
                    }
                    if let Some(position) = removed_position {
                        for entry in data.waitlist.iter_mut() {
                            if entry.active
                                && entry.course_id == course_id
                                && entry.term_id == term_id
                                && entry.position > position
                            {
                                entry.position -= 1;
                            }
                        }
                    }
                }
            }
        }
    }
}

impl RegistryStore for MemoryRegistry {
    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data.students.get(&id).cloned())
    }

    fn students(&self, ids: &[StudentId]) -> Result<HashMap<StudentId, Student>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| data.students.get(id).cloned().map(|row| (*id, row)))
            .collect())
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data.courses.get(&id).cloned())
    }

    fn courses(&self, ids: &[CourseId]) -> Result<HashMap<CourseId, Course>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| data.courses.get(id).cloned().map(|row| (*id, row)))
            .collect())
    }

    fn term(&self, id: TermId) -> Result<Option<Term>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data.terms.get(&id).cloned())
    }

    fn prerequisites(&self, course_id: CourseId) -> Result<Vec<CoursePrerequisite>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data
            .prerequisites
            .iter()
            .filter(|edge| edge.course_id == course_id)
            .cloned()
            .collect())
    }

    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data.enrollments.get(&id).cloned())
    }

    fn student_enrollments(
        &self,
        student_id: StudentId,
        term_id: TermId,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data
            .enrollments
            .values()
            .filter(|row| row.student_id == student_id && row.term_id == term_id)
            .cloned()
            .collect())
    }

    fn student_history(&self, student_id: StudentId) -> Result<Vec<Enrollment>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data
            .enrollments
            .values()
            .filter(|row| row.student_id == student_id)
            .cloned()
            .collect())
    }

    fn active_enrollment_count(
        &self,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<u32, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data
            .enrollments
            .values()
            .filter(|row| row.course_id == course_id && row.term_id == term_id && row.is_active())
            .count() as u32)
    }

    fn active_enrollment_counts(
        &self,
        course_ids: &[CourseId],
        term_id: TermId,
    ) -> Result<HashMap<CourseId, u32>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        let mut counts: HashMap<CourseId, u32> =
            course_ids.iter().map(|id| (*id, 0)).collect();
        for row in data.enrollments.values() {
            if row.term_id == term_id && row.is_active() {
                if let Some(count) = counts.get_mut(&row.course_id) {
                    *count += 1;
                }
            }
        }
        Ok(counts)
    }

    fn waitlist(
        &self,
        course_id: CourseId,
        term_id: TermId,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        let mut entries: Vec<WaitlistEntry> = data
            .waitlist
            .iter()
            .filter(|entry| {
                entry.active && entry.course_id == course_id && entry.term_id == term_id
            })
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.position);
        Ok(entries)
    }

    fn registration_period(
        &self,
        term_id: TermId,
        kind: RegistrationType,
    ) -> Result<Option<RegistrationPeriod>, StoreError> {
        let data = self.inner.lock().expect("registry mutex poisoned");
        Ok(data
            .periods
            .iter()
            .find(|period| period.term_id == term_id && period.kind == kind)
            .cloned())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut data = self.inner.lock().expect("registry mutex poisoned");
        Self::validate(&data, &batch)?;
        Self::apply(&mut data, batch);
        Ok(())
    }
}
