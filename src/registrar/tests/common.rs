use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::registrar::bulk::BulkEnrollmentOrchestrator;
use crate::registrar::directory::MemoryDirectory;
use crate::registrar::domain::{
    Course, CourseId, CoursePrerequisite, CourseSchedule, DayOfWeek, Enrollment, EnrollmentId,
    EnrollmentMethod, EnrollmentStatus, GradeStatus, RegistrationPeriod, RegistrationType, Student,
    StudentId, Term, TermId,
};
use crate::registrar::notify::{Notice, NoticeError, NoticePublisher};
use crate::registrar::policy::EnrollmentPolicy;
use crate::registrar::router::{registrar_router, RegistrarState};
use crate::registrar::service::EnrollmentService;
use crate::registrar::store::{
    next_enrollment_id, MemoryRegistry, RegistryStore, StoreError, WriteBatch,
};

/// Term every fixture enrolls into.
pub(super) const TERM: TermId = TermId(1);
/// Prior term used for completed-history rows.
pub(super) const PAST_TERM: TermId = TermId(90);

pub(super) fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    d(2026, 9, 1)
}

pub(super) fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn student(id: u32, gpa: f32, passed_hours: u32) -> Student {
    Student {
        id: StudentId(id),
        code: format!("S-{id:04}"),
        name: format!("Student {id}"),
        grade_level: 10,
        gpa,
        passed_hours,
        active: true,
    }
}

pub(super) fn course(id: u32, code: &str, max_students: u32) -> Course {
    Course {
        id: CourseId(id),
        code: code.to_string(),
        name: format!("{code} lecture"),
        credits: 3,
        department: "MATH".to_string(),
        term_id: TERM,
        grade_level: 10,
        min_gpa: 2.0,
        min_passed_hours: 0,
        max_students,
        schedule: None,
        allow_waitlist: true,
        active: true,
    }
}

pub(super) fn schedule(
    days: &[DayOfWeek],
    starts: NaiveTime,
    ends: NaiveTime,
    room: Option<&str>,
) -> CourseSchedule {
    CourseSchedule {
        days: days.to_vec(),
        starts_at: starts,
        ends_at: ends,
        room: room.map(str::to_string),
    }
}

pub(super) fn prerequisite(course: u32, prereq: u32, floor: Option<f32>) -> CoursePrerequisite {
    CoursePrerequisite {
        course_id: CourseId(course),
        prerequisite_id: CourseId(prereq),
        minimum_grade: floor,
        required: true,
    }
}

/// Completed prior-term enrollment row for prerequisite and GPA history.
pub(super) fn completed(student: u32, course: u32, grade: f32, points: f32) -> Enrollment {
    Enrollment {
        id: next_enrollment_id(),
        student_id: StudentId(student),
        course_id: CourseId(course),
        term_id: PAST_TERM,
        enrolled_on: d(2026, 1, 15),
        status: EnrollmentStatus::Active,
        method: EnrollmentMethod::Regular,
        approved_by: None,
        grade: Some(grade),
        grade_letter: None,
        grade_points: Some(points),
        grade_status: GradeStatus::Completed,
        history: Vec::new(),
    }
}

pub(super) fn active_enrollment(student: u32, course: u32) -> Enrollment {
    Enrollment {
        id: next_enrollment_id(),
        student_id: StudentId(student),
        course_id: CourseId(course),
        term_id: TERM,
        enrolled_on: today(),
        status: EnrollmentStatus::Active,
        method: EnrollmentMethod::Regular,
        approved_by: None,
        grade: None,
        grade_letter: None,
        grade_points: None,
        grade_status: GradeStatus::InProgress,
        history: Vec::new(),
    }
}

pub(super) fn open_period(kind: RegistrationType) -> RegistrationPeriod {
    RegistrationPeriod {
        term_id: TERM,
        kind,
        opens_on: d(2026, 8, 1),
        closes_on: d(2026, 12, 20),
        open: true,
        active: true,
    }
}

/// Registry seeded with the fixture term and open regular/bulk windows.
pub(super) fn registry() -> Arc<MemoryRegistry> {
    let store = Arc::new(MemoryRegistry::new());
    store.insert_term(Term {
        id: TERM,
        name: "Fall 2026".to_string(),
    });
    store.insert_period(open_period(RegistrationType::Regular));
    store.insert_period(open_period(RegistrationType::Bulk));
    store
}

pub(super) fn build_service(
    store: Arc<MemoryRegistry>,
) -> (
    EnrollmentService<MemoryRegistry, MemoryNotices>,
    Arc<MemoryNotices>,
) {
    let notices = Arc::new(MemoryNotices::default());
    let service = EnrollmentService::new(store, notices.clone(), EnrollmentPolicy::default());
    (service, notices)
}

pub(super) fn build_router(
    store: Arc<MemoryRegistry>,
    directory: MemoryDirectory,
) -> (axum::Router, Arc<MemoryNotices>) {
    let (service, notices) = build_service(store.clone());
    let state = RegistrarState {
        enrollments: Arc::new(service),
        bulk: Arc::new(BulkEnrollmentOrchestrator::new(
            store,
            EnrollmentPolicy::default(),
        )),
        directory: Arc::new(directory),
    };
    (registrar_router(state), notices)
}

#[derive(Default)]
pub(super) struct MemoryNotices {
    events: Mutex<Vec<Notice>>,
}

impl MemoryNotices {
    pub(super) fn events(&self) -> Vec<Notice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

impl NoticePublisher for MemoryNotices {
    fn publish(&self, notice: Notice) -> Result<(), NoticeError> {
        self.events
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

/// Store whose every call fails, for fault-path coverage.
pub(super) struct UnavailableRegistry;

impl UnavailableRegistry {
    fn offline<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl RegistryStore for UnavailableRegistry {
    fn student(&self, _id: StudentId) -> Result<Option<Student>, StoreError> {
        Self::offline()
    }

    fn students(&self, _ids: &[StudentId]) -> Result<HashMap<StudentId, Student>, StoreError> {
        Self::offline()
    }

    fn course(&self, _id: CourseId) -> Result<Option<Course>, StoreError> {
        Self::offline()
    }

    fn courses(&self, _ids: &[CourseId]) -> Result<HashMap<CourseId, Course>, StoreError> {
        Self::offline()
    }

    fn term(&self, _id: TermId) -> Result<Option<Term>, StoreError> {
        Self::offline()
    }

    fn prerequisites(
        &self,
        _course_id: CourseId,
    ) -> Result<Vec<CoursePrerequisite>, StoreError> {
        Self::offline()
    }

    fn enrollment(&self, _id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        Self::offline()
    }

    fn student_enrollments(
        &self,
        _student_id: StudentId,
        _term_id: TermId,
    ) -> Result<Vec<Enrollment>, StoreError> {
        Self::offline()
    }

    fn student_history(&self, _student_id: StudentId) -> Result<Vec<Enrollment>, StoreError> {
        Self::offline()
    }

    fn active_enrollment_count(
        &self,
        _course_id: CourseId,
        _term_id: TermId,
    ) -> Result<u32, StoreError> {
        Self::offline()
    }

    fn active_enrollment_counts(
        &self,
        _course_ids: &[CourseId],
        _term_id: TermId,
    ) -> Result<HashMap<CourseId, u32>, StoreError> {
        Self::offline()
    }

    fn waitlist(
        &self,
        _course_id: CourseId,
        _term_id: TermId,
    ) -> Result<Vec<crate::registrar::domain::WaitlistEntry>, StoreError> {
        Self::offline()
    }

    fn registration_period(
        &self,
        _term_id: TermId,
        _kind: RegistrationType,
    ) -> Result<Option<RegistrationPeriod>, StoreError> {
        Self::offline()
    }

    fn commit(&self, _batch: WriteBatch) -> Result<(), StoreError> {
        Self::offline()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
