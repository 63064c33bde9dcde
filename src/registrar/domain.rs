use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Upper bound of the grade-point scale. Student GPA never exceeds this.
pub const GPA_SCALE_MAX: f32 = 4.0;

/// Identifier wrapper for roster students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub u32);

/// Identifier wrapper for catalog courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub u32);

/// Identifier wrapper for academic terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

/// Identifier wrapper for enrollment rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub u64);

/// Roster entry for a student, including the standing fields the eligibility
/// rules read (grade level, GPA, cumulative passed hours).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub code: String,
    pub name: String,
    pub grade_level: u8,
    pub gpa: f32,
    pub passed_hours: u32,
    pub active: bool,
}

/// An academic period scoping enrollments, capacity, and waitlists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
}

/// Day-of-week component of a course schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const fn label(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Mon",
            DayOfWeek::Tuesday => "Tue",
            DayOfWeek::Wednesday => "Wed",
            DayOfWeek::Thursday => "Thu",
            DayOfWeek::Friday => "Fri",
            DayOfWeek::Saturday => "Sat",
            DayOfWeek::Sunday => "Sun",
        }
    }
}

/// Meeting pattern for a course section: day set, time window, and room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSchedule {
    pub days: Vec<DayOfWeek>,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub room: Option<String>,
}

impl CourseSchedule {
    /// Days this schedule shares with another, in this schedule's order.
    pub fn shared_days(&self, other: &CourseSchedule) -> Vec<DayOfWeek> {
        self.days
            .iter()
            .copied()
            .filter(|day| other.days.contains(day))
            .collect()
    }

    /// Half-open interval overlap on the clock, ignoring days.
    pub fn times_overlap(&self, other: &CourseSchedule) -> bool {
        self.starts_at < other.ends_at && self.ends_at > other.starts_at
    }
}

/// Catalog entry for a course section offered in a term, carrying the
/// admission floors the eligibility rules evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub department: String,
    pub term_id: TermId,
    pub grade_level: u8,
    pub min_gpa: f32,
    pub min_passed_hours: u32,
    pub max_students: u32,
    pub schedule: Option<CourseSchedule>,
    pub allow_waitlist: bool,
    pub active: bool,
}

/// Prerequisite edge between two courses, optionally with a minimum grade the
/// prerequisite must have been completed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePrerequisite {
    pub course_id: CourseId,
    pub prerequisite_id: CourseId,
    pub minimum_grade: Option<f32>,
    pub required: bool,
}

/// Lifecycle state of an enrollment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Active,
    Dropped,
    Withdrawn,
    Waitlisted,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Withdrawn => "withdrawn",
            EnrollmentStatus::Waitlisted => "waitlisted",
        }
    }
}

/// Grade lifecycle tag on an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeStatus {
    InProgress,
    Completed,
    Failed,
}

impl GradeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            GradeStatus::InProgress => "in_progress",
            GradeStatus::Completed => "completed",
            GradeStatus::Failed => "failed",
        }
    }
}

/// How an enrollment row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentMethod {
    Regular,
    Bulk,
    WaitlistPromotion,
}

impl EnrollmentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentMethod::Regular => "regular",
            EnrollmentMethod::Bulk => "bulk",
            EnrollmentMethod::WaitlistPromotion => "waitlist_promotion",
        }
    }
}

/// Audit event recorded on every enrollment status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
    pub changed_on: NaiveDate,
    pub note: String,
}

/// A (student, course, term) enrollment row with grade fields populated once
/// by the grading subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub term_id: TermId,
    pub enrolled_on: NaiveDate,
    pub status: EnrollmentStatus,
    pub method: EnrollmentMethod,
    pub approved_by: Option<String>,
    pub grade: Option<f32>,
    pub grade_letter: Option<String>,
    pub grade_points: Option<f32>,
    pub grade_status: GradeStatus,
    pub history: Vec<StatusChange>,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    /// True when the course was finished with a passing grade, which is what
    /// prerequisite satisfaction looks at.
    pub fn is_completed(&self) -> bool {
        self.grade_status == GradeStatus::Completed
    }
}

/// Queued request for a seat in a full course. Positions are dense and
/// 1-based among active entries for a given (course, term).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub term_id: TermId,
    pub position: u32,
    pub added_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub active: bool,
    pub processed_on: Option<NaiveDate>,
}

/// Registration window category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Regular,
    Bulk,
    Late,
}

impl RegistrationType {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationType::Regular => "regular",
            RegistrationType::Bulk => "bulk",
            RegistrationType::Late => "late",
        }
    }
}

/// A (term, registration-type) window gating whether new registrations are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationPeriod {
    pub term_id: TermId,
    pub kind: RegistrationType,
    pub opens_on: NaiveDate,
    pub closes_on: NaiveDate,
    pub open: bool,
    pub active: bool,
}

impl RegistrationPeriod {
    pub fn accepts(&self, today: NaiveDate) -> bool {
        self.open && self.active && self.opens_on <= today && today <= self.closes_on
    }
}
