//! CSV roster import used by the demo command and fixtures. Spreadsheet and
//! PDF export transforms stay out of scope; this is seeding plumbing only.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::registrar::domain::{
    Course, CourseId, CoursePrerequisite, CourseSchedule, DayOfWeek, RegistrationPeriod,
    RegistrationType, Student, StudentId, Term, TermId,
};
use crate::registrar::store::MemoryRegistry;
use crate::registrar::GPA_SCALE_MAX;

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Invalid { line: u64, message: String },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster file: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Invalid { line, message } => {
                write!(f, "invalid roster row at line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct StudentRow {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Grade Level")]
    grade_level: u8,
    #[serde(rename = "GPA")]
    gpa: f32,
    #[serde(rename = "Passed Hours")]
    passed_hours: u32,
}

#[derive(Debug, Deserialize)]
struct CourseRow {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Credits")]
    credits: u32,
    #[serde(rename = "Department")]
    department: String,
    #[serde(rename = "Grade Level")]
    grade_level: u8,
    #[serde(rename = "Min GPA")]
    min_gpa: f32,
    #[serde(rename = "Min Passed Hours")]
    min_passed_hours: u32,
    #[serde(rename = "Max Students")]
    max_students: u32,
    #[serde(rename = "Days", default)]
    days: String,
    #[serde(rename = "Starts", default)]
    starts: String,
    #[serde(rename = "Ends", default)]
    ends: String,
    #[serde(rename = "Room", default)]
    room: String,
    #[serde(rename = "Allow Waitlist")]
    allow_waitlist: String,
}

pub fn import_students<R: Read>(reader: R) -> Result<Vec<Student>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut students = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let row: StudentRow = record.deserialize(Some(&headers))?;

        if !(0.0..=GPA_SCALE_MAX).contains(&row.gpa) {
            return Err(RosterImportError::Invalid {
                line,
                message: format!("GPA {} outside the 0-{GPA_SCALE_MAX} scale", row.gpa),
            });
        }
        if row.code.is_empty() {
            return Err(RosterImportError::Invalid {
                line,
                message: "student code is empty".to_string(),
            });
        }

        students.push(Student {
            id: StudentId(row.id),
            code: row.code,
            name: row.name,
            grade_level: row.grade_level,
            gpa: row.gpa,
            passed_hours: row.passed_hours,
            active: true,
        });
    }

    Ok(students)
}

pub fn import_students_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<Student>, RosterImportError> {
    let file = std::fs::File::open(path)?;
    import_students(file)
}

pub fn import_courses<R: Read>(
    reader: R,
    term_id: TermId,
) -> Result<Vec<Course>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut courses = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let row: CourseRow = record.deserialize(Some(&headers))?;

        if row.max_students == 0 {
            return Err(RosterImportError::Invalid {
                line,
                message: format!("course {} has zero capacity", row.code),
            });
        }

        let schedule = parse_schedule(&row, line)?;
        courses.push(Course {
            id: CourseId(row.id),
            code: row.code,
            name: row.name,
            credits: row.credits,
            department: row.department,
            term_id,
            grade_level: row.grade_level,
            min_gpa: row.min_gpa,
            min_passed_hours: row.min_passed_hours,
            max_students: row.max_students,
            schedule,
            allow_waitlist: parse_flag(&row.allow_waitlist, line)?,
            active: true,
        });
    }

    Ok(courses)
}

pub fn import_courses_from_path<P: AsRef<Path>>(
    path: P,
    term_id: TermId,
) -> Result<Vec<Course>, RosterImportError> {
    let file = std::fs::File::open(path)?;
    import_courses(file, term_id)
}

fn parse_schedule(row: &CourseRow, line: u64) -> Result<Option<CourseSchedule>, RosterImportError> {
    if row.days.is_empty() {
        return Ok(None);
    }

    let mut days = Vec::new();
    for token in row.days.split('/') {
        days.push(parse_day(token, line)?);
    }

    let starts_at = parse_time(&row.starts, line)?;
    let ends_at = parse_time(&row.ends, line)?;
    if ends_at <= starts_at {
        return Err(RosterImportError::Invalid {
            line,
            message: format!("schedule window {}-{} is empty", row.starts, row.ends),
        });
    }

    Ok(Some(CourseSchedule {
        days,
        starts_at,
        ends_at,
        room: if row.room.is_empty() {
            None
        } else {
            Some(row.room.clone())
        },
    }))
}

fn parse_day(token: &str, line: u64) -> Result<DayOfWeek, RosterImportError> {
    match token.trim() {
        "Mon" => Ok(DayOfWeek::Monday),
        "Tue" => Ok(DayOfWeek::Tuesday),
        "Wed" => Ok(DayOfWeek::Wednesday),
        "Thu" => Ok(DayOfWeek::Thursday),
        "Fri" => Ok(DayOfWeek::Friday),
        "Sat" => Ok(DayOfWeek::Saturday),
        "Sun" => Ok(DayOfWeek::Sunday),
        other => Err(RosterImportError::Invalid {
            line,
            message: format!("unknown day token '{}'", other),
        }),
    }
}

fn parse_time(value: &str, line: u64) -> Result<NaiveTime, RosterImportError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| RosterImportError::Invalid {
        line,
        message: format!("time '{}' is not HH:MM", value),
    })
}

fn parse_flag(value: &str, line: u64) -> Result<bool, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => Err(RosterImportError::Invalid {
            line,
            message: format!("flag '{}' is not yes/no", other),
        }),
    }
}

const SAMPLE_STUDENTS: &str = "\
Id,Code,Name,Grade Level,GPA,Passed Hours
1,S-1001,Amira Hassan,10,3.60,48
2,S-1002,Jonah Pike,10,2.40,36
3,S-1003,Mei Lin,10,3.10,42
4,S-1004,Tomas Vega,10,1.90,12
";

const SAMPLE_COURSES: &str = "\
Id,Code,Name,Credits,Department,Grade Level,Min GPA,Min Passed Hours,Max Students,Days,Starts,Ends,Room,Allow Waitlist
10,MATH-201,Linear Algebra,3,MATH,10,2.00,30,2,Mon/Wed,09:00,10:30,B-104,yes
11,PHYS-301,Classical Mechanics,4,PHYS,10,3.00,40,2,Tue/Thu,11:00,12:30,C-210,yes
12,HIST-110,World History,3,HIST,10,0.00,0,40,Fri,14:00,15:30,,no
";

/// Registry seeded from the embedded sample rosters, with open regular and
/// bulk registration windows around `today`.
pub fn sample_registry(
    term_id: TermId,
    today: NaiveDate,
) -> Result<Arc<MemoryRegistry>, RosterImportError> {
    let store = Arc::new(MemoryRegistry::new());
    store.insert_term(Term {
        id: term_id,
        name: "Fall 2026".to_string(),
    });

    for kind in [RegistrationType::Regular, RegistrationType::Bulk] {
        store.insert_period(RegistrationPeriod {
            term_id,
            kind,
            opens_on: today - chrono::Duration::days(7),
            closes_on: today + chrono::Duration::days(90),
            open: true,
            active: true,
        });
    }

    for student in import_students(SAMPLE_STUDENTS.as_bytes())? {
        store.insert_student(student);
    }
    for course in import_courses(SAMPLE_COURSES.as_bytes(), term_id)? {
        store.insert_course(course);
    }

    // Mechanics requires the algebra course; the sample students have no
    // history, so the orchestrator reports it as missing.
    if let Err(err) = store.insert_prerequisite(CoursePrerequisite {
        course_id: CourseId(11),
        prerequisite_id: CourseId(10),
        minimum_grade: Some(70.0),
        required: true,
    }) {
        return Err(RosterImportError::Invalid {
            line: 0,
            message: err.to_string(),
        });
    }

    Ok(store)
}
