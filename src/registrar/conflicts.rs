use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::domain::{Course, CourseId, DayOfWeek, StudentId, TermId};
use super::policy::EnrollmentPolicy;
use super::store::{RegistryStore, StoreError};

/// A scheduling or load problem found between a candidate course set and a
/// student's existing active schedule. Advisory for single enrollment;
/// blocking in the detailed eligibility path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Conflict {
    DuplicateEnrollment {
        course_id: CourseId,
        course_code: String,
    },
    ScheduleOverlap {
        first: CourseId,
        second: CourseId,
        days: Vec<DayOfWeek>,
        first_window: (NaiveTime, NaiveTime),
        second_window: (NaiveTime, NaiveTime),
    },
    RoomOverlap {
        first: CourseId,
        second: CourseId,
        room: String,
    },
    LoadLimit {
        enrolled: u32,
        requested: u32,
        limit: u32,
    },
}

impl Conflict {
    pub fn summary(&self) -> String {
        match self {
            Conflict::DuplicateEnrollment { course_code, .. } => {
                format!("already enrolled in {course_code} this term")
            }
            Conflict::ScheduleOverlap {
                first,
                second,
                days,
                first_window,
                second_window,
            } => {
                let days: Vec<&str> = days.iter().map(|day| day.label()).collect();
                format!(
                    "courses {} and {} overlap on {} ({}-{} vs {}-{})",
                    first.0,
                    second.0,
                    days.join("/"),
                    first_window.0,
                    first_window.1,
                    second_window.0,
                    second_window.1
                )
            }
            Conflict::RoomOverlap { first, second, room } => {
                format!("courses {} and {} both meet in room {room}", first.0, second.0)
            }
            Conflict::LoadLimit {
                enrolled,
                requested,
                limit,
            } => format!(
                "term load limit exceeded: {enrolled} active + {requested} requested > {limit}"
            ),
        }
    }
}

/// Compare every candidate course against the student's active schedule for
/// the term: duplicate enrollments, day/time overlaps, shared rooms, and the
/// overall term load ceiling.
pub fn detect_conflicts<S: RegistryStore>(
    store: &S,
    policy: &EnrollmentPolicy,
    student_id: StudentId,
    term_id: TermId,
    candidate_ids: &[CourseId],
) -> Result<Vec<Conflict>, StoreError> {
    let mut conflicts = Vec::new();

    let enrollments = store.student_enrollments(student_id, term_id)?;
    let active_course_ids: Vec<CourseId> = enrollments
        .iter()
        .filter(|row| row.is_active())
        .map(|row| row.course_id)
        .collect();

    let candidates = store.courses(candidate_ids)?;
    let existing = store.courses(&active_course_ids)?;

    for candidate_id in candidate_ids {
        let Some(candidate) = candidates.get(candidate_id) else {
            continue;
        };

        if active_course_ids.contains(candidate_id) {
            conflicts.push(Conflict::DuplicateEnrollment {
                course_id: *candidate_id,
                course_code: candidate.code.clone(),
            });
            continue;
        }

        for current in existing.values() {
            pairwise_conflicts(candidate, current, &mut conflicts);
        }
    }

    let enrolled = active_course_ids.len() as u32;
    let requested = candidate_ids.len() as u32;
    if enrolled + requested > policy.max_term_load {
        conflicts.push(Conflict::LoadLimit {
            enrolled,
            requested,
            limit: policy.max_term_load,
        });
    }

    Ok(conflicts)
}

fn pairwise_conflicts(candidate: &Course, current: &Course, conflicts: &mut Vec<Conflict>) {
    if candidate.id == current.id {
        return;
    }

    if let (Some(a), Some(b)) = (&candidate.schedule, &current.schedule) {
        let shared = a.shared_days(b);
        if !shared.is_empty() && a.times_overlap(b) {
            conflicts.push(Conflict::ScheduleOverlap {
                first: candidate.id,
                second: current.id,
                days: shared,
                first_window: (a.starts_at, a.ends_at),
                second_window: (b.starts_at, b.ends_at),
            });
        }

        // Shared rooms are flagged regardless of meeting time; room
        // assignments are the scheduler's problem to untangle.
        match (&a.room, &b.room) {
            (Some(first_room), Some(second_room))
                if !first_room.is_empty() && first_room == second_room =>
            {
                conflicts.push(Conflict::RoomOverlap {
                    first: candidate.id,
                    second: current.id,
                    room: first_room.clone(),
                });
            }
            _ => {}
        }
    }
}
