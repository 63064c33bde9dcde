use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::domain::{Enrollment, EnrollmentId, GradeStatus, StudentId, GPA_SCALE_MAX};
use super::store::{RegistryStore, StoreError, WriteBatch, WriteOp};

/// One row of the letter-grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub letter: String,
    pub min_percent: f32,
    pub max_percent: f32,
    pub points: f32,
    pub passing: bool,
}

/// Ordered percentage-to-letter lookup table. This is the single source of
/// truth for letters and grade points; the weighted final-grade calculation
/// resolves through the same table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeScale {
    bands: Vec<GradeBand>,
}

impl GradeScale {
    /// Bands are kept sorted by descending `min_percent` so lookup picks the
    /// highest threshold at or below the mark.
    pub fn new(mut bands: Vec<GradeBand>) -> Self {
        bands.sort_by(|a, b| {
            b.min_percent
                .partial_cmp(&a.min_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { bands }
    }

    /// The conventional 4.0-scale table.
    pub fn standard() -> Self {
        let band = |letter: &str, min: f32, max: f32, points: f32, passing: bool| GradeBand {
            letter: letter.to_string(),
            min_percent: min,
            max_percent: max,
            points,
            passing,
        };
        Self::new(vec![
            band("A", 90.0, 100.0, 4.0, true),
            band("B+", 85.0, 89.99, 3.5, true),
            band("B", 80.0, 84.99, 3.0, true),
            band("C+", 75.0, 79.99, 2.5, true),
            band("C", 70.0, 74.99, 2.0, true),
            band("D+", 65.0, 69.99, 1.5, true),
            band("D", 60.0, 64.99, 1.0, true),
            band("F", 0.0, 59.99, 0.0, false),
        ])
    }

    pub fn band_for(&self, mark: f32) -> Option<&GradeBand> {
        self.bands.iter().find(|band| band.min_percent <= mark)
    }
}

/// A weighted piece of a final grade (midterm, project, final exam, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeComponent {
    pub name: String,
    pub weight: f32,
    pub score: f32,
}

/// Weight-normalized aggregate mark, or `None` when there is nothing to
/// aggregate.
pub fn weighted_final_mark(components: &[GradeComponent]) -> Option<f32> {
    let total_weight: f32 = components.iter().map(|component| component.weight).sum();
    if components.is_empty() || total_weight <= 0.0 {
        return None;
    }
    let weighted: f32 = components
        .iter()
        .map(|component| component.score * component.weight)
        .sum();
    Some(weighted / total_weight)
}

/// Failures raised when recording a final grade.
#[derive(Debug, Error)]
pub enum GradingError {
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(u64),
    #[error("enrollment {0} already carries a final grade")]
    AlreadyGraded(u64),
    #[error("mark {0} is outside the 0-100 range")]
    MarkOutOfRange(f32),
    #[error("no weighted components supplied")]
    NoComponents,
    #[error("no grade band covers mark {0}")]
    NoMatchingBand(f32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of a recorded grade and the resulting student standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedEnrollment {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub mark: f32,
    pub letter: String,
    pub points: f32,
    pub status: GradeStatus,
    pub recalculated_gpa: f32,
    pub recalculated_passed_hours: u32,
}

/// Grade assignment plus the GPA/passed-hours recalculation that follows
/// completion, committed as one batch.
pub struct GradingService<S> {
    store: Arc<S>,
    scale: GradeScale,
}

impl<S: RegistryStore> GradingService<S> {
    pub fn new(store: Arc<S>, scale: GradeScale) -> Self {
        Self { store, scale }
    }

    pub fn scale(&self) -> &GradeScale {
        &self.scale
    }

    /// Resolve the weighted components to a mark and record it.
    pub fn record_final_grade(
        &self,
        enrollment_id: EnrollmentId,
        components: &[GradeComponent],
    ) -> Result<GradedEnrollment, GradingError> {
        let mark = weighted_final_mark(components).ok_or(GradingError::NoComponents)?;
        self.record_mark(enrollment_id, mark)
    }

    /// Record an already-computed percentage mark for an in-progress
    /// enrollment, stamping letter/points/status and refreshing the student's
    /// GPA and passed hours in the same commit.
    pub fn record_mark(
        &self,
        enrollment_id: EnrollmentId,
        mark: f32,
    ) -> Result<GradedEnrollment, GradingError> {
        if !(0.0..=100.0).contains(&mark) {
            return Err(GradingError::MarkOutOfRange(mark));
        }

        let enrollment = self
            .store
            .enrollment(enrollment_id)?
            .ok_or(GradingError::EnrollmentNotFound(enrollment_id.0))?;
        if enrollment.grade_status != GradeStatus::InProgress {
            return Err(GradingError::AlreadyGraded(enrollment_id.0));
        }

        let band = self
            .scale
            .band_for(mark)
            .ok_or(GradingError::NoMatchingBand(mark))?
            .clone();
        let status = if band.passing {
            GradeStatus::Completed
        } else {
            GradeStatus::Failed
        };

        let (gpa, passed_hours) =
            self.recalculate_standing(enrollment.student_id, &enrollment, &band)?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::RecordGrade {
            id: enrollment_id,
            grade: mark,
            letter: band.letter.clone(),
            points: band.points,
            status,
        });
        batch.push(WriteOp::UpdateStanding {
            student_id: enrollment.student_id,
            gpa,
            passed_hours,
        });
        self.store.commit(batch)?;

        info!(
            enrollment = enrollment_id.0,
            student = enrollment.student_id.0,
            letter = %band.letter,
            "final grade recorded"
        );

        Ok(GradedEnrollment {
            enrollment_id,
            student_id: enrollment.student_id,
            mark,
            letter: band.letter,
            points: band.points,
            status,
            recalculated_gpa: gpa,
            recalculated_passed_hours: passed_hours,
        })
    }

    /// Credit-weighted GPA and cumulative passed hours over the student's
    /// graded history, including the grade being recorded now.
    fn recalculate_standing(
        &self,
        student_id: StudentId,
        graded_now: &Enrollment,
        new_band: &GradeBand,
    ) -> Result<(f32, u32), GradingError> {
        let history = self.store.student_history(student_id)?;
        let course_ids: Vec<_> = history
            .iter()
            .map(|row| row.course_id)
            .chain(std::iter::once(graded_now.course_id))
            .collect();
        let courses = self.store.courses(&course_ids)?;

        let mut quality_points = 0.0f32;
        let mut attempted_credits = 0u32;
        let mut passed_hours = 0u32;

        for row in &history {
            let (points, passing) = if row.id == graded_now.id {
                (Some(new_band.points), new_band.passing)
            } else {
                (row.grade_points, row.grade_status == GradeStatus::Completed)
            };
            let Some(points) = points else { continue };
            let Some(course) = courses.get(&row.course_id) else {
                continue;
            };
            quality_points += points * course.credits as f32;
            attempted_credits += course.credits;
            if passing {
                passed_hours += course.credits;
            }
        }

        let gpa = if attempted_credits == 0 {
            0.0
        } else {
            (quality_points / attempted_credits as f32).clamp(0.0, GPA_SCALE_MAX)
        };

        Ok((gpa, passed_hours))
    }
}
