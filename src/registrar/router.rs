use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::bulk::{BulkEnrollmentOrchestrator, BulkEnrollmentRequest, BulkRequestError};
use super::directory::{AdminDirectory, DirectoryError};
use super::domain::{CourseId, EnrollmentId, StudentId, TermId};
use super::notify::NoticePublisher;
use super::service::{
    DropKind, EnrollmentError, EnrollmentOutcome, EnrollmentRequest, EnrollmentService,
};
use super::store::{RegistryStore, StoreError};

/// Privilege required to submit batch enrollments.
const BULK_ENROLL_PRIVILEGE: &str = "enrollment.bulk";

/// Shared handler state: the enrollment service, the batch orchestrator, and
/// the admin privilege directory.
pub struct RegistrarState<S, N, D> {
    pub enrollments: Arc<EnrollmentService<S, N>>,
    pub bulk: Arc<BulkEnrollmentOrchestrator<S>>,
    pub directory: Arc<D>,
}

impl<S, N, D> Clone for RegistrarState<S, N, D> {
    fn clone(&self) -> Self {
        Self {
            enrollments: self.enrollments.clone(),
            bulk: self.bulk.clone(),
            directory: self.directory.clone(),
        }
    }
}

/// Router builder exposing the enrollment endpoints.
pub fn registrar_router<S, N, D>(state: RegistrarState<S, N, D>) -> Router
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    Router::new()
        .route("/api/v1/enrollments", post(enroll_handler::<S, N, D>))
        .route(
            "/api/v1/enrollments/bulk",
            post(bulk_enroll_handler::<S, N, D>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id",
            delete(drop_handler::<S, N, D>),
        )
        .route(
            "/api/v1/students/:student_id/eligibility/:course_id/:term_id",
            get(eligibility_handler::<S, N, D>),
        )
        .route(
            "/api/v1/courses/:course_id/terms/:term_id/waitlist",
            get(waitlist_handler::<S, N, D>),
        )
        .with_state(state)
}

pub(crate) async fn enroll_handler<S, N, D>(
    State(state): State<RegistrarState<S, N, D>>,
    axum::Json(request): axum::Json<EnrollmentRequest>,
) -> Response
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    let today = Utc::now().date_naive();
    match state.enrollments.enroll(request, today) {
        Ok(outcome) => {
            let status = match &outcome {
                EnrollmentOutcome::Enrolled { .. } => StatusCode::CREATED,
                EnrollmentOutcome::Waitlisted { .. } => StatusCode::ACCEPTED,
                EnrollmentOutcome::AlreadyWaitlisted { .. } => StatusCode::OK,
                EnrollmentOutcome::Rejected { .. }
                | EnrollmentOutcome::RegistrationClosed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(EnrollmentError::Store(StoreError::UniqueActiveEnrollment {
            student,
            course,
            term,
        })) => {
            let payload = json!({
                "error": format!(
                    "student {student} already holds an active enrollment in course {course} for term {term}"
                ),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DropParams {
    #[serde(default = "default_drop_kind")]
    kind: DropKind,
}

fn default_drop_kind() -> DropKind {
    DropKind::Dropped
}

pub(crate) async fn drop_handler<S, N, D>(
    State(state): State<RegistrarState<S, N, D>>,
    Path(enrollment_id): Path<u64>,
    Query(params): Query<DropParams>,
) -> Response
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    let today = Utc::now().date_naive();
    match state
        .enrollments
        .drop_enrollment(EnrollmentId(enrollment_id), params.kind, today)
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(EnrollmentError::NotFound(id)) => {
            let payload = json!({ "error": format!("enrollment {id} not found") });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(EnrollmentError::NotActive(id)) => {
            let payload = json!({ "error": format!("enrollment {id} is not active") });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn bulk_enroll_handler<S, N, D>(
    State(state): State<RegistrarState<S, N, D>>,
    axum::Json(request): axum::Json<BulkEnrollmentRequest>,
) -> Response
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    match state.directory.privileges_for(&request.requested_by) {
        Ok(privileges) if privileges.contains(BULK_ENROLL_PRIVILEGE) => {}
        Ok(_) | Err(DirectoryError::UserNotFound(_)) => {
            let payload = json!({
                "error": format!(
                    "{} is not authorized for bulk enrollment",
                    request.requested_by
                ),
            });
            return (StatusCode::FORBIDDEN, axum::Json(payload)).into_response();
        }
        Err(other) => return internal_error(other),
    }

    let today = Utc::now().date_naive();
    match state.bulk.process(&request, today) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error @ (BulkRequestError::EmptyStudents | BulkRequestError::EmptyCourses)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(error @ BulkRequestError::UnknownTerm(_)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn eligibility_handler<S, N, D>(
    State(state): State<RegistrarState<S, N, D>>,
    Path((student_id, course_id, term_id)): Path<(u32, u32, u32)>,
) -> Response
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    match state.enrollments.check_eligibility(
        StudentId(student_id),
        CourseId(course_id),
        TermId(term_id),
    ) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => internal_error(error),
    }
}

pub(crate) async fn waitlist_handler<S, N, D>(
    State(state): State<RegistrarState<S, N, D>>,
    Path((course_id, term_id)): Path<(u32, u32)>,
) -> Response
where
    S: RegistryStore + 'static,
    N: NoticePublisher + 'static,
    D: AdminDirectory + 'static,
{
    match state
        .enrollments
        .waitlist_entries(CourseId(course_id), TermId(term_id))
    {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => internal_error(error),
    }
}

fn internal_error(error: impl std::fmt::Display) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
