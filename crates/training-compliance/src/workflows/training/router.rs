use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::documents::ReviewDecision;
use super::domain::{
    CallerCapability, CollaboratorId, CourseLevelId, DocumentId, DocumentUpload, EnrollmentId,
    TrainingId, TrainingStatus,
};
use super::repository::{CertificateIssuer, CertificationRepository};
use super::service::{
    ErrorKind, NewEnrollment, NewTraining, TrainingService, TrainingServiceError,
};

/// Header carrying the caller's role; `admin` unlocks the elevated bypasses.
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

type SharedService<R, I> = State<Arc<TrainingService<R, I>>>;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub status: TrainingStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LevelRequest {
    pub course_level_id: CourseLevelId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExternalCertificateRequest {
    pub collaborator_id: CollaboratorId,
    pub certificate_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MassCertificationRequest {
    pub collaborator_ids: Vec<CollaboratorId>,
}

/// Router exposing training administration and certification endpoints.
pub fn training_router<R, I>(service: Arc<TrainingService<R, I>>) -> Router
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    Router::new()
        .route("/api/v1/trainings", post(schedule_handler::<R, I>))
        .route(
            "/api/v1/trainings/:training_id/overview",
            get(overview_handler::<R, I>),
        )
        .route(
            "/api/v1/trainings/:training_id/status",
            post(status_handler::<R, I>),
        )
        .route(
            "/api/v1/trainings/:training_id/archive",
            post(archive_handler::<R, I>),
        )
        .route(
            "/api/v1/trainings/:training_id/enrollments",
            post(enroll_handler::<R, I>),
        )
        .route(
            "/api/v1/trainings/:training_id/external-certificates",
            post(external_certificate_handler::<R, I>),
        )
        .route(
            "/api/v1/trainings/:training_id/certifications",
            post(mass_certify_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(enrollment_handler::<R, I>).delete(remove_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/level",
            put(level_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/score",
            put(score_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/documents",
            post(submit_document_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/eligibility",
            get(eligibility_handler::<R, I>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/certification",
            post(certify_handler::<R, I>),
        )
        .route(
            "/api/v1/documents/:document_id/review",
            post(review_handler::<R, I>),
        )
        .with_state(service)
}

/// Resolve the caller's capability once, at the edge.
pub fn caller_capability(headers: &HeaderMap) -> CallerCapability {
    let elevated = headers
        .get(CALLER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|role| role.trim().eq_ignore_ascii_case("admin"))
        .unwrap_or(false);
    if elevated {
        CallerCapability::Elevated
    } else {
        CallerCapability::Standard
    }
}

pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ValidationError | ErrorKind::InvalidTransition => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::CapacityExceeded
        | ErrorKind::DuplicateEnrollment
        | ErrorKind::AlreadyCertified
        | ErrorKind::CertificatesAlreadyIssued
        | ErrorKind::TrainingDisabled
        | ErrorKind::StorageConflict => StatusCode::CONFLICT,
        ErrorKind::IssuanceFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: &TrainingServiceError) -> Response {
    let kind = error.kind();
    let payload = json!({
        "error": {
            "kind": kind.code(),
            "message": error.to_string(),
        }
    });
    (status_code(kind), axum::Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, TrainingServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn schedule_handler<R, I>(
    State(service): SharedService<R, I>,
    axum::Json(input): axum::Json<NewTraining>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(StatusCode::CREATED, service.schedule_training(input))
}

pub(crate) async fn overview_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.training_overview(&TrainingId(training_id)),
    )
}

pub(crate) async fn status_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.update_training_status(
            &TrainingId(training_id),
            request.status,
            request.reason.as_deref(),
        ),
    )
}

pub(crate) async fn archive_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.archive_training(&TrainingId(training_id)),
    )
}

pub(crate) async fn enroll_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<NewEnrollment>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    respond(
        StatusCode::CREATED,
        service.enroll(&TrainingId(training_id), input, caller),
    )
}

pub(crate) async fn external_certificate_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
    axum::Json(request): axum::Json<ExternalCertificateRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.upsert_external_certificate(
            &TrainingId(training_id),
            &request.collaborator_id,
            &request.certificate_url,
        ),
    )
}

pub(crate) async fn mass_certify_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(training_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<MassCertificationRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    match service.mass_certify(&TrainingId(training_id), &request.collaborator_ids, caller) {
        Ok(report) => {
            let payload = json!({
                "summary": report.summary(),
                "report": report,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn enrollment_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.get_enrollment(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn remove_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    match service.remove_enrollment(&EnrollmentId(enrollment_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn level_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LevelRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    respond(
        StatusCode::OK,
        service.change_level(
            &EnrollmentId(enrollment_id),
            &request.course_level_id,
            caller,
        ),
    )
}

pub(crate) async fn score_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ScoreRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    respond(
        StatusCode::OK,
        service.set_score(&EnrollmentId(enrollment_id), request.score, caller),
    )
}

pub(crate) async fn submit_document_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
    headers: HeaderMap,
    axum::Json(upload): axum::Json<DocumentUpload>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    respond(
        StatusCode::CREATED,
        service.submit_document(&EnrollmentId(enrollment_id), upload, caller),
    )
}

pub(crate) async fn eligibility_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    respond(
        StatusCode::OK,
        service.evaluate_eligibility(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn certify_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(enrollment_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let caller = caller_capability(&headers);
    respond(
        StatusCode::OK,
        service.certify(&EnrollmentId(enrollment_id), caller),
    )
}

pub(crate) async fn review_handler<R, I>(
    State(service): SharedService<R, I>,
    Path(document_id): Path<String>,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let blank_notes = request
        .notes
        .as_deref()
        .map(|notes| notes.trim().is_empty())
        .unwrap_or(true);
    if request.decision == ReviewDecision::Reject && blank_notes {
        return error_response(&TrainingServiceError::Validation(
            "review notes are required when rejecting a document".to_string(),
        ));
    }

    respond(
        StatusCode::OK,
        service.review_document(&DocumentId(document_id), request.decision, request.notes),
    )
}
