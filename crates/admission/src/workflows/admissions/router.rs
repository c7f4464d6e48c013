use std::sync::Arc;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    AcademicYear, ApplicationSubmission, CetSubmission, EligibilityQuery, InterviewUpdate,
    StatusUpdate, StudentId, UploadedFile,
};
use super::intake::IntakeError;
use super::repository::{DocumentVault, RecordStore, StoreError};
use super::service::{AdmissionLifecycleService, LifecycleError};

type SharedService<S, V> = Arc<AdmissionLifecycleService<S, V>>;

/// Router builder exposing the admission lifecycle over HTTP.
pub fn lifecycle_router<S, V>(service: SharedService<S, V>) -> Router
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    let body_limit = service.upload_policy().request_body_limit();

    Router::new()
        .route("/api/applications", post(submit_handler::<S, V>))
        .route("/api/cet-applications", post(submit_cet_handler::<S, V>))
        .route("/api/check-eligibility", post(eligibility_handler::<S, V>))
        .route(
            "/api/applications/:student_id",
            get(status_handler::<S, V>),
        )
        .route(
            "/api/applications/:student_id/status",
            put(update_status_handler::<S, V>),
        )
        .route(
            "/api/applications/:student_id/interview",
            put(interview_handler::<S, V>),
        )
        .route("/api/upload/:student_id", post(upload_handler::<S, V>))
        .route("/api/documents/:student_id", get(documents_handler::<S, V>))
        .route(
            "/api/verify-document/:student_id",
            post(verify_handler::<S, V>),
        )
        .route(
            "/api/verification-status/:student_id",
            get(verification_history_handler::<S, V>),
        )
        .route("/api/cet-cutoffs", get(cutoffs_handler::<S, V>))
        .route("/api/cet-cutoffs/:year", get(cutoffs_for_year_handler::<S, V>))
        .route("/api/students/search", get(search_handler::<S, V>))
        .route("/api/stats", get(stats_handler::<S, V>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    query: String,
}

pub(crate) async fn submit_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    match service.submit(submission) {
        Ok(student_id) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Application submitted successfully",
                "studentId": student_id,
            })),
        )
            .into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

pub(crate) async fn submit_cet_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Json(submission): Json<CetSubmission>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    match service.submit_cet(submission) {
        Ok(outcome) => {
            let message = if outcome.eligible {
                "CET application submitted successfully"
            } else {
                "Application submitted but not eligible for selected program"
            };
            (
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": message,
                    "studentId": outcome.student_id,
                    "eligible": outcome.eligible,
                })),
            )
                .into_response()
        }
        Err(err) => lifecycle_error_response(err),
    }
}

pub(crate) async fn eligibility_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Json(query): Json<EligibilityQuery>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.check_eligibility(query))
}

pub(crate) async fn status_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.status(StudentId(student_id)))
}

pub(crate) async fn update_status_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    match service.update_status(StudentId(student_id), update) {
        Ok(view) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Status updated successfully",
                "data": view,
            })),
        )
            .into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

pub(crate) async fn interview_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
    Json(update): Json<InterviewUpdate>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.record_interview(StudentId(student_id), update))
}

pub(crate) async fn upload_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
    mut multipart: Multipart,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return multipart_error_response(err),
        };
        if field.name() == Some("documents") {
            match read_file(field).await {
                Ok(file) => files.push(file),
                Err(err) => return multipart_error_response(err),
            }
        } else if let Err(err) = field.bytes().await {
            return multipart_error_response(err);
        }
    }

    match service.upload_documents(StudentId(student_id), files) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Documents uploaded successfully",
                "files": outcome.accepted,
                "progressPercentage": outcome.progress_percentage,
            })),
        )
            .into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

pub(crate) async fn verify_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
    mut multipart: Multipart,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    let mut document_type = None;
    let mut document = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return multipart_error_response(err),
        };
        match field.name() {
            Some("documentType") => match field.text().await {
                Ok(text) => document_type = Some(text),
                Err(err) => return multipart_error_response(err),
            },
            Some("document") => match read_file(field).await {
                Ok(file) => document = Some(file),
                Err(err) => return multipart_error_response(err),
            },
            _ => {
                if let Err(err) = field.bytes().await {
                    return multipart_error_response(err);
                }
            }
        }
    }

    match service.verify_document(StudentId(student_id), document_type, document) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Document uploaded and verified",
                "verificationStatus": outcome.verification_status,
                "aiConfidence": outcome.ai_confidence,
                "progressPercentage": outcome.progress_percentage,
            })),
        )
            .into_response(),
        Err(err) => lifecycle_error_response(err),
    }
}

pub(crate) async fn documents_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.documents(StudentId(student_id)))
}

pub(crate) async fn verification_history_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.verification_history(StudentId(student_id)))
}

pub(crate) async fn cutoffs_handler<S, V>(
    State(service): State<SharedService<S, V>>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.cutoffs(None))
}

pub(crate) async fn cutoffs_for_year_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Path(year): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    match AcademicYear::parse(&year) {
        Some(year) => data_response(service.cutoffs(Some(&year))),
        None => {
            let payload = json!({
                "success": false,
                "error": format!("invalid academic year '{year}'"),
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn search_handler<S, V>(
    State(service): State<SharedService<S, V>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.search(&params.query))
}

pub(crate) async fn stats_handler<S, V>(State(service): State<SharedService<S, V>>) -> Response
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    data_response(service.stats())
}

async fn read_file(
    field: Field<'_>,
) -> Result<UploadedFile, axum::extract::multipart::MultipartError> {
    let name = field.file_name().unwrap_or("unnamed").to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    Ok(UploadedFile::new(name, content_type.as_deref(), bytes.to_vec()))
}

fn data_response<T: Serialize>(result: Result<T, LifecycleError>) -> Response {
    match result {
        Ok(data) => {
            (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
        }
        Err(err) => lifecycle_error_response(err),
    }
}

fn multipart_error_response(err: axum::extract::multipart::MultipartError) -> Response {
    let payload = json!({
        "success": false,
        "error": err.body_text(),
    });
    (err.status(), Json(payload)).into_response()
}

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Map a service error onto the portal's error envelope. Collaborator failures are logged in
/// full and answered with a fixed message.
pub(crate) fn lifecycle_error_response(err: LifecycleError) -> Response {
    let (status, payload) = match &err {
        LifecycleError::Intake(IntakeError::Validation(errors)) => (
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "error": err.to_string(),
                "errors": errors,
            }),
        ),
        LifecycleError::Intake(IntakeError::FileRejected(rejected)) => (
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "error": err.to_string(),
                "rejected": rejected,
            }),
        ),
        LifecycleError::Intake(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": err.to_string() }),
        ),
        LifecycleError::Store(StoreError::DuplicateEmail) => (
            StatusCode::CONFLICT,
            json!({ "success": false, "error": "Email already registered" }),
        ),
        LifecycleError::Store(StoreError::NotFound) => (
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": "Application not found" }),
        ),
        LifecycleError::CutoffNotFound { .. } => (
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": err.to_string() }),
        ),
        LifecycleError::InvalidTransition { .. }
        | LifecycleError::Store(StoreError::TransitionRefused { .. }) => (
            StatusCode::CONFLICT,
            json!({ "success": false, "error": err.to_string() }),
        ),
        LifecycleError::Store(StoreError::Unavailable(_))
        | LifecycleError::Vault(_)
        | LifecycleError::Cutoffs(_) => {
            error!(error = %err, "admission request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": INTERNAL_ERROR_MESSAGE }),
            )
        }
    };
    (status, Json(payload)).into_response()
}
