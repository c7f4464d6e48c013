//! Integration scenarios for the admission lifecycle.
//!
//! Scenarios drive the public service facade and HTTP router over the shipped SQLite store and
//! filesystem vault.

mod common {
    use std::path::Path;
    use std::sync::Arc;

    use admission::storage::{FilesystemVault, SqliteRecordStore};
    use admission::workflows::admissions::{
        AdmissionLifecycleService, CutoffTable, FixedConfidenceScorer, LifecycleSettings,
    };

    pub(super) type PortalService = AdmissionLifecycleService<SqliteRecordStore, FilesystemVault>;

    pub(super) fn portal(dir: &Path, confidence: f64) -> PortalService {
        let store = SqliteRecordStore::open(dir.join("portal.db")).expect("database opens");
        AdmissionLifecycleService::new(
            Arc::new(store),
            Arc::new(FilesystemVault::new(dir.join("uploads"))),
            Arc::new(CutoffTable::seeded()),
            Arc::new(FixedConfidenceScorer(confidence)),
            LifecycleSettings::default(),
        )
    }
}

use std::sync::Arc;

use admission::workflows::admissions::{
    lifecycle_router, ApplicationStatus, ApplicationSubmission, CetSubmission, LifecycleError,
    StatusUpdate, StoreError, UploadedFile, VerificationStatus,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn pdf(name: &str) -> UploadedFile {
    UploadedFile::new(name, Some("application/pdf"), b"%PDF-1.7 marks".to_vec())
}

fn asha() -> ApplicationSubmission {
    ApplicationSubmission {
        name: "Asha".to_string(),
        email: "asha@x.com".to_string(),
        phone: None,
        program: "cs".to_string(),
    }
}

#[test]
fn applicant_reaches_ninety_percent_before_the_decision() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = common::portal(dir.path(), 85.0);

    let id = service.submit(asha()).expect("submitted");
    assert_eq!(service.status(id).expect("status").progress_percentage.value(), 25);

    let progress: Vec<u8> = [vec![pdf("a.pdf")], vec![pdf("b.pdf"), pdf("c.pdf")]]
        .into_iter()
        .map(|batch| {
            service
                .upload_documents(id, batch)
                .expect("upload")
                .progress_percentage
                .value()
        })
        .collect();
    assert_eq!(progress, vec![50, 75]);

    let verification = service
        .verify_document(id, Some("10th".to_string()), Some(pdf("10th.pdf")))
        .expect("verified");
    assert_eq!(verification.verification_status, VerificationStatus::AiVerified);
    assert_eq!(verification.progress_percentage.value(), 90);

    let decided = service
        .update_status(
            id,
            StatusUpdate {
                status: "accepted".to_string(),
                progress: 100,
            },
        )
        .expect("accepted");
    assert_eq!(decided.application_status, ApplicationStatus::Accepted);

    let stats = service.stats().expect("stats");
    assert_eq!(stats.total_applications, 1);
    assert_eq!(stats.verified_documents, 1);
    assert_eq!(stats.acceptance_rate, 100);
}

#[test]
fn cet_applicants_are_judged_against_the_published_cutoff() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = common::portal(dir.path(), 85.0);

    let submission = |email: &str, rank: i64| CetSubmission {
        name: "Ravi".to_string(),
        email: email.to_string(),
        cet_score: Some(132),
        cet_rank: Some(rank),
        program: "me".to_string(),
    };

    let inside = service
        .submit_cet(submission("ravi@x.com", 8000))
        .expect("eligible");
    let outside = service
        .submit_cet(submission("kiran@x.com", 8001))
        .expect("ineligible but recorded");
    assert!(inside.eligible);
    assert!(!outside.eligible);
    assert_eq!(
        service
            .status(outside.student_id)
            .expect("status")
            .progress_percentage
            .value(),
        0
    );

    assert!(matches!(
        service.submit_cet(submission("RAVI@x.com", 10)),
        Err(LifecycleError::Store(StoreError::DuplicateEmail))
    ));
}

#[tokio::test]
async fn router_serves_the_portal_over_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = lifecycle_router(Arc::new(common::portal(dir.path(), 65.0)));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/applications")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "Asha", "email": "asha@x.com", "program": "CS" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::get("/api/applications/1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["data"]["name"], json!("Asha"));
    assert_eq!(body["data"]["program"], json!("CS"));
    assert_eq!(body["data"]["isEligible"], Value::Null);
}
