use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

use crate::storage::{MemoryRecordStore, MemoryVault};
use crate::workflows::admissions::domain::{
    Application, ApplicationSubmission, CetSubmission, DocumentRecord, LifecycleAdvance,
    Student, StudentId, UploadedFile, VerificationRecord,
};
use crate::workflows::admissions::eligibility::CutoffTable;
use crate::workflows::admissions::intake::UploadPolicy;
use crate::workflows::admissions::repository::{
    DocumentVault, InterviewRecord, NewApplicant, NewDocument, NewVerification, RecordStore,
    StatusOverride, StoreCounts, StoreError, StudentSummary, VaultError,
};
use crate::workflows::admissions::service::{AdmissionLifecycleService, LifecycleSettings};
use crate::workflows::admissions::verification::FixedConfidenceScorer;

pub(super) const BOUNDARY: &str = "admission-test-boundary";

pub(super) fn asha() -> ApplicationSubmission {
    ApplicationSubmission {
        name: "Asha".to_string(),
        email: "asha@x.com".to_string(),
        phone: Some("9876543210".to_string()),
        program: "cs".to_string(),
    }
}

pub(super) fn cet_submission(email: &str, rank: i64) -> CetSubmission {
    CetSubmission {
        name: "Ravi".to_string(),
        email: email.to_string(),
        cet_score: Some(150),
        cet_rank: Some(rank),
        program: "CS".to_string(),
    }
}

pub(super) fn pdf(name: &str) -> UploadedFile {
    UploadedFile::new(name, Some("application/pdf"), b"%PDF-1.4 test".to_vec())
}

pub(super) fn settings(policy: UploadPolicy) -> LifecycleSettings {
    LifecycleSettings {
        upload_policy: policy,
        ..LifecycleSettings::default()
    }
}

pub(super) type MemoryService = AdmissionLifecycleService<MemoryRecordStore, MemoryVault>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryRecordStore>, Arc<MemoryVault>) {
    build_service_with(85.0, UploadPolicy::default())
}

pub(super) fn build_service_with(
    confidence: f64,
    policy: UploadPolicy,
) -> (MemoryService, Arc<MemoryRecordStore>, Arc<MemoryVault>) {
    let store = Arc::new(MemoryRecordStore::new());
    let vault = Arc::new(MemoryVault::new());
    let service = AdmissionLifecycleService::new(
        store.clone(),
        vault.clone(),
        Arc::new(CutoffTable::seeded()),
        Arc::new(FixedConfidenceScorer(confidence)),
        settings(policy),
    );
    (service, store, vault)
}

pub(super) fn service_over<S, V>(store: Arc<S>, vault: Arc<V>) -> AdmissionLifecycleService<S, V>
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    AdmissionLifecycleService::new(
        store,
        vault,
        Arc::new(CutoffTable::seeded()),
        Arc::new(FixedConfidenceScorer(85.0)),
        LifecycleSettings::default(),
    )
}

/// One multipart form field; `file_name` marks it as a file part.
pub(super) struct Part {
    field: &'static str,
    file_name: Option<&'static str>,
    bytes: Vec<u8>,
}

pub(super) fn file_part(field: &'static str, file_name: &'static str, bytes: &[u8]) -> Part {
    Part {
        field,
        file_name: Some(file_name),
        bytes: bytes.to_vec(),
    }
}

pub(super) fn text_part(field: &'static str, value: &str) -> Part {
    Part {
        field,
        file_name: None,
        bytes: value.as_bytes().to_vec(),
    }
}

pub(super) fn multipart_request(uri: &str, parts: Vec<Part>) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                part.field
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                part.field
            ),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("valid multipart request")
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid json request")
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Store whose every call fails, for exercising the 500 path.
pub(super) struct UnavailableStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl RecordStore for UnavailableStore {
    fn email_exists(&self, _email: &str) -> Result<bool, StoreError> {
        unavailable()
    }

    fn create_applicant(&self, _applicant: NewApplicant) -> Result<StudentId, StoreError> {
        unavailable()
    }

    fn fetch_student(&self, _id: StudentId) -> Result<Option<Student>, StoreError> {
        unavailable()
    }

    fn fetch_application(&self, _id: StudentId) -> Result<Option<Application>, StoreError> {
        unavailable()
    }

    fn record_uploads(
        &self,
        _id: StudentId,
        _documents: Vec<NewDocument>,
        _advance: LifecycleAdvance,
    ) -> Result<(Vec<DocumentRecord>, Student), StoreError> {
        unavailable()
    }

    fn record_verification(
        &self,
        _id: StudentId,
        _document: NewDocument,
        _verification: NewVerification,
        _advance: LifecycleAdvance,
    ) -> Result<(VerificationRecord, Student), StoreError> {
        unavailable()
    }

    fn overwrite_status(
        &self,
        _id: StudentId,
        _update: StatusOverride,
    ) -> Result<Student, StoreError> {
        unavailable()
    }

    fn record_interview(
        &self,
        _id: StudentId,
        _interview: InterviewRecord,
    ) -> Result<Application, StoreError> {
        unavailable()
    }

    fn documents(&self, _id: StudentId) -> Result<Vec<DocumentRecord>, StoreError> {
        unavailable()
    }

    fn verifications(&self, _id: StudentId) -> Result<Vec<VerificationRecord>, StoreError> {
        unavailable()
    }

    fn search_students(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<StudentSummary>, StoreError> {
        unavailable()
    }

    fn stats(&self) -> Result<StoreCounts, StoreError> {
        unavailable()
    }
}

/// Vault that refuses every write.
pub(super) struct FullVault;

impl DocumentVault for FullVault {
    fn put(&self, _key: &str, _bytes: &[u8]) -> Result<String, VaultError> {
        Err(VaultError::Unavailable("disk full".to_string()))
    }
}

/// Vault that reports the first `refusals` keys as already taken, then stores normally.
pub(super) struct CrowdedVault {
    refusals: AtomicU32,
    pub(super) attempts: AtomicU32,
    pub(super) inner: MemoryVault,
}

impl CrowdedVault {
    pub(super) fn refusing(refusals: u32) -> Self {
        Self {
            refusals: AtomicU32::new(refusals),
            attempts: AtomicU32::new(0),
            inner: MemoryVault::new(),
        }
    }
}

impl DocumentVault for CrowdedVault {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, VaultError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(VaultError::KeyTaken(key.to_string()));
        }
        self.inner.put(key, bytes)
    }
}
