use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    AcademicYear, Application, ApplicationStatus, DocumentRecord, FinalStatus, LifecycleAdvance,
    ProgramCode, Progress, Student, StudentId, VerificationRecord, VerificationStatus,
};

/// Student and application rows written together at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplicant {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub program: ProgramCode,
    pub cet_score: Option<u16>,
    pub cet_rank: Option<u32>,
    pub is_eligible: Option<bool>,
    pub progress: Progress,
    pub academic_year: AcademicYear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub name: String,
    pub storage_path: String,
    pub document_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVerification {
    pub document_type: String,
    pub status: VerificationStatus,
    pub confidence: f64,
}

/// Administrative overwrite; the progress value is applied as-is. The store refuses the write
/// with `TransitionRefused` unless the stored status may move to `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOverride {
    pub status: ApplicationStatus,
    pub progress: Progress,
    pub final_status: Option<FinalStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewRecord {
    pub date: NaiveDate,
    pub score: u8,
    pub remarks: Option<String>,
}

/// Durable storage for the admission lifecycle.
///
/// Implementations own the correctness guarantees the service relies on:
/// `create_applicant` must reject a second student with the same email even when the
/// `email_exists` pre-check raced, and each multi-row operation must commit atomically.
pub trait RecordStore: Send + Sync {
    /// Early-exit check only; `create_applicant` is the authority on uniqueness.
    fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    fn create_applicant(&self, applicant: NewApplicant) -> Result<StudentId, StoreError>;

    fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;

    fn fetch_application(&self, id: StudentId) -> Result<Option<Application>, StoreError>;

    /// Insert the documents and apply the advance in one unit of work.
    fn record_uploads(
        &self,
        id: StudentId,
        documents: Vec<NewDocument>,
        advance: LifecycleAdvance,
    ) -> Result<(Vec<DocumentRecord>, Student), StoreError>;

    /// Insert the document, its verification record, and apply the advance in one unit of work.
    fn record_verification(
        &self,
        id: StudentId,
        document: NewDocument,
        verification: NewVerification,
        advance: LifecycleAdvance,
    ) -> Result<(VerificationRecord, Student), StoreError>;

    fn overwrite_status(&self, id: StudentId, update: StatusOverride)
        -> Result<Student, StoreError>;

    fn record_interview(
        &self,
        id: StudentId,
        interview: InterviewRecord,
    ) -> Result<Application, StoreError>;

    /// Oldest first.
    fn documents(&self, id: StudentId) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Newest first.
    fn verifications(&self, id: StudentId) -> Result<Vec<VerificationRecord>, StoreError>;

    fn search_students(&self, query: &str, limit: usize)
        -> Result<Vec<StudentSummary>, StoreError>;

    fn stats(&self) -> Result<StoreCounts, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("application not found")]
    NotFound,
    #[error("cannot move application from {from} to {to}")]
    TransitionRefused {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Binary storage for uploaded document contents.
///
/// `put` never replaces stored bytes: a key that is already taken fails with
/// [`VaultError::KeyTaken`].
pub trait DocumentVault: Send + Sync {
    /// Persist `bytes` under `key`, returning the storage path recorded on the document row.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, VaultError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("failed to store document: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage key already in use: {0}")]
    KeyTaken(String),
    #[error("document vault unavailable: {0}")]
    Unavailable(String),
}

/// Raw counters behind the admissions dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub total_applications: u64,
    pub eligible_applications: u64,
    pub verified_documents: u64,
    pub accepted_applications: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub program: ProgramCode,
    pub application_status: ApplicationStatus,
    pub progress_percentage: Progress,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            name: student.name.clone(),
            email: student.email.clone(),
            program: student.program.clone(),
            application_status: student.status,
            progress_percentage: student.progress,
        }
    }
}

/// Merged student and application view returned by status lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusView {
    pub student_id: StudentId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub program: ProgramCode,
    pub cet_score: Option<u16>,
    pub cet_rank: Option<u32>,
    pub is_eligible: Option<bool>,
    pub progress_percentage: Progress,
    pub application_status: ApplicationStatus,
    pub academic_year: Option<AcademicYear>,
    pub entrance_score: Option<u16>,
    pub interview_date: Option<NaiveDate>,
    pub interview_score: Option<u8>,
    pub final_status: Option<FinalStatus>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApplicationStatusView {
    /// The application side is optional so a student row alone still renders.
    pub fn merge(student: Student, application: Option<Application>) -> Self {
        let decided = application.as_ref();
        Self {
            student_id: student.id,
            name: student.name,
            email: student.email,
            phone: student.phone,
            program: student.program,
            cet_score: student.cet_score,
            cet_rank: student.cet_rank,
            is_eligible: student.is_eligible,
            progress_percentage: student.progress,
            application_status: student.status,
            academic_year: decided.map(|application| application.academic_year.clone()),
            entrance_score: decided.and_then(|application| application.entrance_score),
            interview_date: decided.and_then(|application| application.interview_date),
            interview_score: decided.and_then(|application| application.interview_score),
            final_status: decided.map(|application| application.final_status),
            remarks: application.and_then(|application| application.remarks),
            created_at: student.created_at,
        }
    }
}

/// Dashboard figures with rounded percentage rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStats {
    pub total_applications: u64,
    pub eligible_applications: u64,
    pub verified_documents: u64,
    pub accepted_applications: u64,
    pub eligibility_rate: u64,
    pub acceptance_rate: u64,
}

impl From<StoreCounts> for AdmissionStats {
    fn from(counts: StoreCounts) -> Self {
        Self {
            total_applications: counts.total_applications,
            eligible_applications: counts.eligible_applications,
            verified_documents: counts.verified_documents,
            accepted_applications: counts.accepted_applications,
            eligibility_rate: rounded_rate(counts.eligible_applications, counts.total_applications),
            acceptance_rate: rounded_rate(counts.accepted_applications, counts.total_applications),
        }
    }
}

fn rounded_rate(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_round_and_handle_empty_totals() {
        let stats = AdmissionStats::from(StoreCounts {
            total_applications: 3,
            eligible_applications: 2,
            verified_documents: 4,
            accepted_applications: 1,
        });
        assert_eq!(stats.eligibility_rate, 67);
        assert_eq!(stats.acceptance_rate, 33);
        assert_eq!(AdmissionStats::from(StoreCounts::default()).eligibility_rate, 0);
    }
}
