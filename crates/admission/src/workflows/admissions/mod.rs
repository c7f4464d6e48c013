//! Admission lifecycle: application intake, CET eligibility, document upload and verification,
//! and administrative status management.
//!
//! Persistence, binary storage, cutoff data, and confidence scoring are injected through the
//! traits in [`repository`], [`eligibility`], and [`verification`] so the service and router can
//! run against in-memory doubles or the SQLite/filesystem implementations in `crate::storage`.

pub mod domain;
pub mod eligibility;
pub mod intake;
pub mod repository;
pub mod router;
pub mod service;
pub mod verification;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicYear, Application, ApplicationStatus, ApplicationSubmission, Category, CetSubmission,
    CutoffEntry, DocumentRecord, EligibilityQuery, FinalStatus, InterviewUpdate, ProgramCode,
    Progress, StatusUpdate, Student, StudentId, UploadedFile, VerificationRecord,
    VerificationStatus,
};
pub use eligibility::{CutoffError, CutoffSource, CutoffTable, EligibilityDecision};
pub use intake::{IntakeError, UploadPolicy};
pub use repository::{
    AdmissionStats, ApplicationStatusView, DocumentVault, RecordStore, StoreError,
    StudentSummary, VaultError,
};
pub use router::lifecycle_router;
pub use service::{AdmissionLifecycleService, LifecycleError, LifecycleSettings};
pub use verification::{ConfidenceScorer, FixedConfidenceScorer, RandomConfidenceScorer};
