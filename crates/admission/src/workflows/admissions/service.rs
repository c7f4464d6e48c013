use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    AcademicYear, ApplicationStatus, ApplicationSubmission, Category, CetSubmission,
    CutoffEntry, DocumentRecord, EligibilityQuery, InterviewUpdate, LifecycleAdvance,
    ProgramCode, Progress, ProgressStep, StatusUpdate, StudentId, UploadedFile,
    VerificationRecord, VerificationStatus,
};
use super::eligibility::{CutoffError, CutoffSource, EligibilityDecision};
use super::intake::{IntakeError, IntakeGuard, ScreenedFile, UploadPolicy};
use super::repository::{
    AdmissionStats, ApplicationStatusView, DocumentVault, InterviewRecord, NewApplicant,
    NewDocument, NewVerification, RecordStore, StatusOverride, StoreError, StudentSummary,
    VaultError,
};
use super::verification::{classify, normalize_confidence, ConfidenceScorer};

pub const SEARCH_LIMIT: usize = 50;
const STORAGE_KEY_ATTEMPTS: u32 = 4;

/// Academic year and intake limits the service runs under.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSettings {
    pub academic_year: AcademicYear,
    pub upload_policy: UploadPolicy,
}

/// Orchestrates the admission lifecycle over the injected collaborators.
pub struct AdmissionLifecycleService<S, V> {
    guard: IntakeGuard,
    store: Arc<S>,
    vault: Arc<V>,
    cutoffs: Arc<dyn CutoffSource>,
    scorer: Arc<dyn ConfidenceScorer>,
    academic_year: AcademicYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CetSubmissionOutcome {
    pub student_id: StudentId,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedFile {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    #[serde(rename = "files")]
    pub accepted: Vec<AcceptedFile>,
    pub progress_percentage: Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub verification_status: VerificationStatus,
    /// Rounded for display; the stored record keeps the raw score.
    pub ai_confidence: u8,
    pub progress_percentage: Progress,
}

impl<S, V> AdmissionLifecycleService<S, V>
where
    S: RecordStore + 'static,
    V: DocumentVault + 'static,
{
    pub fn new(
        store: Arc<S>,
        vault: Arc<V>,
        cutoffs: Arc<dyn CutoffSource>,
        scorer: Arc<dyn ConfidenceScorer>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            guard: IntakeGuard::new(settings.upload_policy),
            store,
            vault,
            cutoffs,
            scorer,
            academic_year: settings.academic_year,
        }
    }

    pub fn academic_year(&self) -> &AcademicYear {
        &self.academic_year
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        self.guard.policy()
    }

    /// Record a plain (non-CET) application, returning the new student id.
    pub fn submit(&self, submission: ApplicationSubmission) -> Result<StudentId, LifecycleError> {
        let applicant = self.guard.applicant(&submission)?;
        self.ensure_email_available(&applicant.email)?;

        let id = self.store.create_applicant(NewApplicant {
            name: applicant.name,
            email: applicant.email,
            phone: applicant.phone,
            program: applicant.program.clone(),
            cet_score: None,
            cet_rank: None,
            is_eligible: None,
            progress: Progress::SUBMITTED,
            academic_year: self.academic_year.clone(),
        })?;

        info!(student_id = %id, program = %applicant.program, "application submitted");
        Ok(id)
    }

    /// Record a CET application. An ineligible rank is still a successful submission.
    pub fn submit_cet(
        &self,
        submission: CetSubmission,
    ) -> Result<CetSubmissionOutcome, LifecycleError> {
        let validated = self.guard.cet_applicant(&submission)?;
        let applicant = validated.applicant;
        let decision = self.decide(validated.cet_rank, &applicant.program, Category::General)?;
        self.ensure_email_available(&applicant.email)?;

        let progress = if decision.eligible {
            Progress::SUBMITTED
        } else {
            Progress::ZERO
        };
        let student_id = self.store.create_applicant(NewApplicant {
            name: applicant.name,
            email: applicant.email,
            phone: applicant.phone,
            program: applicant.program,
            cet_score: Some(validated.cet_score),
            cet_rank: Some(validated.cet_rank),
            is_eligible: Some(decision.eligible),
            progress,
            academic_year: self.academic_year.clone(),
        })?;

        info!(
            student_id = %student_id,
            program = %decision.program,
            rank = decision.rank,
            cutoff = decision.cutoff,
            eligible = decision.eligible,
            "CET application submitted"
        );
        Ok(CetSubmissionOutcome {
            student_id,
            eligible: decision.eligible,
        })
    }

    /// Read-only eligibility check against the current year's cutoff.
    pub fn check_eligibility(
        &self,
        query: EligibilityQuery,
    ) -> Result<EligibilityDecision, LifecycleError> {
        let query = self.guard.eligibility_query(&query)?;
        self.decide(query.cet_rank, &query.program, query.category)
    }

    pub fn upload_documents(
        &self,
        student_id: StudentId,
        files: Vec<UploadedFile>,
    ) -> Result<UploadOutcome, LifecycleError> {
        self.require_student(student_id)?;
        let screened = self.guard.screen_batch(files)?;

        let mut documents = Vec::with_capacity(screened.len());
        for file in &screened {
            let storage_path = self.store_file(student_id, file)?;
            documents.push(NewDocument {
                name: file.name.clone(),
                storage_path,
                document_type: file.mime.clone(),
                size_bytes: file.size(),
            });
        }

        let (stored, student) = self.store.record_uploads(
            student_id,
            documents,
            LifecycleAdvance {
                step: ProgressStep::UPLOAD,
                promote_to: Some(ApplicationStatus::DocumentsPending),
            },
        )?;

        info!(
            student_id = %student_id,
            files = stored.len(),
            progress = student.progress.value(),
            "documents uploaded"
        );
        Ok(UploadOutcome {
            accepted: stored
                .into_iter()
                .map(|document| AcceptedFile {
                    name: document.name,
                    size: document.size_bytes,
                })
                .collect(),
            progress_percentage: student.progress,
        })
    }

    pub fn verify_document(
        &self,
        student_id: StudentId,
        document_type: Option<String>,
        file: Option<UploadedFile>,
    ) -> Result<VerificationOutcome, LifecycleError> {
        self.require_student(student_id)?;
        let file = self.guard.screen_single(file)?;
        let document_type = self.guard.document_type(document_type.as_deref())?;

        let confidence = normalize_confidence(self.scorer.score(&document_type, &file));
        let status = classify(confidence);

        let storage_path = self.store_file(student_id, &file)?;
        let promote_to = (status == VerificationStatus::AiVerified)
            .then_some(ApplicationStatus::Verified);
        let (record, student) = self.store.record_verification(
            student_id,
            NewDocument {
                name: file.name.clone(),
                storage_path,
                document_type: document_type.clone(),
                size_bytes: file.size(),
            },
            NewVerification {
                document_type,
                status,
                confidence,
            },
            LifecycleAdvance {
                step: ProgressStep::VERIFICATION,
                promote_to,
            },
        )?;

        info!(
            student_id = %student_id,
            document_type = %record.document_type,
            status = record.status.label(),
            confidence,
            progress = student.progress.value(),
            "document verification recorded"
        );
        Ok(VerificationOutcome {
            verification_status: record.status,
            ai_confidence: confidence.round() as u8,
            progress_percentage: student.progress,
        })
    }

    pub fn status(&self, student_id: StudentId) -> Result<ApplicationStatusView, LifecycleError> {
        let student = self.require_student(student_id)?;
        let application = self.store.fetch_application(student_id)?;
        Ok(ApplicationStatusView::merge(student, application))
    }

    /// Administrative override. Progress is taken as given; the store applies the status change
    /// only if the transition table allows it from the status it holds at write time.
    pub fn update_status(
        &self,
        student_id: StudentId,
        update: StatusUpdate,
    ) -> Result<ApplicationStatusView, LifecycleError> {
        let update = self.guard.status_update(&update)?;
        let result = self.store.overwrite_status(
            student_id,
            StatusOverride {
                status: update.status,
                progress: update.progress,
                final_status: update.status.final_status(),
            },
        );
        let student = match result {
            Ok(student) => student,
            Err(StoreError::TransitionRefused { from, to }) => {
                warn!(
                    student_id = %student_id,
                    from = from.label(),
                    to = to.label(),
                    "rejected status transition"
                );
                return Err(LifecycleError::InvalidTransition { from, to });
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            student_id = %student_id,
            status = student.status.label(),
            progress = student.progress.value(),
            "application status overridden"
        );

        let application = self.store.fetch_application(student_id)?;
        Ok(ApplicationStatusView::merge(student, application))
    }

    pub fn record_interview(
        &self,
        student_id: StudentId,
        update: InterviewUpdate,
    ) -> Result<ApplicationStatusView, LifecycleError> {
        let interview = self.guard.interview(&update)?;
        let student = self.require_student(student_id)?;
        let application = self.store.record_interview(
            student_id,
            InterviewRecord {
                date: interview.date,
                score: interview.score,
                remarks: interview.remarks,
            },
        )?;
        info!(student_id = %student_id, score = application.interview_score, "interview recorded");
        Ok(ApplicationStatusView::merge(student, Some(application)))
    }

    pub fn documents(&self, student_id: StudentId) -> Result<Vec<DocumentRecord>, LifecycleError> {
        self.require_student(student_id)?;
        Ok(self.store.documents(student_id)?)
    }

    pub fn verification_history(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<VerificationRecord>, LifecycleError> {
        self.require_student(student_id)?;
        Ok(self.store.verifications(student_id)?)
    }

    /// Cutoffs for `academic_year`, defaulting to the current year.
    pub fn cutoffs(
        &self,
        academic_year: Option<&AcademicYear>,
    ) -> Result<Vec<CutoffEntry>, LifecycleError> {
        let year = academic_year.unwrap_or(&self.academic_year);
        Ok(self.cutoffs.cutoffs_for_year(year)?)
    }

    pub fn search(&self, query: &str) -> Result<Vec<StudentSummary>, LifecycleError> {
        Ok(self.store.search_students(query.trim(), SEARCH_LIMIT)?)
    }

    pub fn stats(&self) -> Result<AdmissionStats, LifecycleError> {
        Ok(self.store.stats()?.into())
    }

    fn decide(
        &self,
        rank: u32,
        program: &ProgramCode,
        category: Category,
    ) -> Result<EligibilityDecision, LifecycleError> {
        match self.cutoffs.cutoff(program, &self.academic_year, category)? {
            Some(cutoff) => Ok(EligibilityDecision::new(
                rank,
                cutoff,
                program.clone(),
                category,
            )),
            None => {
                warn!(
                    program = %program,
                    category = %category,
                    year = %self.academic_year,
                    "no cutoff published"
                );
                Err(LifecycleError::CutoffNotFound {
                    program: program.clone(),
                    academic_year: self.academic_year.clone(),
                    category,
                })
            }
        }
    }

    fn ensure_email_available(&self, email: &str) -> Result<(), LifecycleError> {
        if self.store.email_exists(email)? {
            info!("submission rejected: email already registered");
            return Err(StoreError::DuplicateEmail.into());
        }
        Ok(())
    }

    fn require_student(
        &self,
        student_id: StudentId,
    ) -> Result<super::domain::Student, LifecycleError> {
        self.store
            .fetch_student(student_id)?
            .ok_or(LifecycleError::Store(StoreError::NotFound))
    }

    /// Writes under a fresh key, drawing a new nonce whenever the vault reports the key taken.
    fn store_file(
        &self,
        student_id: StudentId,
        file: &ScreenedFile,
    ) -> Result<String, LifecycleError> {
        let mut attempt = 1;
        loop {
            let key = storage_key(
                student_id,
                Utc::now().timestamp_millis(),
                rand::random::<u32>(),
                &file.name,
            );
            match self.vault.put(&key, &file.bytes) {
                Err(VaultError::KeyTaken(_)) if attempt < STORAGE_KEY_ATTEMPTS => attempt += 1,
                result => return Ok(result?),
            }
        }
    }
}

/// `<student>/<millis>-<nonce>-<name>`, with the name reduced to a filesystem-safe form.
pub fn storage_key(student_id: StudentId, stamp: i64, nonce: u32, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.');
    let safe = if safe.is_empty() { "document" } else { safe };
    format!("{student_id}/{stamp}-{nonce:08x}-{safe}")
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Cutoffs(#[from] CutoffError),
    #[error("cutoff data not found for {program} ({category}) in {academic_year}")]
    CutoffNotFound {
        program: ProgramCode,
        academic_year: AcademicYear,
        category: Category,
    },
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}
