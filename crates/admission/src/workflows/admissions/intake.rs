use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::domain::{
    ApplicationStatus, ApplicationSubmission, CetSubmission, Category, EligibilityQuery,
    InterviewUpdate, ProgramCode, Progress, StatusUpdate, UploadedFile,
};

pub const CET_SCORE_MIN: i64 = 1;
pub const CET_SCORE_MAX: i64 = 200;

const ALLOWED_EXTENSIONS: [&str; 6] = ["jpeg", "jpg", "png", "pdf", "doc", "docx"];
const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failing field of a request, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|error| error.field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|error| error.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Why an individual file was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Empty,
    TooLarge { size: u64, limit: u64 },
    UnsupportedType { detected: String },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Empty => f.write_str("file is empty"),
            RejectionReason::TooLarge { size, limit } => {
                write!(f, "file too large ({size} bytes, limit {limit})")
            }
            RejectionReason::UnsupportedType { detected } => write!(
                f,
                "only images and documents are allowed (found {detected})"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub name: String,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: RejectionReason,
}

fn serialize_reason<S>(reason: &RejectionReason, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(reason)
}

/// Validation errors raised before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid request: {0}")]
    Validation(ValidationErrors),
    #[error("{} file(s) rejected", .0.len())]
    FileRejected(Vec<FileRejection>),
    #[error("no files uploaded")]
    NoFiles,
    #[error("no document uploaded")]
    NoFile,
    #[error("too many files (limit {limit}, received {received})")]
    TooManyFiles { limit: usize, received: usize },
}

/// Size and count limits applied to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    max_file_bytes: u64,
    max_files: usize,
}

impl UploadPolicy {
    pub const fn new(max_file_bytes: u64, max_files: usize) -> Self {
        Self {
            max_file_bytes,
            max_files,
        }
    }

    pub const fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    pub const fn max_files(&self) -> usize {
        self.max_files
    }

    /// Upper bound for a single multipart request body: every file at its limit plus 1 MiB for
    /// headers and form fields.
    pub fn request_body_limit(&self) -> usize {
        let files = self.max_file_bytes.saturating_mul(self.max_files as u64);
        usize::try_from(files.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(5 * 1024 * 1024, 5)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedApplicant {
    pub name: String,
    /// Trimmed and lower-cased; uniqueness is checked on this form.
    pub email: String,
    pub phone: Option<String>,
    pub program: ProgramCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCetApplicant {
    pub applicant: ValidatedApplicant,
    pub cet_score: u16,
    pub cet_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEligibilityQuery {
    pub cet_rank: u32,
    pub program: ProgramCode,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedStatusUpdate {
    pub status: ApplicationStatus,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInterview {
    pub date: chrono::NaiveDate,
    pub score: u8,
    pub remarks: Option<String>,
}

/// A file that passed the upload policy, with its resolved MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ScreenedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Guard turning raw portal payloads into validated intake values.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    policy: UploadPolicy,
}

impl IntakeGuard {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn applicant(
        &self,
        submission: &ApplicationSubmission,
    ) -> Result<ValidatedApplicant, IntakeError> {
        let mut errors = ValidationErrors::default();
        let applicant = collect_applicant(
            &mut errors,
            &submission.name,
            &submission.email,
            submission.phone.as_deref(),
            &submission.program,
        );
        match applicant {
            Some(applicant) if errors.is_empty() => Ok(applicant),
            _ => Err(IntakeError::Validation(errors)),
        }
    }

    pub fn cet_applicant(
        &self,
        submission: &CetSubmission,
    ) -> Result<ValidatedCetApplicant, IntakeError> {
        let mut errors = ValidationErrors::default();
        let applicant = collect_applicant(
            &mut errors,
            &submission.name,
            &submission.email,
            None,
            &submission.program,
        );
        let cet_score = collect_cet_score(&mut errors, submission.cet_score);
        let cet_rank = collect_rank(&mut errors, submission.cet_rank);

        match (applicant, cet_score, cet_rank) {
            (Some(applicant), Some(cet_score), Some(cet_rank)) if errors.is_empty() => {
                Ok(ValidatedCetApplicant {
                    applicant,
                    cet_score,
                    cet_rank,
                })
            }
            _ => Err(IntakeError::Validation(errors)),
        }
    }

    pub fn eligibility_query(
        &self,
        query: &EligibilityQuery,
    ) -> Result<ValidatedEligibilityQuery, IntakeError> {
        let mut errors = ValidationErrors::default();
        let cet_rank = collect_rank(&mut errors, query.cet_rank);
        let program = collect_program(&mut errors, &query.program);
        let category = match query.category.as_deref() {
            None => Some(Category::General),
            Some(raw) => {
                let parsed = Category::parse(raw);
                if parsed.is_none() {
                    errors.push("category", "Category must be general, obc, sc, or st");
                }
                parsed
            }
        };

        match (cet_rank, program, category) {
            (Some(cet_rank), Some(program), Some(category)) if errors.is_empty() => {
                Ok(ValidatedEligibilityQuery {
                    cet_rank,
                    program,
                    category,
                })
            }
            _ => Err(IntakeError::Validation(errors)),
        }
    }

    pub fn status_update(
        &self,
        update: &StatusUpdate,
    ) -> Result<ValidatedStatusUpdate, IntakeError> {
        let mut errors = ValidationErrors::default();
        let status = ApplicationStatus::parse(&update.status);
        if status.is_none() {
            errors.push(
                "status",
                "Status must be submitted, documents_pending, verified, accepted, or rejected",
            );
        }
        let progress = u8::try_from(update.progress).ok().and_then(Progress::new);
        if progress.is_none() {
            errors.push("progress", "Progress must be between 0 and 100");
        }

        match (status, progress) {
            (Some(status), Some(progress)) => Ok(ValidatedStatusUpdate { status, progress }),
            _ => Err(IntakeError::Validation(errors)),
        }
    }

    pub fn interview(&self, update: &InterviewUpdate) -> Result<ValidatedInterview, IntakeError> {
        let mut errors = ValidationErrors::default();
        let score = u8::try_from(update.score).ok().filter(|score| *score <= 100);
        if score.is_none() {
            errors.push("score", "Interview score must be between 0 and 100");
        }
        let remarks = update
            .remarks
            .as_deref()
            .map(str::trim)
            .filter(|remarks| !remarks.is_empty())
            .map(str::to_string);

        match score {
            Some(score) => Ok(ValidatedInterview {
                date: update.date,
                score,
                remarks,
            }),
            None => Err(IntakeError::Validation(errors)),
        }
    }

    pub fn document_type(&self, raw: Option<&str>) -> Result<String, IntakeError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Ok(value.to_string()),
            None => {
                let mut errors = ValidationErrors::default();
                errors.push("documentType", "Document type is required");
                Err(IntakeError::Validation(errors))
            }
        }
    }

    /// Screen a bulk upload. Every file is checked so the caller sees all rejections at once.
    pub fn screen_batch(&self, files: Vec<UploadedFile>) -> Result<Vec<ScreenedFile>, IntakeError> {
        if files.is_empty() {
            return Err(IntakeError::NoFiles);
        }
        if files.len() > self.policy.max_files {
            return Err(IntakeError::TooManyFiles {
                limit: self.policy.max_files,
                received: files.len(),
            });
        }

        let mut accepted = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();
        for file in files {
            match self.screen(file) {
                Ok(screened) => accepted.push(screened),
                Err(rejection) => rejected.push(rejection),
            }
        }

        if rejected.is_empty() {
            Ok(accepted)
        } else {
            Err(IntakeError::FileRejected(rejected))
        }
    }

    pub fn screen_single(&self, file: Option<UploadedFile>) -> Result<ScreenedFile, IntakeError> {
        let file = file.ok_or(IntakeError::NoFile)?;
        self.screen(file)
            .map_err(|rejection| IntakeError::FileRejected(vec![rejection]))
    }

    fn screen(&self, file: UploadedFile) -> Result<ScreenedFile, FileRejection> {
        let name = display_name(&file.name);
        let reject = |reason| FileRejection {
            name: name.clone(),
            reason,
        };

        if file.bytes.is_empty() {
            return Err(reject(RejectionReason::Empty));
        }
        if file.size() > self.policy.max_file_bytes {
            return Err(reject(RejectionReason::TooLarge {
                size: file.size(),
                limit: self.policy.max_file_bytes,
            }));
        }

        let extension = Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mime = resolve_mime(&name, file.content_type.as_deref());

        let extension_allowed = ALLOWED_EXTENSIONS.contains(&extension.as_str());
        let mime_allowed = mime
            .as_deref()
            .is_some_and(|essence| ALLOWED_MIME_TYPES.contains(&essence));

        match mime {
            Some(mime) if extension_allowed && mime_allowed => Ok(ScreenedFile {
                name,
                mime,
                bytes: file.bytes,
            }),
            other => Err(reject(RejectionReason::UnsupportedType {
                detected: other.unwrap_or_else(|| format!(".{extension}")),
            })),
        }
    }
}

fn collect_applicant(
    errors: &mut ValidationErrors,
    name: &str,
    email: &str,
    phone: Option<&str>,
    program: &str,
) -> Option<ValidatedApplicant> {
    let name = name.trim();
    if name.is_empty() {
        errors.push("name", "Name is required");
    }
    let email = email.trim().to_ascii_lowercase();
    if !is_valid_email(&email) {
        errors.push("email", "Valid email is required");
    }
    let program = collect_program(errors, program);
    let phone = phone
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .map(str::to_string);

    if name.is_empty() || !is_valid_email(&email) {
        return None;
    }
    Some(ValidatedApplicant {
        name: name.to_string(),
        email,
        phone,
        program: program?,
    })
}

fn collect_program(errors: &mut ValidationErrors, raw: &str) -> Option<ProgramCode> {
    let program = ProgramCode::parse(raw);
    if program.is_none() {
        errors.push("program", "Program is required");
    }
    program
}

fn collect_cet_score(errors: &mut ValidationErrors, raw: Option<i64>) -> Option<u16> {
    match raw {
        Some(score) if (CET_SCORE_MIN..=CET_SCORE_MAX).contains(&score) => {
            u16::try_from(score).ok()
        }
        _ => {
            errors.push("cetScore", "Valid CET score required");
            None
        }
    }
}

fn collect_rank(errors: &mut ValidationErrors, raw: Option<i64>) -> Option<u32> {
    match raw.and_then(|rank| u32::try_from(rank).ok()).filter(|rank| *rank >= 1) {
        Some(rank) => Some(rank),
        None => {
            errors.push("cetRank", "Valid CET rank required");
            None
        }
    }
}

/// Syntactic check only: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Drop any client-supplied directory components from an upload name.
fn display_name(raw: &str) -> String {
    let normalized = raw.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or_default().trim();
    if base.is_empty() {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

/// Prefer the declared content type; fall back to guessing from the file name.
fn resolve_mime(name: &str, declared: Option<&str>) -> Option<String> {
    let declared = declared
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .filter(|parsed| *parsed != mime::APPLICATION_OCTET_STREAM);
    declared
        .or_else(|| mime_guess::from_path(name).first())
        .map(|parsed| parsed.essence_str().to_ascii_lowercase())
}
