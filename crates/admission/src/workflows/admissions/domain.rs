use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier for an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Department/program code, normalized to upper case (`cs` and `CS` are the same program).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProgramCode(String);

impl ProgramCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProgramCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid program code '{value}'"))
    }
}

impl From<ProgramCode> for String {
    fn from(value: ProgramCode) -> Self {
        value.0
    }
}

impl fmt::Display for ProgramCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Academic year label such as `2024-25`; the suffix must be the following year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear(String);

impl AcademicYear {
    pub fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.trim().split_once('-')?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if start.len() != 4 || end.len() != 2 || !digits(start) || !digits(end) {
            return None;
        }
        let start_year: u16 = start.parse().ok()?;
        let end_suffix: u16 = end.parse().ok()?;
        if (start_year + 1) % 100 != end_suffix {
            return None;
        }
        Some(Self(format!("{start}-{end}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AcademicYear {
    fn default() -> Self {
        Self("2024-25".to_string())
    }
}

impl TryFrom<String> for AcademicYear {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid academic year '{value}'"))
    }
}

impl From<AcademicYear> for String {
    fn from(value: AcademicYear) -> Self {
        value.0
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reservation category a cutoff is published for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Obc,
    Sc,
    St,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::General, Category::Obc, Category::Sc, Category::St];

    pub const fn label(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Obc => "obc",
            Category::Sc => "sc",
            Category::St => "st",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.label() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse milestone indicator in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const SUBMITTED: Progress = Progress(25);
    pub const COMPLETE: Progress = Progress(100);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= 100 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Advance by `step.increment` without passing `step.cap`. Never lowers the current value, so
    /// a figure set above the cap by an administrator survives applicant activity.
    pub fn advanced(self, step: ProgressStep) -> Self {
        let raised = self.0.saturating_add(step.increment).min(step.cap.0);
        Self(self.0.max(raised))
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStep {
    pub increment: u8,
    pub cap: Progress,
}

impl ProgressStep {
    pub const UPLOAD: ProgressStep = ProgressStep {
        increment: 25,
        cap: Progress(75),
    };
    pub const VERIFICATION: ProgressStep = ProgressStep {
        increment: 15,
        cap: Progress(90),
    };
}

/// Where an application sits in the admission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    DocumentsPending,
    Verified,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::DocumentsPending => "documents_pending",
            ApplicationStatus::Verified => "verified",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "submitted" => Some(Self::Submitted),
            "documents_pending" => Some(Self::DocumentsPending),
            "verified" => Some(Self::Verified),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    /// Transition table. Remaining in place is always allowed; terminal states admit nothing else.
    pub fn can_transition_to(self, target: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self == target {
            return true;
        }
        match self {
            Submitted => matches!(target, DocumentsPending | Verified | Accepted | Rejected),
            DocumentsPending => matches!(target, Verified | Accepted | Rejected),
            Verified => matches!(target, Accepted | Rejected),
            Accepted | Rejected => false,
        }
    }

    /// Final decision recorded on the application row for terminal states.
    pub const fn final_status(self) -> Option<FinalStatus> {
        match self {
            ApplicationStatus::Accepted => Some(FinalStatus::Accepted),
            ApplicationStatus::Rejected => Some(FinalStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FinalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FinalStatus::Pending => "pending",
            FinalStatus::Accepted => "accepted",
            FinalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    AiVerified,
    ManuallyVerified,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::AiVerified => "ai_verified",
            VerificationStatus::ManuallyVerified => "manually_verified",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "ai_verified" => Some(Self::AiVerified),
            "manually_verified" => Some(Self::ManuallyVerified),
            _ => None,
        }
    }

    pub const fn is_verified(self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }
}

/// Progress change plus the status an applicant action would like to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleAdvance {
    pub step: ProgressStep,
    pub promote_to: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub program: ProgramCode,
    pub cet_score: Option<u16>,
    pub cet_rank: Option<u32>,
    /// Set once at CET submission; `None` on the plain application path.
    pub is_eligible: Option<bool>,
    #[serde(rename = "progressPercentage")]
    pub progress: Progress,
    #[serde(rename = "applicationStatus")]
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Apply an applicant-facing advance. Status promotion is skipped when the transition table
    /// forbids it.
    pub fn advance(&mut self, advance: LifecycleAdvance) {
        self.progress = self.progress.advanced(advance.step);
        if let Some(target) = advance.promote_to {
            if self.status.can_transition_to(target) {
                self.status = target;
            }
        }
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        Progress::new(raw).ok_or_else(|| serde::de::Error::custom("progress exceeds 100"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub student_id: StudentId,
    pub academic_year: AcademicYear,
    pub entrance_score: Option<u16>,
    pub interview_date: Option<NaiveDate>,
    pub interview_score: Option<u8>,
    pub final_status: FinalStatus,
    pub remarks: Option<String>,
}

impl Application {
    pub fn new(
        student_id: StudentId,
        academic_year: AcademicYear,
        entrance_score: Option<u16>,
    ) -> Self {
        Self {
            student_id,
            academic_year,
            entrance_score,
            interview_date: None,
            interview_score: None,
            final_status: FinalStatus::Pending,
            remarks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: u64,
    pub student_id: StudentId,
    pub name: String,
    pub storage_path: String,
    /// MIME type for bulk uploads, logical category (e.g. `10th`) for verification uploads.
    pub document_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub id: u64,
    pub student_id: StudentId,
    pub document_type: String,
    pub status: VerificationStatus,
    pub confidence: f64,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffEntry {
    pub program: ProgramCode,
    pub academic_year: AcademicYear,
    pub category: Category,
    pub rank_cutoff: u32,
}

/// Plain application form as posted by the portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub program: String,
}

/// CET application form. Numeric fields stay wide so out-of-range input reaches validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CetSubmission {
    pub name: String,
    pub email: String,
    pub cet_score: Option<i64>,
    pub cet_rank: Option<i64>,
    pub program: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EligibilityQuery {
    pub cet_rank: Option<i64>,
    pub program: String,
    pub category: Option<String>,
}

/// Administrative override of status and progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: String,
    pub progress: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewUpdate {
    pub date: NaiveDate,
    pub score: i64,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// File bytes received from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
