//! CET cutoff lookups and the rank-versus-cutoff eligibility rule.

mod table;

use serde::Serialize;

use super::domain::{AcademicYear, Category, CutoffEntry, ProgramCode};

pub use table::CutoffTable;

/// Read-only view of the published cutoff ranks.
pub trait CutoffSource: Send + Sync {
    fn cutoff(
        &self,
        program: &ProgramCode,
        academic_year: &AcademicYear,
        category: Category,
    ) -> Result<Option<u32>, CutoffError>;

    fn cutoffs_for_year(&self, academic_year: &AcademicYear)
        -> Result<Vec<CutoffEntry>, CutoffError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CutoffError {
    #[error("failed to read cutoff table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cutoff CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid cutoff row {line}: {message}")]
    InvalidRow { line: u64, message: String },
    #[error("cutoff source unavailable: {0}")]
    Unavailable(String),
}

/// Result of comparing a rank against its cutoff, echoed back for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub cutoff: u32,
    pub rank: u32,
    pub program: ProgramCode,
    pub category: Category,
}

impl EligibilityDecision {
    pub fn new(rank: u32, cutoff: u32, program: ProgramCode, category: Category) -> Self {
        Self {
            eligible: is_eligible(rank, cutoff),
            cutoff,
            rank,
            program,
            category,
        }
    }
}

/// A rank is admissible when it is at or better than (numerically below) the cutoff.
pub const fn is_eligible(rank: u32, cutoff: u32) -> bool {
    rank <= cutoff
}
