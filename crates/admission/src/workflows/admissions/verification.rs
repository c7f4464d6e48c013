use rand::Rng;

use super::domain::VerificationStatus;
use super::intake::ScreenedFile;

/// Confidence strictly above this marks a document as machine-verified.
pub const AI_VERIFIED_THRESHOLD: f64 = 80.0;

/// Authenticity signal for an uploaded document, in `0..=100`.
pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, document_type: &str, file: &ScreenedFile) -> f64;
}

/// Placeholder scorer drawing uniformly from `[60, 100)` until a real authenticity service is
/// wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomConfidenceScorer;

impl ConfidenceScorer for RandomConfidenceScorer {
    fn score(&self, _document_type: &str, _file: &ScreenedFile) -> f64 {
        rand::rng().random_range(60.0..100.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedConfidenceScorer(pub f64);

impl ConfidenceScorer for FixedConfidenceScorer {
    fn score(&self, _document_type: &str, _file: &ScreenedFile) -> f64 {
        self.0
    }
}

/// Clamp scorer output into range; NaN counts as no confidence.
pub fn normalize_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

pub fn classify(confidence: f64) -> VerificationStatus {
    if confidence > AI_VERIFIED_THRESHOLD {
        VerificationStatus::AiVerified
    } else {
        VerificationStatus::Pending
    }
}
