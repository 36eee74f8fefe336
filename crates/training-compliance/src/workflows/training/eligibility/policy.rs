use serde::{Deserialize, Serialize};

use super::super::documents::DocumentCompleteness;

/// Why an enrollment cannot be certified yet. Several may apply at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    MissingDocuments { completeness: DocumentCompleteness },
    NoScore,
    InsufficientScore { score: u8, threshold: u8 },
    AlreadyCertified,
    NoExternalCertificate,
}

impl IneligibilityReason {
    pub const fn code(&self) -> &'static str {
        match self {
            IneligibilityReason::MissingDocuments { .. } => "MISSING_DOCUMENTS",
            IneligibilityReason::NoScore => "NO_SCORE",
            IneligibilityReason::InsufficientScore { .. } => "INSUFFICIENT_SCORE",
            IneligibilityReason::AlreadyCertified => "ALREADY_CERTIFIED",
            IneligibilityReason::NoExternalCertificate => "NO_EXTERNAL_CERTIFICATE",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            IneligibilityReason::MissingDocuments { completeness } => {
                format!("documents not approved ({})", completeness.label())
            }
            IneligibilityReason::NoScore => "no final score recorded".to_string(),
            IneligibilityReason::InsufficientScore { score, threshold } => {
                format!("score {score} is below the passing threshold of {threshold}")
            }
            IneligibilityReason::AlreadyCertified => "certificate already issued".to_string(),
            IneligibilityReason::NoExternalCertificate => {
                "no external certificate link on file".to_string()
            }
        }
    }
}

/// Score gate shared by every document-channel evaluation.
pub(crate) fn score_reason(score: Option<u8>, threshold: u8) -> Option<IneligibilityReason> {
    match score {
        None => Some(IneligibilityReason::NoScore),
        Some(value) if value < threshold => Some(IneligibilityReason::InsufficientScore {
            score: value,
            threshold,
        }),
        Some(_) => None,
    }
}
