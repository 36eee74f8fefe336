mod config;
mod policy;

pub use config::EligibilityConfig;
pub use policy::IneligibilityReason;

use serde::{Deserialize, Serialize};

use super::documents::{DocumentCompleteness, DocumentRegistry};
use super::domain::{
    CertificationChannel, CourseLevel, Enrollment, EnrollmentDocument, EnrollmentId,
    ExternalCertificate,
};
use policy::score_reason;

/// Everything the evaluator needs to judge one enrollment. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityInput<'a> {
    pub enrollment: &'a Enrollment,
    pub level: &'a CourseLevel,
    pub documents: &'a [EnrollmentDocument],
    pub external_certificate: Option<&'a ExternalCertificate>,
    pub channel: CertificationChannel,
}

/// Stateless evaluator applying the pass threshold to an enrollment.
#[derive(Debug, Clone)]
pub struct EligibilityEvaluator {
    config: EligibilityConfig,
}

impl EligibilityEvaluator {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn evaluate(&self, input: &EligibilityInput<'_>) -> EligibilityOutcome {
        evaluate(input, self.config.pass_threshold)
    }
}

/// Decide certification eligibility for one enrollment.
///
/// The external-link channel ignores score and documents entirely; the document channel
/// requires approved documents, a passing score, and no prior certificate. Every failing
/// condition is reported, not only the first.
pub fn evaluate(input: &EligibilityInput<'_>, threshold: u8) -> EligibilityOutcome {
    let mut reasons = Vec::new();

    let completeness = match input.channel {
        CertificationChannel::ExternalLink => {
            let linked = input
                .external_certificate
                .filter(|certificate| {
                    certificate.training_id == input.enrollment.training_id
                        && certificate.collaborator_id == input.enrollment.collaborator_id
                })
                .map(ExternalCertificate::has_link)
                .unwrap_or(false);
            if !linked {
                reasons.push(IneligibilityReason::NoExternalCertificate);
            }
            None
        }
        CertificationChannel::DocumentScore => {
            let completeness = DocumentRegistry::new(input.level, input.documents).completeness();
            if !completeness.satisfied() {
                reasons.push(IneligibilityReason::MissingDocuments { completeness });
            }
            if let Some(reason) = score_reason(input.enrollment.final_score, threshold) {
                reasons.push(reason);
            }
            Some(completeness)
        }
    };

    if input.enrollment.certificate_issued {
        reasons.push(IneligibilityReason::AlreadyCertified);
    }

    EligibilityOutcome {
        enrollment_id: input.enrollment.id.clone(),
        channel: input.channel,
        eligible: reasons.is_empty(),
        reasons,
        completeness,
    }
}

/// Verdict for one enrollment plus the full list of blocking reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityOutcome {
    pub enrollment_id: EnrollmentId,
    pub channel: CertificationChannel,
    pub eligible: bool,
    pub reasons: Vec<IneligibilityReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<DocumentCompleteness>,
}

impl EligibilityOutcome {
    pub fn summary(&self) -> String {
        if self.eligible {
            "eligible for certification".to_string()
        } else {
            let details: Vec<String> =
                self.reasons.iter().map(IneligibilityReason::summary).collect();
            format!("not eligible: {}", details.join("; "))
        }
    }

    pub fn reason_codes(&self) -> Vec<&'static str> {
        self.reasons.iter().map(IneligibilityReason::code).collect()
    }
}
