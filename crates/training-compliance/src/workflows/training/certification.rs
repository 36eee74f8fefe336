use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    Certificate, CertificateId, CertificateSnapshot, CollaboratorId, EnrollmentId, Training,
};
use super::eligibility::{EligibilityEvaluator, EligibilityInput, EligibilityOutcome};
use super::repository::{
    CertificateIssuer, CertificationRepository, IssuanceRequest, RepositoryError,
};
use super::service::TrainingServiceError;

/// Result of one read-evaluate-issue pass over a single enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IssuanceOutcome {
    Issued { certificate: Certificate },
    Ineligible { eligibility: EligibilityOutcome },
}

/// Per-collaborator line of a mass certification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationDetail {
    pub collaborator_id: CollaboratorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<EnrollmentId>,
    pub outcome: CertificationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CertificationOutcome {
    Created { certificate_id: CertificateId },
    Skipped { reasons: Vec<String>, summary: String },
    NotEnrolled,
    Failed { kind: String, message: String },
}

/// Aggregate counts plus the per-item trail shown as "N created, M skipped, K failed".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MassCertificationReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: Vec<CertificationDetail>,
}

impl MassCertificationReport {
    pub(crate) fn record(
        &mut self,
        collaborator_id: CollaboratorId,
        enrollment_id: Option<EnrollmentId>,
        outcome: CertificationOutcome,
    ) {
        match outcome {
            CertificationOutcome::Created { .. } => self.created += 1,
            CertificationOutcome::Skipped { .. } | CertificationOutcome::NotEnrolled => {
                self.skipped += 1
            }
            CertificationOutcome::Failed { .. } => self.errors += 1,
        }
        self.details.push(CertificationDetail {
            collaborator_id,
            enrollment_id,
            outcome,
        });
    }

    pub fn summary(&self) -> String {
        format!(
            "{} created, {} skipped, {} failed",
            self.created, self.skipped, self.errors
        )
    }
}

impl From<Result<IssuanceOutcome, TrainingServiceError>> for CertificationOutcome {
    fn from(result: Result<IssuanceOutcome, TrainingServiceError>) -> Self {
        match result {
            Ok(IssuanceOutcome::Issued { certificate }) => CertificationOutcome::Created {
                certificate_id: certificate.id,
            },
            Ok(IssuanceOutcome::Ineligible { eligibility }) => CertificationOutcome::Skipped {
                reasons: eligibility
                    .reason_codes()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                summary: eligibility.summary(),
            },
            Err(error) => CertificationOutcome::Failed {
                kind: error.kind().code().to_string(),
                message: error.to_string(),
            },
        }
    }
}

/// Evaluate one enrollment and, when eligible, issue and attach its certificate.
///
/// The caller must hold the training read lock and the enrollment's mutex. The enrollment is
/// re-read here so the decision reflects any edit that finished before the lock was taken.
pub(crate) fn certify_enrollment<R, I>(
    repository: &R,
    issuer: &I,
    evaluator: &EligibilityEvaluator,
    training: &Training,
    enrollment_id: &EnrollmentId,
    issued_on: chrono::NaiveDate,
) -> Result<IssuanceOutcome, TrainingServiceError>
where
    R: CertificationRepository + ?Sized,
    I: CertificateIssuer + ?Sized,
{
    let enrollment = repository
        .fetch_enrollment(enrollment_id)?
        .ok_or_else(|| TrainingServiceError::not_found("enrollment", enrollment_id))?;
    let level = repository
        .fetch_course_level(&enrollment.course_level_id)?
        .ok_or_else(|| {
            TrainingServiceError::not_found("course level", &enrollment.course_level_id)
        })?;
    let documents = repository.documents_for_enrollment(&enrollment.id)?;
    let external =
        repository.fetch_external_certificate(&training.id, &enrollment.collaborator_id)?;

    let eligibility = evaluator.evaluate(&EligibilityInput {
        enrollment: &enrollment,
        level: &level,
        documents: &documents,
        external_certificate: external.as_ref(),
        channel: training.channel(),
    });
    if !eligibility.eligible {
        return Ok(IssuanceOutcome::Ineligible { eligibility });
    }

    let collaborator = repository
        .fetch_collaborator(&enrollment.collaborator_id)?
        .ok_or_else(|| {
            TrainingServiceError::not_found("collaborator", &enrollment.collaborator_id)
        })?;
    let course = repository
        .fetch_course(&training.course_id)?
        .ok_or_else(|| TrainingServiceError::not_found("course", &training.course_id))?;

    let request = IssuanceRequest {
        training_id: training.id.clone(),
        enrollment_id: enrollment.id.clone(),
        collaborator_id: enrollment.collaborator_id.clone(),
        course_level_id: level.id.clone(),
        snapshot: CertificateSnapshot {
            collaborator_name: collaborator.full_name,
            collaborator_document: collaborator.document_number,
            training_code: training.code.clone(),
            course_name: course.name,
            level_name: level.name.clone(),
            hours: level.hours,
            training_start: training.start_date,
            coach_name: training.coach.full_name.clone(),
            coach_license: training.coach.license_number.clone(),
        },
        issued_on,
    };

    let certificate = issuer.issue(&request)?;

    match repository.mark_certified(&enrollment.id) {
        Ok(_) => Ok(IssuanceOutcome::Issued { certificate }),
        Err(error) => {
            if let Err(revoke_error) = issuer.revoke(&certificate.id) {
                warn!(
                    certificate_id = %certificate.id,
                    enrollment_id = %enrollment.id,
                    error = %revoke_error,
                    "failed to withdraw certificate after flag update failed"
                );
            }
            Err(match error {
                RepositoryError::Conflict => {
                    TrainingServiceError::already_certified(&enrollment.id)
                }
                other => other.into(),
            })
        }
    }
}
