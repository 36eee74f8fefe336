use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::certification::{
    certify_enrollment, CertificationOutcome, IssuanceOutcome, MassCertificationReport,
};
use super::documents::{
    self, DocumentCompleteness, DocumentError, DocumentRegistry, ReviewDecision,
};
use super::domain::{
    CallerCapability, CollaboratorId, Coach, CourseId, CourseLevel, CourseLevelId, DocumentId,
    DocumentStatus, DocumentUpload, Enrollment, EnrollmentDocument, EnrollmentId,
    ExternalCertificate, RequiredDocument, Training, TrainingId, TrainingStatus,
};
use super::eligibility::{
    EligibilityConfig, EligibilityEvaluator, EligibilityInput, EligibilityOutcome,
};
use super::enrollment::{self, EnrollmentError};
use super::locks::LockRegistry;
use super::repository::{
    CertificateIssuer, CertificationRepository, IssuanceError, RepositoryError,
};
use super::status::{self, StatusError};

static TRAINING_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ENROLLMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_training_id() -> TrainingId {
    let id = TRAINING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TrainingId(format!("trn-{id:06}"))
}

fn next_enrollment_id() -> EnrollmentId {
    let id = ENROLLMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EnrollmentId(format!("enr-{id:06}"))
}

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// Admin input for a new training offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTraining {
    pub code: String,
    pub course_id: CourseId,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub max_capacity: Option<u32>,
    #[serde(default)]
    pub by_cetar: bool,
    pub coach: Coach,
}

/// Input for adding a collaborator to a training, optionally with initial uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub collaborator_id: CollaboratorId,
    pub course_level_id: CourseLevelId,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

/// An enrollment with every stored submission, stale ones included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRecord {
    pub enrollment: Enrollment,
    pub documents: Vec<EnrollmentDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentOverview {
    pub enrollment: Enrollment,
    pub completeness: DocumentCompleteness,
    pub eligibility: EligibilityOutcome,
}

/// Read-only dashboard view of a training and each enrollment's standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingOverview {
    pub training: Training,
    pub certified: usize,
    pub enrollments: Vec<EnrollmentOverview>,
}

/// Error kinds surfaced to API and UI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CapacityExceeded,
    DuplicateEnrollment,
    AlreadyCertified,
    TrainingDisabled,
    CertificatesAlreadyIssued,
    ValidationError,
    NotFound,
    IssuanceFailure,
    InvalidTransition,
    StorageConflict,
    StorageUnavailable,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::DuplicateEnrollment => "duplicate_enrollment",
            ErrorKind::AlreadyCertified => "already_certified",
            ErrorKind::TrainingDisabled => "training_disabled",
            ErrorKind::CertificatesAlreadyIssued => "certificates_already_issued",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::IssuanceFailure => "issuance_failure",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::StorageConflict => "storage_conflict",
            ErrorKind::StorageUnavailable => "storage_unavailable",
        }
    }
}

/// Error raised by the training service.
#[derive(Debug, thiserror::Error)]
pub enum TrainingServiceError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("certificate issuance failed: {0}")]
    Issuance(#[from] IssuanceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl TrainingServiceError {
    pub(crate) fn not_found(entity: &'static str, id: &impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_certified(id: &EnrollmentId) -> Self {
        Self::Enrollment(EnrollmentError::AlreadyCertified(id.clone()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Enrollment(error) => match error {
                EnrollmentError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
                EnrollmentError::DuplicateEnrollment { .. } => ErrorKind::DuplicateEnrollment,
                EnrollmentError::AlreadyCertified(_) => ErrorKind::AlreadyCertified,
                EnrollmentError::TrainingDisabled { .. } => ErrorKind::TrainingDisabled,
                EnrollmentError::ScoreOutOfRange(_)
                | EnrollmentError::LevelOutsideCourse { .. } => ErrorKind::ValidationError,
            },
            Self::Status(error) => match error {
                StatusError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
                StatusError::ReasonRequired(_) => ErrorKind::ValidationError,
                StatusError::CertificatesAlreadyIssued { .. } => {
                    ErrorKind::CertificatesAlreadyIssued
                }
            },
            Self::Document(DocumentError::NotPending(_)) => ErrorKind::InvalidTransition,
            Self::Document(_) | Self::Validation(_) => ErrorKind::ValidationError,
            Self::NotFound { .. } | Self::Repository(RepositoryError::NotFound) => {
                ErrorKind::NotFound
            }
            Self::Issuance(_) => ErrorKind::IssuanceFailure,
            Self::Repository(RepositoryError::Conflict) => ErrorKind::StorageConflict,
            Self::Repository(RepositoryError::Unavailable(_)) => ErrorKind::StorageUnavailable,
        }
    }
}

/// Service composing the repository, certificate issuer, and eligibility rubric.
pub struct TrainingService<R, I> {
    repository: Arc<R>,
    issuer: Arc<I>,
    evaluator: Arc<EligibilityEvaluator>,
    locks: LockRegistry,
}

impl<R, I> TrainingService<R, I>
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    pub fn new(repository: Arc<R>, issuer: Arc<I>, config: EligibilityConfig) -> Self {
        Self {
            repository,
            issuer,
            evaluator: Arc::new(EligibilityEvaluator::new(config)),
            locks: LockRegistry::default(),
        }
    }

    pub fn eligibility_config(&self) -> &EligibilityConfig {
        self.evaluator.config()
    }

    /// Schedule a new training in the PLANNED state.
    pub fn schedule_training(&self, input: NewTraining) -> Result<Training, TrainingServiceError> {
        let code = input.code.trim();
        if code.is_empty() {
            return Err(TrainingServiceError::Validation(
                "training code is required".to_string(),
            ));
        }
        if input.max_capacity == Some(0) {
            return Err(TrainingServiceError::Validation(
                "max capacity must be at least 1".to_string(),
            ));
        }
        if self.repository.fetch_course(&input.course_id)?.is_none() {
            return Err(TrainingServiceError::not_found("course", &input.course_id));
        }

        let training = Training {
            id: next_training_id(),
            code: code.to_string(),
            course_id: input.course_id,
            status: TrainingStatus::Planned,
            start_date: input.start_date,
            max_capacity: input.max_capacity,
            by_cetar: input.by_cetar,
            coach: input.coach,
            active: true,
            status_history: Vec::new(),
            created_at: Utc::now(),
        };

        let stored = self.repository.insert_training(training)?;
        info!(training_id = %stored.id, code = %stored.code, "training scheduled");
        Ok(stored)
    }

    /// Soft-delete a completed or cancelled training.
    pub fn archive_training(
        &self,
        training_id: &TrainingId,
    ) -> Result<Training, TrainingServiceError> {
        let lock = self.locks.training(training_id);
        let _exclusive = lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut training = self.load_training(training_id)?;
        if !training.status.is_terminal() {
            return Err(TrainingServiceError::Validation(format!(
                "only completed or cancelled trainings can be archived (training is {})",
                training.status
            )));
        }
        training.active = false;
        self.repository.update_training(training.clone())?;
        let enrollments = self.repository.enrollments_for_training(training_id)?;
        self.locks.forget_training(
            training_id,
            enrollments.iter().map(|enrollment| &enrollment.id),
        );
        info!(training_id = %training.id, "training archived");
        Ok(training)
    }

    /// Move the training through its lifecycle.
    ///
    /// The issued-certificate count is taken under the training's exclusive lock, so a
    /// cancellation cannot overtake a certification in flight for the same training.
    pub fn update_training_status(
        &self,
        training_id: &TrainingId,
        to: TrainingStatus,
        reason: Option<&str>,
    ) -> Result<Training, TrainingServiceError> {
        let lock = self.locks.training(training_id);
        let _exclusive = lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut training = self.load_training(training_id)?;
        let issued = self
            .repository
            .enrollments_for_training(training_id)?
            .iter()
            .filter(|enrollment| enrollment.certificate_issued)
            .count();

        let change = status::transition(&mut training, to, reason, issued, Utc::now())?;
        self.repository.update_training(training.clone())?;

        info!(
            training_id = %training.id,
            from = %change.from,
            to = %change.to,
            reason = change.reason.as_deref().unwrap_or(""),
            "training status changed"
        );
        Ok(training)
    }

    /// Add a collaborator to a training at one of its course levels.
    pub fn enroll(
        &self,
        training_id: &TrainingId,
        input: NewEnrollment,
        caller: CallerCapability,
    ) -> Result<EnrollmentRecord, TrainingServiceError> {
        let lock = self.locks.training(training_id);
        let _exclusive = lock.write().unwrap_or_else(PoisonError::into_inner);

        let training = self.load_training(training_id)?;
        if self
            .repository
            .fetch_collaborator(&input.collaborator_id)?
            .is_none()
        {
            return Err(TrainingServiceError::not_found(
                "collaborator",
                &input.collaborator_id,
            ));
        }
        let level = self.load_level(&input.course_level_id)?;
        for upload in &input.documents {
            documents::validate_upload(&level, upload)?;
        }

        let existing = self.repository.enrollments_for_training(training_id)?;
        let now = Utc::now();
        let enrollment = enrollment::enroll(
            next_enrollment_id(),
            &training,
            &input.collaborator_id,
            &level,
            &existing,
            caller,
            now,
        )?;

        let enrollment = match self.repository.insert_enrollment(enrollment) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(EnrollmentError::DuplicateEnrollment {
                    training_id: training_id.clone(),
                    collaborator_id: input.collaborator_id,
                }
                .into())
            }
            Err(other) => return Err(other.into()),
        };

        let mut stored_documents = Vec::with_capacity(input.documents.len());
        for upload in input.documents {
            let document = pending_document(&enrollment.id, upload);
            match self.repository.insert_document(document) {
                Ok(stored) => stored_documents.push(stored),
                Err(error) => {
                    self.discard_enrollment(&enrollment.id);
                    return Err(error.into());
                }
            }
        }

        info!(
            training_id = %training.id,
            enrollment_id = %enrollment.id,
            collaborator_id = %enrollment.collaborator_id,
            documents = stored_documents.len(),
            "collaborator enrolled"
        );

        Ok(EnrollmentRecord {
            enrollment,
            documents: stored_documents,
        })
    }

    /// Move an enrollment to another level of the training's course.
    pub fn change_level(
        &self,
        enrollment_id: &EnrollmentId,
        course_level_id: &CourseLevelId,
        caller: CallerCapability,
    ) -> Result<Enrollment, TrainingServiceError> {
        self.with_enrollment(enrollment_id, |service, training, mut enrollment| {
            let level = service.load_level(course_level_id)?;
            let previous = enrollment.course_level_id.clone();
            enrollment::change_level(&mut enrollment, training, &level, caller)?;
            service.repository.update_enrollment(enrollment.clone())?;
            info!(
                enrollment_id = %enrollment.id,
                from = %previous,
                to = %enrollment.course_level_id,
                "enrollment level changed"
            );
            Ok(enrollment)
        })
    }

    /// Record the final score (0-100) for an enrollment.
    pub fn set_score(
        &self,
        enrollment_id: &EnrollmentId,
        value: i32,
        caller: CallerCapability,
    ) -> Result<Enrollment, TrainingServiceError> {
        self.with_enrollment(enrollment_id, |service, _training, mut enrollment| {
            enrollment::set_score(&mut enrollment, value, caller)?;
            service.repository.update_enrollment(enrollment.clone())?;
            info!(enrollment_id = %enrollment.id, score = value, "final score recorded");
            Ok(enrollment)
        })
    }

    /// Delete an uncertified enrollment along with its documents.
    pub fn remove_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<(), TrainingServiceError> {
        self.with_enrollment(enrollment_id, |service, _training, enrollment| {
            enrollment::ensure_removable(&enrollment)?;
            service.repository.delete_enrollment(&enrollment.id)?;
            info!(enrollment_id = %enrollment.id, "enrollment removed");
            Ok(())
        })?;
        self.locks.forget_enrollment(enrollment_id);
        Ok(())
    }

    /// Store an uploaded file against one of the level's required documents.
    ///
    /// A new upload for the same required document supersedes earlier ones without deleting them.
    pub fn submit_document(
        &self,
        enrollment_id: &EnrollmentId,
        upload: DocumentUpload,
        caller: CallerCapability,
    ) -> Result<EnrollmentDocument, TrainingServiceError> {
        self.with_enrollment(enrollment_id, |service, training, enrollment| {
            enrollment::ensure_training_enabled(training, caller)?;
            enrollment::ensure_not_certified(&enrollment, caller)?;
            let level = service.load_level(&enrollment.course_level_id)?;
            documents::validate_upload(&level, &upload)?;

            let document = service
                .repository
                .insert_document(pending_document(&enrollment.id, upload))?;
            info!(
                enrollment_id = %enrollment.id,
                document_id = %document.id,
                required_document_id = %document.required_document_id,
                "document submitted"
            );
            Ok(document)
        })
    }

    /// Approve or reject a pending document.
    pub fn review_document(
        &self,
        document_id: &DocumentId,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<EnrollmentDocument, TrainingServiceError> {
        let enrollment_id = self
            .repository
            .fetch_document(document_id)?
            .ok_or_else(|| TrainingServiceError::not_found("document", document_id))?
            .enrollment_id;

        self.with_enrollment(&enrollment_id, |service, _training, _enrollment| {
            let mut document = service
                .repository
                .fetch_document(document_id)?
                .ok_or_else(|| TrainingServiceError::not_found("document", document_id))?;
            documents::review(&mut document, decision, notes, Utc::now())?;
            service.repository.update_document(document.clone())?;
            info!(
                document_id = %document.id,
                status = document.status.label(),
                "document reviewed"
            );
            Ok(document)
        })
    }

    /// Record or replace the external provider's certificate link for a collaborator.
    pub fn upsert_external_certificate(
        &self,
        training_id: &TrainingId,
        collaborator_id: &CollaboratorId,
        certificate_url: &str,
    ) -> Result<ExternalCertificate, TrainingServiceError> {
        let lock = self.locks.training(training_id);
        let _shared = lock.read().unwrap_or_else(PoisonError::into_inner);

        let training = self.load_training(training_id)?;
        if !training.by_cetar {
            return Err(TrainingServiceError::Validation(format!(
                "training {} does not certify through the external provider",
                training.id
            )));
        }
        let url = certificate_url.trim();
        if url.is_empty() {
            return Err(TrainingServiceError::Validation(
                "certificate url is required".to_string(),
            ));
        }
        let enrolled = self
            .repository
            .enrollments_for_training(training_id)?
            .iter()
            .any(|enrollment| &enrollment.collaborator_id == collaborator_id);
        if !enrolled {
            return Err(TrainingServiceError::not_found("enrollment for", collaborator_id));
        }

        let certificate = ExternalCertificate {
            training_id: training_id.clone(),
            collaborator_id: collaborator_id.clone(),
            certificate_url: url.to_string(),
            updated_at: Utc::now(),
        };
        self.repository
            .upsert_external_certificate(certificate.clone())?;
        info!(
            training_id = %training_id,
            collaborator_id = %collaborator_id,
            "external certificate recorded"
        );
        Ok(certificate)
    }

    pub fn get_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<EnrollmentRecord, TrainingServiceError> {
        let enrollment = self.load_enrollment(enrollment_id)?;
        let documents = self.repository.documents_for_enrollment(enrollment_id)?;
        Ok(EnrollmentRecord {
            enrollment,
            documents,
        })
    }

    /// Required documents of the enrollment's current level, in level order.
    pub fn required_documents(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<RequiredDocument>, TrainingServiceError> {
        let enrollment = self.load_enrollment(enrollment_id)?;
        let level = self.load_level(&enrollment.course_level_id)?;
        Ok(DocumentRegistry::new(&level, &[]).required().to_vec())
    }

    /// Latest submission per required document of the current level.
    pub fn valid_documents(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<EnrollmentDocument>, TrainingServiceError> {
        let enrollment = self.load_enrollment(enrollment_id)?;
        let level = self.load_level(&enrollment.course_level_id)?;
        let submissions = self.repository.documents_for_enrollment(enrollment_id)?;
        Ok(DocumentRegistry::new(&level, &submissions)
            .valid_submissions()
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn document_completeness(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<DocumentCompleteness, TrainingServiceError> {
        let enrollment = self.load_enrollment(enrollment_id)?;
        let level = self.load_level(&enrollment.course_level_id)?;
        let submissions = self.repository.documents_for_enrollment(enrollment_id)?;
        Ok(DocumentRegistry::new(&level, &submissions).completeness())
    }

    /// Read-only eligibility preview; never mutates anything.
    pub fn evaluate_eligibility(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<EligibilityOutcome, TrainingServiceError> {
        let enrollment = self.load_enrollment(enrollment_id)?;
        let training = self.load_training(&enrollment.training_id)?;
        self.eligibility_for(&training, &enrollment)
    }

    /// Issue a certificate for one enrollment when it is eligible.
    ///
    /// Cancelled or postponed trainings only certify for elevated callers.
    pub fn certify(
        &self,
        enrollment_id: &EnrollmentId,
        caller: CallerCapability,
    ) -> Result<IssuanceOutcome, TrainingServiceError> {
        let outcome = self.with_enrollment(enrollment_id, |service, training, enrollment| {
            enrollment::ensure_training_enabled(training, caller)?;
            service.certify_locked(training, &enrollment.id)
        })?;
        if let IssuanceOutcome::Issued { certificate } = &outcome {
            info!(
                enrollment_id = %enrollment_id,
                certificate_id = %certificate.id,
                "certificate issued"
            );
        }
        Ok(outcome)
    }

    /// Issue certificates for the listed collaborators of a training.
    ///
    /// Each collaborator is handled on its own: ineligible ones are skipped, failures are
    /// recorded and the batch moves on. Certificates already issued stay issued whatever
    /// happens to later items. A disabled training fails each item for a standard caller.
    pub fn mass_certify(
        &self,
        training_id: &TrainingId,
        collaborator_ids: &[CollaboratorId],
        caller: CallerCapability,
    ) -> Result<MassCertificationReport, TrainingServiceError> {
        self.load_training(training_id)?;

        let by_collaborator: HashMap<CollaboratorId, EnrollmentId> = self
            .repository
            .enrollments_for_training(training_id)?
            .into_iter()
            .map(|enrollment| (enrollment.collaborator_id, enrollment.id))
            .collect();

        let mut seen = HashSet::new();
        let mut report = MassCertificationReport::default();

        for collaborator_id in collaborator_ids {
            if !seen.insert(collaborator_id) {
                continue;
            }
            let Some(enrollment_id) = by_collaborator.get(collaborator_id) else {
                report.record(
                    collaborator_id.clone(),
                    None,
                    CertificationOutcome::NotEnrolled,
                );
                continue;
            };

            let outcome =
                CertificationOutcome::from(self.certify_item(training_id, enrollment_id, caller));
            if let CertificationOutcome::Failed { kind, message } = &outcome {
                warn!(
                    training_id = %training_id,
                    enrollment_id = %enrollment_id,
                    kind = kind.as_str(),
                    error = message.as_str(),
                    "certification failed for enrollment"
                );
            }
            report.record(collaborator_id.clone(), Some(enrollment_id.clone()), outcome);
        }

        info!(
            training_id = %training_id,
            created = report.created,
            skipped = report.skipped,
            errors = report.errors,
            "mass certification finished"
        );
        Ok(report)
    }

    /// Enrollments of a training with their document state and eligibility.
    pub fn training_overview(
        &self,
        training_id: &TrainingId,
    ) -> Result<TrainingOverview, TrainingServiceError> {
        let training = self.load_training(training_id)?;
        let enrollments = self.repository.enrollments_for_training(training_id)?;

        let mut overview = TrainingOverview {
            certified: enrollments
                .iter()
                .filter(|enrollment| enrollment.certificate_issued)
                .count(),
            enrollments: Vec::with_capacity(enrollments.len()),
            training,
        };

        for enrollment in enrollments {
            let level = self.load_level(&enrollment.course_level_id)?;
            let submissions = self.repository.documents_for_enrollment(&enrollment.id)?;
            let completeness = DocumentRegistry::new(&level, &submissions).completeness();
            let eligibility = self.eligibility_for(&overview.training, &enrollment)?;
            overview.enrollments.push(EnrollmentOverview {
                enrollment,
                completeness,
                eligibility,
            });
        }

        Ok(overview)
    }

    fn certify_item(
        &self,
        training_id: &TrainingId,
        enrollment_id: &EnrollmentId,
        caller: CallerCapability,
    ) -> Result<IssuanceOutcome, TrainingServiceError> {
        let training_lock = self.locks.training(training_id);
        let _shared = training_lock.read().unwrap_or_else(PoisonError::into_inner);
        let enrollment_lock = self.locks.enrollment(enrollment_id);
        let _held = enrollment_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let training = self.load_training(training_id)?;
        enrollment::ensure_training_enabled(&training, caller)?;
        self.certify_locked(&training, enrollment_id)
    }

    fn certify_locked(
        &self,
        training: &Training,
        enrollment_id: &EnrollmentId,
    ) -> Result<IssuanceOutcome, TrainingServiceError> {
        certify_enrollment(
            self.repository.as_ref(),
            self.issuer.as_ref(),
            &self.evaluator,
            training,
            enrollment_id,
            Utc::now().date_naive(),
        )
    }

    /// Run `action` with the training read lock and the enrollment mutex held, passing
    /// freshly loaded copies of both records.
    fn with_enrollment<T, F>(
        &self,
        enrollment_id: &EnrollmentId,
        action: F,
    ) -> Result<T, TrainingServiceError>
    where
        F: FnOnce(&Self, &Training, Enrollment) -> Result<T, TrainingServiceError>,
    {
        let training_id = self.load_enrollment(enrollment_id)?.training_id;

        let training_lock = self.locks.training(&training_id);
        let _shared = training_lock.read().unwrap_or_else(PoisonError::into_inner);
        let enrollment_lock = self.locks.enrollment(enrollment_id);
        let _held = enrollment_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let enrollment = self.load_enrollment(enrollment_id)?;
        let training = self.load_training(&training_id)?;
        action(self, &training, enrollment)
    }

    /// Undo a half-written enrollment; deletion cascades to the documents already stored.
    fn discard_enrollment(&self, enrollment_id: &EnrollmentId) {
        if let Err(error) = self.repository.delete_enrollment(enrollment_id) {
            warn!(
                enrollment_id = %enrollment_id,
                error = %error,
                "failed to discard partially created enrollment"
            );
        }
        self.locks.forget_enrollment(enrollment_id);
    }

    fn eligibility_for(
        &self,
        training: &Training,
        enrollment: &Enrollment,
    ) -> Result<EligibilityOutcome, TrainingServiceError> {
        let level = self.load_level(&enrollment.course_level_id)?;
        let documents = self.repository.documents_for_enrollment(&enrollment.id)?;
        let external = self
            .repository
            .fetch_external_certificate(&training.id, &enrollment.collaborator_id)?;
        Ok(self.evaluator.evaluate(&EligibilityInput {
            enrollment,
            level: &level,
            documents: &documents,
            external_certificate: external.as_ref(),
            channel: training.channel(),
        }))
    }

    fn load_training(&self, id: &TrainingId) -> Result<Training, TrainingServiceError> {
        self.repository
            .fetch_training(id)?
            .filter(|training| training.active)
            .ok_or_else(|| TrainingServiceError::not_found("training", id))
    }

    fn load_enrollment(&self, id: &EnrollmentId) -> Result<Enrollment, TrainingServiceError> {
        self.repository
            .fetch_enrollment(id)?
            .ok_or_else(|| TrainingServiceError::not_found("enrollment", id))
    }

    fn load_level(&self, id: &CourseLevelId) -> Result<CourseLevel, TrainingServiceError> {
        self.repository
            .fetch_course_level(id)?
            .ok_or_else(|| TrainingServiceError::not_found("course level", id))
    }
}

fn pending_document(enrollment_id: &EnrollmentId, upload: DocumentUpload) -> EnrollmentDocument {
    EnrollmentDocument {
        id: next_document_id(),
        enrollment_id: enrollment_id.clone(),
        required_document_id: upload.required_document_id,
        status: DocumentStatus::Pending,
        document_link: upload.document_link.trim().to_string(),
        review_notes: None,
        file_size: upload.file_size,
        kind: upload.kind,
        created_at: Utc::now(),
        reviewed_at: None,
    }
}
