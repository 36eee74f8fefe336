use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Certificate, CertificateId, CertificateSnapshot, Collaborator, CollaboratorId, Course,
    CourseId, CourseLevel, CourseLevelId, DocumentId, Enrollment, EnrollmentDocument,
    EnrollmentId, ExternalCertificate, Training, TrainingId,
};

/// Storage abstraction so the service can be exercised without a database.
pub trait CertificationRepository: Send + Sync {
    fn insert_training(&self, training: Training) -> Result<Training, RepositoryError>;
    fn update_training(&self, training: Training) -> Result<(), RepositoryError>;
    fn fetch_training(&self, id: &TrainingId) -> Result<Option<Training>, RepositoryError>;

    fn fetch_course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    fn fetch_course_level(&self, id: &CourseLevelId)
        -> Result<Option<CourseLevel>, RepositoryError>;
    fn fetch_collaborator(
        &self,
        id: &CollaboratorId,
    ) -> Result<Option<Collaborator>, RepositoryError>;

    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError>;
    fn update_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError>;
    fn fetch_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    fn enrollments_for_training(
        &self,
        training_id: &TrainingId,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    /// Deletes the enrollment together with all of its documents.
    fn delete_enrollment(&self, id: &EnrollmentId) -> Result<(), RepositoryError>;
    /// Compare-and-set of `certificate_issued`; returns `Conflict` when the flag is already set.
    fn mark_certified(&self, id: &EnrollmentId) -> Result<Enrollment, RepositoryError>;

    fn insert_document(
        &self,
        document: EnrollmentDocument,
    ) -> Result<EnrollmentDocument, RepositoryError>;
    fn update_document(&self, document: EnrollmentDocument) -> Result<(), RepositoryError>;
    fn fetch_document(&self, id: &DocumentId)
        -> Result<Option<EnrollmentDocument>, RepositoryError>;
    /// Every stored submission of the enrollment, oldest first, including stale ones.
    fn documents_for_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<EnrollmentDocument>, RepositoryError>;

    fn upsert_external_certificate(
        &self,
        certificate: ExternalCertificate,
    ) -> Result<(), RepositoryError>;
    fn fetch_external_certificate(
        &self,
        training_id: &TrainingId,
        collaborator_id: &CollaboratorId,
    ) -> Result<Option<ExternalCertificate>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was changed concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Data handed to the certificate issuer; the snapshot is frozen into the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub training_id: TrainingId,
    pub enrollment_id: EnrollmentId,
    pub collaborator_id: CollaboratorId,
    pub course_level_id: CourseLevelId,
    pub snapshot: CertificateSnapshot,
    pub issued_on: NaiveDate,
}

/// Outbound port materializing certificate records (and their rendered documents).
pub trait CertificateIssuer: Send + Sync {
    fn issue(&self, request: &IssuanceRequest) -> Result<Certificate, IssuanceError>;
    /// Withdraw a certificate that could not be attached to its enrollment.
    fn revoke(&self, id: &CertificateId) -> Result<(), IssuanceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    #[error("{collaborator_id} already holds a valid certificate for level {course_level_id}")]
    DuplicateCertificate {
        collaborator_id: CollaboratorId,
        course_level_id: CourseLevelId,
    },
    #[error("certificate storage failed: {0}")]
    Storage(String),
    #[error("certificate data rejected: {0}")]
    Validation(String),
}
