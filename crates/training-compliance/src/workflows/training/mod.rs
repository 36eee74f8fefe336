//! Training enrollment, document review, and certificate issuance.
//!
//! The pure rules live in `documents`, `eligibility`, `enrollment`, and `status`. The
//! service composes them with the repository and issuer ports and owns the locking that
//! keeps concurrent edits and mass certification consistent.

pub mod certification;
pub mod documents;
pub mod domain;
pub mod eligibility;
pub mod enrollment;
mod locks;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;

#[cfg(test)]
mod tests;

pub use certification::{
    CertificationDetail, CertificationOutcome, IssuanceOutcome, MassCertificationReport,
};
pub use documents::{DocumentCompleteness, DocumentError, DocumentRegistry, ReviewDecision};
pub use domain::{
    CallerCapability, Certificate, CertificateId, CertificateSnapshot, CertificationChannel,
    Coach, CoachId, Collaborator, CollaboratorId, Course, CourseId, CourseLevel, CourseLevelId,
    DocumentId, DocumentKind, DocumentStatus, DocumentUpload, Enrollment, EnrollmentDocument,
    EnrollmentId, EnrollmentStatus, ExternalCertificate, RequiredDocument, RequiredDocumentId,
    Training, TrainingId, TrainingStatus,
};
pub use eligibility::{
    EligibilityConfig, EligibilityEvaluator, EligibilityInput, EligibilityOutcome,
    IneligibilityReason,
};
pub use enrollment::EnrollmentError;
pub use memory::{InMemoryCertificateIssuer, InMemoryTrainingStore};
pub use repository::{
    CertificateIssuer, CertificationRepository, IssuanceError, IssuanceRequest, RepositoryError,
};
pub use router::training_router;
pub use service::{
    EnrollmentOverview, EnrollmentRecord, ErrorKind, NewEnrollment, NewTraining,
    TrainingOverview, TrainingService, TrainingServiceError,
};
pub use status::StatusError;
