use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of one scheduled training offering.
    TrainingId
);
identifier!(CourseId);
identifier!(CourseLevelId);
identifier!(RequiredDocumentId);
identifier!(
    /// Identifier of an employee that can be enrolled in trainings.
    CollaboratorId
);
identifier!(
    /// Identifier of a collaborator's participation record in a training.
    EnrollmentId
);
identifier!(DocumentId);
identifier!(CertificateId);
identifier!(CoachId);

/// Lifecycle of a training instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
    Postponed,
}

impl TrainingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Postponed => "postponed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Completed trainings stay manageable; only cancelled and postponed ones lock enrollments.
    pub const fn is_disabled(self) -> bool {
        matches!(self, Self::Cancelled | Self::Postponed)
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two mutually exclusive paths to a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationChannel {
    /// Approved documents plus a passing score.
    DocumentScore,
    /// A certificate link supplied by the external provider (CETAR).
    ExternalLink,
}

impl CertificationChannel {
    pub const fn from_external_flag(by_external_provider: bool) -> Self {
        if by_external_provider {
            Self::ExternalLink
        } else {
            Self::DocumentScore
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coach {
    pub id: CoachId,
    pub full_name: String,
    #[serde(default)]
    pub license_number: Option<String>,
}

/// Audit entry written on every status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: TrainingStatus,
    pub to: TrainingStatus,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Training {
    pub id: TrainingId,
    pub code: String,
    pub course_id: CourseId,
    pub status: TrainingStatus,
    pub start_date: NaiveDate,
    pub max_capacity: Option<u32>,
    pub by_cetar: bool,
    pub coach: Coach,
    pub active: bool,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
}

impl Training {
    pub fn channel(&self) -> CertificationChannel {
        CertificationChannel::from_external_flag(self.by_cetar)
    }

    pub fn is_disabled(&self) -> bool {
        self.status.is_disabled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub levels: Vec<CourseLevel>,
}

/// A level of a course together with the documents every enrollee must submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLevel {
    pub id: CourseLevelId,
    pub course_id: CourseId,
    pub name: String,
    pub hours: u16,
    pub required_documents: Vec<RequiredDocument>,
}

impl CourseLevel {
    pub fn required_document_ids(&self) -> BTreeSet<&RequiredDocumentId> {
        self.required_documents.iter().map(|doc| &doc.id).collect()
    }

    pub fn requires(&self, id: &RequiredDocumentId) -> bool {
        self.required_documents.iter().any(|doc| &doc.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredDocument {
    pub id: RequiredDocumentId,
    pub course_level_id: CourseLevelId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub full_name: String,
    pub document_number: String,
}

/// Participation state of a collaborator inside a training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Registered,
    Confirmed,
    Attending,
    Completed,
    Failed,
    Dropped,
    Absent,
}

/// `status` and `certificate_issued` move independently; several guards only look at the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub training_id: TrainingId,
    pub collaborator_id: CollaboratorId,
    pub course_level_id: CourseLevelId,
    pub final_score: Option<u8>,
    pub status: EnrollmentStatus,
    pub certificate_issued: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// File formats accepted by the document storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
}

/// One submitted file against a required document of the enrollment's level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentDocument {
    pub id: DocumentId,
    pub enrollment_id: EnrollmentId,
    pub required_document_id: RequiredDocumentId,
    pub status: DocumentStatus,
    pub document_link: String,
    pub review_notes: Option<String>,
    pub file_size: u64,
    pub kind: DocumentKind,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Upload metadata returned by the file storage; only the link is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub required_document_id: RequiredDocumentId,
    pub document_link: String,
    pub file_size: u64,
    pub kind: DocumentKind,
}

/// Fields frozen into a certificate at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSnapshot {
    pub collaborator_name: String,
    pub collaborator_document: String,
    pub training_code: String,
    pub course_name: String,
    pub level_name: String,
    pub hours: u16,
    pub training_start: NaiveDate,
    pub coach_name: String,
    pub coach_license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub training_id: TrainingId,
    pub collaborator_id: CollaboratorId,
    pub course_level_id: CourseLevelId,
    pub snapshot: CertificateSnapshot,
    pub issued_on: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub active: bool,
}

impl Certificate {
    /// An active certificate blocks a new one until its due date has passed.
    pub fn blocks_renewal(&self, on: NaiveDate) -> bool {
        self.active && self.due_date.map(|due| due > on).unwrap_or(true)
    }
}

/// Certificate link supplied by the external provider for one collaborator in one training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCertificate {
    pub training_id: TrainingId,
    pub collaborator_id: CollaboratorId,
    pub certificate_url: String,
    pub updated_at: DateTime<Utc>,
}

impl ExternalCertificate {
    pub fn has_link(&self) -> bool {
        !self.certificate_url.trim().is_empty()
    }
}

/// Guards an elevated caller is allowed to override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    DisabledTraining,
    CertifiedEnrollment,
}

/// Role of the caller, resolved at the edge and passed into every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerCapability {
    #[default]
    Standard,
    Elevated,
}

impl CallerCapability {
    pub const fn permits(self, bypass: Bypass) -> bool {
        match (self, bypass) {
            (Self::Elevated, Bypass::DisabledTraining | Bypass::CertifiedEnrollment) => true,
            (Self::Standard, _) => false,
        }
    }

    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Elevated)
    }
}
