use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::training::domain::{
    CallerCapability, Certificate, CertificateId, CertificateSnapshot, Coach, CoachId,
    Collaborator, CollaboratorId, Course, CourseId, CourseLevel, CourseLevelId, DocumentId,
    DocumentKind, DocumentStatus, DocumentUpload, Enrollment, EnrollmentDocument, EnrollmentId,
    EnrollmentStatus, ExternalCertificate, RequiredDocument, RequiredDocumentId, Training,
    TrainingId, TrainingStatus,
};
use crate::workflows::training::documents::ReviewDecision;
use crate::workflows::training::repository::{
    CertificateIssuer, CertificationRepository, IssuanceError, IssuanceRequest,
    RepositoryError,
};
use crate::workflows::training::service::{NewEnrollment, NewTraining, TrainingService};
use crate::workflows::training::{
    training_router, EligibilityConfig, InMemoryCertificateIssuer, InMemoryTrainingStore,
};

pub(super) const COURSE: &str = "course-heights";
pub(super) const OTHER_COURSE: &str = "course-confined";
pub(super) const BASIC: &str = "lvl-basic";
pub(super) const ADVANCED: &str = "lvl-advanced";
pub(super) const NO_DOCS: &str = "lvl-awareness";
pub(super) const CONFINED: &str = "lvl-confined";
pub(super) const MEDICAL: &str = "req-medical";
pub(super) const IDENTITY: &str = "req-identity";
pub(super) const RESCUE: &str = "req-rescue-plan";

pub(super) type MemoryService = TrainingService<InMemoryTrainingStore, InMemoryCertificateIssuer>;

pub(super) fn config() -> EligibilityConfig {
    EligibilityConfig { pass_threshold: 80 }
}

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 7).expect("valid date")
}

fn required(id: &str, level: &str, name: &str) -> RequiredDocument {
    RequiredDocument {
        id: RequiredDocumentId(id.to_string()),
        course_level_id: CourseLevelId(level.to_string()),
        name: name.to_string(),
        description: None,
    }
}

pub(super) fn basic_level() -> CourseLevel {
    CourseLevel {
        id: CourseLevelId(BASIC.to_string()),
        course_id: CourseId(COURSE.to_string()),
        name: "Basic worker".to_string(),
        hours: 8,
        required_documents: vec![
            required(MEDICAL, BASIC, "Medical fitness certificate"),
            required(IDENTITY, BASIC, "Identity document"),
        ],
    }
}

pub(super) fn advanced_level() -> CourseLevel {
    CourseLevel {
        id: CourseLevelId(ADVANCED.to_string()),
        course_id: CourseId(COURSE.to_string()),
        name: "Advanced worker".to_string(),
        hours: 40,
        required_documents: vec![required(RESCUE, ADVANCED, "Rescue plan")],
    }
}

pub(super) fn no_docs_level() -> CourseLevel {
    CourseLevel {
        id: CourseLevelId(NO_DOCS.to_string()),
        course_id: CourseId(COURSE.to_string()),
        name: "Awareness".to_string(),
        hours: 4,
        required_documents: Vec::new(),
    }
}

pub(super) fn heights_course() -> Course {
    Course {
        id: CourseId(COURSE.to_string()),
        name: "Work at heights".to_string(),
        levels: vec![basic_level(), advanced_level(), no_docs_level()],
    }
}

fn confined_course() -> Course {
    Course {
        id: CourseId(OTHER_COURSE.to_string()),
        name: "Confined spaces".to_string(),
        levels: vec![CourseLevel {
            id: CourseLevelId(CONFINED.to_string()),
            course_id: CourseId(OTHER_COURSE.to_string()),
            name: "Entrant".to_string(),
            hours: 16,
            required_documents: Vec::new(),
        }],
    }
}

pub(super) fn collaborator_id(n: u32) -> CollaboratorId {
    CollaboratorId(format!("col-{n}"))
}

pub(super) fn seeded_store() -> InMemoryTrainingStore {
    let store = InMemoryTrainingStore::default();
    store.add_course(heights_course()).expect("seed course");
    store.add_course(confined_course()).expect("seed course");
    for n in 1..=6 {
        store
            .add_collaborator(Collaborator {
                id: collaborator_id(n),
                full_name: format!("Worker {n}"),
                document_number: format!("10{n:04}"),
            })
            .expect("seed collaborator");
    }
    store
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryTrainingStore>,
    Arc<InMemoryCertificateIssuer>,
) {
    let store = Arc::new(seeded_store());
    let issuer = Arc::new(InMemoryCertificateIssuer::new(12));
    let service = TrainingService::new(store.clone(), issuer.clone(), config());
    (service, store, issuer)
}

pub(super) fn new_training(by_cetar: bool, max_capacity: Option<u32>) -> NewTraining {
    NewTraining {
        code: "TA-2025-014".to_string(),
        course_id: CourseId(COURSE.to_string()),
        start_date: start_date(),
        max_capacity,
        by_cetar,
        coach: Coach {
            id: CoachId("coach-1".to_string()),
            full_name: "Lucia Ramos".to_string(),
            license_number: Some("LIC-3321".to_string()),
        },
    }
}

pub(super) fn schedule<R, I>(
    service: &TrainingService<R, I>,
    by_cetar: bool,
    max_capacity: Option<u32>,
) -> Training
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    service
        .schedule_training(new_training(by_cetar, max_capacity))
        .expect("training scheduled")
}

pub(super) fn upload(required_document: &str) -> DocumentUpload {
    DocumentUpload {
        required_document_id: RequiredDocumentId(required_document.to_string()),
        document_link: format!("https://files.example.com/{required_document}.pdf"),
        file_size: 48_000,
        kind: DocumentKind::Pdf,
    }
}

pub(super) fn enroll_at<R, I>(
    service: &TrainingService<R, I>,
    training: &Training,
    collaborator: u32,
    level: &str,
) -> Enrollment
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    service
        .enroll(
            &training.id,
            NewEnrollment {
                collaborator_id: collaborator_id(collaborator),
                course_level_id: CourseLevelId(level.to_string()),
                documents: Vec::new(),
            },
            CallerCapability::Standard,
        )
        .expect("enrollment created")
        .enrollment
}

/// Submits and approves every document the enrollment's level requires.
pub(super) fn approve_all<R, I>(service: &TrainingService<R, I>, enrollment_id: &EnrollmentId)
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let required = service
        .required_documents(enrollment_id)
        .expect("required documents");
    for definition in required {
        let document = service
            .submit_document(
                enrollment_id,
                upload(&definition.id.0),
                CallerCapability::Standard,
            )
            .expect("document submitted");
        service
            .review_document(&document.id, ReviewDecision::Approve, None)
            .expect("document approved");
    }
}

/// Enrollment at the basic level with approved documents and a passing score.
pub(super) fn ready_enrollment<R, I>(
    service: &TrainingService<R, I>,
    training: &Training,
    collaborator: u32,
) -> Enrollment
where
    R: CertificationRepository + 'static,
    I: CertificateIssuer + 'static,
{
    let enrollment = enroll_at(service, training, collaborator, BASIC);
    approve_all(service, &enrollment.id);
    service
        .set_score(&enrollment.id, 92, CallerCapability::Standard)
        .expect("score recorded")
}

pub(super) fn enrollment(score: Option<u8>) -> Enrollment {
    Enrollment {
        id: EnrollmentId("enr-fixture".to_string()),
        training_id: TrainingId("trn-fixture".to_string()),
        collaborator_id: collaborator_id(1),
        course_level_id: CourseLevelId(BASIC.to_string()),
        final_score: score,
        status: EnrollmentStatus::Registered,
        certificate_issued: false,
        created_at: at(1, 8),
    }
}

pub(super) fn training(status: TrainingStatus) -> Training {
    Training {
        id: TrainingId("trn-fixture".to_string()),
        code: "TA-FIXTURE".to_string(),
        course_id: CourseId(COURSE.to_string()),
        status,
        start_date: start_date(),
        max_capacity: Some(2),
        by_cetar: false,
        coach: Coach {
            id: CoachId("coach-1".to_string()),
            full_name: "Lucia Ramos".to_string(),
            license_number: None,
        },
        active: true,
        status_history: Vec::new(),
        created_at: at(1, 7),
    }
}

pub(super) fn document(
    id: &str,
    required_document: &str,
    status: DocumentStatus,
    created_at: DateTime<Utc>,
) -> EnrollmentDocument {
    EnrollmentDocument {
        id: DocumentId(id.to_string()),
        enrollment_id: EnrollmentId("enr-fixture".to_string()),
        required_document_id: RequiredDocumentId(required_document.to_string()),
        status,
        document_link: format!("https://files.example.com/{id}.pdf"),
        review_notes: None,
        file_size: 1_024,
        kind: DocumentKind::Pdf,
        created_at,
        reviewed_at: None,
    }
}

pub(super) fn approved_basic_documents() -> Vec<EnrollmentDocument> {
    vec![
        document("doc-a", MEDICAL, DocumentStatus::Approved, at(2, 9)),
        document("doc-b", IDENTITY, DocumentStatus::Approved, at(2, 10)),
    ]
}

/// Issuer that refuses one collaborator and delegates everything else.
pub(super) struct FailingIssuer {
    inner: InMemoryCertificateIssuer,
    failing: CollaboratorId,
}

impl FailingIssuer {
    pub(super) fn new(failing: CollaboratorId) -> Self {
        Self {
            inner: InMemoryCertificateIssuer::new(12),
            failing,
        }
    }

    pub(super) fn certificates(&self) -> Vec<Certificate> {
        self.inner.certificates()
    }
}

impl CertificateIssuer for FailingIssuer {
    fn issue(&self, request: &IssuanceRequest) -> Result<Certificate, IssuanceError> {
        if request.collaborator_id == self.failing {
            return Err(IssuanceError::Storage("pdf renderer offline".to_string()));
        }
        self.inner.issue(request)
    }

    fn revoke(&self, id: &CertificateId) -> Result<(), IssuanceError> {
        self.inner.revoke(id)
    }
}

pub(super) fn prior_certificate(collaborator: u32, issued_on: NaiveDate) -> Certificate {
    Certificate {
        id: CertificateId(format!("cert-prior-{collaborator}")),
        training_id: TrainingId("trn-previous".to_string()),
        collaborator_id: collaborator_id(collaborator),
        course_level_id: CourseLevelId(BASIC.to_string()),
        snapshot: CertificateSnapshot {
            collaborator_name: format!("Worker {collaborator}"),
            collaborator_document: "100001".to_string(),
            training_code: "TA-2024-002".to_string(),
            course_name: "Work at heights".to_string(),
            level_name: "Basic worker".to_string(),
            hours: 8,
            training_start: issued_on,
            coach_name: "Lucia Ramos".to_string(),
            coach_license: None,
        },
        issued_on,
        due_date: issued_on.checked_add_signed(Duration::days(365)),
        active: true,
    }
}

pub(super) fn router_for(service: MemoryService) -> axum::Router {
    training_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// In-memory store with injectable storage faults.
pub(super) struct FaultyStore {
    inner: InMemoryTrainingStore,
    lose_flag_race: bool,
    fail_document_insert: Option<usize>,
    document_inserts: AtomicUsize,
}

impl FaultyStore {
    /// `mark_certified` sets the flag, then reports that another writer got there first.
    pub(super) fn racing_flag() -> Self {
        Self {
            inner: seeded_store(),
            lose_flag_race: true,
            fail_document_insert: None,
            document_inserts: AtomicUsize::new(0),
        }
    }

    /// The `nth` document insert (1-based) fails as if storage went away.
    pub(super) fn failing_document_insert(nth: usize) -> Self {
        Self {
            inner: seeded_store(),
            lose_flag_race: false,
            fail_document_insert: Some(nth),
            document_inserts: AtomicUsize::new(0),
        }
    }

    pub(super) fn inner(&self) -> &InMemoryTrainingStore {
        &self.inner
    }
}

impl CertificationRepository for FaultyStore {
    fn insert_training(&self, training: Training) -> Result<Training, RepositoryError> {
        self.inner.insert_training(training)
    }

    fn update_training(&self, training: Training) -> Result<(), RepositoryError> {
        self.inner.update_training(training)
    }

    fn fetch_training(&self, id: &TrainingId) -> Result<Option<Training>, RepositoryError> {
        self.inner.fetch_training(id)
    }

    fn fetch_course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        self.inner.fetch_course(id)
    }

    fn fetch_course_level(
        &self,
        id: &CourseLevelId,
    ) -> Result<Option<CourseLevel>, RepositoryError> {
        self.inner.fetch_course_level(id)
    }

    fn fetch_collaborator(
        &self,
        id: &CollaboratorId,
    ) -> Result<Option<Collaborator>, RepositoryError> {
        self.inner.fetch_collaborator(id)
    }

    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        self.inner.insert_enrollment(enrollment)
    }

    fn update_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        self.inner.update_enrollment(enrollment)
    }

    fn fetch_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        self.inner.fetch_enrollment(id)
    }

    fn enrollments_for_training(
        &self,
        training_id: &TrainingId,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        self.inner.enrollments_for_training(training_id)
    }

    fn delete_enrollment(&self, id: &EnrollmentId) -> Result<(), RepositoryError> {
        self.inner.delete_enrollment(id)
    }

    fn mark_certified(&self, id: &EnrollmentId) -> Result<Enrollment, RepositoryError> {
        let marked = self.inner.mark_certified(id)?;
        if self.lose_flag_race {
            return Err(RepositoryError::Conflict);
        }
        Ok(marked)
    }

    fn insert_document(
        &self,
        document: EnrollmentDocument,
    ) -> Result<EnrollmentDocument, RepositoryError> {
        let attempt = self.document_inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_document_insert == Some(attempt) {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.inner.insert_document(document)
    }

    fn update_document(&self, document: EnrollmentDocument) -> Result<(), RepositoryError> {
        self.inner.update_document(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<EnrollmentDocument>, RepositoryError> {
        self.inner.fetch_document(id)
    }

    fn documents_for_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<EnrollmentDocument>, RepositoryError> {
        self.inner.documents_for_enrollment(enrollment_id)
    }

    fn upsert_external_certificate(
        &self,
        certificate: ExternalCertificate,
    ) -> Result<(), RepositoryError> {
        self.inner.upsert_external_certificate(certificate)
    }

    fn fetch_external_certificate(
        &self,
        training_id: &TrainingId,
        collaborator_id: &CollaboratorId,
    ) -> Result<Option<ExternalCertificate>, RepositoryError> {
        self.inner
            .fetch_external_certificate(training_id, collaborator_id)
    }
}
