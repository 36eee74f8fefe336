//! In-memory adapters for the repository and issuer ports, used by the API binary and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Months;

use super::domain::{
    Certificate, CertificateId, Collaborator, CollaboratorId, Course, CourseId, CourseLevel,
    CourseLevelId, DocumentId, Enrollment, EnrollmentDocument, EnrollmentId, ExternalCertificate,
    Training, TrainingId,
};
use super::enrollment;
use super::repository::{
    CertificateIssuer, CertificationRepository, IssuanceError, IssuanceRequest, RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    courses: HashMap<CourseId, Course>,
    levels: HashMap<CourseLevelId, CourseLevel>,
    collaborators: HashMap<CollaboratorId, Collaborator>,
    trainings: HashMap<TrainingId, Training>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    documents: Vec<EnrollmentDocument>,
    external: HashMap<(TrainingId, CollaboratorId), ExternalCertificate>,
}

/// Mutex-guarded store holding the catalog, trainings, enrollments, and documents.
#[derive(Debug, Default)]
pub struct InMemoryTrainingStore {
    state: Mutex<StoreState>,
}

impl InMemoryTrainingStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Register a course and all of its levels.
    pub fn add_course(&self, course: Course) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        for level in &course.levels {
            state.levels.insert(level.id.clone(), level.clone());
        }
        state.courses.insert(course.id.clone(), course);
        Ok(())
    }

    pub fn add_collaborator(&self, collaborator: Collaborator) -> Result<(), RepositoryError> {
        self.state()?
            .collaborators
            .insert(collaborator.id.clone(), collaborator);
        Ok(())
    }

    pub fn document_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.state()?.documents.len())
    }
}

impl CertificationRepository for InMemoryTrainingStore {
    fn insert_training(&self, training: Training) -> Result<Training, RepositoryError> {
        let mut state = self.state()?;
        if state.trainings.contains_key(&training.id) {
            return Err(RepositoryError::Conflict);
        }
        state.trainings.insert(training.id.clone(), training.clone());
        Ok(training)
    }

    fn update_training(&self, training: Training) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.trainings.get_mut(&training.id) {
            Some(slot) => {
                *slot = training;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_training(&self, id: &TrainingId) -> Result<Option<Training>, RepositoryError> {
        Ok(self.state()?.trainings.get(id).cloned())
    }

    fn fetch_course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.state()?.courses.get(id).cloned())
    }

    fn fetch_course_level(
        &self,
        id: &CourseLevelId,
    ) -> Result<Option<CourseLevel>, RepositoryError> {
        Ok(self.state()?.levels.get(id).cloned())
    }

    fn fetch_collaborator(
        &self,
        id: &CollaboratorId,
    ) -> Result<Option<Collaborator>, RepositoryError> {
        Ok(self.state()?.collaborators.get(id).cloned())
    }

    fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut state = self.state()?;
        let duplicate = state.enrollments.values().any(|existing| {
            existing.id == enrollment.id
                || (existing.training_id == enrollment.training_id
                    && existing.collaborator_id == enrollment.collaborator_id)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());
        Ok(enrollment)
    }

    fn update_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.enrollments.get_mut(&enrollment.id) {
            Some(slot) => {
                *slot = enrollment;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_enrollment(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.state()?.enrollments.get(id).cloned())
    }

    fn enrollments_for_training(
        &self,
        training_id: &TrainingId,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let state = self.state()?;
        let mut enrollments: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|enrollment| &enrollment.training_id == training_id)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(enrollments)
    }

    fn delete_enrollment(&self, id: &EnrollmentId) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.enrollments.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.documents.retain(|document| &document.enrollment_id != id);
        Ok(())
    }

    fn mark_certified(&self, id: &EnrollmentId) -> Result<Enrollment, RepositoryError> {
        let mut state = self.state()?;
        let record = state
            .enrollments
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        enrollment::mark_certified(record).map_err(|_| RepositoryError::Conflict)?;
        Ok(record.clone())
    }

    fn insert_document(
        &self,
        document: EnrollmentDocument,
    ) -> Result<EnrollmentDocument, RepositoryError> {
        let mut state = self.state()?;
        if !state.enrollments.contains_key(&document.enrollment_id) {
            return Err(RepositoryError::NotFound);
        }
        if state.documents.iter().any(|existing| existing.id == document.id) {
            return Err(RepositoryError::Conflict);
        }
        state.documents.push(document.clone());
        Ok(document)
    }

    fn update_document(&self, document: EnrollmentDocument) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state
            .documents
            .iter_mut()
            .find(|existing| existing.id == document.id)
        {
            Some(slot) => {
                *slot = document;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<EnrollmentDocument>, RepositoryError> {
        Ok(self
            .state()?
            .documents
            .iter()
            .find(|document| &document.id == id)
            .cloned())
    }

    fn documents_for_enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<Vec<EnrollmentDocument>, RepositoryError> {
        Ok(self
            .state()?
            .documents
            .iter()
            .filter(|document| &document.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }

    fn upsert_external_certificate(
        &self,
        certificate: ExternalCertificate,
    ) -> Result<(), RepositoryError> {
        let key = (
            certificate.training_id.clone(),
            certificate.collaborator_id.clone(),
        );
        self.state()?.external.insert(key, certificate);
        Ok(())
    }

    fn fetch_external_certificate(
        &self,
        training_id: &TrainingId,
        collaborator_id: &CollaboratorId,
    ) -> Result<Option<ExternalCertificate>, RepositoryError> {
        let key = (training_id.clone(), collaborator_id.clone());
        Ok(self.state()?.external.get(&key).cloned())
    }
}

/// Issuer keeping certificates in memory and enforcing the renewal rule.
#[derive(Debug)]
pub struct InMemoryCertificateIssuer {
    validity_months: u32,
    sequence: AtomicU64,
    certificates: Mutex<Vec<Certificate>>,
}

impl InMemoryCertificateIssuer {
    pub fn new(validity_months: u32) -> Self {
        Self {
            validity_months,
            sequence: AtomicU64::new(1),
            certificates: Mutex::new(Vec::new()),
        }
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        self.certificates
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Seed a certificate issued elsewhere, e.g. during a previous training.
    pub fn record(&self, certificate: Certificate) -> Result<(), IssuanceError> {
        self.lock()?.push(certificate);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Certificate>>, IssuanceError> {
        self.certificates
            .lock()
            .map_err(|_| IssuanceError::Storage("certificate store poisoned".to_string()))
    }
}

impl CertificateIssuer for InMemoryCertificateIssuer {
    fn issue(&self, request: &IssuanceRequest) -> Result<Certificate, IssuanceError> {
        if request.snapshot.collaborator_name.trim().is_empty() {
            return Err(IssuanceError::Validation(
                "collaborator name is required".to_string(),
            ));
        }

        let mut certificates = self.lock()?;
        let blocked = certificates.iter().any(|existing| {
            existing.collaborator_id == request.collaborator_id
                && existing.course_level_id == request.course_level_id
                && existing.blocks_renewal(request.issued_on)
        });
        if blocked {
            return Err(IssuanceError::DuplicateCertificate {
                collaborator_id: request.collaborator_id.clone(),
                course_level_id: request.course_level_id.clone(),
            });
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let certificate = Certificate {
            id: CertificateId(format!("cert-{sequence:06}")),
            training_id: request.training_id.clone(),
            collaborator_id: request.collaborator_id.clone(),
            course_level_id: request.course_level_id.clone(),
            snapshot: request.snapshot.clone(),
            issued_on: request.issued_on,
            due_date: request
                .issued_on
                .checked_add_months(Months::new(self.validity_months)),
            active: true,
        };
        certificates.push(certificate.clone());
        Ok(certificate)
    }

    fn revoke(&self, id: &CertificateId) -> Result<(), IssuanceError> {
        let mut certificates = self.lock()?;
        let certificate = certificates
            .iter_mut()
            .find(|certificate| &certificate.id == id)
            .ok_or_else(|| IssuanceError::Storage(format!("unknown certificate {id}")))?;
        certificate.active = false;
        Ok(())
    }
}
