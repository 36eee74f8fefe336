use super::common::*;
use std::sync::Arc;

use crate::workflows::training::domain::{
    CallerCapability, CourseLevelId, EnrollmentId, TrainingStatus,
};
use crate::workflows::training::enrollment::{
    change_level, enroll, mark_certified, set_score, EnrollmentError,
};
use crate::workflows::training::repository::CertificationRepository;
use crate::workflows::training::service::{
    ErrorKind, NewEnrollment, TrainingService, TrainingServiceError,
};
use crate::workflows::training::InMemoryCertificateIssuer;

fn new_enrollment(collaborator: u32, level: &str) -> NewEnrollment {
    NewEnrollment {
        collaborator_id: collaborator_id(collaborator),
        course_level_id: CourseLevelId(level.to_string()),
        documents: Vec::new(),
    }
}

#[test]
fn capacity_is_enforced_on_the_third_enrollment() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, Some(2));

    enroll_at(&service, &training, 1, BASIC);
    enroll_at(&service, &training, 2, ADVANCED);

    let error = service
        .enroll(&training.id, new_enrollment(3, BASIC), CallerCapability::Standard)
        .expect_err("training is full");
    assert_eq!(error.kind(), ErrorKind::CapacityExceeded);

    let overview = service.training_overview(&training.id).expect("overview");
    assert_eq!(overview.enrollments.len(), 2);
}

#[test]
fn collaborator_cannot_enroll_twice() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);
    enroll_at(&service, &training, 1, BASIC);

    let error = service
        .enroll(&training.id, new_enrollment(1, ADVANCED), CallerCapability::Elevated)
        .expect_err("duplicate enrollment");
    assert!(matches!(
        error,
        TrainingServiceError::Enrollment(EnrollmentError::DuplicateEnrollment { .. })
    ));
}

#[test]
fn enrollment_with_initial_documents_stores_them_pending() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);

    let record = service
        .enroll(
            &training.id,
            NewEnrollment {
                documents: vec![upload(MEDICAL), upload(IDENTITY)],
                ..new_enrollment(4, BASIC)
            },
            CallerCapability::Standard,
        )
        .expect("enrolled");

    assert_eq!(record.documents.len(), 2);
    assert!(record
        .documents
        .iter()
        .all(|doc| doc.status == crate::workflows::training::DocumentStatus::Pending));
}

#[test]
fn unknown_collaborator_or_foreign_level_is_rejected() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);

    let error = service
        .enroll(&training.id, new_enrollment(99, BASIC), CallerCapability::Standard)
        .expect_err("unknown collaborator");
    assert_eq!(error.kind(), ErrorKind::NotFound);

    let error = service
        .enroll(&training.id, new_enrollment(1, CONFINED), CallerCapability::Standard)
        .expect_err("level from another course");
    assert!(matches!(
        error,
        TrainingServiceError::Enrollment(EnrollmentError::LevelOutsideCourse { .. })
    ));
    assert_eq!(error.kind(), ErrorKind::ValidationError);
}

#[test]
fn disabled_training_blocks_standard_callers_only() {
    let postponed = training(TrainingStatus::Postponed);
    let level = basic_level();

    let error = enroll(
        EnrollmentId("enr-x".to_string()),
        &postponed,
        &collaborator_id(1),
        &level,
        &[],
        CallerCapability::Standard,
        at(5, 9),
    )
    .expect_err("postponed training is locked");
    assert_eq!(
        error,
        EnrollmentError::TrainingDisabled {
            status: TrainingStatus::Postponed
        }
    );

    let created = enroll(
        EnrollmentId("enr-y".to_string()),
        &postponed,
        &collaborator_id(1),
        &level,
        &[],
        CallerCapability::Elevated,
        at(5, 9),
    )
    .expect("elevated caller bypasses the lock");
    assert_eq!(created.course_level_id, level.id);

    let mut subject = enrollment(None);
    assert!(change_level(
        &mut subject,
        &postponed,
        &advanced_level(),
        CallerCapability::Standard
    )
    .is_err());
}

#[test]
fn completed_training_still_accepts_changes() {
    let completed = training(TrainingStatus::Completed);
    let mut subject = enrollment(None);

    change_level(
        &mut subject,
        &completed,
        &advanced_level(),
        CallerCapability::Standard,
    )
    .expect("completed trainings stay editable");
    assert_eq!(subject.course_level_id.0, ADVANCED);
}

#[test]
fn score_must_be_within_range() {
    let mut subject = enrollment(None);

    assert_eq!(
        set_score(&mut subject, 101, CallerCapability::Elevated),
        Err(EnrollmentError::ScoreOutOfRange(101))
    );
    assert_eq!(
        set_score(&mut subject, -1, CallerCapability::Standard),
        Err(EnrollmentError::ScoreOutOfRange(-1))
    );
    set_score(&mut subject, 0, CallerCapability::Standard).expect("zero is valid");
    assert_eq!(subject.final_score, Some(0));
    set_score(&mut subject, 100, CallerCapability::Standard).expect("hundred is valid");
    assert_eq!(subject.final_score, Some(100));
}

#[test]
fn certified_enrollment_is_frozen_for_standard_callers() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);
    let enrollment = ready_enrollment(&service, &training, 1);
    service
        .certify(&enrollment.id, CallerCapability::Standard)
        .expect("certified");

    let score_error = service
        .set_score(&enrollment.id, 50, CallerCapability::Standard)
        .expect_err("score frozen");
    assert_eq!(score_error.kind(), ErrorKind::AlreadyCertified);

    let level_error = service
        .change_level(
            &enrollment.id,
            &CourseLevelId(ADVANCED.to_string()),
            CallerCapability::Standard,
        )
        .expect_err("level frozen");
    assert_eq!(level_error.kind(), ErrorKind::AlreadyCertified);

    let upload_error = service
        .submit_document(&enrollment.id, upload(MEDICAL), CallerCapability::Standard)
        .expect_err("documents frozen");
    assert_eq!(upload_error.kind(), ErrorKind::AlreadyCertified);

    let corrected = service
        .set_score(&enrollment.id, 95, CallerCapability::Elevated)
        .expect("administrator may correct the score");
    assert_eq!(corrected.final_score, Some(95));
    assert!(corrected.certificate_issued);
}

#[test]
fn certified_enrollment_cannot_be_deleted_by_anyone() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);
    let enrollment = ready_enrollment(&service, &training, 1);
    service
        .certify(&enrollment.id, CallerCapability::Standard)
        .expect("certified");

    let error = service
        .remove_enrollment(&enrollment.id)
        .expect_err("deletion guard");
    assert_eq!(error.kind(), ErrorKind::AlreadyCertified);
    assert!(service.get_enrollment(&enrollment.id).is_ok());
}

#[test]
fn removing_enrollment_drops_its_documents() {
    let (service, store, _) = build_service();
    let training = schedule(&service, false, None);
    let enrollment = enroll_at(&service, &training, 1, BASIC);
    approve_all(&service, &enrollment.id);
    assert_eq!(store.document_count().expect("count"), 2);

    service
        .remove_enrollment(&enrollment.id)
        .expect("uncertified enrollment removed");

    assert_eq!(store.document_count().expect("count"), 0);
    let error = service
        .get_enrollment(&enrollment.id)
        .expect_err("enrollment gone");
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[test]
fn scoring_is_allowed_while_training_is_postponed() {
    let (service, _, _) = build_service();
    let training = schedule(&service, false, None);
    let enrollment = enroll_at(&service, &training, 1, BASIC);
    service
        .update_training_status(&training.id, TrainingStatus::Postponed, Some("weather"))
        .expect("postponed");

    service
        .set_score(&enrollment.id, 88, CallerCapability::Standard)
        .expect("score only checks the certified flag");

    let error = service
        .change_level(
            &enrollment.id,
            &CourseLevelId(ADVANCED.to_string()),
            CallerCapability::Standard,
        )
        .expect_err("level change blocked");
    assert_eq!(error.kind(), ErrorKind::TrainingDisabled);
}

#[test]
fn full_training_reports_capacity_before_duplicate() {
    let full = training(TrainingStatus::Planned);
    let mut second = enrollment(None);
    second.id = EnrollmentId("enr-fixture-2".to_string());
    second.collaborator_id = collaborator_id(2);
    let existing = vec![enrollment(None), second];

    let error = enroll(
        EnrollmentId("enr-x".to_string()),
        &full,
        &collaborator_id(1),
        &basic_level(),
        &existing,
        CallerCapability::Standard,
        at(2, 9),
    )
    .expect_err("training is full");

    assert!(matches!(error, EnrollmentError::CapacityExceeded { capacity: 2, .. }));
}

#[test]
fn certified_flag_is_set_only_once() {
    let mut record = enrollment(Some(90));

    mark_certified(&mut record).expect("first certification");
    let error = mark_certified(&mut record).expect_err("already certified");

    assert_eq!(error, EnrollmentError::AlreadyCertified(record.id.clone()));
    assert!(record.certificate_issued);
}

#[test]
fn failed_document_insert_leaves_no_enrollment_behind() {
    let store = Arc::new(FaultyStore::failing_document_insert(2));
    let service = TrainingService::new(
        store.clone(),
        Arc::new(InMemoryCertificateIssuer::new(12)),
        config(),
    );
    let training = schedule(&service, false, None);
    let input = NewEnrollment {
        documents: vec![upload(MEDICAL), upload(IDENTITY)],
        ..new_enrollment(1, BASIC)
    };

    let error = service
        .enroll(&training.id, input.clone(), CallerCapability::Standard)
        .expect_err("second document insert fails");
    assert_eq!(error.kind(), ErrorKind::StorageUnavailable);
    assert!(store
        .enrollments_for_training(&training.id)
        .expect("enrollments")
        .is_empty());
    assert_eq!(store.inner().document_count().expect("documents"), 0);

    let record = service
        .enroll(&training.id, input, CallerCapability::Standard)
        .expect("retry succeeds");
    assert_eq!(record.documents.len(), 2);
}
