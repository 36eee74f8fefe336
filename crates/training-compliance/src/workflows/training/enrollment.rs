//! Rules for a single collaborator's participation in one training.
//!
//! These functions only check and mutate in-memory values; the service decides what to load,
//! which locks to hold, and what to persist.

use chrono::{DateTime, Utc};

use super::domain::{
    Bypass, CallerCapability, CollaboratorId, CourseLevel, CourseLevelId, Enrollment,
    EnrollmentId, EnrollmentStatus, Training, TrainingId, TrainingStatus,
};

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("training {training_id} is full ({capacity} seats)")]
    CapacityExceeded { training_id: TrainingId, capacity: u32 },
    #[error("collaborator {collaborator_id} is already enrolled in training {training_id}")]
    DuplicateEnrollment {
        training_id: TrainingId,
        collaborator_id: CollaboratorId,
    },
    #[error("enrollment {0} already has an issued certificate")]
    AlreadyCertified(EnrollmentId),
    #[error("training is {status}; only an administrator may change its enrollments")]
    TrainingDisabled { status: TrainingStatus },
    #[error("score {0} is outside the 0-100 range")]
    ScoreOutOfRange(i32),
    #[error("course level {level} does not belong to the training's course")]
    LevelOutsideCourse { level: CourseLevelId },
}

/// Fails for a standard caller when the training is cancelled or postponed.
pub fn ensure_training_enabled(
    training: &Training,
    caller: CallerCapability,
) -> Result<(), EnrollmentError> {
    if training.is_disabled() && !caller.permits(Bypass::DisabledTraining) {
        return Err(EnrollmentError::TrainingDisabled {
            status: training.status,
        });
    }
    Ok(())
}

/// Fails for a standard caller once the certificate has been issued.
pub fn ensure_not_certified(
    enrollment: &Enrollment,
    caller: CallerCapability,
) -> Result<(), EnrollmentError> {
    if enrollment.certificate_issued && !caller.permits(Bypass::CertifiedEnrollment) {
        return Err(EnrollmentError::AlreadyCertified(enrollment.id.clone()));
    }
    Ok(())
}

fn ensure_level_in_course(training: &Training, level: &CourseLevel) -> Result<(), EnrollmentError> {
    if level.course_id != training.course_id {
        return Err(EnrollmentError::LevelOutsideCourse {
            level: level.id.clone(),
        });
    }
    Ok(())
}

/// Build a new enrollment after checking level, capacity, then duplicates.
///
/// `existing` must be every enrollment currently stored for the training. A full training
/// reports `CapacityExceeded` even for a collaborator who is already enrolled.
pub fn enroll(
    id: EnrollmentId,
    training: &Training,
    collaborator_id: &CollaboratorId,
    level: &CourseLevel,
    existing: &[Enrollment],
    caller: CallerCapability,
    created_at: DateTime<Utc>,
) -> Result<Enrollment, EnrollmentError> {
    ensure_training_enabled(training, caller)?;
    ensure_level_in_course(training, level)?;

    if let Some(capacity) = training.max_capacity {
        if existing.len() >= capacity as usize {
            return Err(EnrollmentError::CapacityExceeded {
                training_id: training.id.clone(),
                capacity,
            });
        }
    }

    if existing
        .iter()
        .any(|enrollment| &enrollment.collaborator_id == collaborator_id)
    {
        return Err(EnrollmentError::DuplicateEnrollment {
            training_id: training.id.clone(),
            collaborator_id: collaborator_id.clone(),
        });
    }

    Ok(Enrollment {
        id,
        training_id: training.id.clone(),
        collaborator_id: collaborator_id.clone(),
        course_level_id: level.id.clone(),
        final_score: None,
        status: EnrollmentStatus::Registered,
        certificate_issued: false,
        created_at,
    })
}

/// Switch the enrollment to another level of the same course.
///
/// Documents submitted for the previous level are left untouched; they simply stop
/// counting because the new level does not require them.
pub fn change_level(
    enrollment: &mut Enrollment,
    training: &Training,
    level: &CourseLevel,
    caller: CallerCapability,
) -> Result<(), EnrollmentError> {
    ensure_not_certified(enrollment, caller)?;
    ensure_training_enabled(training, caller)?;
    ensure_level_in_course(training, level)?;

    enrollment.course_level_id = level.id.clone();
    Ok(())
}

/// Record the final score. Missing documents do not block scoring.
pub fn set_score(
    enrollment: &mut Enrollment,
    value: i32,
    caller: CallerCapability,
) -> Result<(), EnrollmentError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        return Err(EnrollmentError::ScoreOutOfRange(value));
    }
    ensure_not_certified(enrollment, caller)?;

    enrollment.final_score = u8::try_from(value).ok();
    Ok(())
}

/// Certified enrollments are never deleted, whatever the caller's role.
pub fn ensure_removable(enrollment: &Enrollment) -> Result<(), EnrollmentError> {
    if enrollment.certificate_issued {
        return Err(EnrollmentError::AlreadyCertified(enrollment.id.clone()));
    }
    Ok(())
}

/// The single transition into the certified state. Never succeeds twice.
pub fn mark_certified(enrollment: &mut Enrollment) -> Result<(), EnrollmentError> {
    if enrollment.certificate_issued {
        return Err(EnrollmentError::AlreadyCertified(enrollment.id.clone()));
    }
    enrollment.certificate_issued = true;
    Ok(())
}
