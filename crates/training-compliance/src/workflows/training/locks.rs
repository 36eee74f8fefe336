use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::domain::{EnrollmentId, TrainingId};

/// In-process lock table.
///
/// Lock order is always training first, then enrollment. A training's write lock is taken
/// by enrollment creation and status transitions; everything touching a single enrollment
/// holds the training read lock plus that enrollment's mutex.
#[derive(Debug, Default)]
pub(crate) struct LockRegistry {
    trainings: Mutex<HashMap<TrainingId, Arc<RwLock<()>>>>,
    enrollments: Mutex<HashMap<EnrollmentId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub(crate) fn training(&self, id: &TrainingId) -> Arc<RwLock<()>> {
        let mut table = self
            .trainings
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(id.clone()).or_default().clone()
    }

    pub(crate) fn enrollment(&self, id: &EnrollmentId) -> Arc<Mutex<()>> {
        let mut table = self
            .enrollments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(id.clone()).or_default().clone()
    }

    pub(crate) fn forget_enrollment(&self, id: &EnrollmentId) {
        self.enrollments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Drop the entries of an archived training and its enrollments.
    pub(crate) fn forget_training<'a>(
        &self,
        id: &TrainingId,
        enrollments: impl IntoIterator<Item = &'a EnrollmentId>,
    ) {
        {
            let mut table = self
                .enrollments
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for enrollment in enrollments {
                table.remove(enrollment);
            }
        }
        self.trainings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    #[cfg(test)]
    fn sizes(&self) -> (usize, usize) {
        let trainings = self
            .trainings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let enrollments = self
            .enrollments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        (trainings, enrollments)
    }
}
