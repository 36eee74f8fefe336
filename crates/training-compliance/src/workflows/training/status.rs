use chrono::{DateTime, Utc};

use super::domain::{StatusChange, Training, TrainingStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("training cannot move from {from} to {to}")]
    InvalidTransition {
        from: TrainingStatus,
        to: TrainingStatus,
    },
    #[error("a reason is required to mark a training as {0}")]
    ReasonRequired(TrainingStatus),
    #[error("training cannot be cancelled: {issued} certificate(s) already issued")]
    CertificatesAlreadyIssued { issued: usize },
}

/// Statuses reachable from `from` in one step.
pub const fn allowed_targets(from: TrainingStatus) -> &'static [TrainingStatus] {
    use TrainingStatus::*;
    match from {
        Planned => &[Active, Completed, Cancelled, Postponed],
        Active => &[Completed, Cancelled, Postponed],
        Postponed => &[Planned, Active, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: TrainingStatus, to: TrainingStatus) -> bool {
    allowed_targets(from).contains(&to)
}

const fn requires_reason(to: TrainingStatus) -> bool {
    matches!(to, TrainingStatus::Cancelled | TrainingStatus::Postponed)
}

/// Apply a status change to the training and append it to the history.
///
/// `issued_certificates` must be counted while holding the same exclusive lock the caller
/// uses to persist the result, so no issuance can slip in between.
pub fn transition(
    training: &mut Training,
    to: TrainingStatus,
    reason: Option<&str>,
    issued_certificates: usize,
    changed_at: DateTime<Utc>,
) -> Result<StatusChange, StatusError> {
    let from = training.status;
    if !can_transition(from, to) {
        return Err(StatusError::InvalidTransition { from, to });
    }

    let reason = reason
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    if requires_reason(to) && reason.is_none() {
        return Err(StatusError::ReasonRequired(to));
    }

    if to == TrainingStatus::Cancelled && issued_certificates > 0 {
        return Err(StatusError::CertificatesAlreadyIssued {
            issued: issued_certificates,
        });
    }

    let change = StatusChange {
        from,
        to,
        reason,
        changed_at,
    };
    training.status = to;
    training.status_history.push(change.clone());
    Ok(change)
}
