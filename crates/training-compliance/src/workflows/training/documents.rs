use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CourseLevel, DocumentStatus, DocumentUpload, EnrollmentDocument, RequiredDocument,
    RequiredDocumentId,
};

/// Storage refuses anything larger than 2 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;

/// Aggregate state of an enrollment's required documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCompleteness {
    /// The level requires no documents.
    None,
    Complete,
    Missing,
    Rejected,
    Pending,
    Incomplete,
}

impl DocumentCompleteness {
    /// `None` counts as complete: there is nothing to submit.
    pub const fn satisfied(self) -> bool {
        matches!(self, Self::None | Self::Complete)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "no documents required",
            Self::Complete => "all documents approved",
            Self::Missing => "no documents submitted",
            Self::Rejected => "at least one document rejected",
            Self::Pending => "documents awaiting review",
            Self::Incomplete => "documents partially approved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document is already {} and can no longer be reviewed", .0.label())]
    NotPending(DocumentStatus),
    #[error("file of {size} bytes exceeds the {max} byte upload limit")]
    Oversized { size: u64, max: u64 },
    #[error("uploaded file is empty")]
    EmptyFile,
    #[error("document link is required")]
    MissingLink,
    #[error("required document {0} does not belong to the enrollment's current level")]
    NotRequiredForLevel(RequiredDocumentId),
}

/// Read view over one enrollment's submissions, scoped to its current course level.
///
/// Submissions for documents the level no longer requires stay in storage but are ignored
/// here, which is how a level change invalidates earlier uploads.
pub struct DocumentRegistry<'a> {
    level: &'a CourseLevel,
    submissions: &'a [EnrollmentDocument],
}

impl<'a> DocumentRegistry<'a> {
    pub fn new(level: &'a CourseLevel, submissions: &'a [EnrollmentDocument]) -> Self {
        Self { level, submissions }
    }

    pub fn required(&self) -> &'a [RequiredDocument] {
        &self.level.required_documents
    }

    /// Latest submission per required document of the current level, in level order.
    pub fn valid_submissions(&self) -> Vec<&'a EnrollmentDocument> {
        let required = self.level.required_document_ids();
        let mut latest: HashMap<&RequiredDocumentId, &'a EnrollmentDocument> = HashMap::new();

        for document in self.submissions {
            if !required.contains(&document.required_document_id) {
                continue;
            }
            match latest.get(&document.required_document_id) {
                Some(existing) if existing.created_at > document.created_at => {}
                _ => {
                    latest.insert(&document.required_document_id, document);
                }
            }
        }

        self.level
            .required_documents
            .iter()
            .filter_map(|definition| latest.get(&definition.id).copied())
            .collect()
    }

    pub fn completeness(&self) -> DocumentCompleteness {
        let required = self.required();
        if required.is_empty() {
            return DocumentCompleteness::None;
        }

        let valid = self.valid_submissions();
        let approved = valid
            .iter()
            .filter(|doc| doc.status == DocumentStatus::Approved)
            .count();

        if approved == required.len() {
            DocumentCompleteness::Complete
        } else if valid.is_empty() {
            DocumentCompleteness::Missing
        } else if valid.iter().any(|doc| doc.status == DocumentStatus::Rejected) {
            DocumentCompleteness::Rejected
        } else if valid.iter().any(|doc| doc.status == DocumentStatus::Pending) {
            DocumentCompleteness::Pending
        } else {
            DocumentCompleteness::Incomplete
        }
    }
}

/// Move a pending document to approved or rejected.
///
/// Rejections are expected to carry notes; callers enforce that before invoking.
pub fn review(
    document: &mut EnrollmentDocument,
    decision: ReviewDecision,
    notes: Option<String>,
    reviewed_at: DateTime<Utc>,
) -> Result<(), DocumentError> {
    if document.status != DocumentStatus::Pending {
        return Err(DocumentError::NotPending(document.status));
    }

    document.status = match decision {
        ReviewDecision::Approve => DocumentStatus::Approved,
        ReviewDecision::Reject => DocumentStatus::Rejected,
    };
    document.review_notes = notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    document.reviewed_at = Some(reviewed_at);
    Ok(())
}

/// Checks the storage contract for an upload and that the level asks for this document.
pub fn validate_upload(level: &CourseLevel, upload: &DocumentUpload) -> Result<(), DocumentError> {
    if upload.document_link.trim().is_empty() {
        return Err(DocumentError::MissingLink);
    }
    if upload.file_size == 0 {
        return Err(DocumentError::EmptyFile);
    }
    if upload.file_size > MAX_UPLOAD_BYTES {
        return Err(DocumentError::Oversized {
            size: upload.file_size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    if !level.requires(&upload.required_document_id) {
        return Err(DocumentError::NotRequiredForLevel(
            upload.required_document_id.clone(),
        ));
    }
    Ok(())
}
