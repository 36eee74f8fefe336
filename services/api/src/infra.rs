use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use training_compliance::workflows::training::{
    Collaborator, CollaboratorId, Course, CourseId, CourseLevel, CourseLevelId,
    InMemoryTrainingStore, RequiredDocument, RequiredDocumentId, TrainingServiceError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const HEIGHTS_COURSE: &str = "course-heights";
pub(crate) const WORKER_LEVEL: &str = "lvl-heights-worker";
pub(crate) const COORDINATOR_LEVEL: &str = "lvl-heights-coordinator";
pub(crate) const MEDICAL_EXAM: &str = "req-medical-exam";
pub(crate) const SOCIAL_SECURITY: &str = "req-social-security";
pub(crate) const RESCUE_PLAN: &str = "req-rescue-plan";

fn required(id: &str, level: &str, name: &str, description: &str) -> RequiredDocument {
    RequiredDocument {
        id: RequiredDocumentId(id.to_string()),
        course_level_id: CourseLevelId(level.to_string()),
        name: name.to_string(),
        description: Some(description.to_string()),
    }
}

/// Work-at-heights course plus a small roster, enough to exercise every endpoint.
pub(crate) fn demo_course() -> Course {
    Course {
        id: CourseId(HEIGHTS_COURSE.to_string()),
        name: "Work at heights".to_string(),
        levels: vec![
            CourseLevel {
                id: CourseLevelId(WORKER_LEVEL.to_string()),
                course_id: CourseId(HEIGHTS_COURSE.to_string()),
                name: "Authorized worker".to_string(),
                hours: 32,
                required_documents: vec![
                    required(
                        MEDICAL_EXAM,
                        WORKER_LEVEL,
                        "Occupational medical exam",
                        "Issued within the last 12 months",
                    ),
                    required(
                        SOCIAL_SECURITY,
                        WORKER_LEVEL,
                        "Social security affiliation",
                        "Current month certificate",
                    ),
                ],
            },
            CourseLevel {
                id: CourseLevelId(COORDINATOR_LEVEL.to_string()),
                course_id: CourseId(HEIGHTS_COURSE.to_string()),
                name: "Coordinator".to_string(),
                hours: 80,
                required_documents: vec![required(
                    RESCUE_PLAN,
                    COORDINATOR_LEVEL,
                    "Rescue plan",
                    "Signed by the site supervisor",
                )],
            },
        ],
    }
}

pub(crate) fn demo_roster() -> Vec<Collaborator> {
    [
        ("col-001", "Andrea Morales", "1032456789"),
        ("col-002", "Julian Castro", "80123456"),
        ("col-003", "Paula Herrera", "52987654"),
        ("col-004", "Santiago Rojas", "1020304050"),
    ]
    .into_iter()
    .map(|(id, name, document)| Collaborator {
        id: CollaboratorId(id.to_string()),
        full_name: name.to_string(),
        document_number: document.to_string(),
    })
    .collect()
}

pub(crate) fn seed_catalog(store: &InMemoryTrainingStore) -> Result<(), TrainingServiceError> {
    store.add_course(demo_course())?;
    for collaborator in demo_roster() {
        store.add_collaborator(collaborator)?;
    }
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
