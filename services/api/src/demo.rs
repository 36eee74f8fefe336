use crate::infra::{
    demo_roster, parse_date, seed_catalog, COORDINATOR_LEVEL, MEDICAL_EXAM, SOCIAL_SECURITY,
    WORKER_LEVEL,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::sync::Arc;
use training_compliance::config::AppConfig;
use training_compliance::error::AppError;
use training_compliance::workflows::training::{
    CallerCapability, CertificationOutcome, Coach, CoachId, CollaboratorId, CourseId,
    CourseLevelId, DocumentKind, DocumentUpload, EligibilityConfig, InMemoryCertificateIssuer,
    InMemoryTrainingStore, NewEnrollment, NewTraining, RequiredDocumentId, ReviewDecision,
    TrainingService, TrainingStatus,
};

type DemoService = TrainingService<InMemoryTrainingStore, InMemoryCertificateIssuer>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Training start date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Passing score override for this run (0-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub(crate) pass_threshold: Option<u8>,
    /// Also run the external-provider (CETAR) certification path.
    #[arg(long)]
    pub(crate) include_external: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start_date,
        pass_threshold,
        include_external,
    } = args;

    let config = AppConfig::load()?;
    let mut eligibility = EligibilityConfig::from(&config.certification);
    if let Some(threshold) = pass_threshold {
        eligibility.pass_threshold = threshold;
    }
    let start_date = start_date.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryTrainingStore::default());
    seed_catalog(&store)?;
    let issuer = Arc::new(InMemoryCertificateIssuer::new(
        config.certification.validity_months,
    ));
    let service = TrainingService::new(store, issuer.clone(), eligibility);

    println!("Safety training certification walkthrough");
    println!(
        "Passing score {} | certificates valid {} months",
        eligibility.pass_threshold, config.certification.validity_months
    );

    run_document_channel(&service, start_date)?;
    if include_external {
        run_external_channel(&service, start_date)?;
    }

    println!("\nCertificates on file");
    for certificate in issuer.certificates() {
        println!(
            "- {} | {} | {} ({}h) | issued {} | due {}",
            certificate.id,
            certificate.snapshot.collaborator_name,
            certificate.snapshot.level_name,
            certificate.snapshot.hours,
            certificate.issued_on,
            certificate
                .due_date
                .map(|due| due.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    Ok(())
}

fn demo_training(code: &str, start_date: NaiveDate, by_cetar: bool) -> NewTraining {
    NewTraining {
        code: code.to_string(),
        course_id: CourseId(crate::infra::HEIGHTS_COURSE.to_string()),
        start_date,
        max_capacity: Some(4),
        by_cetar,
        coach: Coach {
            id: CoachId("coach-014".to_string()),
            full_name: "Hernan Quintero".to_string(),
            license_number: Some("TSA-0099812".to_string()),
        },
    }
}

fn upload(required_document: &str, collaborator: &CollaboratorId) -> DocumentUpload {
    DocumentUpload {
        required_document_id: RequiredDocumentId(required_document.to_string()),
        document_link: format!(
            "https://storage.example.com/{collaborator}/{required_document}.pdf"
        ),
        file_size: 182_000,
        kind: DocumentKind::Pdf,
    }
}

fn run_document_channel(service: &DemoService, start_date: NaiveDate) -> Result<(), AppError> {
    let training = service.schedule_training(demo_training("ALT-001", start_date, false))?;
    service.update_training_status(&training.id, TrainingStatus::Active, None)?;
    println!(
        "\nTraining {} ({}) scheduled for {} and activated",
        training.code, training.id, training.start_date
    );

    let roster = demo_roster();
    let scores = [96, 74, 88, 91];
    for (collaborator, score) in roster.iter().zip(scores) {
        let record = service.enroll(
            &training.id,
            NewEnrollment {
                collaborator_id: collaborator.id.clone(),
                course_level_id: CourseLevelId(WORKER_LEVEL.to_string()),
                documents: vec![
                    upload(MEDICAL_EXAM, &collaborator.id),
                    upload(SOCIAL_SECURITY, &collaborator.id),
                ],
            },
            CallerCapability::Standard,
        )?;

        for document in &record.documents {
            let rejected = collaborator.id.0 == "col-003"
                && document.required_document_id.0 == SOCIAL_SECURITY;
            if rejected {
                service.review_document(
                    &document.id,
                    ReviewDecision::Reject,
                    Some("Certificate is from a previous month".to_string()),
                )?;
            } else {
                service.review_document(&document.id, ReviewDecision::Approve, None)?;
            }
        }
        service.set_score(&record.enrollment.id, score, CallerCapability::Standard)?;
        println!(
            "- enrolled {} as {} with score {}",
            collaborator.full_name, record.enrollment.id, score
        );
    }

    if let Some(last) = roster.last() {
        let overview = service.training_overview(&training.id)?;
        if let Some(entry) = overview
            .enrollments
            .iter()
            .find(|entry| entry.enrollment.collaborator_id == last.id)
        {
            service.change_level(
                &entry.enrollment.id,
                &CourseLevelId(COORDINATOR_LEVEL.to_string()),
                CallerCapability::Standard,
            )?;
            println!(
                "- moved {} to the coordinator level; earlier uploads no longer count",
                last.full_name
            );
        }
    }

    println!("\nEligibility preview");
    for entry in service.training_overview(&training.id)?.enrollments {
        println!(
            "- {} | documents: {} | {}",
            entry.enrollment.collaborator_id,
            entry.completeness.label(),
            entry.eligibility.summary()
        );
    }

    let batch: Vec<CollaboratorId> = roster
        .iter()
        .map(|collaborator| collaborator.id.clone())
        .chain(std::iter::once(CollaboratorId("col-999".to_string())))
        .collect();
    let report = service.mass_certify(&training.id, &batch, CallerCapability::Standard)?;
    println!("\nMass certification: {}", report.summary());
    for detail in &report.details {
        let line = match &detail.outcome {
            CertificationOutcome::Created { certificate_id } => {
                format!("certificate {certificate_id}")
            }
            CertificationOutcome::Skipped { summary, .. } => summary.clone(),
            CertificationOutcome::NotEnrolled => "not enrolled in this training".to_string(),
            CertificationOutcome::Failed { kind, message } => format!("{kind}: {message}"),
        };
        println!("- {}: {}", detail.collaborator_id, line);
    }

    match service.update_training_status(
        &training.id,
        TrainingStatus::Cancelled,
        Some("Client requested cancellation"),
    ) {
        Ok(_) => println!("\nTraining cancelled"),
        Err(err) => println!("\nCancellation refused: {err}"),
    }
    service.update_training_status(&training.id, TrainingStatus::Completed, None)?;
    println!("Training {} completed", training.code);

    Ok(())
}

fn run_external_channel(service: &DemoService, start_date: NaiveDate) -> Result<(), AppError> {
    let training = service.schedule_training(demo_training("ALT-CETAR-002", start_date, true))?;
    println!(
        "\nExternal-provider training {} ({}) scheduled",
        training.code, training.id
    );

    let roster = demo_roster();
    for collaborator in roster.iter().take(2) {
        service.enroll(
            &training.id,
            NewEnrollment {
                collaborator_id: collaborator.id.clone(),
                course_level_id: CourseLevelId(COORDINATOR_LEVEL.to_string()),
                documents: Vec::new(),
            },
            CallerCapability::Standard,
        )?;
    }
    if let Some(first) = roster.first() {
        service.upsert_external_certificate(
            &training.id,
            &first.id,
            "https://cetar.example.com/certificates/ALT-CETAR-002/col-001",
        )?;
        println!("- external certificate recorded for {}", first.full_name);
    }

    let batch: Vec<CollaboratorId> = roster
        .iter()
        .take(2)
        .map(|collaborator| collaborator.id.clone())
        .collect();
    let report = service.mass_certify(&training.id, &batch, CallerCapability::Standard)?;
    println!("External mass certification: {}", report.summary());

    Ok(())
}
