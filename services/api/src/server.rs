use crate::cli::ServeArgs;
use crate::infra::{seed_catalog, AppState};
use crate::routes::with_training_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use training_compliance::config::AppConfig;
use training_compliance::error::AppError;
use training_compliance::telemetry;
use training_compliance::workflows::training::{
    EligibilityConfig, InMemoryCertificateIssuer, InMemoryTrainingStore, TrainingService,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryTrainingStore::default());
    seed_catalog(&store)?;
    let issuer = Arc::new(InMemoryCertificateIssuer::new(
        config.certification.validity_months,
    ));
    let training_service = Arc::new(TrainingService::new(
        store,
        issuer,
        EligibilityConfig::from(&config.certification),
    ));

    let app = with_training_routes(training_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        pass_threshold = config.certification.pass_threshold,
        "training compliance service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
