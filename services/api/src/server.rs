use crate::cli::ServeArgs;
use crate::infra::{
    build_assistant, build_gateway, spawn_session_sweeper, AppState, InMemorySessionRepository,
};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_risk::assessment::AssessmentService;
use loan_risk::config::AppConfig;
use loan_risk::error::AppError;
use loan_risk::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let gateway = build_gateway(&config.model);
    let assistant = build_assistant(&config.assistant)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        gateway: gateway.clone(),
    };

    let repository = Arc::new(InMemorySessionRepository::default());
    spawn_session_sweeper(repository.clone(), config.server.session_idle);
    let assessment_service = Arc::new(AssessmentService::new(
        repository,
        assistant,
        gateway,
        config.model.policy(),
        config.assistant.timeout,
    ));

    let app = with_assessment_routes(assessment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        framing = ?config.model.framing,
        assistant_model = %config.assistant.model,
        "loan risk assessor ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
