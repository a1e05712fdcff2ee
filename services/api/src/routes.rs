use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_risk::assessment::{
    assessment_router, AssessmentService, ChatCompletionClient, SessionRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_assessment_routes<R, C>(service: Arc<AssessmentService<R, C>>) -> axum::Router
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    assessment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the listener is bound, degraded while the classifier artifact is unusable.
pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let bound = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let model = match state.gateway.availability() {
        Some(true) => "loaded",
        Some(false) => "unavailable",
        None => "not_loaded",
    };

    if !bound {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing", "model": model })),
        );
    }
    if state.gateway.availability() == Some(false) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "model": model })),
        );
    }
    (StatusCode::OK, Json(json!({ "status": "ready", "model": model })))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemorySessionRepository;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use loan_risk::assessment::bridge::ChatRequest;
    use loan_risk::assessment::{
        ChatCompletion, ClassifierGateway, LabelFraming, SchemaPolicy, ServiceError,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoClient;

    #[async_trait]
    impl ChatCompletionClient for EchoClient {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, ServiceError> {
            Ok(ChatCompletion::text("What is the applicant's age?"))
        }
    }

    fn bundled_gateway() -> Arc<ClassifierGateway> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../models/loan_risk_scorecard.json");
        Arc::new(ClassifierGateway::from_path(path, LabelFraming::DefaultRisk))
    }

    fn app(gateway: Arc<ClassifierGateway>, bound: bool) -> axum::Router {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(bound)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            gateway: gateway.clone(),
        };
        let service = Arc::new(AssessmentService::new(
            Arc::new(InMemorySessionRepository::default()),
            Arc::new(EchoClient),
            gateway,
            SchemaPolicy::default(),
            Duration::from_secs(5),
        ));
        with_assessment_routes(service).layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&body).expect("json payload"))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_waits_for_the_listener() {
        let gateway = bundled_gateway();
        gateway.initialize().expect("bundled artifact loads");

        let (status, body) = get(app(gateway, false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");
    }

    #[tokio::test]
    async fn readiness_reports_a_loaded_model() {
        let gateway = bundled_gateway();
        gateway.initialize().expect("bundled artifact loads");

        let (status, body) = get(app(gateway, true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "loaded");
    }

    #[tokio::test]
    async fn readiness_is_degraded_without_a_model() {
        let gateway = Arc::new(ClassifierGateway::from_path(
            "/nonexistent/loan-risk/model.json",
            LabelFraming::DefaultRisk,
        ));
        assert!(gateway.initialize().is_err());

        let (status, body) = get(app(gateway, true), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["model"], "unavailable");
    }

    #[tokio::test]
    async fn assessment_routes_are_mounted() {
        let gateway = bundled_gateway();
        let router = app(gateway, true);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/assessments/sessions")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
