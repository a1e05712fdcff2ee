use super::common::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::assessment::bridge::{ChatCompletion, ServiceError};
use crate::assessment::conversation::AssessmentPhase;
use crate::assessment::domain::{DecisionLabel, LabelFraming};
use crate::assessment::error::AssessmentError;
use crate::assessment::gateway::ClassifierGateway;
use crate::assessment::repository::{RepositoryError, SessionId, SessionRepository};
use crate::assessment::service::{AssessmentService, AssessmentServiceError};
use crate::assessment::validation::SchemaPolicy;

#[tokio::test]
async fn new_session_shows_only_the_welcome() {
    let (service, repository) = build_service(
        ScriptedClient::silent(),
        scorecard_gateway(LabelFraming::DefaultRisk),
    );

    let view = service.start_session().await.expect("session created");
    assert_eq!(view.phase, AssessmentPhase::AwaitingConsent);
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.missing.len(), 10);
    assert!(view.session_id.0.starts_with("sess-"));
    assert!(repository
        .fetch(&view.session_id)
        .expect("fetch")
        .is_some());
}

#[tokio::test]
async fn empty_messages_are_rejected_before_any_call() {
    let client = ScriptedClient::silent();
    let (service, _) = build_service(client.clone(), scorecard_gateway(LabelFraming::DefaultRisk));
    let view = service.start_session().await.expect("session created");

    match service.send_message(&view.session_id, "   ").await {
        Err(AssessmentServiceError::EmptyMessage) => {}
        other => panic!("expected empty message error, got {other:?}"),
    }
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let (service, _) = build_service(
        ScriptedClient::silent(),
        scorecard_gateway(LabelFraming::DefaultRisk),
    );
    let id = SessionId("sess-missing".to_string());

    assert!(matches!(
        service.send_message(&id, "yes").await,
        Err(AssessmentServiceError::Repository(RepositoryError::NotFound))
    ));
    assert!(matches!(
        service.reset(&id).await,
        Err(AssessmentServiceError::Repository(RepositoryError::NotFound))
    ));
    assert!(matches!(
        service.end_session(&id).await,
        Err(AssessmentServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[tokio::test]
async fn service_outage_does_not_touch_the_stored_session() {
    let client = ScriptedClient::new([
        Ok(ChatCompletion::text("What is the applicant's age?")),
        Err(ServiceError::Status {
            status: 503,
            body: "overloaded".to_string(),
        }),
    ]);
    let (service, _) = build_service(client, scorecard_gateway(LabelFraming::DefaultRisk));
    let view = service.start_session().await.expect("session created");
    let id = view.session_id;

    service.send_message(&id, "yes").await.expect("consent");
    let before = service.get(&id).await.expect("view");

    match service.send_message(&id, "25").await {
        Err(AssessmentServiceError::Assessment(AssessmentError::ServiceUnavailable { .. })) => {}
        other => panic!("expected service unavailable, got {other:?}"),
    }

    let after = service.get(&id).await.expect("view");
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.phase, AssessmentPhase::Collecting);
}

#[tokio::test]
async fn reset_is_idempotent() {
    let client = ScriptedClient::replying([
        ChatCompletion::text("What is the applicant's age?"),
        decide_call(json!({ "age": 52 })),
    ]);
    let (service, _) = build_service(client, scorecard_gateway(LabelFraming::DefaultRisk));
    let id = service.start_session().await.expect("session").session_id;

    service.send_message(&id, "yes").await.expect("consent");
    service.send_message(&id, "52").await.expect("age");

    let first = service.reset(&id).await.expect("reset");
    let second = service.reset(&id).await.expect("reset again");

    assert_eq!(first.phase, AssessmentPhase::AwaitingConsent);
    assert_eq!(first.messages.len(), 1);
    assert!(first.collected.is_empty());
    assert_eq!(first.updated_at, second.updated_at);
    assert_eq!(first.messages, second.messages);
}

#[tokio::test]
async fn sessions_do_not_share_state() {
    let client = ScriptedClient::replying([
        ChatCompletion::text("What is the applicant's age?"),
        decide_call(json!({ "age": 29 })),
    ]);
    let (service, _) = build_service(client, scorecard_gateway(LabelFraming::DefaultRisk));
    let first = service.start_session().await.expect("first").session_id;
    let second = service.start_session().await.expect("second").session_id;
    assert_ne!(first, second);

    service.send_message(&first, "yes").await.expect("consent");
    let report = service.send_message(&first, "29").await.expect("age");
    assert_eq!(report.missing.len(), 9);

    let untouched = service.get(&second).await.expect("second view");
    assert_eq!(untouched.phase, AssessmentPhase::AwaitingConsent);
    assert!(untouched.collected.is_empty());
}

#[tokio::test]
async fn ended_sessions_are_gone() {
    let (service, _) = build_service(
        ScriptedClient::silent(),
        scorecard_gateway(LabelFraming::DefaultRisk),
    );
    let id = service.start_session().await.expect("session").session_id;

    service.end_session(&id).await.expect("ended");
    assert!(matches!(
        service.get(&id).await,
        Err(AssessmentServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[tokio::test]
async fn repository_outage_surfaces_as_repository_error() {
    let service = AssessmentService::new(
        Arc::new(UnavailableSessions),
        ScriptedClient::silent(),
        scorecard_gateway(LabelFraming::DefaultRisk),
        SchemaPolicy::default(),
        TURN_TIMEOUT,
    );

    assert!(matches!(
        service.start_session().await,
        Err(AssessmentServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
}

#[test]
fn score_decides_complete_forms() {
    let (service, _) = build_service(
        ScriptedClient::silent(),
        scorecard_gateway(LabelFraming::DefaultRisk),
    );

    let decision = service.score(&strong_fields()).expect("decision");
    assert_eq!(decision.label, DecisionLabel::LowRisk);

    let mut fields = strong_fields();
    fields.insert("age".to_string(), json!(12));
    fields.insert("loan_intent".to_string(), Value::from("vacation"));
    match service.score(&fields) {
        Err(AssessmentError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn score_reports_unavailable_model() {
    let (loader, _) = CountingLoader::new(true);
    let (service, _) = build_service(
        ScriptedClient::silent(),
        Arc::new(ClassifierGateway::new(loader, LabelFraming::DefaultRisk)),
    );

    let err = service.score(&strong_fields()).expect_err("no model");
    assert_eq!(err.kind(), "model_unavailable");
    assert!(!err.retryable());
}
