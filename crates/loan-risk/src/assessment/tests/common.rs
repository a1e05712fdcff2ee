use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::assessment::bridge::{
    ChatCompletion, ChatCompletionClient, ChatRequest, ServiceError, TOOL_NAME,
};
use crate::assessment::conversation::{ConversationEngine, ConversationState, Turn};
use crate::assessment::domain::{ApplicantRecord, LabelFraming};
use crate::assessment::gateway::{
    ClassifierGateway, ModelLoadError, ModelLoader, PredictionError, RiskModel, ScorecardModel,
};
use crate::assessment::repository::{
    RepositoryError, SessionHandle, SessionId, SessionRecord, SessionRepository,
};
use crate::assessment::service::AssessmentService;
use crate::assessment::validation::{validate, SchemaPolicy};

pub(super) const SCORECARD: &str = include_str!("../../../../../models/loan_risk_scorecard.json");

pub(super) const TURN_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) fn scorecard() -> ScorecardModel {
    ScorecardModel::from_json(SCORECARD).expect("bundled scorecard parses")
}

pub(super) fn scorecard_gateway(framing: LabelFraming) -> Arc<ClassifierGateway> {
    Arc::new(ClassifierGateway::with_model(Arc::new(scorecard()), framing))
}

/// Established, well-paid borrower the bundled scorecard rates as low risk.
pub(super) fn strong_fields() -> Map<String, Value> {
    object(json!({
        "age": 35,
        "annual_income": 120000,
        "home_ownership": "MORTGAGE",
        "employment_length_years": 10,
        "loan_intent": "EDUCATION",
        "loan_grade": "A",
        "loan_amount": 5000,
        "interest_rate_pct": 7.5,
        "prior_default_on_file": "N",
        "credit_history_length_years": 12
    }))
}

/// Young renter with a prior default and a large, expensive loan: high risk.
pub(super) fn weak_fields() -> Map<String, Value> {
    object(json!({
        "age": 22,
        "annual_income": 18000,
        "home_ownership": "RENT",
        "employment_length_years": 0,
        "loan_intent": "MEDICAL",
        "loan_grade": "F",
        "loan_amount": 25000,
        "interest_rate_pct": 19.5,
        "prior_default_on_file": "Y",
        "credit_history_length_years": 2
    }))
}

pub(super) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(super) fn record(fields: &Map<String, Value>) -> ApplicantRecord {
    validate(fields, &SchemaPolicy::default()).expect("fixture fields are valid")
}

/// A single call of the applicant tool carrying `arguments`.
pub(super) fn decide_call(arguments: Value) -> ChatCompletion {
    ChatCompletion::tool_call(TOOL_NAME, arguments.to_string())
}

/// Plays back queued replies in order and records every request.
#[derive(Default)]
pub(super) struct ScriptedClient {
    replies: Mutex<VecDeque<Result<ChatCompletion, ServiceError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub(super) fn new(
        replies: impl IntoIterator<Item = Result<ChatCompletion, ServiceError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn replying(replies: impl IntoIterator<Item = ChatCompletion>) -> Arc<Self> {
        Self::new(replies.into_iter().map(Ok))
    }

    /// No scripted replies; every call gets a generic question back.
    pub(super) fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(super) fn calls(&self) -> usize {
        self.requests.lock().expect("request log poisoned").len()
    }

    pub(super) fn last_request(&self) -> Option<ChatRequest> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl ChatCompletionClient for ScriptedClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ServiceError> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());
        self.replies
            .lock()
            .expect("reply queue poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(ChatCompletion::text("Is there anything else I can help with?")))
    }
}

/// Answers only after `delay`, to exercise the bridge timeout.
pub(super) struct SlowClient {
    pub(super) delay: Duration,
}

#[async_trait]
impl ChatCompletionClient for SlowClient {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, ServiceError> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatCompletion::text("too late"))
    }
}

/// Counts loads; sleeps first so concurrent first callers overlap.
pub(super) struct CountingLoader {
    pub(super) loads: Arc<AtomicUsize>,
    pub(super) delay: Duration,
    pub(super) fail: bool,
}

impl CountingLoader {
    pub(super) fn new(fail: bool) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = Self {
            loads: loads.clone(),
            delay: Duration::from_millis(50),
            fail,
        };
        (loader, loads)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self) -> Result<Arc<dyn RiskModel>, ModelLoadError> {
        std::thread::sleep(self.delay);
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ModelLoadError::Corrupt {
                path: "memory://scorecard".to_string(),
                reason: "truncated artifact".to_string(),
            })
        } else {
            Ok(Arc::new(scorecard()))
        }
    }

    fn describe(&self) -> String {
        "counting loader".to_string()
    }
}

/// Always answers with the same raw class.
#[derive(Debug)]
pub(super) struct FixedModel(pub(super) u8);

impl RiskModel for FixedModel {
    fn predict(&self, _record: &ApplicantRecord) -> Result<u8, PredictionError> {
        Ok(self.0)
    }
}

/// Raises on every call and counts how often it was asked.
#[derive(Debug, Default)]
pub(super) struct FailingModel {
    pub(super) calls: AtomicUsize,
}

impl RiskModel for FailingModel {
    fn predict(&self, _record: &ApplicantRecord) -> Result<u8, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PredictionError::NonFinite)
    }
}

pub(super) fn engine(
    client: Arc<ScriptedClient>,
    gateway: Arc<ClassifierGateway>,
) -> ConversationEngine<ScriptedClient> {
    ConversationEngine::new(client, gateway, SchemaPolicy::default(), TURN_TIMEOUT)
}

pub(super) async fn turn<C>(
    engine: &ConversationEngine<C>,
    state: ConversationState,
    input: &str,
) -> Turn
where
    C: ChatCompletionClient + ?Sized + 'static,
{
    engine
        .process_turn(state, input)
        .await
        .expect("turn is accepted")
}

pub(super) fn build_service(
    client: Arc<ScriptedClient>,
    gateway: Arc<ClassifierGateway>,
) -> (
    AssessmentService<MemorySessions, ScriptedClient>,
    Arc<MemorySessions>,
) {
    let repository = Arc::new(MemorySessions::default());
    let service = AssessmentService::new(
        repository.clone(),
        client,
        gateway,
        SchemaPolicy::default(),
        TURN_TIMEOUT,
    );
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemorySessions {
    pub(super) sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
}

impl SessionRepository for MemorySessions {
    fn insert(&self, record: SessionRecord) -> Result<SessionHandle, RepositoryError> {
        let mut guard = self.sessions.lock().expect("session map poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        let id = record.id.clone();
        let handle = Arc::new(tokio::sync::Mutex::new(record));
        guard.insert(id, handle.clone());
        Ok(handle)
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<SessionHandle>, RepositoryError> {
        let guard = self.sessions.lock().expect("session map poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut guard = self.sessions.lock().expect("session map poisoned");
        Ok(guard.remove(id).is_some())
    }
}

pub(super) struct UnavailableSessions;

impl SessionRepository for UnavailableSessions {
    fn insert(&self, _record: SessionRecord) -> Result<SessionHandle, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<SessionHandle>, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }

    fn remove(&self, _id: &SessionId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
