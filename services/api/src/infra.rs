use loan_risk::assessment::{
    ChatCompletionClient, ClassifierGateway, OpenAiCompatibleClient, RepositoryError,
    SessionHandle, SessionId, SessionRecord, SessionRepository,
};
use chrono::{DateTime, Utc};
use loan_risk::config::{AppConfig, AssistantConfig, ModelConfig};
use loan_risk::error::AppError;
use loan_risk::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) gateway: Arc<ClassifierGateway>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
}

impl InMemorySessionRepository {
    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionHandle>>, RepositoryError> {
        self.sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session map poisoned".to_string()))
    }
}

impl InMemorySessionRepository {
    /// Drops sessions idle since before `now - max_idle`. Sessions mid-turn are
    /// locked and therefore kept.
    pub(crate) fn evict_idle(
        &self,
        now: DateTime<Utc>,
        max_idle: Duration,
    ) -> Result<usize, RepositoryError> {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut guard = self.sessions()?;
        let before = guard.len();
        guard.retain(|_, handle| match handle.try_lock() {
            Ok(record) => now.signed_duration_since(record.updated_at) < max_idle,
            Err(_) => true,
        });
        Ok(before - guard.len())
    }
}

/// Sweeps idle sessions on a fixed period until the process exits.
pub(crate) fn spawn_session_sweeper(repository: Arc<InMemorySessionRepository>, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match repository.evict_idle(Utc::now(), max_idle) {
                Ok(0) => {}
                Ok(evicted) => debug!(evicted, "dropped idle assessment sessions"),
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
        }
    });
}

impl SessionRepository for InMemorySessionRepository {
    fn insert(&self, record: SessionRecord) -> Result<SessionHandle, RepositoryError> {
        let mut guard = self.sessions()?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        let id = record.id.clone();
        let handle = Arc::new(tokio::sync::Mutex::new(record));
        guard.insert(id, handle.clone());
        Ok(handle)
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<SessionHandle>, RepositoryError> {
        Ok(self.sessions()?.get(id).cloned())
    }

    fn remove(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        Ok(self.sessions()?.remove(id).is_some())
    }
}

/// Builds the gateway and loads the artifact up front. A load failure is logged and
/// cached; the service keeps running and reports the model as unavailable.
pub(crate) fn build_gateway(config: &ModelConfig) -> Arc<ClassifierGateway> {
    let gateway = Arc::new(ClassifierGateway::from_path(
        config.path.clone(),
        config.framing,
    ));
    if let Err(err) = gateway.initialize() {
        warn!(path = %config.path.display(), error = %err, "classifier unavailable at startup");
    }
    gateway
}

/// Config for the one-shot commands: logs go to stderr so stdout stays clean output.
pub(crate) fn load_cli_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_for_cli(&config.telemetry)?;
    Ok(config)
}

/// The configured model settings, pointed at `path` when a command overrides it.
pub(crate) fn model_config(config: &AppConfig, path: Option<PathBuf>) -> ModelConfig {
    let mut model = config.model.clone();
    if let Some(path) = path {
        model.path = path;
    }
    model
}

pub(crate) fn build_assistant(
    config: &AssistantConfig,
) -> Result<Arc<dyn ChatCompletionClient>, AppError> {
    if config.api_key.is_none() {
        warn!(api_base = %config.api_base, "no assistant API key configured");
    }
    let client = OpenAiCompatibleClient::new(config)?;
    Ok(Arc::new(client))
}
