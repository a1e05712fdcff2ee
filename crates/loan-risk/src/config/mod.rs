use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::assessment::domain::LabelFraming;
use crate::assessment::validation::{SchemaPolicy, DEFAULT_INTEREST_RATE_CAP};

const DEFAULT_MODEL_PATH: &str = "models/loan_risk_scorecard.json";
const DEFAULT_ASSISTANT_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_ASSISTANT_MODEL: &str = "llama3-groq-70b-8192-tool-use-preview";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");
        let log_format = LogFormat::parse(&var_or("APP_LOG_FORMAT", "compact"))?;

        let framing = var_or("APP_DECISION_FRAMING", "default_risk");
        let framing = LabelFraming::parse(&framing)
            .ok_or(ConfigError::InvalidFraming { value: framing })?;
        let interest_rate_cap = parse_number::<f64>("APP_INTEREST_RATE_CAP", "100")?;
        if !(interest_rate_cap.is_finite() && interest_rate_cap > 0.0) {
            return Err(ConfigError::InvalidNumber {
                variable: "APP_INTEREST_RATE_CAP",
            });
        }
        if interest_rate_cap > DEFAULT_INTEREST_RATE_CAP {
            return Err(ConfigError::InterestRateCapTooHigh {
                value: interest_rate_cap,
            });
        }

        let session_idle_secs = parse_positive::<u64>("APP_SESSION_IDLE_SECS", "3600")?;
        let timeout_secs = parse_positive::<u64>("LLM_TIMEOUT_SECS", "30")?;
        let max_tokens = parse_positive::<u32>("LLM_MAX_TOKENS", "4096")?;

        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("GROQ_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                session_idle: Duration::from_secs(session_idle_secs),
            },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            model: ModelConfig {
                path: PathBuf::from(var_or("APP_MODEL_PATH", DEFAULT_MODEL_PATH)),
                framing,
                interest_rate_cap,
            },
            assistant: AssistantConfig {
                api_base: var_or("LLM_API_BASE", DEFAULT_ASSISTANT_BASE)
                    .trim_end_matches('/')
                    .to_string(),
                api_key,
                model: var_or("LLM_MODEL", DEFAULT_ASSISTANT_MODEL),
                timeout: Duration::from_secs(timeout_secs),
                max_tokens,
            },
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T: std::str::FromStr>(
    variable: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    var_or(variable, default)
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber { variable })
}

fn parse_positive<T>(variable: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_number::<T>(variable, default)?;
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber { variable })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions untouched for this long are dropped from the in-memory store.
    pub session_idle: Duration,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing output controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidLogFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// Location of the classifier artifact and the schema variant this deployment enforces.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub framing: LabelFraming,
    pub interest_rate_cap: f64,
}

impl ModelConfig {
    pub fn policy(&self) -> SchemaPolicy {
        SchemaPolicy {
            interest_rate_cap: self.interest_rate_cap,
            framing: self.framing,
        }
    }
}

/// Connection settings for the hosted tool-calling assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InterestRateCapTooHigh { value: f64 },
    InvalidFraming { value: String },
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive number")
            }
            ConfigError::InterestRateCapTooHigh { value } => write!(
                f,
                "APP_INTEREST_RATE_CAP must not exceed {DEFAULT_INTEREST_RATE_CAP} (found {value})"
            ),
            ConfigError::InvalidFraming { value } => write!(
                f,
                "APP_DECISION_FRAMING must be 'default_risk' or 'approval' (found '{value}')"
            ),
            ConfigError::InvalidLogFormat { value } => write!(
                f,
                "APP_LOG_FORMAT must be 'compact' or 'pretty' (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_MODEL_PATH",
            "APP_DECISION_FRAMING",
            "APP_INTEREST_RATE_CAP",
            "APP_SESSION_IDLE_SECS",
            "LLM_API_BASE",
            "LLM_API_KEY",
            "GROQ_API_KEY",
            "LLM_MODEL",
            "LLM_TIMEOUT_SECS",
            "LLM_MAX_TOKENS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.session_idle, Duration::from_secs(3600));
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.model.path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.model.framing, LabelFraming::DefaultRisk);
        assert_eq!(config.model.interest_rate_cap, 100.0);
        assert_eq!(config.assistant.timeout, Duration::from_secs(30));
        assert_eq!(config.assistant.max_tokens, 4096);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn approval_framing_and_tighter_cap_are_honored() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DECISION_FRAMING", "approval");
        env::set_var("APP_INTEREST_RATE_CAP", "30");
        let config = AppConfig::load().expect("config loads");
        let policy = config.model.policy();
        assert_eq!(policy.framing, LabelFraming::Approval);
        assert_eq!(policy.interest_rate_cap, 30.0);
        reset_env();
    }

    #[test]
    fn rejects_unknown_framing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DECISION_FRAMING", "vibes");
        let err = AppConfig::load().expect_err("framing is validated");
        assert!(matches!(err, ConfigError::InvalidFraming { .. }));
        reset_env();
    }

    #[test]
    fn groq_key_is_used_when_generic_key_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GROQ_API_KEY", "gsk-test");
        env::set_var("LLM_API_BASE", "http://localhost:8080/v1/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.assistant.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.assistant.api_base, "http://localhost:8080/v1");
        reset_env();
    }

    #[test]
    fn rejects_interest_cap_above_one_hundred() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_INTEREST_RATE_CAP", "250");
        let err = AppConfig::load().expect_err("cap is bounded");
        assert!(matches!(
            err,
            ConfigError::InterestRateCapTooHigh { value } if value == 250.0
        ));
        reset_env();
    }

    #[test]
    fn rejects_zero_timeout_and_token_budget() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LLM_TIMEOUT_SECS", "0");
        let err = AppConfig::load().expect_err("zero timeout");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                variable: "LLM_TIMEOUT_SECS"
            }
        ));

        reset_env();
        env::set_var("LLM_MAX_TOKENS", "0");
        let err = AppConfig::load().expect_err("zero token budget");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                variable: "LLM_MAX_TOKENS"
            }
        ));
        reset_env();
    }
}
