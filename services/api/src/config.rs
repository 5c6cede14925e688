use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Fallback instructions when SYSTEM_PROMPT is unset.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly voice assistant on a phone call. \
Keep replies short and conversational, one or two sentences. \
Open the call with a brief greeting and ask how you can help. \
When the caller asks about uploaded materials, use the search_knowledge_base tool \
before answering.";

const SPEECH_VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub chat_model: String,
    pub transcribe_model: String,
    pub speech_model: String,
    pub speech_voice: String,
    pub system_prompt: String,
    pub log_level: Level,
    /// Per-call deadline for the transcription, reasoning, and synthesis
    /// services within a turn.
    pub service_timeout: Duration,
    /// Upper bound on waiting for session transports to close at shutdown.
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:7860".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let transcribe_model =
            std::env::var("TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let speech_model = std::env::var("SPEECH_MODEL").unwrap_or_else(|_| "tts-1".to_string());

        let speech_voice = std::env::var("SPEECH_VOICE").unwrap_or_else(|_| "alloy".to_string());
        if !SPEECH_VOICES.contains(&speech_voice.as_str()) {
            return Err(ConfigError::InvalidValue(
                "SPEECH_VOICE".to_string(),
                format!("'{}' is not a supported voice", speech_voice),
            ));
        }

        let system_prompt = std::env::var("SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let service_timeout = duration_secs_var("SERVICE_TIMEOUT_SECS", 5)?;
        let shutdown_timeout = duration_secs_var("SHUTDOWN_TIMEOUT_SECS", 5)?;

        Ok(Self {
            bind_address,
            openai_api_key,
            openai_api_base,
            chat_model,
            transcribe_model,
            speech_model,
            speech_voice,
            system_prompt,
            log_level,
            service_timeout,
            shutdown_timeout,
        })
    }
}

fn duration_secs_var(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not a whole number of seconds", raw),
                )
            }),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}
