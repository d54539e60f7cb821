use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// External inference provider endpoints and models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// API key for the OpenAI-compatible providers. Falls back to the
    /// VISTA_API_KEY or OPENAI_API_KEY environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OpenAI-compatible chat completions endpoint used for scene
    /// understanding and OCR via a vision-capable model.
    #[serde(default = "default_vision_url")]
    pub vision_url: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// Object detection service accepting raw image bytes.
    #[serde(default = "default_detect_url")]
    pub detect_url: String,
    /// Whisper-style transcription endpoint.
    #[serde(default = "default_transcribe_url")]
    pub transcribe_url: String,
    #[serde(default = "default_transcribe_model")]
    pub transcribe_model: String,
    /// Speech synthesis endpoint.
    #[serde(default = "default_speech_url")]
    pub speech_url: String,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_voice")]
    pub default_voice: String,
    /// Default language hint for OCR and speech recognition.
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_vision_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_detect_url() -> String {
    "http://127.0.0.1:8500/detect".to_string()
}

fn default_transcribe_url() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_transcribe_model() -> String {
    "whisper-1".to_string()
}

fn default_speech_url() -> String {
    "https://api.openai.com/v1/audio/speech".to_string()
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "zh-CN-XiaoxiaoNeural".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            vision_url: default_vision_url(),
            vision_model: default_vision_model(),
            detect_url: default_detect_url(),
            transcribe_url: default_transcribe_url(),
            transcribe_model: default_transcribe_model(),
            speech_url: default_speech_url(),
            speech_model: default_speech_model(),
            default_voice: default_voice(),
            default_language: default_language(),
        }
    }
}

impl ProvidersConfig {
    /// Resolve the effective API key, preferring the config file value.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("VISTA_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    800
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Payload and deadline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
    /// Hard wall-clock budget per request, retries included. The scene
    /// understanding target is a sub-2s end-to-end response.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_audio_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_request_deadline_ms() -> u64 {
    2000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_audio_bytes: default_max_audio_bytes(),
            request_deadline_ms: default_request_deadline_ms(),
            retry: RetryConfig::default(),
        }
    }
}

/// Task tracker retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Upper bound on retained tasks; oldest terminal tasks are evicted
    /// past this count.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

fn default_max_retained() -> usize {
    1024
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
        }
    }
}

/// Top-level VISTA configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VistaConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

/// Resolve the vista config directory (~/.vista/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".vista"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.vista/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<VistaConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if the
/// file does not exist.
pub fn load_config_from(path: &Path) -> Result<VistaConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(VistaConfig::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let config: VistaConfig = json5::from_str(&raw)?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
