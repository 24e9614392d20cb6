//! Configuration module for the interview client
//!
//! Configuration comes from `.env` files, environment variables and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//! The `.env` file is loaded in `main.rs` at startup.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use voice_interview::config::AppConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = AppConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config = AppConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Using voice {}", config.voice);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::{
    DEFAULT_TRANSCRIPTION_MODEL, InputTranscriptionConfig, OpenAIRealtimeModel,
    OpenAIRealtimeVoice, RealtimeConfig, TurnDetectionConfig,
};

/// Interviewer persona used when no instructions are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a professional technical recruiter running a live technical interview. Assess the candidate's skills politely and efficiently.

Interview flow:
1. Open by asking the candidate to tell you about themselves.
2. Follow up on the projects they mention.
3. Move on to technical topics: object-oriented programming, databases, operating systems, data structures and algorithms, and web development.

Rules:
- Ask exactly one question at a time and let the candidate finish before moving on.
- Keep your turns short and professional. You are interviewing, not teaching.
- Be encouraging while keeping a professional distance.
- If the candidate is stuck, offer a small hint, then move on.
- Briefly acknowledge each answer before the next question.";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("OpenAI API key is not configured (set OPENAI_API_KEY or openai.api_key)")]
    MissingApiKey,
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Bearer credential for the realtime endpoint
    pub openai_api_key: Option<String>,
    /// Endpoint override
    pub realtime_url: Option<String>,
    pub model: String,
    pub voice: String,
    /// System prompt for the interviewer
    pub instructions: String,
    /// Opening-turn instruction override
    pub greeting: Option<String>,
    /// Input transcription model; `None` disables user transcripts
    pub transcription_model: Option<String>,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
    /// Directory for exported transcripts
    pub transcript_dir: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            realtime_url: None,
            model: OpenAIRealtimeModel::default().as_str().to_string(),
            voice: OpenAIRealtimeVoice::default().as_str().to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            greeting: None,
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
            transcript_dir: PathBuf::from("."),
            log_level: "info".to_string(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("realtime_url", &self.realtime_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("greeting", &self.greeting)
            .field("transcription_model", &self.transcription_model)
            .field("vad_threshold", &self.vad_threshold)
            .field("vad_prefix_padding_ms", &self.vad_prefix_padding_ms)
            .field("vad_silence_duration_ms", &self.vad_silence_duration_ms)
            .field("transcript_dir", &self.transcript_dir)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for AppConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

/// Read a non-empty environment variable.
fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a non-empty environment variable.
fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        None => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the resulting
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::env_base()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables as the base
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, an
    /// environment variable is invalid, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = Self::env_base()?;
        config.apply_yaml(yaml_config);
        config.validate()?;
        Ok(config)
    }

    fn env_base() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let transcription_model = match env::var("TRANSCRIPTION_MODEL") {
            Ok(value) => non_empty(Some(value)),
            Err(_) => defaults.transcription_model.clone(),
        };

        Ok(Self {
            openai_api_key: env_string("OPENAI_API_KEY"),
            realtime_url: env_string("OPENAI_REALTIME_URL"),
            model: env_string("OPENAI_REALTIME_MODEL").unwrap_or_else(|| defaults.model.clone()),
            voice: env_string("OPENAI_REALTIME_VOICE").unwrap_or_else(|| defaults.voice.clone()),
            instructions: env_string("INTERVIEW_INSTRUCTIONS")
                .unwrap_or_else(|| defaults.instructions.clone()),
            greeting: env_string("INTERVIEW_GREETING"),
            transcription_model,
            vad_threshold: env_parse("VAD_THRESHOLD")?.unwrap_or(defaults.vad_threshold),
            vad_prefix_padding_ms: env_parse("VAD_PREFIX_PADDING_MS")?
                .unwrap_or(defaults.vad_prefix_padding_ms),
            vad_silence_duration_ms: env_parse("VAD_SILENCE_DURATION_MS")?
                .unwrap_or(defaults.vad_silence_duration_ms),
            transcript_dir: env_string("TRANSCRIPT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| defaults.transcript_dir.clone()),
            log_level: env_string("LOG_LEVEL").unwrap_or_else(|| defaults.log_level.clone()),
        })
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(openai) = yaml.openai {
            if let Some(key) = non_empty(openai.api_key) {
                self.openai_api_key = Some(key);
            }
            if let Some(url) = non_empty(openai.url) {
                self.realtime_url = Some(url);
            }
            if let Some(model) = non_empty(openai.model) {
                self.model = model;
            }
            if let Some(voice) = non_empty(openai.voice) {
                self.voice = voice;
            }
        }

        if let Some(interview) = yaml.interview {
            if let Some(instructions) = non_empty(interview.instructions) {
                self.instructions = instructions;
            }
            if let Some(greeting) = non_empty(interview.greeting) {
                self.greeting = Some(greeting);
            }
            if let Some(model) = interview.transcription_model {
                self.transcription_model = non_empty(Some(model));
            }
        }

        if let Some(vad) = yaml.vad {
            if let Some(threshold) = vad.threshold {
                self.vad_threshold = threshold;
            }
            if let Some(padding) = vad.prefix_padding_ms {
                self.vad_prefix_padding_ms = padding;
            }
            if let Some(silence) = vad.silence_duration_ms {
                self.vad_silence_duration_ms = silence;
            }
        }

        if let Some(dir) = yaml.transcript.and_then(|t| non_empty(t.dir)) {
            self.transcript_dir = PathBuf::from(dir);
        }

        if let Some(level) = yaml.logging.and_then(|l| non_empty(l.level)) {
            self.log_level = level;
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(ConfigError::Invalid(format!(
                "VAD threshold must be between 0.0 and 1.0, got {}",
                self.vad_threshold
            )));
        }
        if let Some(url) = self.realtime_url.as_deref() {
            let parsed = url::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("Invalid realtime URL {url}: {e}")))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::Invalid(format!(
                    "Realtime URL must use ws:// or wss://, got {url}"
                )));
            }
        }
        Ok(())
    }

    /// The API key, or an error when none is configured.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Session parameters for the realtime client.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: self.realtime_url.clone(),
            model: self.model.clone(),
            voice: Some(self.voice.clone()),
            instructions: Some(self.instructions.clone()),
            input_audio_transcription: self
                .transcription_model
                .clone()
                .map(|model| InputTranscriptionConfig { model }),
            turn_detection: Some(TurnDetectionConfig::ServerVad {
                threshold: Some(self.vad_threshold),
                prefix_padding_ms: Some(self.vad_prefix_padding_ms),
                silence_duration_ms: Some(self.vad_silence_duration_ms),
            }),
            modalities: None,
            greeting: self.greeting.clone(),
        }
    }
}
