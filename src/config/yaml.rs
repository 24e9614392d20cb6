use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override the environment.
///
/// # Example YAML structure
/// ```yaml
/// openai:
///   api_key: "sk-..."
///   model: "gpt-4o-mini-realtime-preview-2024-12-17"
///   voice: "alloy"
///   url: "wss://api.openai.com/v1/realtime"
///
/// interview:
///   instructions: "You are a technical interviewer..."
///   greeting: "Greet the candidate and ask them to introduce themselves."
///   transcription_model: "whisper-1"
///
/// vad:
///   threshold: 0.5
///   prefix_padding_ms: 300
///   silence_duration_ms: 500
///
/// transcript:
///   dir: "./transcripts"
///
/// logging:
///   level: "info"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub openai: Option<OpenAIYaml>,
    pub interview: Option<InterviewYaml>,
    pub vad: Option<VadYaml>,
    pub transcript: Option<TranscriptYaml>,
    pub logging: Option<LoggingYaml>,
}

/// Provider connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub url: Option<String>,
}

/// Interview behaviour from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InterviewYaml {
    pub instructions: Option<String>,
    pub greeting: Option<String>,
    /// Empty string disables input transcription
    pub transcription_model: Option<String>,
}

/// Server VAD thresholds from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Transcript export from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptYaml {
    pub dir: Option<String>,
}

/// Logging from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub level: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
