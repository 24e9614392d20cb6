//! OpenAI Realtime API configuration types.
//!
//! This module contains configuration types for OpenAI's Realtime API:
//! - Model selection
//! - Voice selection
//! - Fixed audio format and session defaults

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Audio sample rate for OpenAI Realtime API.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// The only audio encoding used on the wire, in both directions.
pub const PCM16_AUDIO_FORMAT: &str = "pcm16";

/// Default model used for input audio transcription.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Opening instruction sent once per connection after the session is confirmed.
pub const DEFAULT_GREETING: &str =
    "Start the interview by greeting the candidate and asking them to tell you about themselves.";

// =============================================================================
// Models
// =============================================================================

/// Realtime-capable models accepted by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeModel {
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
    /// Cheapest snapshot; used unless configured otherwise
    #[default]
    #[serde(rename = "gpt-4o-mini-realtime-preview-2024-12-17")]
    Gpt4oMiniRealtimePreview20241217,
}

impl OpenAIRealtimeModel {
    const ALL: [Self; 4] = [
        Self::Gpt4oRealtimePreview,
        Self::Gpt4oRealtimePreview20241217,
        Self::Gpt4oMiniRealtimePreview,
        Self::Gpt4oMiniRealtimePreview20241217,
    ];

    /// Value of the `model` query parameter.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
            Self::Gpt4oMiniRealtimePreview20241217 => "gpt-4o-mini-realtime-preview-2024-12-17",
        }
    }

    /// Case-insensitive lookup; unknown names select the default model.
    pub fn from_str_or_default(s: &str) -> Self {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Output voices. `alloy` is used when none is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Case-insensitive lookup; unknown names select `alloy`.
    pub fn from_str_or_default(s: &str) -> Self {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }

    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the WebSocket URL for a model.
pub fn realtime_url(base: &str, model: OpenAIRealtimeModel) -> String {
    format!("{}?model={}", base, model.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_default() {
        assert_eq!(
            OpenAIRealtimeModel::default().as_str(),
            "gpt-4o-mini-realtime-preview-2024-12-17"
        );
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("GPT-4o-Realtime-Preview"),
            OpenAIRealtimeModel::Gpt4oRealtimePreview
        );
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("unknown-model"),
            OpenAIRealtimeModel::default()
        );
    }

    #[test]
    fn test_voice_from_str() {
        assert_eq!(
            OpenAIRealtimeVoice::from_str_or_default("Shimmer"),
            OpenAIRealtimeVoice::Shimmer
        );
        assert_eq!(
            OpenAIRealtimeVoice::from_str_or_default(""),
            OpenAIRealtimeVoice::Alloy
        );
        assert_eq!(OpenAIRealtimeVoice::all().len(), 8);
    }

    #[test]
    fn test_realtime_url() {
        assert_eq!(
            realtime_url(OPENAI_REALTIME_URL, OpenAIRealtimeModel::default()),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-mini-realtime-preview-2024-12-17"
        );
    }
}
