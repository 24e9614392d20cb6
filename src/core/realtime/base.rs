//! Base traits and types for the realtime voice session.
//!
//! This module defines the error taxonomy, session configuration, connection
//! states, the callback contract exposed to callers, and the capability traits
//! (`Transport`, `AudioSink`, `AudioSource`) the session client is driven by.
//! Real socket and device bindings implement these traits at the edge; tests
//! supply fakes.
//!
//! # Audio Format
//!
//! Audio on the wire is PCM 16-bit signed little-endian at 24kHz, mono.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::audio::{AudioBuffer, PlaybackTicket};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during a realtime session.
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// Invalid or missing configuration (including credentials)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Audio input or output device unavailable
    #[error("Audio device error: {0}")]
    DeviceError(String),

    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Error frame reported by the provider
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Frame could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Coarse classification of a [`RealtimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fails fast before any I/O
    Configuration,
    /// Microphone or speaker acquisition failed
    Device,
    /// Socket failure; followed by a disconnect notification
    Transport,
    /// Remote-reported or undecodable frame; the session stays up
    Protocol,
}

impl RealtimeError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RealtimeError::InvalidConfiguration(_) => ErrorCategory::Configuration,
            RealtimeError::DeviceError(_) => ErrorCategory::Device,
            RealtimeError::ConnectionFailed(_)
            | RealtimeError::WebSocketError(_)
            | RealtimeError::NotConnected => ErrorCategory::Transport,
            RealtimeError::ProviderError(_) | RealtimeError::SerializationError(_) => {
                ErrorCategory::Protocol
            }
        }
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Session parameters negotiated with the provider on every connection.
///
/// Empty or missing values fall back to the provider defaults when the
/// session configuration frame is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Endpoint override (defaults to the provider URL)
    #[serde(default)]
    pub url: Option<String>,

    /// Model to use (e.g., "gpt-4o-mini-realtime-preview-2024-12-17")
    #[serde(default)]
    pub model: String,

    /// Voice ID for audio output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Enable input audio transcription
    #[serde(default)]
    pub input_audio_transcription: Option<InputTranscriptionConfig>,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Response modalities (text, audio, or both)
    #[serde(default)]
    pub modalities: Option<Vec<String>>,

    /// Instruction sent as the synthetic opening turn
    #[serde(default)]
    pub greeting: Option<String>,
}

/// Configuration for input audio transcription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    /// Model to use for transcription (e.g., "whisper-1")
    pub model: String,
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default)]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a realtime session.
///
/// `Disconnected → Connecting → Negotiating → Active → Closing → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection
    #[default]
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport is open and the session configuration was sent
    Negotiating,
    /// Provider acknowledged the session
    Active,
    /// Teardown in progress
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Negotiating => write!(f, "Negotiating"),
            ConnectionState::Active => write!(f, "Active"),
            ConnectionState::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Parameters for opening the realtime transport.
///
/// The API key is zeroized when the request is dropped.
#[derive(Clone)]
pub struct ConnectRequest {
    /// Full endpoint URL including the model query parameter
    pub url: String,
    /// Bearer credential
    pub api_key: String,
}

impl ConnectRequest {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for ConnectRequest {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

/// Events a transport reports to the session driver, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is open and frames may be sent
    Opened,
    /// A text frame arrived
    Message(String),
    /// The connection failed
    Error(String),
    /// The connection is closed; no further events follow
    Closed { reason: Option<String> },
}

/// Message-oriented duplex connection carrying JSON text frames.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection.
    ///
    /// Resolves once the handshake completed. `TransportEvent::Opened` is
    /// reported through `events` before any inbound message.
    async fn open(
        &mut self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> RealtimeResult<()>;

    /// Whether frames can currently be sent.
    fn is_open(&self) -> bool;

    /// Queue a text frame for sending.
    fn send(&mut self, text: String) -> RealtimeResult<()>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}

// =============================================================================
// Audio Capabilities
// =============================================================================

/// Output device that plays one buffer at a time.
///
/// `play` returns immediately. When the buffer finished playing the sink sends
/// its ticket on the completion channel it was created with.
#[async_trait]
pub trait AudioSink: Send {
    /// Start playing `buffer`.
    fn play(&mut self, ticket: PlaybackTicket, buffer: AudioBuffer) -> RealtimeResult<()>;

    /// Halt the in-flight buffer immediately.
    fn stop(&mut self);

    /// Release the output device.
    async fn close(&mut self);
}

/// Input device producing blocks of mono samples at its native rate.
#[async_trait]
pub trait AudioSource: Send {
    /// Acquire the device and start delivering blocks to `blocks`.
    async fn start(&mut self, blocks: mpsc::UnboundedSender<AudioBuffer>) -> RealtimeResult<()>;

    /// Release the device. Safe to call more than once.
    fn stop(&mut self);
}

/// Factory for the per-connection transport and audio devices.
///
/// A fresh instance of every capability is created for each connection;
/// nothing is shared across sessions.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Create an unopened transport.
    fn transport(&self) -> Box<dyn Transport>;

    /// Allocate a playback output reporting completions on `completions`.
    async fn playback(
        &self,
        completions: mpsc::UnboundedSender<PlaybackTicket>,
    ) -> RealtimeResult<Box<dyn AudioSink>>;

    /// Create an input source (acquired on `AudioSource::start`).
    fn capture(&self) -> RealtimeResult<Box<dyn AudioSource>>;
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for payload-free lifecycle events.
pub type LifecycleCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for raw inbound audio (PCM 16-bit, 24kHz, mono, little-endian).
pub type AudioDataCallback =
    Arc<dyn Fn(Bytes) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for text fragments and transcripts.
pub type TextCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for error events.
pub type RealtimeErrorCallback =
    Arc<dyn Fn(RealtimeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callbacks registered on a session client.
///
/// All callbacks run on the session driver task, one at a time.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    /// Provider acknowledged the session
    pub on_connect: Option<LifecycleCallback>,
    /// Transport closed or the client disconnected
    pub on_disconnect: Option<LifecycleCallback>,
    /// Inbound audio fragment decoded
    pub on_audio_data: Option<AudioDataCallback>,
    /// Assistant transcript or text fragment
    pub on_text_response: Option<TextCallback>,
    /// Completed transcription of a user utterance
    pub on_user_transcript: Option<TextCallback>,
    /// Protocol or transport error
    pub on_error: Option<RealtimeErrorCallback>,
    /// User speech started while the assistant was responding
    pub on_interrupted: Option<LifecycleCallback>,
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_audio_data", &self.on_audio_data.is_some())
            .field("on_text_response", &self.on_text_response.is_some())
            .field("on_user_transcript", &self.on_user_transcript.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_interrupted", &self.on_interrupted.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Active.to_string(), "Active");
        assert_eq!(ConnectionState::Negotiating.to_string(), "Negotiating");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert!(config.model.is_empty());
        assert!(config.voice.is_none());
        assert!(config.greeting.is_none());
    }

    #[test]
    fn test_default_turn_detection() {
        match TurnDetectionConfig::default() {
            TurnDetectionConfig::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            } => {
                assert_eq!(threshold, Some(0.5));
                assert_eq!(prefix_padding_ms, Some(300));
                assert_eq!(silence_duration_ms, Some(500));
            }
            _ => panic!("Expected ServerVad default"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            RealtimeError::InvalidConfiguration("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            RealtimeError::DeviceError("x".into()).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            RealtimeError::WebSocketError("x".into()).category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            RealtimeError::ProviderError("x".into()).category(),
            ErrorCategory::Protocol
        );
    }

    #[test]
    fn test_connect_request_debug_redacts_key() {
        let request = ConnectRequest::new("wss://example.com", "sk-secret");
        let debug = format!("{:?}", request);
        assert!(debug.contains("wss://example.com"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_turn_detection_yaml_shape() {
        let td: TurnDetectionConfig =
            serde_json::from_str(r#"{"type":"server_vad","threshold":0.7}"#).unwrap();
        assert_eq!(
            td,
            TurnDetectionConfig::ServerVad {
                threshold: Some(0.7),
                prefix_padding_ms: None,
                silence_duration_ms: None,
            }
        );
    }
}
