//! Realtime voice session.
//!
//! The session client speaks the OpenAI Realtime protocol over an injected
//! [`Transport`] and plays and records audio through injected [`AudioSink`]
//! and [`AudioSource`] implementations.

pub mod base;
pub mod openai;

pub use base::{
    AudioDataCallback, AudioSink, AudioSource, ConnectRequest, ConnectionState, ErrorCategory,
    InputTranscriptionConfig, LifecycleCallback, RealtimeConfig, RealtimeError,
    RealtimeErrorCallback, RealtimeResult, SessionBackend, SessionCallbacks, TextCallback,
    Transport, TransportEvent, TurnDetectionConfig,
};
pub use openai::{
    ClientEvent, DEFAULT_GREETING, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeModel, OpenAIRealtimeVoice, ServerEvent,
    WebSocketTransport, build_session_config,
};
