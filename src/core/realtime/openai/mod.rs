//! OpenAI Realtime API module.
//!
//! This module provides the realtime voice session over OpenAI's Realtime API.
//!
//! # Features
//!
//! - Bidirectional audio streaming (PCM16, 24kHz, mono)
//! - Assistant transcript and text deltas
//! - Input audio transcription of the user's turns
//! - Server-side Voice Activity Detection with barge-in
//! - One synthetic opening turn per connection
//!
//! # Supported Models
//!
//! - `gpt-4o-mini-realtime-preview-2024-12-17` - Default
//! - `gpt-4o-mini-realtime-preview` - Mini model alias
//! - `gpt-4o-realtime-preview` - GPT-4o Realtime Preview
//! - `gpt-4o-realtime-preview-2024-12-17` - December 2024 version
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse

mod client;
mod config;
pub mod messages;
mod transport;

pub use client::{OpenAIRealtime, build_session_config};
pub use config::{
    DEFAULT_GREETING, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice, PCM16_AUDIO_FORMAT,
    realtime_url,
};
pub use messages::{ClientEvent, ServerEvent};
pub use transport::WebSocketTransport;
