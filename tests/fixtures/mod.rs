//! Test Fixtures Module
//!
//! This module provides test fixtures for session testing:
//! - A fake session backend (transport, playback sink, capture source)
//! - Server frame builders
//! - Polling helpers for driver-side effects

// Allow dead code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]

pub mod fake_backend;

pub use fake_backend::*;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use voice_interview::core::conversation::forwarding_callbacks;
use voice_interview::{OpenAIRealtime, SessionEvent};

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Route every client callback into a channel.
pub fn collect_events(client: &mut OpenAIRealtime) -> mpsc::UnboundedReceiver<SessionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.set_callbacks(forwarding_callbacks(tx));
    rx
}

/// Everything currently buffered on `events`.
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// =============================================================================
// Server frames
// =============================================================================

pub fn session_created() -> Value {
    json!({
        "type": "session.created",
        "event_id": "event_1",
        "session": { "id": "sess_001", "model": "gpt-4o-mini-realtime-preview-2024-12-17" }
    })
}

pub fn session_updated() -> Value {
    json!({
        "type": "session.updated",
        "event_id": "event_2",
        "session": { "id": "sess_001" }
    })
}

pub fn audio_delta(samples: &[i16]) -> Value {
    let bytes = voice_interview::core::audio::int16_to_pcm_bytes(samples);
    json!({
        "type": "response.audio.delta",
        "response_id": "resp_001",
        "item_id": "item_001",
        "delta": voice_interview::core::audio::encode_base64(&bytes)
    })
}

pub fn transcript_delta(text: &str) -> Value {
    json!({
        "type": "response.audio_transcript.delta",
        "response_id": "resp_001",
        "item_id": "item_001",
        "delta": text
    })
}

pub fn text_delta(text: &str) -> Value {
    json!({
        "type": "response.text.delta",
        "response_id": "resp_001",
        "item_id": "item_001",
        "delta": text
    })
}

pub fn speech_started() -> Value {
    json!({
        "type": "input_audio_buffer.speech_started",
        "audio_start_ms": 1200,
        "item_id": "item_002"
    })
}

pub fn transcription_completed(transcript: &str) -> Value {
    json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_002",
        "content_index": 0,
        "transcript": transcript
    })
}

pub fn error_frame(message: Option<&str>) -> Value {
    match message {
        Some(message) => json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": message }
        }),
        None => json!({ "type": "error", "error": {} }),
    }
}
