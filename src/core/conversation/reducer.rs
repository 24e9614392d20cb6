//! Transcript reconciliation.
//!
//! Streamed assistant fragments, complete user utterances and audio activity
//! are folded into an ordered list of [`TranscriptMessage`]s plus a
//! speaking indicator and a best-effort "current question".
//!
//! At most one assistant message is open at a time and it is always the last
//! message. Fragments append to it; a user utterance, a turn boundary or an
//! interruption closes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// How long the assistant counts as speaking after the last audio fragment.
pub const SPEAKING_HOLD: time::Duration = time::Duration::milliseconds(500);

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person being interviewed
    User,
    /// The remote model
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TranscriptMessage {
    fn new(role: Role, content: String, timestamp: OffsetDateTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp,
        }
    }
}

/// Input to [`ConversationState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// Incremental assistant text (transcript or native text delta)
    AssistantFragment(String),
    /// A complete user utterance
    UserUtterance(String),
    /// Explicit end of the assistant's turn
    TurnBoundary,
    /// The user barged in
    Interrupted,
    /// An assistant audio fragment arrived
    AudioActivity,
}

/// Reducer state for one session's transcript.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<TranscriptMessage>,
    /// The last message is an assistant message still accepting fragments.
    assistant_open: bool,
    current_question: Option<String>,
    assistant_speaking: bool,
    last_audio_at: Option<OffsetDateTime>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: ConversationEvent, at: OffsetDateTime) {
        match event {
            ConversationEvent::AssistantFragment(fragment) => {
                if fragment.is_empty() {
                    return;
                }
                match self.open_assistant_message() {
                    Some(message) => message.content.push_str(&fragment),
                    None => {
                        self.messages
                            .push(TranscriptMessage::new(Role::Assistant, fragment, at));
                        self.assistant_open = true;
                    }
                }
                let question = self
                    .messages
                    .last()
                    .and_then(|m| extract_question(&m.content));
                if question.is_some() {
                    self.current_question = question;
                }
            }
            ConversationEvent::UserUtterance(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                self.assistant_open = false;
                self.messages
                    .push(TranscriptMessage::new(Role::User, text.to_string(), at));
            }
            ConversationEvent::TurnBoundary => {
                self.assistant_open = false;
            }
            ConversationEvent::Interrupted => {
                // The partial message stays; the next fragment starts a new one.
                self.assistant_open = false;
                self.assistant_speaking = false;
            }
            ConversationEvent::AudioActivity => {
                self.assistant_speaking = true;
                self.last_audio_at = Some(at);
            }
        }
    }

    /// Expire the speaking indicator. Returns `true` if it changed.
    pub fn refresh(&mut self, now: OffsetDateTime) -> bool {
        if !self.assistant_speaking {
            return false;
        }
        let expired = self
            .last_audio_at
            .is_none_or(|last| now - last >= SPEAKING_HOLD);
        if expired {
            self.assistant_speaking = false;
        }
        expired
    }

    /// Drop the transcript and indicators.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn current_question(&self) -> Option<&str> {
        self.current_question.as_deref()
    }

    pub fn is_assistant_speaking(&self) -> bool {
        self.assistant_speaking
    }

    pub fn has_open_assistant_message(&self) -> bool {
        self.assistant_open
    }

    fn open_assistant_message(&mut self) -> Option<&mut TranscriptMessage> {
        if !self.assistant_open {
            return None;
        }
        self.messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant)
    }
}

// =============================================================================
// Question Extraction
// =============================================================================

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// Split after every run of sentence terminators, keeping the terminators.
///
/// Text ending in a terminator yields a trailing empty segment, so the last
/// complete sentence is always the second-to-last segment.
fn sentence_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_run = false;

    for (i, c) in text.char_indices() {
        let terminator = is_terminator(c);
        if in_run && !terminator {
            segments.push(&text[start..i]);
            start = i;
        }
        in_run = terminator;
    }

    segments.push(&text[start..]);
    if in_run {
        segments.push("");
    }
    segments
}

/// Best-effort extraction of the question the assistant just asked.
///
/// Inspects the last complete sentence (or the first segment when there is
/// none). Abbreviations such as "e.g." and decimals split sentences early.
pub fn extract_question(text: &str) -> Option<String> {
    let segments = sentence_segments(text);
    let candidate = match segments.len() {
        n if n >= 2 && !segments[n - 2].is_empty() => segments[n - 2],
        _ => segments[0],
    };

    if !candidate.contains('?') {
        return None;
    }
    let body = candidate.trim().trim_end_matches(is_terminator).trim_end();
    if body.is_empty() {
        return None;
    }
    Some(format!("{body}?"))
}
