//! Session record and lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::core::audio::generate_session_id;

const CLOSED_BEFORE_ACKNOWLEDGED: &str = "connection closed before session was acknowledged";

/// Lifecycle status of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Ended => write!(f, "ended"),
        }
    }
}

/// One connection attempt and its outcome.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    status: SessionStatus,
    started_at: Option<OffsetDateTime>,
    ended_at: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: generate_session_id(),
            status: SessionStatus::Idle,
            started_at: None,
            ended_at: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<OffsetDateTime> {
        self.ended_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.last_error = None;
    }

    /// The provider acknowledged the session; the timer starts now.
    pub fn activate(&mut self, at: OffsetDateTime) {
        if self.status == SessionStatus::Ended {
            return;
        }
        self.status = SessionStatus::Active;
        self.started_at.get_or_insert(at);
    }

    /// The connection went away.
    ///
    /// An active session ends. A session still waiting for the provider's
    /// acknowledgement fails back to idle so it can be started again.
    /// Returns `true` if the status changed.
    pub fn connection_lost(&mut self, at: OffsetDateTime) -> bool {
        match self.status {
            SessionStatus::Active => {
                self.end(at);
                true
            }
            SessionStatus::Connecting => {
                self.fail(CLOSED_BEFORE_ACKNOWLEDGED);
                true
            }
            SessionStatus::Idle | SessionStatus::Ended => false,
        }
    }

    /// Connecting failed; back to idle with the error recorded.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Idle;
        self.last_error = Some(message.into());
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn end(&mut self, at: OffsetDateTime) {
        self.status = SessionStatus::Ended;
        self.ended_at.get_or_insert(at);
    }

    /// Time since activation, frozen once the session ended.
    pub fn elapsed(&self, now: OffsetDateTime) -> time::Duration {
        let Some(started) = self.started_at else {
            return time::Duration::ZERO;
        };
        let until = self.ended_at.unwrap_or(now);
        (until - started).max(time::Duration::ZERO)
    }
}

/// Render a duration as `MM:SS`. Minutes are not capped.
pub fn format_elapsed(elapsed: time::Duration) -> String {
    let seconds = elapsed.whole_seconds().max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
