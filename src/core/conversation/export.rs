//! Transcript export.
//!
//! At the end of a session the transcript is written once as pretty-printed
//! JSON:
//!
//! ```json
//! {
//!   "sessionId": "…",
//!   "startTime": "2024-12-17T10:00:00Z",
//!   "endTime": "2024-12-17T10:12:31Z",
//!   "messages": [{ "id": "…", "role": "assistant", "content": "…", "timestamp": "…" }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;

use super::reducer::TranscriptMessage;
use super::session::Session;

/// Errors raised while exporting a transcript.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to serialize transcript: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write transcript {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exported form of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHistory {
    pub session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub messages: Vec<TranscriptMessage>,
}

impl ConversationHistory {
    /// Snapshot a session. Missing timestamps fall back to `now`.
    pub fn new(session: &Session, messages: &[TranscriptMessage], now: OffsetDateTime) -> Self {
        Self {
            session_id: session.id().to_string(),
            start_time: session.started_at().unwrap_or(now),
            end_time: session.ended_at().unwrap_or(now),
            messages: messages.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `interview-transcript-<first 8 chars of id>.json`
pub fn transcript_file_name(session_id: &str) -> String {
    let prefix: String = session_id.chars().take(8).collect();
    format!("interview-transcript-{prefix}.json")
}

/// Write the transcript into `dir`, creating it if needed.
pub async fn write_transcript(
    history: &ConversationHistory,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let json = history.to_json()?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(transcript_file_name(&history.session_id));
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

    tracing::info!("Transcript written to {}", path.display());
    Ok(path)
}
