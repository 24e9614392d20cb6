//! Interview conversation state.
//!
//! # Modules
//! - `reducer`: folds streamed fragments into a stable transcript
//! - `session`: session record, status and elapsed timer
//! - `export`: one-shot JSON transcript export
//! - `orchestrator`: binds a realtime client to the above

pub mod export;
pub mod orchestrator;
pub mod reducer;
pub mod session;

pub use export::{ConversationHistory, ExportError, transcript_file_name, write_transcript};
pub use orchestrator::{InterviewSession, SessionEvent, forwarding_callbacks};
pub use reducer::{
    ConversationEvent, ConversationState, Role, SPEAKING_HOLD, TranscriptMessage, extract_question,
};
pub use session::{Session, SessionStatus, format_elapsed};
