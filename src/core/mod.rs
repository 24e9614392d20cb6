pub mod audio;
pub mod conversation;
pub mod realtime;

// Re-export commonly used types for convenience
pub use audio::{AudioBuffer, PlaybackQueue, PlaybackTicket, WIRE_SAMPLE_RATE};

pub use conversation::{
    ConversationEvent, ConversationHistory, ConversationState, ExportError, InterviewSession,
    Role, Session, SessionEvent, SessionStatus, TranscriptMessage,
};

pub use realtime::{
    AudioSink, AudioSource, ConnectionState, OpenAIRealtime, RealtimeConfig, RealtimeError,
    RealtimeResult, SessionBackend, SessionCallbacks, Transport, TransportEvent,
    WebSocketTransport,
};
