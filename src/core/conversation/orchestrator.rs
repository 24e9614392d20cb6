//! Interview session orchestration.
//!
//! [`InterviewSession`] ties one [`OpenAIRealtime`] client to a [`Session`]
//! record and a [`ConversationState`]. Client callbacks are forwarded as
//! [`SessionEvent`]s over a channel; the owner pulls them with
//! [`InterviewSession::next_event`] and feeds them back through
//! [`InterviewSession::handle_event`], so all state changes happen on the
//! caller's task.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use super::export::{ConversationHistory, ExportError, write_transcript};
use super::reducer::{ConversationEvent, ConversationState};
use super::session::{Session, SessionStatus, format_elapsed};
use crate::core::realtime::{OpenAIRealtime, RealtimeError, RealtimeResult, SessionCallbacks};

/// Client notification, in the order the session driver produced it.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    AudioData(Bytes),
    AssistantText(String),
    UserTranscript(String),
    Error(RealtimeError),
    Interrupted,
}

fn completed() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async {})
}

/// Build callbacks that forward every client notification to `events`.
pub fn forwarding_callbacks(events: mpsc::UnboundedSender<SessionEvent>) -> SessionCallbacks {
    let connect_tx = events.clone();
    let disconnect_tx = events.clone();
    let audio_tx = events.clone();
    let text_tx = events.clone();
    let transcript_tx = events.clone();
    let error_tx = events.clone();
    let interrupt_tx = events;

    SessionCallbacks {
        on_connect: Some(Arc::new(move || {
            let _ = connect_tx.send(SessionEvent::Connected);
            completed()
        })),
        on_disconnect: Some(Arc::new(move || {
            let _ = disconnect_tx.send(SessionEvent::Disconnected);
            completed()
        })),
        on_audio_data: Some(Arc::new(move |bytes: Bytes| {
            let _ = audio_tx.send(SessionEvent::AudioData(bytes));
            completed()
        })),
        on_text_response: Some(Arc::new(move |text: String| {
            let _ = text_tx.send(SessionEvent::AssistantText(text));
            completed()
        })),
        on_user_transcript: Some(Arc::new(move |text: String| {
            let _ = transcript_tx.send(SessionEvent::UserTranscript(text));
            completed()
        })),
        on_error: Some(Arc::new(move |error: RealtimeError| {
            let _ = error_tx.send(SessionEvent::Error(error));
            completed()
        })),
        on_interrupted: Some(Arc::new(move || {
            let _ = interrupt_tx.send(SessionEvent::Interrupted);
            completed()
        })),
    }
}

/// One interview: connection, transcript, timer and export.
pub struct InterviewSession {
    client: OpenAIRealtime,
    session: Session,
    conversation: ConversationState,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl InterviewSession {
    /// Take over `client`; its callbacks are replaced by event forwarding.
    pub fn new(mut client: OpenAIRealtime) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        client.set_callbacks(forwarding_callbacks(tx));
        Self {
            client,
            session: Session::new(),
            conversation: ConversationState::new(),
            events: rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn client(&self) -> &OpenAIRealtime {
        &self.client
    }

    /// Connect and start the microphone.
    ///
    /// On failure the session returns to idle with the error recorded and
    /// any partially opened connection is torn down. Starting an ended
    /// session restarts it first.
    pub async fn start(&mut self, api_key: &str) -> RealtimeResult<()> {
        match self.session.status() {
            SessionStatus::Connecting | SessionStatus::Active => return Ok(()),
            SessionStatus::Ended => self.restart().await,
            SessionStatus::Idle => {}
        }

        self.session.begin_connecting();
        tracing::info!("Starting interview session {}", self.session.id());

        if let Err(e) = self.connect_and_listen(api_key).await {
            tracing::error!("Failed to start interview: {}", e);
            self.session.fail(e.to_string());
            if let Err(close_err) = self.client.disconnect().await {
                tracing::warn!("Failed to close after start failure: {}", close_err);
            }
            self.discard_pending_events();
            return Err(e);
        }
        Ok(())
    }

    async fn connect_and_listen(&mut self, api_key: &str) -> RealtimeResult<()> {
        self.client.connect(api_key).await?;
        self.client.start_microphone().await
    }

    /// Wait for the next client notification.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Apply a notification to the session and transcript.
    pub fn handle_event(&mut self, event: &SessionEvent, at: OffsetDateTime) {
        match event {
            SessionEvent::Connected => {
                self.session.activate(at);
                tracing::info!("Interview session {} active", self.session.id());
            }
            SessionEvent::Disconnected => {
                if self.session.connection_lost(at) {
                    match self.session.status() {
                        SessionStatus::Ended => tracing::info!(
                            "Interview session {} ended by disconnect",
                            self.session.id()
                        ),
                        _ => tracing::warn!(
                            "Interview session {} closed before it was acknowledged",
                            self.session.id()
                        ),
                    }
                }
            }
            SessionEvent::AudioData(_) => {
                self.conversation.apply(ConversationEvent::AudioActivity, at);
            }
            SessionEvent::AssistantText(text) => {
                self.conversation
                    .apply(ConversationEvent::AssistantFragment(text.clone()), at);
            }
            SessionEvent::UserTranscript(text) => {
                self.conversation
                    .apply(ConversationEvent::UserUtterance(text.clone()), at);
            }
            SessionEvent::Error(error) => {
                self.session.record_error(error.to_string());
            }
            SessionEvent::Interrupted => {
                self.conversation.apply(ConversationEvent::Interrupted, at);
            }
        }
    }

    /// Periodic housekeeping; expires the speaking indicator.
    ///
    /// Returns `true` if the indicator changed.
    pub fn tick(&mut self, now: OffsetDateTime) -> bool {
        self.conversation.refresh(now)
    }

    /// Elapsed time as `MM:SS`.
    pub fn elapsed_display(&self, now: OffsetDateTime) -> String {
        format_elapsed(self.session.elapsed(now))
    }

    /// Disconnect and mark the session ended.
    ///
    /// Notifications produced by the teardown are applied before the
    /// returned snapshot is taken.
    pub async fn end(&mut self, now: OffsetDateTime) -> RealtimeResult<ConversationHistory> {
        self.client.disconnect().await?;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(&event, now);
        }
        self.session.end(now);
        Ok(self.history(now))
    }

    /// Snapshot the transcript for export.
    pub fn history(&self, now: OffsetDateTime) -> ConversationHistory {
        ConversationHistory::new(&self.session, self.conversation.messages(), now)
    }

    /// Write the current transcript into `dir`.
    pub async fn export(&self, dir: &Path, now: OffsetDateTime) -> Result<PathBuf, ExportError> {
        write_transcript(&self.history(now), dir).await
    }

    /// Drop the connection and begin a fresh session with an empty transcript.
    pub async fn restart(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!("Failed to close previous session: {}", e);
        }
        self.discard_pending_events();
        self.session = Session::new();
        self.conversation.reset();
        tracing::debug!("Session reset to {}", self.session.id());
    }

    fn discard_pending_events(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::PlaybackTicket;
    use crate::core::realtime::{AudioSink, AudioSource, RealtimeConfig, SessionBackend, Transport};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-12-17 10:00:00 UTC);

    struct UnusedBackend;

    #[async_trait::async_trait]
    impl SessionBackend for UnusedBackend {
        fn transport(&self) -> Box<dyn Transport> {
            panic!("transport should not be created")
        }

        async fn playback(
            &self,
            _completions: mpsc::UnboundedSender<PlaybackTicket>,
        ) -> RealtimeResult<Box<dyn AudioSink>> {
            panic!("playback should not be created")
        }

        fn capture(&self) -> RealtimeResult<Box<dyn AudioSource>> {
            panic!("capture should not be created")
        }
    }

    fn interview() -> InterviewSession {
        InterviewSession::new(OpenAIRealtime::new(
            RealtimeConfig::default(),
            Arc::new(UnusedBackend),
        ))
    }

    #[tokio::test]
    async fn test_start_without_key_returns_to_idle() {
        let mut interview = interview();
        let err = interview.start("  ").await.unwrap_err();
        assert!(matches!(err, RealtimeError::InvalidConfiguration(_)));
        assert_eq!(interview.status(), SessionStatus::Idle);
        assert_eq!(
            interview.session().last_error(),
            Some("Invalid configuration: API key is required")
        );
    }

    #[test]
    fn test_handle_event_drives_session_and_transcript() {
        let mut interview = interview();
        interview.handle_event(&SessionEvent::Connected, T0);
        assert_eq!(interview.status(), SessionStatus::Active);

        interview.handle_event(&SessionEvent::AudioData(Bytes::from_static(&[0, 0])), T0);
        assert!(interview.conversation().is_assistant_speaking());

        interview.handle_event(&SessionEvent::AssistantText("Hello".into()), T0);
        interview.handle_event(&SessionEvent::AssistantText(" there".into()), T0);
        interview.handle_event(&SessionEvent::UserTranscript("Hi".into()), T0);
        let messages = interview.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hello there");

        interview.handle_event(&SessionEvent::Interrupted, T0);
        assert!(!interview.conversation().is_assistant_speaking());

        interview.handle_event(
            &SessionEvent::Error(RealtimeError::ProviderError("Unknown error".into())),
            T0,
        );
        assert_eq!(interview.status(), SessionStatus::Active);

        let later = T0 + time::Duration::seconds(61);
        assert_eq!(interview.elapsed_display(later), "01:01");
        interview.handle_event(&SessionEvent::Disconnected, later);
        assert_eq!(interview.status(), SessionStatus::Ended);
    }

    #[test]
    fn test_tick_expires_speaking() {
        let mut interview = interview();
        interview.handle_event(&SessionEvent::AudioData(Bytes::new()), T0);
        assert!(!interview.tick(T0 + time::Duration::milliseconds(100)));
        assert!(interview.tick(T0 + time::Duration::milliseconds(600)));
    }

    #[tokio::test]
    async fn test_end_and_restart() {
        let mut interview = interview();
        interview.handle_event(&SessionEvent::Connected, T0);
        interview.handle_event(&SessionEvent::AssistantText("Welcome.".into()), T0);
        let first_id = interview.session().id().to_string();

        let end = T0 + time::Duration::seconds(10);
        let history = interview.end(end).await.unwrap();
        assert_eq!(interview.status(), SessionStatus::Ended);
        assert_eq!(history.session_id, first_id);
        assert_eq!(history.start_time, T0);
        assert_eq!(history.end_time, end);
        assert_eq!(history.messages.len(), 1);

        interview.restart().await;
        assert_eq!(interview.status(), SessionStatus::Idle);
        assert_ne!(interview.session().id(), first_id);
        assert!(interview.conversation().messages().is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_callbacks_preserve_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = forwarding_callbacks(tx);

        (callbacks.on_connect.unwrap())().await;
        (callbacks.on_text_response.unwrap())("Hi".to_string()).await;
        (callbacks.on_interrupted.unwrap())().await;

        assert!(matches!(rx.recv().await, Some(SessionEvent::Connected)));
        assert!(matches!(rx.recv().await, Some(SessionEvent::AssistantText(t)) if t == "Hi"));
        assert!(matches!(rx.recv().await, Some(SessionEvent::Interrupted)));
    }
}
