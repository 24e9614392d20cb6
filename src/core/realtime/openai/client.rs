//! OpenAI Realtime session client.
//!
//! The client owns one streaming conversation at a time. `connect` opens the
//! transport and spawns a session driver task that owns the transport, the
//! playback queue and the capture device for the lifetime of the connection.
//! The driver multiplexes transport events, captured audio blocks, playback
//! completions and caller commands in a single `select!` loop, so session
//! state is only ever touched from one task and needs no locking.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! # Example
//!
//! ```rust,ignore
//! use voice_interview::core::realtime::{OpenAIRealtime, RealtimeConfig};
//! use std::sync::Arc;
//!
//! let mut client = OpenAIRealtime::new(RealtimeConfig::default(), backend);
//! client.on_text_response(Arc::new(|text| Box::pin(async move {
//!     print!("{}", text);
//! })));
//! client.connect("sk-...").await?;
//! client.start_microphone().await?;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::config::{
    DEFAULT_GREETING, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeModel,
    OpenAIRealtimeVoice, PCM16_AUDIO_FORMAT, realtime_url,
};
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ResponseConfig, ServerEvent,
    SessionConfig, TurnDetection,
};
use crate::core::audio::{
    AudioBuffer, CaptureSession, PlaybackQueue, PlaybackTicket, encode_capture_block,
};
use crate::core::realtime::base::{
    AudioDataCallback, ConnectRequest, ConnectionState, LifecycleCallback, RealtimeConfig,
    RealtimeError, RealtimeErrorCallback, RealtimeResult, SessionBackend, SessionCallbacks,
    TextCallback, Transport, TransportEvent, TurnDetectionConfig,
};

/// Fallback message for error frames without details.
const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Modalities declared for the session and requested for responses.
fn default_modalities() -> Vec<String> {
    vec!["text".to_string(), "audio".to_string()]
}

// =============================================================================
// Session Configuration
// =============================================================================

/// Build the `session.update` payload for a configuration.
pub fn build_session_config(config: &RealtimeConfig) -> SessionConfig {
    let voice = config
        .voice
        .as_deref()
        .map(OpenAIRealtimeVoice::from_str_or_default)
        .unwrap_or_default();

    let turn_detection = match config.turn_detection.clone().unwrap_or_default() {
        TurnDetectionConfig::ServerVad {
            threshold,
            prefix_padding_ms,
            silence_duration_ms,
        } => TurnDetection::ServerVad {
            threshold,
            prefix_padding_ms,
            silence_duration_ms,
        },
        TurnDetectionConfig::None => TurnDetection::None {},
    };

    SessionConfig {
        modalities: Some(
            config
                .modalities
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(default_modalities),
        ),
        instructions: config
            .instructions
            .clone()
            .filter(|i| !i.trim().is_empty()),
        voice: Some(voice.as_str().to_string()),
        input_audio_format: Some(PCM16_AUDIO_FORMAT.to_string()),
        output_audio_format: Some(PCM16_AUDIO_FORMAT.to_string()),
        input_audio_transcription: config
            .input_audio_transcription
            .as_ref()
            .filter(|t| !t.model.is_empty())
            .map(|t| InputAudioTranscription {
                model: t.model.clone(),
            }),
        turn_detection: Some(turn_detection),
    }
}

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

enum DriverCommand {
    StartMicrophone(oneshot::Sender<RealtimeResult<()>>),
    StopMicrophone(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
}

struct DriverHandle {
    commands: mpsc::UnboundedSender<DriverCommand>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

/// OpenAI Realtime session client.
///
/// Callbacks registered after `connect` apply from the next connection on.
/// Every connection gets a fresh transport, playback output and capture
/// device from the [`SessionBackend`]. Dropping the client closes the command
/// channel, which makes the driver release the session.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    model: OpenAIRealtimeModel,
    backend: Arc<dyn SessionBackend>,
    callbacks: SessionCallbacks,
    driver: Option<DriverHandle>,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig, backend: Arc<dyn SessionBackend>) -> Self {
        let model = if config.model.is_empty() {
            OpenAIRealtimeModel::default()
        } else {
            OpenAIRealtimeModel::from_str_or_default(&config.model)
        };

        Self {
            config,
            model,
            backend,
            callbacks: SessionCallbacks::default(),
            driver: None,
        }
    }

    /// Get the configured model.
    pub fn model(&self) -> OpenAIRealtimeModel {
        self.model
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(&self) -> String {
        let base = self
            .config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(OPENAI_REALTIME_URL);
        realtime_url(base, self.model)
    }

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    pub fn on_connect(&mut self, callback: LifecycleCallback) {
        self.callbacks.on_connect = Some(callback);
    }

    pub fn on_disconnect(&mut self, callback: LifecycleCallback) {
        self.callbacks.on_disconnect = Some(callback);
    }

    pub fn on_audio_data(&mut self, callback: AudioDataCallback) {
        self.callbacks.on_audio_data = Some(callback);
    }

    pub fn on_text_response(&mut self, callback: TextCallback) {
        self.callbacks.on_text_response = Some(callback);
    }

    pub fn on_user_transcript(&mut self, callback: TextCallback) {
        self.callbacks.on_user_transcript = Some(callback);
    }

    pub fn on_error(&mut self, callback: RealtimeErrorCallback) {
        self.callbacks.on_error = Some(callback);
    }

    pub fn on_interrupted(&mut self, callback: LifecycleCallback) {
        self.callbacks.on_interrupted = Some(callback);
    }

    /// Replace all callbacks at once.
    pub fn set_callbacks(&mut self, callbacks: SessionCallbacks) {
        self.callbacks = callbacks;
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Open a session.
    ///
    /// Fails with `InvalidConfiguration` before any I/O when `api_key` is
    /// blank. Returns `Ok` without reconnecting if a session is already live.
    pub async fn connect(&mut self, api_key: &str) -> RealtimeResult<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        if let Some(driver) = self.driver.as_ref() {
            let closed = *driver.state.borrow() == ConnectionState::Disconnected;
            if !closed && !driver.task.is_finished() {
                return Ok(());
            }
        }
        // A driver that already released its connection is reaped before
        // the next one starts.
        if let Some(stale) = self.driver.take() {
            if let Err(e) = stale.task.await {
                tracing::warn!("Session driver ended abnormally: {}", e);
            }
        }

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let (completion_tx, completion_rx) = mpsc::unbounded_channel::<PlaybackTicket>();
        let sink = self.backend.playback(completion_tx).await?;
        let playback = PlaybackQueue::new(sink);

        let mut transport = self.backend.transport();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let request = ConnectRequest::new(self.build_ws_url(), api_key);

        tracing::info!("Connecting to realtime endpoint with model {}", self.model);
        if let Err(e) = transport.open(request, events_tx).await {
            tracing::error!("Failed to open realtime transport: {}", e);
            playback.close().await;
            transport.close().await;
            return Err(e);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel::<AudioBuffer>();

        let driver = SessionDriver {
            session: build_session_config(&self.config),
            greeting: self
                .config
                .greeting
                .clone()
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            backend: self.backend.clone(),
            callbacks: self.callbacks.clone(),
            state: state_tx,
            transport: Some(transport),
            playback: Some(playback),
            capture: None,
            capture_tx,
            greeting_sent: false,
        };

        let task = tokio::spawn(driver.run(command_rx, events_rx, capture_rx, completion_rx));

        self.driver = Some(DriverHandle {
            commands: command_tx,
            state: state_rx,
            task,
        });
        Ok(())
    }

    /// Acquire the microphone and stream it to the session.
    pub async fn start_microphone(&self) -> RealtimeResult<()> {
        let driver = self.driver.as_ref().ok_or(RealtimeError::NotConnected)?;
        let (tx, rx) = oneshot::channel();
        driver
            .commands
            .send(DriverCommand::StartMicrophone(tx))
            .map_err(|_| RealtimeError::NotConnected)?;
        rx.await.map_err(|_| RealtimeError::NotConnected)?
    }

    /// Release the microphone; the session stays open.
    pub async fn stop_microphone(&self) {
        let Some(driver) = self.driver.as_ref() else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if driver.commands.send(DriverCommand::StopMicrophone(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Tear the session down.
    ///
    /// Idempotent and safe before any `connect`. On return the capture
    /// device, playback output and transport have all been released.
    pub async fn disconnect(&mut self) -> RealtimeResult<()> {
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };

        let (tx, rx) = oneshot::channel();
        if driver.commands.send(DriverCommand::Disconnect(tx)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = driver.task.await {
            tracing::warn!("Session driver ended abnormally: {}", e);
        }
        Ok(())
    }

    /// Get the current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.driver
            .as_ref()
            .map(|d| *d.state.borrow())
            .unwrap_or_default()
    }

    /// Check whether the provider acknowledged the session.
    pub fn is_ready(&self) -> bool {
        self.connection_state() == ConnectionState::Active
    }

    /// Whether the client still holds a session driver.
    pub fn has_session(&self) -> bool {
        self.driver.is_some()
    }

    /// Wait until the connection state changes, returning the new state.
    ///
    /// Returns `None` when no session exists or the session has ended.
    pub async fn state_changed(&mut self) -> Option<ConnectionState> {
        let driver = self.driver.as_mut()?;
        driver.state.changed().await.ok()?;
        Some(*driver.state.borrow())
    }
}

// =============================================================================
// Session Driver
// =============================================================================

/// Owns the live connection and processes every session event in order.
struct SessionDriver {
    session: SessionConfig,
    greeting: String,
    backend: Arc<dyn SessionBackend>,
    callbacks: SessionCallbacks,
    state: watch::Sender<ConnectionState>,
    transport: Option<Box<dyn Transport>>,
    playback: Option<PlaybackQueue>,
    capture: Option<CaptureSession>,
    capture_tx: mpsc::UnboundedSender<AudioBuffer>,
    /// Set once the opening turn has been sent on this connection.
    ///
    /// `session.created` and `session.updated` are not guaranteed to arrive
    /// in order or only once, so this flag alone decides whether the greeting
    /// goes out.
    greeting_sent: bool,
}

impl SessionDriver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<DriverCommand>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut blocks: mpsc::UnboundedReceiver<AudioBuffer>,
        mut completions: mpsc::UnboundedReceiver<PlaybackTicket>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(DriverCommand::StartMicrophone(reply)) => {
                        let result = self.start_microphone().await;
                        let _ = reply.send(result);
                    }
                    Some(DriverCommand::StopMicrophone(reply)) => {
                        self.stop_microphone();
                        let _ = reply.send(());
                    }
                    Some(DriverCommand::Disconnect(reply)) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },

                Some(event) = events.recv() => {
                    if !self.handle_transport_event(event).await {
                        break;
                    }
                }

                Some(block) = blocks.recv() => self.send_capture_block(&block),

                Some(ticket) = completions.recv() => {
                    if let Some(playback) = self.playback.as_mut() {
                        playback.on_completed(ticket);
                    }
                }
            }
        }
        tracing::debug!("Session driver stopped");
    }

    /// Returns `false` once the transport is gone.
    async fn handle_transport_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => {
                self.set_state(ConnectionState::Negotiating);
                let event = ClientEvent::SessionUpdate {
                    session: self.session.clone(),
                };
                if let Err(e) = self.send_event(&event) {
                    tracing::error!("Failed to send session configuration: {}", e);
                    self.emit_error(e).await;
                }
                true
            }
            TransportEvent::Message(text) => {
                match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => self.handle_server_event(event).await,
                    Err(e) => {
                        tracing::warn!("Failed to parse server event: {} - {}", e, text);
                        self.emit_error(RealtimeError::SerializationError(e.to_string()))
                            .await;
                    }
                }
                true
            }
            TransportEvent::Error(message) => {
                tracing::error!("Realtime transport error: {}", message);
                self.emit_error(RealtimeError::WebSocketError(message)).await;
                true
            }
            TransportEvent::Closed { reason } => {
                tracing::info!(
                    "Realtime transport closed{}",
                    reason.map(|r| format!(": {r}")).unwrap_or_default()
                );
                self.release().await;
                self.set_state(ConnectionState::Disconnected);
                Self::emit_lifecycle(self.callbacks.on_disconnect.clone()).await;
                false
            }
        }
    }

    /// Handle a server event.
    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!("OpenAI Realtime session created: {}", session.id);
                self.set_state(ConnectionState::Active);
                Self::emit_lifecycle(self.callbacks.on_connect.clone()).await;
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::debug!("OpenAI Realtime session updated: {}", session.id);
                if !self.greeting_sent {
                    self.greeting_sent = true;
                    self.send_greeting().await;
                }
            }

            ServerEvent::AudioDelta { delta, .. } => {
                match ServerEvent::decode_audio_delta(&delta) {
                    Ok(bytes) => {
                        if let Some(playback) = self.playback.as_mut() {
                            playback.enqueue(AudioBuffer::from_pcm16(
                                &bytes,
                                OPENAI_REALTIME_SAMPLE_RATE,
                            ));
                        }
                        if let Some(cb) = self.callbacks.on_audio_data.clone() {
                            cb(Bytes::from(bytes)).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to decode audio delta: {}", e);
                        self.emit_error(RealtimeError::SerializationError(format!(
                            "Invalid audio delta: {e}"
                        )))
                        .await;
                    }
                }
            }

            ServerEvent::AudioTranscriptDelta { delta, .. } | ServerEvent::TextDelta { delta, .. } => {
                if let Some(cb) = self.callbacks.on_text_response.clone() {
                    cb(delta).await;
                }
            }

            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                tracing::debug!("Speech started at {}ms", audio_start_ms);
                if let Some(playback) = self.playback.as_mut() {
                    playback.interrupt();
                }
                Self::emit_lifecycle(self.callbacks.on_interrupted.clone()).await;
            }

            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                tracing::debug!("Speech stopped at {}ms", audio_end_ms);
            }

            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                let transcript = transcript.trim().to_string();
                if transcript.is_empty() {
                    return;
                }
                if let Some(cb) = self.callbacks.on_user_transcript.clone() {
                    cb(transcript).await;
                }
            }

            ServerEvent::Error { error } => {
                let message = error
                    .and_then(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
                tracing::error!("OpenAI Realtime error: {}", message);
                self.emit_error(RealtimeError::ProviderError(message)).await;
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!(
                    "Response done: {}",
                    response.map(|r| r.id).unwrap_or_default()
                );
            }

            ServerEvent::Unknown => {
                tracing::trace!("Ignoring unhandled server event");
            }
        }
    }

    async fn send_greeting(&mut self) {
        let item = ClientEvent::ConversationItemCreate {
            item: ConversationItem::system_text(self.greeting.clone()),
        };
        let response = ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                modalities: Some(default_modalities()),
                instructions: None,
            }),
        };

        for event in [item, response] {
            if let Err(e) = self.send_event(&event) {
                tracing::error!("Failed to send {}: {}", event.kind(), e);
                self.emit_error(e).await;
                return;
            }
        }
        tracing::info!("Opening turn requested");
    }

    fn send_event(&mut self, event: &ClientEvent) -> RealtimeResult<()> {
        let transport = self
            .transport
            .as_mut()
            .filter(|t| t.is_open())
            .ok_or(RealtimeError::NotConnected)?;
        let json = serde_json::to_string(event)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        transport.send(json)
    }

    /// Forward one microphone block.
    ///
    /// Dropped silently while the transport is not open, and once the
    /// microphone is stopped even if the block was queued before that.
    fn send_capture_block(&mut self, block: &AudioBuffer) {
        if self.capture.is_none() || !self.transport.as_ref().is_some_and(|t| t.is_open()) {
            return;
        }
        let bytes = encode_capture_block(block);
        if bytes.is_empty() {
            return;
        }
        if let Err(e) = self.send_event(&ClientEvent::audio_append(&bytes)) {
            tracing::debug!("Dropped capture block: {}", e);
        }
    }

    async fn start_microphone(&mut self) -> RealtimeResult<()> {
        if self.capture.is_some() {
            return Ok(());
        }
        let source = self.backend.capture()?;
        let session = CaptureSession::start(source, self.capture_tx.clone()).await?;
        self.capture = Some(session);
        Ok(())
    }

    fn stop_microphone(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }

    /// Client-initiated teardown.
    async fn shutdown(&mut self) {
        let was_connected = *self.state.borrow() != ConnectionState::Disconnected;
        if was_connected {
            self.set_state(ConnectionState::Closing);
        }
        self.release().await;
        self.set_state(ConnectionState::Disconnected);
        if was_connected {
            Self::emit_lifecycle(self.callbacks.on_disconnect.clone()).await;
        }
    }

    /// Release capture, playback and transport, in that order.
    async fn release(&mut self) {
        self.stop_microphone();
        if let Some(playback) = self.playback.take() {
            playback.close().await;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
    }

    async fn emit_lifecycle(callback: Option<LifecycleCallback>) {
        if let Some(cb) = callback {
            cb().await;
        }
    }

    async fn emit_error(&mut self, error: RealtimeError) {
        if let Some(cb) = self.callbacks.on_error.clone() {
            cb(error).await;
        }
    }
}
