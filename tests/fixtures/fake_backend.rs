//! In-memory session backend.
//!
//! The fake transport records every outbound frame and lets the test push
//! inbound frames as if the server sent them. The fake sink records played
//! tickets and reports completions only when the test says so. The fake
//! source forwards blocks the test injects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use voice_interview::core::audio::{AudioBuffer, PlaybackTicket};
use voice_interview::core::realtime::{
    AudioSink, AudioSource, ConnectRequest, RealtimeError, RealtimeResult, SessionBackend,
    Transport, TransportEvent,
};

/// Side effects observed by the fake devices.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub transports_opened: usize,
    pub transport_closes: usize,
    pub last_url: Option<String>,
    pub sent: Vec<String>,
    pub played: Vec<(PlaybackTicket, usize)>,
    pub sink_stops: usize,
    pub sinks_closed: usize,
    pub sources_started: usize,
    pub source_stops: usize,
}

#[derive(Default)]
struct Shared {
    recorded: Mutex<Recorded>,
    transport_open: AtomicBool,
    server: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    completions: Mutex<Option<mpsc::UnboundedSender<PlaybackTicket>>>,
    blocks: Mutex<Option<mpsc::UnboundedSender<AudioBuffer>>>,
    // Outlives `stop`, like a device callback that fired just before release.
    late_blocks: Mutex<Option<mpsc::UnboundedSender<AudioBuffer>>>,
    fail_open: AtomicBool,
    fail_playback: AtomicBool,
    fail_capture: AtomicBool,
}

/// Handle shared by the test and every device the backend creates.
#[derive(Clone, Default)]
pub struct FakeBackend {
    shared: Arc<Shared>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(&self) {
        self.shared.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_playback(&self) {
        self.shared.fail_playback.store(true, Ordering::SeqCst);
    }

    pub fn fail_capture(&self) {
        self.shared.fail_capture.store(true, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Recorded {
        self.shared.recorded.lock().clone()
    }

    /// Deliver a text frame as if the server sent it.
    pub fn push_server(&self, frame: Value) {
        self.push_raw(frame.to_string());
    }

    pub fn push_raw(&self, text: impl Into<String>) {
        if let Some(server) = self.shared.server.lock().as_ref() {
            let _ = server.send(TransportEvent::Message(text.into()));
        }
    }

    pub fn push_transport_error(&self, message: &str) {
        if let Some(server) = self.shared.server.lock().as_ref() {
            let _ = server.send(TransportEvent::Error(message.to_string()));
        }
    }

    /// Server-side close: the transport stops accepting frames, then reports closure.
    pub fn close_from_server(&self) {
        self.shared.transport_open.store(false, Ordering::SeqCst);
        if let Some(server) = self.shared.server.lock().take() {
            let _ = server.send(TransportEvent::Closed {
                reason: Some("server going away".to_string()),
            });
        }
    }

    /// Mark the transport as not open without delivering a close event.
    pub fn stall_transport(&self) {
        self.shared.transport_open.store(false, Ordering::SeqCst);
    }

    pub fn transport_is_open(&self) -> bool {
        self.shared.transport_open.load(Ordering::SeqCst)
    }

    /// Report a playback ticket as finished.
    pub fn complete(&self, ticket: PlaybackTicket) {
        if let Some(completions) = self.shared.completions.lock().as_ref() {
            let _ = completions.send(ticket);
        }
    }

    /// Feed one microphone block into the running source.
    pub fn capture_block(&self, block: AudioBuffer) {
        if let Some(blocks) = self.shared.blocks.lock().as_ref() {
            let _ = blocks.send(block);
        }
    }

    /// Feed a block through the sender of the most recently started source,
    /// even if that source has been stopped since.
    pub fn capture_late_block(&self, block: AudioBuffer) {
        if let Some(blocks) = self.shared.late_blocks.lock().as_ref() {
            let _ = blocks.send(block);
        }
    }

    pub fn sent_events(&self) -> Vec<Value> {
        self.shared
            .recorded
            .lock()
            .sent
            .iter()
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_events()
            .iter()
            .filter_map(|v| v["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn count_sent(&self, kind: &str) -> usize {
        self.sent_types().iter().filter(|t| *t == kind).count()
    }

    pub fn played_tickets(&self) -> Vec<PlaybackTicket> {
        self.shared
            .recorded
            .lock()
            .played
            .iter()
            .map(|(t, _)| *t)
            .collect()
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    fn transport(&self) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            shared: self.shared.clone(),
        })
    }

    async fn playback(
        &self,
        completions: mpsc::UnboundedSender<PlaybackTicket>,
    ) -> RealtimeResult<Box<dyn AudioSink>> {
        // Device allocation hands control back to the runtime before completing.
        tokio::task::yield_now().await;
        if self.shared.fail_playback.load(Ordering::SeqCst) {
            return Err(RealtimeError::DeviceError("no output device".to_string()));
        }
        *self.shared.completions.lock() = Some(completions);
        Ok(Box::new(FakeSink {
            shared: self.shared.clone(),
        }))
    }

    fn capture(&self) -> RealtimeResult<Box<dyn AudioSource>> {
        Ok(Box::new(FakeSource {
            shared: self.shared.clone(),
            running: false,
        }))
    }
}

struct FakeTransport {
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(
        &mut self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> RealtimeResult<()> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(RealtimeError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        {
            let mut recorded = self.shared.recorded.lock();
            recorded.transports_opened += 1;
            recorded.last_url = Some(request.url.clone());
        }
        self.shared.transport_open.store(true, Ordering::SeqCst);
        let _ = events.send(TransportEvent::Opened);
        *self.shared.server.lock() = Some(events);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.shared.transport_open.load(Ordering::SeqCst)
    }

    fn send(&mut self, text: String) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        self.shared.recorded.lock().sent.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.transport_open.store(false, Ordering::SeqCst);
        self.shared.server.lock().take();
        self.shared.recorded.lock().transport_closes += 1;
    }
}

struct FakeSink {
    shared: Arc<Shared>,
}

#[async_trait]
impl AudioSink for FakeSink {
    fn play(&mut self, ticket: PlaybackTicket, buffer: AudioBuffer) -> RealtimeResult<()> {
        self.shared
            .recorded
            .lock()
            .played
            .push((ticket, buffer.len()));
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.recorded.lock().sink_stops += 1;
    }

    async fn close(&mut self) {
        self.shared.completions.lock().take();
        self.shared.recorded.lock().sinks_closed += 1;
    }
}

struct FakeSource {
    shared: Arc<Shared>,
    running: bool,
}

#[async_trait]
impl AudioSource for FakeSource {
    async fn start(&mut self, blocks: mpsc::UnboundedSender<AudioBuffer>) -> RealtimeResult<()> {
        if self.shared.fail_capture.load(Ordering::SeqCst) {
            return Err(RealtimeError::DeviceError(
                "microphone permission denied".to_string(),
            ));
        }
        *self.shared.late_blocks.lock() = Some(blocks.clone());
        *self.shared.blocks.lock() = Some(blocks);
        self.shared.recorded.lock().sources_started += 1;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.shared.blocks.lock().take();
        self.shared.recorded.lock().source_stops += 1;
    }
}
