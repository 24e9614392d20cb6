//! Host audio devices through cpal.
//!
//! cpal streams are not `Send` on every platform, so each stream lives on a
//! dedicated thread for as long as the device is held. The thread exits and
//! drops the stream when its shutdown channel closes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{AudioBuffer, CAPTURE_BLOCK_SIZE, PlaybackTicket};
use crate::core::realtime::base::{
    AudioSink, AudioSource, RealtimeError, RealtimeResult, SessionBackend, Transport,
};
use crate::core::realtime::openai::WebSocketTransport;

fn device_error(context: &str, e: impl std::fmt::Display) -> RealtimeError {
    RealtimeError::DeviceError(format!("{context}: {e}"))
}

/// Wait for a device thread to report its stream rate.
async fn await_device_ready(
    ready: oneshot::Receiver<RealtimeResult<u32>>,
    name: &str,
) -> RealtimeResult<u32> {
    ready.await.map_err(|_| {
        RealtimeError::DeviceError(format!("{name} thread exited during setup"))
    })?
}

/// Wait for a device thread to finish without blocking the runtime.
async fn join_device_thread(thread: JoinHandle<()>, name: &str) {
    match tokio::task::spawn_blocking(move || thread.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::warn!("{} thread panicked", name),
        Err(e) => tracing::warn!("Failed to join {} thread: {}", name, e),
    }
}

/// Let a device thread wind down in the background.
///
/// For synchronous release paths; the join runs on the blocking pool when
/// called from within a runtime.
fn release_device_thread(thread: JoinHandle<()>, name: &'static str) {
    let join = move || {
        if thread.join().is_err() {
            tracing::warn!("{} thread panicked", name);
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(join);
        }
        Err(_) => join(),
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Production backend: WebSocket transport plus the default host devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

#[async_trait]
impl SessionBackend for CpalBackend {
    fn transport(&self) -> Box<dyn Transport> {
        Box::new(WebSocketTransport::new())
    }

    async fn playback(
        &self,
        completions: mpsc::UnboundedSender<PlaybackTicket>,
    ) -> RealtimeResult<Box<dyn AudioSink>> {
        Ok(Box::new(CpalSink::open(completions).await?))
    }

    fn capture(&self) -> RealtimeResult<Box<dyn AudioSource>> {
        Ok(Box::new(CpalSource::new()))
    }
}

// =============================================================================
// Output
// =============================================================================

#[derive(Default)]
struct SinkState {
    /// Device-rate mono samples of the in-flight buffer
    samples: VecDeque<f32>,
    current: Option<PlaybackTicket>,
}

/// Default output device.
///
/// The in-flight buffer is resampled to the device rate and copied to every
/// output channel. Its ticket is reported once the device consumed the last
/// sample.
pub struct CpalSink {
    shared: Arc<Mutex<SinkState>>,
    sample_rate: u32,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device.
    pub async fn open(completions: mpsc::UnboundedSender<PlaybackTicket>) -> RealtimeResult<Self> {
        let shared = Arc::new(Mutex::new(SinkState::default()));
        let (ready_tx, ready_rx) = oneshot::channel::<RealtimeResult<u32>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let stream_state = shared.clone();
        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match open_output_stream(stream_state, completions) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Held until the sink is closed or dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| device_error("Failed to spawn audio output thread", e))?;

        let sample_rate = await_device_ready(ready_rx, "Audio output").await?;

        tracing::info!("Audio output opened at {}Hz", sample_rate);
        Ok(Self {
            shared,
            sample_rate,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn open_output_stream(
    shared: Arc<Mutex<SinkState>>,
    completions: mpsc::UnboundedSender<PlaybackTicket>,
) -> RealtimeResult<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RealtimeError::DeviceError("No output device available".to_string()))?;

    tracing::info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .default_output_config()
        .map_err(|e| device_error("Failed to get output config", e))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let sample_rate = config.sample_rate.0;

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, shared, completions),
        cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, shared, completions),
        cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, shared, completions),
        other => {
            return Err(RealtimeError::DeviceError(format!(
                "Unsupported output sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| device_error("Failed to build output stream", e))?;

    stream
        .play()
        .map_err(|e| device_error("Failed to start output stream", e))?;

    Ok((stream, sample_rate))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Mutex<SinkState>>,
    completions: mpsc::UnboundedSender<PlaybackTicket>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut state = shared.lock();
            for frame in data.chunks_mut(channels) {
                let sample = state.samples.pop_front().unwrap_or(0.0);
                frame.fill(T::from_sample(sample));
            }
            if state.samples.is_empty() {
                if let Some(ticket) = state.current.take() {
                    let _ = completions.send(ticket);
                }
            }
        },
        |err| tracing::error!("Audio output stream error: {}", err),
        None,
    )
}

#[async_trait]
impl AudioSink for CpalSink {
    fn play(&mut self, ticket: PlaybackTicket, buffer: AudioBuffer) -> RealtimeResult<()> {
        if self.shutdown.is_none() {
            return Err(RealtimeError::DeviceError(
                "Audio output is closed".to_string(),
            ));
        }
        let resampled = buffer.resampled(self.sample_rate);
        let mut state = self.shared.lock();
        state.samples.clear();
        state.samples.extend(resampled.samples);
        state.current = Some(ticket);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.shared.lock();
        state.samples.clear();
        state.current = None;
    }

    async fn close(&mut self) {
        self.stop();
        self.shutdown = None;
        if let Some(thread) = self.thread.take() {
            join_device_thread(thread, "audio output").await;
            tracing::info!("Audio output closed");
        }
    }
}

// =============================================================================
// Input
// =============================================================================

/// Default input device, delivering mono blocks of [`CAPTURE_BLOCK_SIZE`]
/// samples at the device rate.
#[derive(Default)]
pub struct CpalSource {
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn open_input_stream(
    blocks: mpsc::UnboundedSender<AudioBuffer>,
) -> RealtimeResult<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RealtimeError::DeviceError("No input device available".to_string()))?;

    tracing::info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .default_input_config()
        .map_err(|e| device_error("Failed to get input config", e))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let sample_rate = config.sample_rate.0;

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, blocks),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, blocks),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, blocks),
        other => {
            return Err(RealtimeError::DeviceError(format!(
                "Unsupported input sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| device_error("Failed to build input stream", e))?;

    stream
        .play()
        .map_err(|e| device_error("Failed to start input stream", e))?;

    Ok((stream, sample_rate))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: mpsc::UnboundedSender<AudioBuffer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = (config.channels as usize).max(1);
    let sample_rate = config.sample_rate.0;
    let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_BLOCK_SIZE);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let mono = frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>()
                    / frame.len() as f32;
                pending.push(mono);

                if pending.len() == CAPTURE_BLOCK_SIZE {
                    let block = std::mem::replace(
                        &mut pending,
                        Vec::with_capacity(CAPTURE_BLOCK_SIZE),
                    );
                    let _ = blocks.send(AudioBuffer::new(block, sample_rate));
                }
            }
        },
        |err| tracing::error!("Audio input stream error: {}", err),
        None,
    )
}

#[async_trait]
impl AudioSource for CpalSource {
    async fn start(&mut self, blocks: mpsc::UnboundedSender<AudioBuffer>) -> RealtimeResult<()> {
        if self.shutdown.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel::<RealtimeResult<u32>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-input".to_string())
            .spawn(move || {
                let stream = match open_input_stream(blocks) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| device_error("Failed to spawn audio input thread", e))?;

        let sample_rate = await_device_ready(ready_rx, "Audio input").await?;

        tracing::info!("Audio input opened at {}Hz", sample_rate);
        self.shutdown = Some(shutdown_tx);
        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) {
        // Closing the shutdown channel releases the stream on its own thread.
        self.shutdown = None;
        if let Some(thread) = self.thread.take() {
            release_device_thread(thread, "audio input");
            tracing::info!("Audio input closed");
        }
    }
}
