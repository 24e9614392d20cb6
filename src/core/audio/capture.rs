//! Microphone capture for the realtime wire.
//!
//! Each block delivered by the input device is converted on its own: it is
//! resampled from the device rate to 24kHz, quantized to int16 and
//! serialized little-endian. No samples are carried across blocks.

use tokio::sync::mpsc;

use super::{AudioBuffer, WIRE_SAMPLE_RATE, float_to_pcm_bytes, resample_linear};
use crate::core::realtime::base::{AudioSource, RealtimeResult};

/// Number of device-rate samples per capture block.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// Encode one captured block as wire-rate PCM16 bytes.
pub fn encode_capture_block(block: &AudioBuffer) -> Vec<u8> {
    let resampled = resample_linear(&block.samples, block.sample_rate, WIRE_SAMPLE_RATE);
    float_to_pcm_bytes(&resampled)
}

/// A running input device.
///
/// Blocks are delivered on the channel passed to [`CaptureSession::start`].
/// Dropping the session releases the device.
pub struct CaptureSession {
    source: Option<Box<dyn AudioSource>>,
}

impl CaptureSession {
    /// Acquire the device and start streaming blocks.
    pub async fn start(
        mut source: Box<dyn AudioSource>,
        blocks: mpsc::UnboundedSender<AudioBuffer>,
    ) -> RealtimeResult<Self> {
        source.start(blocks).await?;
        tracing::info!("Microphone capture started");
        Ok(Self {
            source: Some(source),
        })
    }

    /// Release the input device. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            tracing::info!("Microphone capture stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::pcm_bytes_to_int16;
    use crate::core::realtime::base::RealtimeError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        stops: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AudioSource for CountingSource {
        async fn start(&mut self, _blocks: mpsc::UnboundedSender<AudioBuffer>) -> RealtimeResult<()> {
            if self.fail {
                return Err(RealtimeError::DeviceError("permission denied".to_string()));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_encode_capture_block_resamples_to_wire_rate() {
        let block = AudioBuffer::new(vec![0.5; 480], 48_000);
        let bytes = encode_capture_block(&block);
        assert_eq!(bytes.len(), 240 * 2);
        assert!(pcm_bytes_to_int16(&bytes).iter().all(|&s| s == 16383));
    }

    #[test]
    fn test_encode_capture_block_clamps() {
        let block = AudioBuffer::new(vec![-1.5, 1.5], WIRE_SAMPLE_RATE);
        let samples = pcm_bytes_to_int16(&encode_capture_block(&block));
        assert_eq!(samples, vec![i16::MIN, i16::MAX]);
    }

    #[tokio::test]
    async fn test_capture_session_stop_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = CaptureSession::start(
            Box::new(CountingSource {
                stops: stops.clone(),
                fail: false,
            }),
            tx,
        )
        .await
        .unwrap();

        assert!(session.is_running());
        session.stop();
        session.stop();
        drop(session);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capture_session_start_failure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = CaptureSession::start(
            Box::new(CountingSource {
                stops: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
            tx,
        )
        .await;
        assert!(matches!(result, Err(RealtimeError::DeviceError(_))));
    }
}
