//! Sequential playback of decoded response audio.
//!
//! Buffers play strictly in enqueue order, one at a time. The next buffer is
//! handed to the sink only after the sink reports the previous ticket as
//! complete. An interruption drops everything queued, halts the sink and
//! invalidates the in-flight ticket so a late completion cannot restart
//! output.

use std::collections::VecDeque;

use super::{AudioBuffer, PlaybackTicket};
use crate::core::realtime::base::AudioSink;

/// FIFO of decoded buffers feeding a single [`AudioSink`].
pub struct PlaybackQueue {
    sink: Box<dyn AudioSink>,
    queue: VecDeque<AudioBuffer>,
    is_playing: bool,
    in_flight: Option<PlaybackTicket>,
    next_ticket: u64,
}

impl PlaybackQueue {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            queue: VecDeque::new(),
            is_playing: false,
            in_flight: None,
            next_ticket: 0,
        }
    }

    /// Append a buffer; starts the playback chain if it is idle.
    pub fn enqueue(&mut self, buffer: AudioBuffer) {
        if buffer.is_empty() {
            return;
        }
        self.queue.push_back(buffer);
        if !self.is_playing {
            self.play_next();
        }
    }

    /// Handle a completion reported by the sink.
    ///
    /// Completions for anything but the in-flight ticket are ignored.
    pub fn on_completed(&mut self, ticket: PlaybackTicket) {
        if self.in_flight != Some(ticket) {
            tracing::trace!("Ignoring stale playback completion {:?}", ticket);
            return;
        }
        self.in_flight = None;
        self.play_next();
    }

    /// Drop all queued audio and halt the in-flight buffer.
    pub fn interrupt(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        self.in_flight = None;
        self.is_playing = false;
        self.sink.stop();
        tracing::debug!("Playback interrupted, dropped {} queued buffers", dropped);
    }

    /// Halt playback and release the output device.
    pub async fn close(mut self) {
        self.interrupt();
        self.sink.close().await;
    }

    /// Number of buffers waiting behind the in-flight one.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn in_flight(&self) -> Option<PlaybackTicket> {
        self.in_flight
    }

    fn play_next(&mut self) {
        while let Some(buffer) = self.queue.pop_front() {
            let ticket = PlaybackTicket(self.next_ticket);
            self.next_ticket += 1;

            match self.sink.play(ticket, buffer) {
                Ok(()) => {
                    self.in_flight = Some(ticket);
                    self.is_playing = true;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Failed to play audio buffer: {}", e);
                }
            }
        }

        self.in_flight = None;
        self.is_playing = false;
    }
}
