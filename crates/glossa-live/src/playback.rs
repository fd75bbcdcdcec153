//! **Translation Playback** — speaks the translated audio the service returns
//!
//! Translated speech arrives interleaved with the transcription stream as
//! raw PCM16 chunks. Each chunk is queued on a `rodio::Sink` as it lands;
//! text handling never waits on audio. If no output device exists the
//! session degrades to text-only rather than failing.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{LiveError, LiveResult};

/// Owns the output device. Keep this alive for as long as audio should
/// play; it is not `Send`, so it stays with the session while async tasks
/// feed the sink through [`PlaybackSink`].
pub struct TranslationPlayback {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
}

impl TranslationPlayback {
    /// Create playback on the default output device.
    pub fn new() -> LiveResult<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| LiveError::Playback(e.to_string()))?;
        let sink =
            Sink::try_new(&stream_handle).map_err(|e| LiveError::Playback(e.to_string()))?;
        info!("Playback: sink ready for translated audio");
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
        })
    }

    /// Cloneable handle for queueing PCM from async tasks.
    pub fn handle(&self) -> PlaybackSink {
        PlaybackSink {
            sink: Arc::clone(&self.sink),
        }
    }

    /// Stop immediately and clear anything still queued.
    pub fn stop(&self) {
        self.sink.stop();
        debug!("Playback: stopped and cleared");
    }

    /// Whether the sink currently has queued samples (playing or pending).
    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

/// Sendable queueing side of [`TranslationPlayback`].
#[derive(Clone)]
pub struct PlaybackSink {
    sink: Arc<Sink>,
}

impl PlaybackSink {
    /// Queue one mono PCM16 chunk at the given sample rate. Empty chunks
    /// and zero rates are dropped; `SamplesBuffer` rejects both.
    pub fn enqueue(&self, samples: Vec<i16>, sample_rate: u32) {
        if samples.is_empty() || sample_rate == 0 {
            return;
        }
        self.sink.append(SamplesBuffer::new(1, sample_rate, samples));
    }

    /// Clear the queue (used when the session tears down mid-utterance).
    pub fn stop(&self) {
        self.sink.stop();
    }
}
