//! # Glossa Live - Streaming Speech Translation
//!
//! This crate drives live interpretation sessions: microphone audio streams
//! to a remote translation service over a persistent channel, and the
//! translation comes back as an incremental sentence transcript plus
//! spoken audio. Built on bare metal Rust for minimal latency.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Interpreter Session                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
//! │  │  Microphone  │→ │ PCM16/base64 │→ │ Live Channel │        │
//! │  │    (cpal)    │  │    frames    │  │ (WebSocket)  │        │
//! │  └──────────────┘  └──────────────┘  └──────┬───────┘        │
//! │                                             ↓                │
//! │  ┌──────────────┐                    ┌──────────────┐        │
//! │  │   Playback   │←───────────────────│  Segmenter   │→ calls │
//! │  │   (rodio)    │   translated PCM   │  (sentences) │  back  │
//! │  └──────────────┘                    └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod error;
pub mod keygate;
pub mod pcm;
pub mod playback;
pub mod prompt;
pub mod record;
pub mod segmenter;
pub mod session;
pub mod transport;
pub mod wire;

pub use audio::{AudioCapture, AudioConfig, CaptureHandle, CaptureStop, SERVICE_SAMPLE_RATE};
pub use error::{LiveError, LiveResult};
pub use keygate::{KeyGate, NoopKeyGate};
pub use pcm::{decode_frame, encode_frame};
pub use playback::{PlaybackSink, TranslationPlayback};
pub use prompt::translation_instruction;
pub use record::{Segment, SessionRecord};
pub use segmenter::{SegmentBatch, TranscriptSegmenter};
pub use session::{
    ErrorCallback, InterpreterSession, SegmentCallback, SessionConfig, DEFAULT_ENDPOINT,
    DEFAULT_MODEL, DEFAULT_VOICE,
};
pub use transport::{
    ConnectionEvent, ConnectionHandle, ConnectionState, LiveConnection, TransportConfig,
};
pub use wire::{MediaFrame, ServerContent, ServerMessage, SetupFrame, INPUT_MIME_TYPE};
