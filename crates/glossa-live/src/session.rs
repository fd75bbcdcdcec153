//! **Interpreter Session** — the coordination layer callers talk to
//!
//! One `InterpreterSession` owns everything a live attempt needs: the
//! microphone capture thread, the channel to the translation service, the
//! segmenter, and optional playback of the translated speech. `connect`
//! brings the whole stack up in strict order (microphone first, channel
//! second, pump last) and `disconnect` tears it down from any state,
//! flushing pending text so nothing spoken is lost.
//!
//! Callbacks are keyed to a connection generation: anything still in
//! flight from an older attempt is silently suppressed, so a caller never
//! sees a segment or error from a session it already left.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{self, AudioConfig, CaptureHandle, CaptureStop};
use crate::error::{LiveError, LiveResult};
use crate::keygate::{KeyGate, NoopKeyGate};
use crate::pcm;
use crate::playback::{PlaybackSink, TranslationPlayback};
use crate::prompt;
use crate::record::Segment;
use crate::segmenter::TranscriptSegmenter;
use crate::transport::{
    ConnectionEvent, ConnectionHandle, ConnectionState, LiveConnection, TransportConfig,
    CLOSE_NORMAL,
};
use crate::wire::{self, SetupFrame};

/// Default service endpoint; the API key is appended as a query parameter.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default live model selector.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-live-001";

/// Default prebuilt voice for translated speech.
pub const DEFAULT_VOICE: &str = "Puck";

/// Callback invoked for every finalized segment and preview replacement.
pub type SegmentCallback = Arc<dyn Fn(Segment) + Send + Sync>;

/// Callback invoked for connect-time and mid-session failures.
pub type ErrorCallback = Arc<dyn Fn(LiveError) + Send + Sync>;

/// Everything needed to start one interpretation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Credential appended to the endpoint URL. Never logged.
    pub api_key: String,
    /// Language the caller speaks.
    pub input_language: String,
    /// Language the service translates into.
    pub output_language: String,
    /// Model selector, short name or full `models/...` path.
    pub model: String,
    /// Prebuilt voice for the translated speech.
    pub voice: String,
    /// Service endpoint without credentials.
    pub endpoint: String,
    pub audio: AudioConfig,
}

impl SessionConfig {
    pub fn new(
        api_key: impl Into<String>,
        input_language: impl Into<String>,
        output_language: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            input_language: input_language.into(),
            output_language: output_language.into(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            audio: AudioConfig::default(),
        }
    }

    /// Build from environment: `GLOSSA_API_KEY` (or `GEMINI_API_KEY` /
    /// `GOOGLE_API_KEY`), with `GLOSSA_MODEL`, `GLOSSA_VOICE` and
    /// `GLOSSA_ENDPOINT` as optional overrides.
    pub fn from_env(
        input_language: impl Into<String>,
        output_language: impl Into<String>,
    ) -> LiveResult<Self> {
        let api_key = std::env::var("GLOSSA_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                LiveError::Config(
                    "set GLOSSA_API_KEY, GEMINI_API_KEY, or GOOGLE_API_KEY".to_string(),
                )
            })?;
        let mut config = Self::new(api_key, input_language, output_language);
        if let Ok(model) = std::env::var("GLOSSA_MODEL") {
            config.model = model;
        }
        if let Ok(voice) = std::env::var("GLOSSA_VOICE") {
            config.voice = voice;
        }
        if let Ok(endpoint) = std::env::var("GLOSSA_ENDPOINT") {
            config.endpoint = endpoint;
        }
        Ok(config)
    }

    fn endpoint_url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }

    fn setup_frame(&self) -> SetupFrame {
        SetupFrame::new(
            &self.model,
            &self.voice,
            &prompt::translation_instruction(&self.input_language, &self.output_language),
        )
    }
}

/// Delivers callbacks only while its generation is the current one.
#[derive(Clone)]
struct CallbackEmitter {
    generation: u64,
    shared: Arc<AtomicU64>,
    on_segment: SegmentCallback,
    on_error: ErrorCallback,
}

impl CallbackEmitter {
    fn is_live(&self) -> bool {
        self.shared.load(Ordering::SeqCst) == self.generation
    }

    fn segment(&self, segment: Segment) {
        if self.is_live() {
            (self.on_segment)(segment);
        }
    }

    fn error(&self, error: LiveError) {
        if self.is_live() {
            (self.on_error)(error);
        }
    }

    /// Suppress this generation's callbacks without touching a newer one.
    fn retire(&self) {
        let _ = self.shared.compare_exchange(
            self.generation,
            self.generation + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Everything the event loop needs, bundled so the loop can release the
/// session's resources itself when the channel dies under it.
struct LoopContext {
    segmenter: Arc<Mutex<TranscriptSegmenter>>,
    emitter: CallbackEmitter,
    playback: Option<PlaybackSink>,
    connection: ConnectionHandle,
    capture_stop: CaptureStop,
}

struct ActiveSession {
    input_language: String,
    output_language: String,
    connection: LiveConnection,
    capture: CaptureHandle,
    playback: Option<TranslationPlayback>,
    segmenter: Arc<Mutex<TranscriptSegmenter>>,
    emitter: CallbackEmitter,
    pump_task: JoinHandle<()>,
    loop_task: JoinHandle<()>,
}

/// Live speech-translation session with a connect/disconnect lifecycle.
pub struct InterpreterSession {
    generation: Arc<AtomicU64>,
    key_gate: Arc<dyn KeyGate>,
    active: Option<ActiveSession>,
}

impl InterpreterSession {
    pub fn new() -> Self {
        Self::with_key_gate(Arc::new(NoopKeyGate))
    }

    /// Use an environment-provided credential gate instead of the default
    /// (which assumes a key exists).
    pub fn with_key_gate(key_gate: Arc<dyn KeyGate>) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            key_gate,
            active: None,
        }
    }

    /// Acquire the microphone, open the channel, and start streaming.
    ///
    /// No-op if a session is already connected. `on_error` never fires for
    /// a failure of this call itself; it reports failures of an established
    /// session (mid-stream interruption, abnormal close).
    ///
    /// # Errors
    ///
    /// Connect-time failures come back to the caller, classified; the
    /// attempt is fully torn down:
    /// - [`LiveError::Unauthorized`] - no key configured, an empty key, or
    ///   the service rejecting the handshake
    /// - [`LiveError::MicrophoneDenied`] - microphone unavailable or denied
    /// - [`LiveError::ConnectFailed`] - any other handshake or setup failure
    pub async fn connect(
        &mut self,
        config: SessionConfig,
        on_segment: impl Fn(Segment) + Send + Sync + 'static,
        on_error: impl Fn(LiveError) + Send + Sync + 'static,
    ) -> LiveResult<()> {
        if let Some(active) = &self.active {
            match active.connection.state() {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    debug!("Session: connect ignored, already connected");
                    return Ok(());
                }
                ConnectionState::Disconnected | ConnectionState::Error => {
                    // The previous attempt is fully released before a fresh
                    // one starts.
                    self.disconnect();
                }
            }
        }

        if !self.key_gate.has_key() {
            self.key_gate.open_key_picker();
            return Err(LiveError::Unauthorized(
                "no API key configured; key selection requested".to_string(),
            ));
        }
        if config.api_key.is_empty() {
            return Err(LiveError::Unauthorized("API key is empty".to_string()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let emitter = CallbackEmitter {
            generation,
            shared: Arc::clone(&self.generation),
            on_segment: Arc::new(on_segment),
            on_error: Arc::new(on_error),
        };

        // Microphone first: a denied microphone must fail the attempt
        // before any channel exists.
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let capture = audio::spawn_capture(config.audio.clone(), frame_tx)?;

        let transport_config = TransportConfig {
            url: config.endpoint_url(),
            setup: config.setup_frame(),
        };
        let (connection, event_rx) = LiveConnection::open(transport_config).await?;

        // Channel open: start pulling frames and pumping them out.
        capture.start();

        let playback = match TranslationPlayback::new() {
            Ok(playback) => Some(playback),
            Err(e) => {
                warn!("Session: translated audio disabled: {}", e);
                None
            }
        };

        let segmenter = Arc::new(Mutex::new(TranscriptSegmenter::new()));
        let pump_task = tokio::spawn(run_capture_pump(frame_rx, connection.handle()));
        let loop_task = tokio::spawn(run_event_loop(
            event_rx,
            LoopContext {
                segmenter: Arc::clone(&segmenter),
                emitter: emitter.clone(),
                playback: playback.as_ref().map(TranslationPlayback::handle),
                connection: connection.handle(),
                capture_stop: capture.stopper(),
            },
        ));

        info!(
            "Session: connected ({} -> {})",
            config.input_language, config.output_language
        );
        self.active = Some(ActiveSession {
            input_language: config.input_language,
            output_language: config.output_language,
            connection,
            capture,
            playback,
            segmenter,
            emitter,
            pump_task,
            loop_task,
        });
        Ok(())
    }

    /// Tear the session down from any state. Safe to call repeatedly and
    /// while disconnected; never fails.
    ///
    /// Pending translation text is flushed as one last final segment before
    /// resources go away, then callbacks for this attempt are suppressed
    /// for good.
    pub fn disconnect(&mut self) {
        let Some(mut active) = self.active.take() else {
            debug!("Session: disconnect ignored, nothing active");
            return;
        };

        if let Some(segment) = active.segmenter.lock().unwrap().flush_pending() {
            active.emitter.segment(segment);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        active.connection.close();
        active.capture.stop();
        if let Some(playback) = &active.playback {
            playback.stop();
        }
        active.pump_task.abort();
        active.loop_task.abort();

        info!("Session: disconnected");
    }

    /// Current connection state; `Disconnected` when no session is active.
    pub fn state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map(|active| active.connection.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Language pair of the active session, if any.
    pub fn languages(&self) -> Option<(&str, &str)> {
        self.active
            .as_ref()
            .map(|active| (active.input_language.as_str(), active.output_language.as_str()))
    }
}

impl Default for InterpreterSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterpreterSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Forward capture frames to the channel until the capture side closes.
async fn run_capture_pump(
    mut frame_rx: mpsc::UnboundedReceiver<Vec<f32>>,
    connection: ConnectionHandle,
) {
    while let Some(frame) = frame_rx.recv().await {
        connection.send_media(pcm::encode_frame(&frame));
    }
    debug!("Session: capture pump finished");
}

/// Dispatch transport events until the channel ends, then release the
/// session's resources from here so a dead channel never leaves the
/// microphone running.
async fn run_event_loop(mut events: mpsc::UnboundedReceiver<ConnectionEvent>, ctx: LoopContext) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Opened => debug!("Session: channel open"),
            ConnectionEvent::Message(message) => {
                let Some(content) = message.server_content else {
                    if message.setup_complete.is_some() {
                        debug!("Session: setup acknowledged");
                    }
                    continue;
                };

                if let (Some(playback), Some(turn)) = (&ctx.playback, &content.model_turn) {
                    for part in &turn.parts {
                        if let Some(inline) = &part.inline_data {
                            match pcm::decode_frame(&inline.data) {
                                Ok(samples) => playback
                                    .enqueue(samples, wire::pcm_sample_rate(&inline.mime_type)),
                                Err(e) => warn!("Session: skipping audio part: {}", e),
                            }
                        }
                    }
                }

                let batch = ctx.segmenter.lock().unwrap().apply(&content);
                for segment in batch.finalized {
                    ctx.emitter.segment(segment);
                }
                if let Some(preview) = batch.preview {
                    ctx.emitter.segment(preview);
                }
            }
            ConnectionEvent::Failed(reason) => {
                fail_session(&ctx, LiveError::ConnectionInterrupted(reason));
                break;
            }
            ConnectionEvent::Closed { code, reason } => {
                if code == CLOSE_NORMAL {
                    info!("Session: channel closed cleanly");
                    if let Some(segment) = ctx.segmenter.lock().unwrap().flush_pending() {
                        ctx.emitter.segment(segment);
                    }
                    release_resources(&ctx);
                } else {
                    let what = if reason.is_empty() {
                        format!("channel closed abnormally ({code})")
                    } else {
                        format!("channel closed abnormally ({code}): {reason}")
                    };
                    fail_session(&ctx, LiveError::ConnectionInterrupted(what));
                }
                break;
            }
        }
    }
    debug!("Session: event loop finished");
}

/// Mid-session failure: deliver pending text, report the error, then run
/// the same teardown a manual disconnect would.
fn fail_session(ctx: &LoopContext, error: LiveError) {
    warn!("Session: {}", error);
    if let Some(segment) = ctx.segmenter.lock().unwrap().flush_pending() {
        ctx.emitter.segment(segment);
    }
    ctx.emitter.error(error);
    release_resources(ctx);
}

fn release_resources(ctx: &LoopContext) {
    ctx.emitter.retire();
    ctx.connection.close();
    ctx.capture_stop.stop();
    if let Some(playback) = &ctx.playback {
        playback.stop();
    }
}
