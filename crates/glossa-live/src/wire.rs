//! **Wire Messages** — JSON frames exchanged with the translation service
//!
//! The service speaks camelCase JSON over a single persistent channel. The
//! client sends one `setup` frame after the handshake, then streams base64
//! PCM media frames. The server interleaves transcription deltas (the
//! caller's own words echoed back, and the translated text), translated
//! audio chunks, and turn-complete markers.

use serde::{Deserialize, Serialize};

/// Mime type for outbound microphone audio: 16 kHz mono PCM16.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Sample rate the service uses for translated audio when the mime type
/// does not say otherwise.
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24_000;

// -----------------------------------------------------------------------------
// Outbound frames
// -----------------------------------------------------------------------------

/// First client frame on a fresh channel: session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SetupFrame {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Full model resource name, e.g. `models/gemini-2.0-flash-live-001`.
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: SystemInstruction,
    /// Presence of these (empty) objects enables the two transcription
    /// streams; omitting them would silence the text side entirely.
    pub input_audio_transcription: TranscriptionConfig,
    pub output_audio_transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Serializes as `{}` on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionConfig {}

impl SetupFrame {
    /// Build the configuration frame. `model` may be a short name or a full
    /// `models/...` resource path.
    pub fn new(model: &str, voice: &str, system_instruction: &str) -> Self {
        SetupFrame {
            setup: Setup {
                model: format!("models/{}", model.trim_start_matches("models/")),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: voice.to_string(),
                            },
                        },
                    },
                },
                system_instruction: SystemInstruction {
                    parts: vec![TextPart {
                        text: system_instruction.to_string(),
                    }],
                },
                input_audio_transcription: TranscriptionConfig {},
                output_audio_transcription: TranscriptionConfig {},
            },
        }
    }
}

/// Streaming media frame carrying one capture buffer of base64 PCM16.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFrame {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media: MediaChunk,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

impl MediaFrame {
    pub fn audio(base64_pcm: String) -> Self {
        MediaFrame {
            realtime_input: RealtimeInput {
                media: MediaChunk {
                    mime_type: INPUT_MIME_TYPE.to_string(),
                    data: base64_pcm,
                },
            },
        }
    }
}

// -----------------------------------------------------------------------------
// Inbound frames
// -----------------------------------------------------------------------------

/// Any message the server can send. Unknown fields are ignored so protocol
/// additions do not break the session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<ServerContent>,
}

/// Acknowledgement of the setup frame; empty object on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// Echo of the caller's own speech, as incremental delta text.
    pub input_transcription: Option<TranscriptionDelta>,
    /// The translation the model is speaking, as incremental delta text.
    pub output_transcription: Option<TranscriptionDelta>,
    #[serde(default)]
    pub turn_complete: bool,
    /// Translated audio arrives as inline PCM parts.
    pub model_turn: Option<ModelTurn>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionDelta {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPart {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Extract the sample rate from a PCM mime type such as
/// `audio/pcm;rate=24000`. Falls back to the service default when the
/// parameter is missing, malformed, or zero.
pub fn pcm_sample_rate(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
        .filter(|&rate| rate > 0)
        .unwrap_or(DEFAULT_OUTPUT_SAMPLE_RATE)
}
