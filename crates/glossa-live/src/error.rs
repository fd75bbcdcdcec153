//! Error types for the live interpretation engine

use thiserror::Error;

/// Result type alias for live-session operations
pub type LiveResult<T> = Result<T, LiveError>;

/// Errors that can occur while running a live interpretation session
///
/// Connect-time failures are split by recovery path: `MicrophoneDenied`
/// points the caller at OS permissions, `Unauthorized` at credential
/// selection, and `ConnectFailed` at plain retry. `ConnectionInterrupted`
/// is only ever reported after a session was fully established.
#[derive(Error, Debug, Clone)]
pub enum LiveError {
    #[error("Microphone unavailable or access denied: {0}")]
    MicrophoneDenied(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Failed to connect: {0}")]
    ConnectFailed(String),

    #[error("Connection interrupted: {0}")]
    ConnectionInterrupted(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<cpal::DevicesError> for LiveError {
    fn from(err: cpal::DevicesError) -> Self {
        LiveError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for LiveError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        LiveError::AudioDevice(err.to_string())
    }
}
