//! **Audio Capture** — microphone input feeding the streaming session
//!
//! Opens the default input device at its native configuration and conforms
//! whatever arrives (any rate, any channel count, f32 or i16) to mono
//! 16 kHz f32 frames of a fixed size. The capture callback only pushes
//! frames into a channel; network backpressure can never stall the audio
//! thread. A dedicated thread owns the stream because cpal streams are
//! !Send on some platforms.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{LiveError, LiveResult};

/// Sample rate the translation service expects for inbound audio.
pub const SERVICE_SAMPLE_RATE: u32 = 16_000;

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Target sample rate in Hz (default: 16000, the service contract)
    pub sample_rate: u32,

    /// Frame size in samples (default: 1600 for 100ms at 16kHz)
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SERVICE_SAMPLE_RATE,
            chunk_size: 1600, // 100ms at 16kHz
        }
    }
}

/// Collects conformed samples and emits fixed-size frames.
struct FrameAccumulator {
    pending: Vec<f32>,
    chunk_size: usize,
    frame_tx: mpsc::UnboundedSender<Vec<f32>>,
}

impl FrameAccumulator {
    fn new(chunk_size: usize, frame_tx: mpsc::UnboundedSender<Vec<f32>>) -> Self {
        Self {
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            frame_tx,
        }
    }

    fn push(&mut self, samples: Vec<f32>) {
        self.pending.extend(samples);
        while self.pending.len() >= self.chunk_size {
            let frame: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            if self.frame_tx.send(frame).is_err() {
                // Receiver gone; the session is shutting down.
                self.pending.clear();
                return;
            }
        }
    }
}

/// Microphone capture bound to the default input device.
pub struct AudioCapture {
    config: AudioConfig,
    device: Device,
    native: SupportedStreamConfig,
}

impl AudioCapture {
    /// Acquire the default input device. Failing here means the microphone
    /// is missing or access was refused, which callers surface as a
    /// permission problem rather than a transport one.
    pub fn new(config: AudioConfig) -> LiveResult<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| {
                LiveError::MicrophoneDenied("no input device available".to_string())
            })?;

        info!(
            "Capture: using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let native = device.default_input_config()?;
        debug!("Capture: native input config: {:?}", native);

        Ok(Self {
            config,
            device,
            native,
        })
    }

    /// Build the input stream without starting it. Playback of the stream
    /// is deferred so the session can open its channel first.
    pub fn build_stream(self, frame_tx: mpsc::UnboundedSender<Vec<f32>>) -> LiveResult<Stream> {
        let native_rate = self.native.sample_rate().0;
        let channels = self.native.channels() as usize;
        let target_rate = self.config.sample_rate;
        let stream_config: StreamConfig = self.native.clone().into();
        let mut frames = FrameAccumulator::new(self.config.chunk_size, frame_tx);

        let built = match self.native.sample_format() {
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    frames.push(to_mono_resampled(data, channels, native_rate, target_rate));
                },
                move |err| warn!("Capture: stream error: {}", err),
                None,
            ),
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let normalized: Vec<f32> =
                        data.iter().map(|&s| s as f32 / 32768.0f32).collect();
                    frames.push(to_mono_resampled(
                        &normalized,
                        channels,
                        native_rate,
                        target_rate,
                    ));
                },
                move |err| warn!("Capture: stream error: {}", err),
                None,
            ),
            other => {
                return Err(LiveError::AudioDevice(format!(
                    "unsupported input sample format: {other:?}"
                )))
            }
        };

        built.map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                LiveError::MicrophoneDenied("input device became unavailable".to_string())
            }
            other => LiveError::AudioStream(other.to_string()),
        })
    }

    /// List available input devices
    pub fn list_input_devices() -> LiveResult<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices()?;

        let mut device_names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                device_names.push(name);
            }
        }

        Ok(device_names)
    }
}

/// Convert interleaved multi-channel audio at any rate to mono at the
/// target rate (nearest-sample resampling).
fn to_mono_resampled(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if channels == 0 || samples.is_empty() {
        return Vec::new();
    }
    let mono: Vec<f32> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    if from_rate == to_rate {
        return mono;
    }
    let out_len = (mono.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src = (i as u64 * from_rate as u64 / to_rate as u64) as usize;
        if src >= mono.len() {
            break;
        }
        out.push(mono[src]);
    }
    out
}

enum CaptureCommand {
    Start,
    Stop,
}

/// Owns the capture thread. The stream lives on that thread from build to
/// drop; `start()` begins pulling frames, `stop()` (or drop) releases the
/// microphone.
pub struct CaptureHandle {
    command_tx: std_mpsc::Sender<CaptureCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CaptureHandle {
    /// Start pulling frames from the microphone.
    pub fn start(&self) {
        let _ = self.command_tx.send(CaptureCommand::Start);
    }

    /// Cloneable stop control usable from async tasks.
    pub fn stopper(&self) -> CaptureStop {
        CaptureStop {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Stop capturing and release the microphone. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stop control for the capture thread, detached from the owning handle.
#[derive(Clone)]
pub struct CaptureStop {
    command_tx: std_mpsc::Sender<CaptureCommand>,
}

impl CaptureStop {
    pub fn stop(&self) {
        let _ = self.command_tx.send(CaptureCommand::Stop);
    }

    /// Stop control wired to nothing, for tests without a microphone.
    #[cfg(test)]
    pub(crate) fn dummy() -> Self {
        let (command_tx, _command_rx) = std_mpsc::channel();
        Self { command_tx }
    }
}

#[cfg(test)]
impl CaptureHandle {
    /// Handle over a thread that only waits for its stop command, for
    /// tests without a microphone.
    pub(crate) fn dummy() -> Self {
        let (command_tx, command_rx) = std_mpsc::channel::<CaptureCommand>();
        let thread = thread::spawn(move || loop {
            match command_rx.recv() {
                Ok(CaptureCommand::Start) => continue,
                Ok(CaptureCommand::Stop) | Err(_) => break,
            }
        });
        Self {
            command_tx,
            thread: Some(thread),
        }
    }
}

/// Acquire the microphone and park the stream on its own thread, idle.
/// Returns once the device is open (or the failure is known), so the
/// caller can sequence "microphone first, channel second".
pub fn spawn_capture(
    config: AudioConfig,
    frame_tx: mpsc::UnboundedSender<Vec<f32>>,
) -> LiveResult<CaptureHandle> {
    let (command_tx, command_rx) = std_mpsc::channel();
    let (ready_tx, ready_rx) = std_mpsc::channel();

    let thread = thread::spawn(move || capture_thread(config, frame_tx, command_rx, ready_tx));

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(CaptureHandle {
            command_tx,
            thread: Some(thread),
        }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(LiveError::AudioStream(
                "capture thread exited before reporting readiness".to_string(),
            ))
        }
    }
}

fn capture_thread(
    config: AudioConfig,
    frame_tx: mpsc::UnboundedSender<Vec<f32>>,
    command_rx: std_mpsc::Receiver<CaptureCommand>,
    ready_tx: std_mpsc::Sender<LiveResult<()>>,
) {
    let capture = match AudioCapture::new(config) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let stream = match capture.build_stream(frame_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    loop {
        match command_rx.recv() {
            Ok(CaptureCommand::Start) => {
                if let Err(e) = stream.play() {
                    warn!("Capture: stream start failed: {}", e);
                } else {
                    info!("Capture: microphone streaming");
                }
            }
            Ok(CaptureCommand::Stop) | Err(_) => break,
        }
    }

    drop(stream);
    debug!("Capture: thread finished, microphone released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_config_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.chunk_size, 1600);
    }

    #[test]
    fn stereo_downmix_averages_channels() {
        let interleaved = [0.2f32, 0.4, -1.0, 1.0];
        let mono = to_mono_resampled(&interleaved, 2, 16000, 16000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn resampling_halves_sample_count_from_32k() {
        let samples = vec![0.1f32; 3200];
        let mono = to_mono_resampled(&samples, 1, 32000, 16000);
        assert_eq!(mono.len(), 1600);
    }

    #[test]
    fn matching_rate_is_passthrough() {
        let samples = vec![0.5f32, -0.5];
        assert_eq!(to_mono_resampled(&samples, 1, 16000, 16000), samples);
    }

    #[test]
    fn accumulator_emits_fixed_size_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut frames = FrameAccumulator::new(4, tx);

        frames.push(vec![0.0; 10]);

        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert!(rx.try_recv().is_err());
        assert_eq!(frames.pending.len(), 2);
    }

    #[test]
    fn test_list_devices() {
        // This might fail in CI environments without audio devices
        let result = AudioCapture::list_input_devices();
        if let Ok(devices) = result {
            println!("Available input devices: {:?}", devices);
        }
    }
}
