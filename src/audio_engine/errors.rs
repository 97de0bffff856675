//! Audio-specific error types.

use thiserror::Error;

/// Errors that can occur while decoding an uploaded clip.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to read the byte source.
    #[error("failed to read clip: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not a supported or parseable audio format.
    #[error("failed to decode audio clip: {0}")]
    Unsupported(#[from] symphonia::core::errors::Error),

    /// Failed to create resampler.
    #[error("failed to create resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Failed to resample audio.
    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    /// Clip has no default track.
    #[error("audio clip has no default track")]
    NoDefaultTrack,

    /// Clip is missing sample rate information.
    #[error("audio clip is missing a sample rate")]
    MissingSampleRate,

    /// Clip is missing channel information.
    #[error("audio clip is missing channel information")]
    MissingChannels,

    /// Clip decoded to zero frames.
    #[error("audio clip contains no audio frames")]
    Empty,

    /// The decode worker went away before reporting a result.
    #[error("decode worker exited without a result")]
    WorkerLost,
}

/// Errors that can occur while acquiring the microphone.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Access was refused by the permission layer.
    #[error("microphone access denied")]
    Denied,

    /// There is no input device to capture from.
    #[error("no microphone found")]
    NoDevice,

    /// The input device exists but could not be opened.
    #[error("microphone unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the output device or the render side of the mix bus.
///
/// These are fatal for playback: no further audio output is possible until
/// the engine is rebuilt.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("no default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to create audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    /// The control ring is full; the render thread is not draining it.
    #[error("failed to send {0} - buffer may be full")]
    QueueFull(&'static str),

    /// The recording encoder could not be set up.
    #[error("failed to prepare recording: {0}")]
    Capture(#[from] hound::Error),

    /// The render side of the mix bus has been dropped.
    #[error("audio render thread is gone")]
    Disconnected,
}

/// Errors that can occur while handing a finished recording to the user.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to write recording {file_name}: {source}")]
    Write {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode recording {file_name}: {source}")]
    Encode {
        file_name: String,
        #[source]
        source: hound::Error,
    },
}
