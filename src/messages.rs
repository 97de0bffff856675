//! Message definitions for communication between the control thread and the audio thread.
//!
//! This module defines the enums that serve as the wire format for messages passed through the
//! ring buffers between the control thread and the real-time audio thread, plus the
//! notifications the engine raises for the presentation layer.

use std::fmt;
use std::path::PathBuf;

use rtrb::Producer;

use crate::audio_engine::source::{Source, SourceId};

/// Message that is emitted from the control side.
pub enum ControlMessage {
    /// Used for testing message passing functionality.
    Ping(),

    /// Add a source to the bus sum.
    ///
    /// # Parameters
    /// * `id` - Identity used to detach the source later
    /// * `source` - The source, boxed on the control thread
    Attach { id: SourceId, source: Box<dyn Source> },

    /// Remove a source from the bus sum. Unknown ids are ignored.
    Detach { id: SourceId },

    /// Start copying the mixed signal into the capture tap.
    StartCapture(Producer<f32>),

    /// Stop copying the mixed signal and drop the capture tap.
    StopCapture(),
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping() => write!(f, "Ping"),
            Self::Attach { id, source } => write!(f, "Attach({id}, {})", source.kind()),
            Self::Detach { id } => write!(f, "Detach({id})"),
            Self::StartCapture(_) => write!(f, "StartCapture"),
            Self::StopCapture() => write!(f, "StopCapture"),
        }
    }
}

/// Why a source left the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireReason {
    /// The source reached its end (one-shot voices).
    Finished,
    /// The control side detached it.
    Detached,
}

/// Message that is emitted from the audio thread.
pub enum AudioMessage {
    /// Response to a Ping message.
    Pong(),

    /// A source left the bus. It is handed back so that its buffers are
    /// released on the control thread rather than in the audio callback.
    Retired {
        id: SourceId,
        reason: RetireReason,
        source: Box<dyn Source>,
    },

    /// The capture tap was full and `dropped` samples were lost.
    CaptureOverrun { dropped: usize },
}

impl fmt::Debug for AudioMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pong() => write!(f, "Pong"),
            Self::Retired { id, reason, source } => {
                write!(f, "Retired({id}, {reason:?}, {})", source.kind())
            }
            Self::CaptureOverrun { dropped } => write!(f, "CaptureOverrun({dropped})"),
        }
    }
}

/// Notifications for the presentation layer, drained with
/// [`AudioEngine::poll_event`](crate::audio_engine::AudioEngine::poll_event).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A clip could not be decoded. Engine state is unaffected.
    DecodeFailed { error: String },

    /// The microphone could not be enabled.
    MicUnavailable { reason: String },

    /// A finished recording was written out.
    RecordingDelivered {
        file_name: String,
        path: PathBuf,
        bytes: usize,
    },

    /// A finished recording could not be written out.
    DeliveryFailed { file_name: String, error: String },

    /// The output device reported an error.
    StreamError { message: String },

    /// Recorded audio was dropped because the capture tap was not drained in time.
    CaptureOverrun { dropped: usize },
}
