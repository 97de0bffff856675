//! Soundboard and looper audio engine.
//!
//! Clips are decoded into shared buffers, played as one-shots or per-slot
//! loops on a real-time mix bus together with an optional live microphone,
//! and the mix can be recorded into a session file.

pub mod audio_engine;
pub mod messages;
pub mod slots;

pub use audio_engine::AudioEngine;
pub use audio_engine::buffer::DecodedBuffer;
pub use audio_engine::config::{EngineConfig, OutputFormat};
pub use audio_engine::decoder::{ClipSource, DecodeTask};
pub use audio_engine::errors::{DecodeError, DeliveryError, DeviceError, PermissionError};
pub use audio_engine::recorder::RecordingPayload;
pub use messages::EngineEvent;
pub use slots::{PadBoard, SlotId, SlotRole, SoundSlot};
