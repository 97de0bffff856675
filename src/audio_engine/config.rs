//! Engine configuration.

use std::path::PathBuf;

use crate::audio_engine::constants::{
    CAPTURE_RING_SECONDS, DEFAULT_BUFFER_FRAMES, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE,
    FRAGMENT_FRAMES, LIVE_INPUT_RING_SECONDS, MESSAGE_QUEUE_CAPACITY, PRODUCT_NAME,
};

/// Environment variable overriding where finished recordings are written.
pub const RECORDINGS_DIR_ENV: &str = "NAMOURADOXIER_RECORDINGS_DIR";

/// Channel count and sample rate of the mix bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub channels: usize,
    pub sample_rate: u32,
}

impl OutputFormat {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Number of interleaved samples covering `seconds` of audio.
    pub fn samples_for(&self, seconds: f32) -> usize {
        let frames = (self.sample_rate as f32 * seconds).ceil() as usize;
        frames.max(1) * self.channels.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Format of offline engines. Device engines use the device's default format.
    pub preferred_format: OutputFormat,

    /// Fixed device buffer size in frames.
    pub buffer_frames: u32,

    /// Capacity of the control and event message rings.
    pub queue_capacity: usize,

    /// Length of the microphone ring in seconds.
    pub live_input_seconds: f32,

    /// Length of the capture ring in seconds.
    pub capture_seconds: f32,

    /// Upper bound on frames per recorded fragment.
    pub fragment_frames: usize,

    /// Prefix of delivered recording filenames.
    pub product_name: String,

    /// Directory finished recordings are written to.
    pub recordings_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preferred_format: OutputFormat::new(DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE),
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            queue_capacity: MESSAGE_QUEUE_CAPACITY,
            live_input_seconds: LIVE_INPUT_RING_SECONDS,
            capture_seconds: CAPTURE_RING_SECONDS,
            fragment_frames: FRAGMENT_FRAMES,
            product_name: PRODUCT_NAME.to_string(),
            recordings_dir: PathBuf::from("."),
        }
    }
}

impl EngineConfig {
    /// Defaults, with the recordings directory taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(RECORDINGS_DIR_ENV) {
            if !dir.is_empty() {
                config.recordings_dir = PathBuf::from(dir);
            }
        }
        config
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    pub fn with_format(mut self, channels: usize, sample_rate: u32) -> Self {
        self.preferred_format = OutputFormat::new(channels, sample_rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.preferred_format, OutputFormat::new(2, 44_100));
        assert_eq!(config.buffer_frames, 512);
        assert_eq!(config.product_name, "namouradoxier");
    }

    #[test]
    fn test_samples_for_rounds_up_to_whole_frames() {
        let format = OutputFormat::new(2, 10);
        assert_eq!(format.samples_for(0.25), 6); // 3 frames
        assert_eq!(format.samples_for(0.0), 2); // never empty
    }

    #[test]
    fn test_builder_helpers() {
        let config = EngineConfig::default()
            .with_format(1, 48_000)
            .with_recordings_dir("/tmp/sessions");
        assert_eq!(config.preferred_format.channels, 1);
        assert_eq!(config.preferred_format.sample_rate, 48_000);
        assert_eq!(config.recordings_dir, PathBuf::from("/tmp/sessions"));
    }
}
