//! Audio engine configuration constants and limits.

/// Number of one-shot trigger pads on the board.
pub const NUM_TRIGGER_PADS: usize = 9;

/// Number of looping pads on the board.
pub const NUM_LOOP_PADS: usize = 3;

/// Output channel count used until a device reports its own.
pub const DEFAULT_CHANNELS: usize = 2;

/// Output sample rate used until a device reports its own.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Fixed device buffer size in frames.
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Capacity of the control -> render and render -> control message rings.
pub const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// Seconds of microphone audio the live input ring can hold.
pub const LIVE_INPUT_RING_SECONDS: f32 = 0.5;

/// Seconds of mixed audio the capture ring can hold between polls.
pub const CAPTURE_RING_SECONDS: f32 = 4.0;

/// Upper bound on frames packed into one recorded fragment.
pub const FRAGMENT_FRAMES: usize = 4096;

/// Gain applied to every bus input. The bus only sums.
pub const UNITY_GAIN: f32 = 1.0;

/// Frames fed to the resampler per chunk.
pub const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Product name used in delivered recording filenames.
pub const PRODUCT_NAME: &str = "namouradoxier";
