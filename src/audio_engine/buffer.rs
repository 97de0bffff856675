//! Decoded clip storage shared between slots and voices.

use std::sync::Arc;

/// An immutable, interleaved, fixed-length sample buffer produced once per clip.
///
/// Cloning is cheap: every clone shares the same samples, so one buffer can
/// back any number of concurrent voices.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    channels: usize,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl DecodedBuffer {
    pub fn new(channels: usize, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels,
            sample_rate,
            samples: Arc::from(samples.into_boxed_slice()),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of whole frames in the buffer.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// True when both handles share the same decoded samples.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.samples, &b.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_frames_and_duration() {
        let buffer = DecodedBuffer::new(2, 4, vec![0.0; 16]);
        assert_eq!(buffer.frames(), 8);
        assert!((buffer.duration_secs() - 2.0).abs() < f32::EPSILON);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_zero_channel_buffer_is_empty() {
        let buffer = DecodedBuffer::new(0, 44_100, vec![0.5; 4]);
        assert_eq!(buffer.frames(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clones_share_samples() {
        let a = DecodedBuffer::new(1, 44_100, vec![0.1, 0.2]);
        let b = a.clone();
        let c = DecodedBuffer::new(1, 44_100, vec![0.1, 0.2]);

        assert!(DecodedBuffer::ptr_eq(&a, &b));
        assert!(!DecodedBuffer::ptr_eq(&a, &c));
    }
}
