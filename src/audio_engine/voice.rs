//! Playback voices.
//!
//! A [`Voice`] plays a [`DecodedBuffer`] into the mix bus, either once or as a
//! gapless loop. Voices hold their own playback position, so any number of
//! them can share a single buffer.

use crate::audio_engine::buffer::DecodedBuffer;
use crate::audio_engine::channels::frame_sample;
use crate::audio_engine::constants::UNITY_GAIN;
use crate::audio_engine::source::{Source, SourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Play to the end of the buffer, then finish.
    OneShot,
    /// Wrap to the start of the buffer indefinitely.
    Loop,
}

/// A single voice in the mixer, representing a playing clip.
#[derive(Debug)]
pub struct Voice {
    /// The buffer being played.
    pub buffer: DecodedBuffer,

    /// Current playback position in frames.
    pub frame_pos: usize,

    pub mode: PlaybackMode,
}

impl Voice {
    pub fn one_shot(buffer: DecodedBuffer) -> Self {
        Self::new(buffer, PlaybackMode::OneShot)
    }

    pub fn looping(buffer: DecodedBuffer) -> Self {
        Self::new(buffer, PlaybackMode::Loop)
    }

    fn new(buffer: DecodedBuffer, mode: PlaybackMode) -> Self {
        Self {
            buffer,
            frame_pos: 0,
            mode,
        }
    }
}

impl Source for Voice {
    fn render(&mut self, out: &mut [f32], channels: usize) -> SourceState {
        let buffer_channels = self.buffer.channels();
        let buffer_frames = self.buffer.frames();
        if channels == 0 || buffer_frames == 0 {
            return SourceState::Finished;
        }

        let samples = self.buffer.samples();
        for out_frame in out.chunks_exact_mut(channels) {
            if self.frame_pos >= buffer_frames {
                match self.mode {
                    PlaybackMode::OneShot => return SourceState::Finished,
                    PlaybackMode::Loop => self.frame_pos = 0,
                }
            }

            let base = self.frame_pos * buffer_channels;
            let frame = &samples[base..base + buffer_channels];
            for (channel, sample) in out_frame.iter_mut().enumerate() {
                *sample += frame_sample(frame, channel, channels) * UNITY_GAIN;
            }

            self.frame_pos += 1;
        }

        if self.mode == PlaybackMode::OneShot && self.frame_pos >= buffer_frames {
            SourceState::Finished
        } else {
            SourceState::Playing
        }
    }

    fn kind(&self) -> &'static str {
        match self.mode {
            PlaybackMode::OneShot => "one-shot voice",
            PlaybackMode::Loop => "loop voice",
        }
    }
}
