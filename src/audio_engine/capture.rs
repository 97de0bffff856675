//! Encoding of the capture tap into recorded fragments.
//!
//! Recordings are 16-bit PCM WAV streams. The first fragment is the WAV header
//! written by `hound` for an empty data chunk, followed by PCM frames; later
//! fragments carry PCM frames only. Concatenated, the fragments form the
//! recording, and delivery rewrites them through `hound` with the real chunk
//! lengths.

use std::io::Cursor;

use cpal::Sample;
use hound::{SampleFormat, WavSpec, WavWriter};
use rtrb::Consumer;

use crate::audio_engine::config::OutputFormat;

const BITS_PER_SAMPLE: u16 = 16;

/// Container of delivered recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
}

impl Container {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }
}

/// PCM16 WAV layout of the mix bus.
pub fn wav_spec(format: OutputFormat) -> WavSpec {
    WavSpec {
        channels: u16::try_from(format.channels).unwrap_or(u16::MAX),
        sample_rate: format.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// WAV header opening a recording in `format`.
pub fn wav_header(format: OutputFormat) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    WavWriter::new(&mut cursor, wav_spec(format))?.finalize()?;
    Ok(cursor.into_inner())
}

/// Drains the capture tap into PCM16 fragments.
pub struct CaptureEncoder {
    consumer: Consumer<f32>,
    channels: usize,
    max_frames: usize,
    header: Option<Vec<u8>>,
}

impl CaptureEncoder {
    pub fn new(
        consumer: Consumer<f32>,
        format: OutputFormat,
        max_frames: usize,
    ) -> Result<Self, hound::Error> {
        Ok(Self {
            consumer,
            channels: format.channels.max(1),
            max_frames: max_frames.max(1),
            header: Some(wav_header(format)?),
        })
    }

    /// Encodes up to `max_frames` whole frames of captured audio.
    ///
    /// The first call always yields the header. Later calls return an empty
    /// fragment when nothing new was captured.
    pub fn next_fragment(&mut self) -> Vec<u8> {
        let frames = (self.consumer.slots() / self.channels).min(self.max_frames);
        let samples = frames * self.channels;

        let mut fragment = self.header.take().unwrap_or_default();
        fragment.reserve(samples * 2);

        if let Ok(chunk) = self.consumer.read_chunk(samples) {
            let (first, second) = chunk.as_slices();
            for &sample in first.iter().chain(second) {
                fragment.extend_from_slice(&sample.to_sample::<i16>().to_le_bytes());
            }
            chunk.commit_all();
        }

        fragment
    }

    /// Encodes everything currently captured as a sequence of fragments.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let mut fragments = Vec::new();
        loop {
            let fragment = self.next_fragment();
            if fragment.is_empty() {
                break;
            }
            fragments.push(fragment);
        }
        fragments
    }
}
