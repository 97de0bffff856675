//! Sample-rate conversion for decoded clips.

use rubato::{FftFixedIn, Resampler};

use crate::audio_engine::constants::RESAMPLE_CHUNK_FRAMES;
use crate::audio_engine::errors::DecodeError;

/// Converts interleaved `samples` from `from_hz` to `to_hz`.
///
/// The result holds exactly `frames * to_hz / from_hz` frames: the
/// resampler's startup delay is trimmed and its tail flushed.
pub fn resample_interleaved(
    samples: Vec<f32>,
    channels: usize,
    from_hz: u32,
    to_hz: u32,
) -> Result<Vec<f32>, DecodeError> {
    if from_hz == to_hz || channels == 0 || samples.is_empty() {
        return Ok(samples);
    }

    let frames = samples.len() / channels;
    let mut planar: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in samples.chunks_exact(channels) {
        for (channel, sample) in frame.iter().enumerate() {
            planar[channel].push(*sample);
        }
    }

    let mut resampler = FftFixedIn::<f32>::new(
        from_hz as usize,
        to_hz as usize,
        RESAMPLE_CHUNK_FRAMES,
        2,
        channels,
    )?;

    let expected = ((frames as u64 * u64::from(to_hz)) / u64::from(from_hz)) as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(expected + delay + RESAMPLE_CHUNK_FRAMES))
        .collect();

    let mut pos = 0;
    while pos < frames {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(frames);
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..end]).collect();

        let block = if end - pos == needed {
            resampler.process(chunk.as_slice(), None)?
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)?
        };
        append_planar(&mut out, block);
        pos = end;
    }

    while out[0].len() < expected + delay {
        let block = resampler.process_partial::<Vec<f32>>(None, None)?;
        if block.first().is_none_or(|ch| ch.is_empty()) {
            break;
        }
        append_planar(&mut out, block);
    }

    let mut interleaved = Vec::with_capacity(expected * channels);
    for frame in delay..(delay + expected).min(out[0].len()) {
        for channel in &out {
            interleaved.push(channel[frame]);
        }
    }

    Ok(interleaved)
}

fn append_planar(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(block) {
        dst.extend_from_slice(&src);
    }
}
