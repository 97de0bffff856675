/// Maps audio samples from one channel configuration to another.
///
/// Every layout is accepted:
/// - Same channel count: no conversion needed
/// - Fewer file channels (e.g. mono → stereo): output channels repeat the file channels
/// - More file channels (e.g. stereo → mono, 5.1 → stereo): file channels fold onto
///   output channel `index % output_channels` and are averaged
pub fn map_channels(samples: Vec<f32>, file_channels: usize, output_channels: usize) -> Vec<f32> {
    if file_channels == output_channels || file_channels == 0 || output_channels == 0 {
        return samples;
    }

    let frames = samples.len() / file_channels;
    let mut out = Vec::with_capacity(frames * output_channels);
    for frame in samples.chunks_exact(file_channels) {
        for channel in 0..output_channels {
            out.push(frame_sample(frame, channel, output_channels));
        }
    }
    out
}

/// Reads one output channel from an interleaved frame of arbitrary width.
///
/// Same layout rules as [`map_channels`], without allocating, so it is safe on
/// the render thread.
#[inline]
pub fn frame_sample(frame: &[f32], out_channel: usize, out_channels: usize) -> f32 {
    let width = frame.len();
    if width == 0 || out_channels == 0 {
        return 0.0;
    }
    if width <= out_channels {
        return frame[out_channel % width];
    }

    let mut sum = 0.0;
    let mut count = 0;
    for sample in frame.iter().skip(out_channel).step_by(out_channels) {
        sum += *sample;
        count += 1;
    }
    if count == 0 { 0.0 } else { sum / count as f32 }
}
