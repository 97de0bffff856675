//! Clip decoding.
//!
//! Turns an uploaded byte source into a [`DecodedBuffer`] in the engine's
//! output format. Decoding has no side effects beyond producing the buffer:
//! attaching it to a slot or playing it is up to the caller.

use std::io::Cursor;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer, codecs::DecoderOptions,
    errors::Error as SymphoniaError, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::buffer::DecodedBuffer;
use crate::audio_engine::channels::map_channels;
use crate::audio_engine::config::OutputFormat;
use crate::audio_engine::errors::DecodeError;
use crate::audio_engine::resample::resample_interleaved;

/// Raw bytes of an uploaded clip, with the original file name when known.
#[derive(Debug, Clone)]
pub struct ClipSource {
    pub bytes: Vec<u8>,
    pub name: Option<String>,
}

impl ClipSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, name: None }
    }

    pub fn named(bytes: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            name: Some(name.into()),
        }
    }

    /// Reads a clip from disk, keeping the file name as a format hint.
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        Ok(Self { bytes, name })
    }

    fn extension(&self) -> Option<&str> {
        let name = self.name.as_deref()?;
        Path::new(name).extension().and_then(|e| e.to_str())
    }
}

/// Decodes a clip into a buffer matching `output`.
///
/// The byte source is consumed and dropped once decoding finishes.
///
/// # Errors
///
/// - The bytes are not a recognised audio container or codec
/// - The clip has no default track, rate, or channel layout
/// - The clip decodes to zero frames
pub fn decode_clip(source: ClipSource, output: OutputFormat) -> Result<DecodedBuffer, DecodeError> {
    let mut hint = Hint::new();
    if let Some(ext) = source.extension() {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(source.bytes)), Default::default());

    let detected = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = detected.format;

    let track = format.default_track().ok_or(DecodeError::NoDefaultTrack)?;
    let track_id = track.id;
    let file_rate_hz = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;
    let file_channels = track
        .codec_params
        .channels
        .ok_or(DecodeError::MissingChannels)?
        .count();

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut decoded: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(DecodeError::Unsupported(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {msg}");
                continue;
            }
            Err(err) => return Err(DecodeError::Unsupported(err)),
        };
        let spec = *audio_buf.spec();
        let duration = audio_buf.capacity() as u64;

        let mut sample_buf = SymphoniaSampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        decoded.extend_from_slice(sample_buf.samples());
    }

    if file_channels == 0 || decoded.len() < file_channels {
        return Err(DecodeError::Empty);
    }

    let resampled =
        resample_interleaved(decoded, file_channels, file_rate_hz, output.sample_rate)?;
    let mapped = map_channels(resampled, file_channels, output.channels);

    let buffer = DecodedBuffer::new(output.channels, output.sample_rate, mapped);
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }

    log::debug!(
        "Decoded clip: {} frames, {} ch@{} Hz (source {} ch@{} Hz)",
        buffer.frames(),
        output.channels,
        output.sample_rate,
        file_channels,
        file_rate_hz
    );

    Ok(buffer)
}

/// A decode running on a worker thread.
///
/// There is no abort: dropping the task simply discards the result when it
/// arrives.
#[derive(Debug)]
pub struct DecodeTask {
    rx: Receiver<Result<DecodedBuffer, DecodeError>>,
}

impl DecodeTask {
    /// Suspends the caller until the decode completes or fails.
    pub fn wait(self) -> Result<DecodedBuffer, DecodeError> {
        self.rx.recv().unwrap_or(Err(DecodeError::WorkerLost))
    }

    /// Returns the outcome if the decode has finished, without blocking.
    pub fn try_result(&self) -> Option<Result<DecodedBuffer, DecodeError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(DecodeError::WorkerLost)),
        }
    }
}

/// Starts decoding `source` on a background thread.
pub fn spawn_decode(source: ClipSource, output: OutputFormat) -> DecodeTask {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let _ = tx.send(decode_clip(source, output));
    });

    DecodeTask { rx }
}
