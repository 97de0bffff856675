//! Handing finished recordings to the user.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::{WavReader, WavWriter};

use crate::audio_engine::capture::Container;
use crate::audio_engine::errors::DeliveryError;
use crate::audio_engine::recorder::RecordingPayload;

/// Where finished recordings go.
pub trait Delivery {
    /// Delivers `payload` and returns where it ended up.
    fn deliver(&mut self, payload: &RecordingPayload) -> Result<PathBuf, DeliveryError>;
}

/// Writes recordings as files into a directory, the desktop analogue of a download.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Delivery for DirectoryDelivery {
    fn deliver(&mut self, payload: &RecordingPayload) -> Result<PathBuf, DeliveryError> {
        let path = self.dir.join(&payload.file_name);

        fs::create_dir_all(&self.dir).map_err(|source| DeliveryError::Write {
            file_name: payload.file_name.clone(),
            source,
        })?;
        let written = match payload.container {
            Container::Wav => write_wav(&path, &payload.bytes),
        };
        written.map_err(|source| DeliveryError::Encode {
            file_name: payload.file_name.clone(),
            source,
        })?;

        log::info!("Delivered recording to {}", path.display());
        Ok(path)
    }
}

/// Rewrites a streamed PCM16 recording as a complete WAV file at `path`.
fn write_wav(path: &Path, bytes: &[u8]) -> Result<(), hound::Error> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.channels == 0 {
        return Err(hound::Error::Unsupported);
    }
    let data_start = usize::try_from(reader.into_inner().position()).unwrap_or(bytes.len());
    let data = bytes.get(data_start..).unwrap_or_default();

    let mut writer = WavWriter::create(path, spec)?;
    let frame_bytes = usize::from(spec.channels) * 2;
    for frame in data.chunks_exact(frame_bytes) {
        for pcm in frame.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pcm[0], pcm[1]]))?;
        }
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::capture::wav_header;
    use crate::audio_engine::config::OutputFormat;

    fn payload(file_name: &str, bytes: Vec<u8>) -> RecordingPayload {
        RecordingPayload {
            file_name: file_name.to_string(),
            container: Container::Wav,
            bytes,
        }
    }

    #[test]
    fn test_delivery_writes_complete_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let mut delivery = DirectoryDelivery::new(tmp.path().join("sessions"));
        let mut bytes = wav_header(OutputFormat::new(1, 44_100)).unwrap();
        for sample in [100i16, -200, 300] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let path = delivery
            .deliver(&payload("namouradoxier-session-42.wav", bytes))
            .unwrap();

        assert_eq!(path, tmp.path().join("sessions/namouradoxier-session-42.wav"));
        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 44_100);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![100, -200, 300]);
    }

    #[test]
    fn test_delivery_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let mut delivery = DirectoryDelivery::new(&blocker);

        let result = delivery.deliver(&payload("namouradoxier-session-1.wav", vec![1, 2, 3]));

        assert!(matches!(result, Err(DeliveryError::Write { .. })));
    }

    #[test]
    fn test_delivery_rejects_garbage_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let mut delivery = DirectoryDelivery::new(tmp.path());

        let result = delivery.deliver(&payload("namouradoxier-session-2.wav", vec![7u8; 64]));

        assert!(matches!(result, Err(DeliveryError::Encode { .. })));
    }
}
