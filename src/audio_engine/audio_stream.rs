//! Audio Stream Module
//!
//! This module handles CPAL device management including:
//! - Logger setup
//! - Output stream initialization driving the [`RtMixer`]
//! - The microphone backend used by the live input bridge
//! - Error handling for audio stream operations

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};

use crate::audio_engine::config::{EngineConfig, OutputFormat};
use crate::audio_engine::errors::{DeviceError, PermissionError};
use crate::audio_engine::live_input::{AcquiredInput, CaptureHandle, InputBackend, LiveFeed};
use crate::audio_engine::mixer::RtMixer;
use crate::messages::EngineEvent;

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Users can override via `RUST_LOG`, e.g. `RUST_LOG=debug` when troubleshooting.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// The default output device, opened and playing.
pub struct OutputStreamHandle {
    pub stream: Stream,
    pub format: OutputFormat,
}

/// Queries the default output device for the format the mix bus should run at.
pub fn default_output_format() -> Result<OutputFormat, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoOutputDevice)?;
    let config = device.default_output_config()?;

    Ok(OutputFormat::new(
        config.channels() as usize,
        config.sample_rate(),
    ))
}

/// Create the output stream and hand `mixer` to its callback.
///
/// `mixer` must have been built for `format.channels`. Stream errors are
/// logged and forwarded on `events`.
pub fn create_output_stream(
    mut mixer: RtMixer,
    format: OutputFormat,
    config: &EngineConfig,
    events: Sender<EngineEvent>,
) -> Result<OutputStreamHandle, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoOutputDevice)?;

    log::info!(
        "Starting AudioEngine... ({} ch@{} Hz)",
        format.channels,
        format.sample_rate
    );

    let stream_config = StreamConfig {
        channels: format.channels as u16,
        sample_rate: format.sample_rate,
        buffer_size: BufferSize::Fixed(config.buffer_frames),
    };

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            mixer.render(data);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            let _ = events.send(EngineEvent::StreamError {
                message: err.to_string(),
            });
        },
        None,
    )?;

    Ok(OutputStreamHandle { stream, format })
}

/// Start playing the audio stream
pub fn start_stream(stream: &Stream) -> Result<(), DeviceError> {
    stream.play()?;
    Ok(())
}

pub fn pause_stream(stream: &Stream) -> Result<(), DeviceError> {
    stream.pause()?;
    Ok(())
}

/// Microphone backend on the default input device.
///
/// `cpal` streams are tied to the thread that built them on some hosts, so
/// each acquisition gets a dedicated thread that builds, runs, and finally
/// drops the input stream.
#[derive(Debug, Default)]
pub struct CpalInput;

struct CpalCapture {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl CaptureHandle for CpalCapture {
    fn release(self: Box<Self>) {
        // Drop does the work.
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        // Dropping the sender wakes the stream thread.
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("Microphone thread panicked during shutdown");
            }
        }
    }
}

impl InputBackend for CpalInput {
    fn acquire(&mut self, feed: LiveFeed) -> Result<AcquiredInput, PermissionError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<usize, PermissionError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("namouradoxier-mic".to_string())
            .spawn(move || {
                let stream = match open_input_stream(feed) {
                    Ok((stream, channels)) => {
                        let _ = ready_tx.send(Ok(channels));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                // Hold the stream until the handle is released.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| PermissionError::Unavailable(e.to_string()))?;

        let outcome = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(PermissionError::Unavailable("microphone thread exited".into())));

        match outcome {
            Ok(channels) => Ok(AcquiredInput {
                handle: Box::new(CpalCapture {
                    stop_tx: Some(stop_tx),
                    join: Some(join),
                }),
                channels,
            }),
            Err(err) => {
                let _ = join.join();
                Err(err)
            }
        }
    }
}

fn open_input_stream(feed: LiveFeed) -> Result<(Stream, usize), PermissionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(PermissionError::NoDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| PermissionError::Unavailable(e.to_string()))?;
    let mut stream_config: StreamConfig = supported.into();
    stream_config.sample_rate = feed.sample_rate;
    let channels = stream_config.channels as usize;

    let mut producer = feed.producer;
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Samples that do not fit are dropped; the mixer catches up.
                for &sample in data {
                    if producer.push(sample).is_err() {
                        break;
                    }
                }
            },
            |err| log::error!("Microphone stream error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => PermissionError::Denied,
            other => PermissionError::Unavailable(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| PermissionError::Unavailable(e.to_string()))?;

    log::info!(
        "Microphone stream open ({} ch@{} Hz)",
        channels,
        stream_config.sample_rate
    );
    Ok((stream, channels))
}
