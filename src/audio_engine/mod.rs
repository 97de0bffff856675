//! Audio Engine Module
//!
//! This module provides the soundboard's real-time mixing, looping, live
//! input and session recording. It is organized into sub-modules, each with a
//! specific responsibility:
//!
//! - [`audio_stream`]: CPAL output stream, microphone backend and logger setup
//! - [`config`]: Engine configuration and output format
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Audio-specific error types
//! - [`decoder`]: Clip decoding into [`DecodedBuffer`]s
//! - [`voice`] and [`voice_manager`]: One-shot and loop voices
//! - [`mix_bus`] and [`mixer`]: Control-side bus handle and real-time mixer
//! - [`live_input`]: Microphone routing into the mix bus
//! - [`capture`], [`recorder`] and [`delivery`]: Session recording
//!
//! The main [`AudioEngine`] struct orchestrates these components behind the
//! operations the presentation layer calls.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::audio_engine::audio_stream::{
    CpalInput, OutputStreamHandle, create_output_stream, default_output_format, pause_stream,
    setup_logger, start_stream,
};
use crate::audio_engine::capture::{CaptureEncoder, Container};
use crate::audio_engine::config::{EngineConfig, OutputFormat};
use crate::audio_engine::decoder::{ClipSource, DecodeTask, spawn_decode};
use crate::audio_engine::delivery::{Delivery, DirectoryDelivery};
use crate::audio_engine::errors::{DecodeError, DeviceError};
use crate::audio_engine::live_input::{InputBackend, LiveInputBridge, NoInput};
use crate::audio_engine::mix_bus::{BusReport, MixBus, mix_bus};
use crate::audio_engine::mixer::RtMixer;
use crate::audio_engine::recorder::{RecordingPayload, SessionRecorder};
use crate::audio_engine::voice_manager::VoiceManager;
use crate::messages::EngineEvent;
use crate::slots::SlotId;

pub use crate::audio_engine::buffer::DecodedBuffer;

pub mod audio_stream;
pub mod buffer;
pub mod capture;
pub mod channels;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod delivery;
pub mod errors;
pub mod live_input;
pub mod mix_bus;
pub mod mixer;
pub mod recorder;
pub mod resample;
pub mod source;
pub mod voice;
pub mod voice_manager;

enum Renderer {
    /// Rendering happens in the cpal callback.
    Device(OutputStreamHandle),
    /// The caller renders through [`AudioEngine::render_offline`].
    Offline(RtMixer),
    Closed,
}

/// One explicitly constructed engine per output device.
pub struct AudioEngine {
    config: EngineConfig,
    format: OutputFormat,
    bus: MixBus,
    renderer: Renderer,
    suspended: bool,
    voices: VoiceManager,
    live_input: LiveInputBridge,
    recorder: SessionRecorder,
    capture: Option<CaptureEncoder>,
    /// The capture tap stop could not be sent; retried on every poll.
    capture_close_pending: bool,
    delivery: Box<dyn Delivery>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
}

impl AudioEngine {
    /// Opens the default output device and starts rendering.
    pub fn start(config: EngineConfig) -> Result<Self, DeviceError> {
        setup_logger();

        let format = default_output_format()?;
        let (events_tx, events_rx) = mpsc::channel();
        let (bus, mixer) = mix_bus(format.channels, config.queue_capacity);

        let handle = create_output_stream(mixer, format, &config, events_tx.clone())?;
        start_stream(&handle.stream)?;

        Ok(Self::assemble(
            config,
            format,
            bus,
            Renderer::Device(handle),
            Box::new(CpalInput),
            events_tx,
            events_rx,
        ))
    }

    /// Builds an engine without a device, rendered by the caller.
    ///
    /// Runs at the configured preferred format and has no microphone until
    /// one is supplied with [`AudioEngine::with_input_backend`].
    pub fn offline(config: EngineConfig) -> Self {
        setup_logger();

        let format = config.preferred_format;
        let (events_tx, events_rx) = mpsc::channel();
        let (bus, mixer) = mix_bus(format.channels, config.queue_capacity);

        Self::assemble(
            config,
            format,
            bus,
            Renderer::Offline(mixer),
            Box::new(NoInput),
            events_tx,
            events_rx,
        )
    }

    fn assemble(
        config: EngineConfig,
        format: OutputFormat,
        bus: MixBus,
        renderer: Renderer,
        input: Box<dyn InputBackend>,
        events_tx: Sender<EngineEvent>,
        events_rx: Receiver<EngineEvent>,
    ) -> Self {
        let live_ring = format.samples_for(config.live_input_seconds);
        let recorder = SessionRecorder::new(config.product_name.clone(), Container::Wav);
        let delivery = Box::new(DirectoryDelivery::new(config.recordings_dir.clone()));

        log::info!(
            "AudioEngine ready ({} ch@{} Hz, recordings in {})",
            format.channels,
            format.sample_rate,
            config.recordings_dir.display()
        );

        Self {
            config,
            format,
            bus,
            renderer,
            suspended: false,
            voices: VoiceManager::new(),
            live_input: LiveInputBridge::new(input, live_ring),
            recorder,
            capture: None,
            capture_close_pending: false,
            delivery,
            events_tx,
            events_rx,
        }
    }

    /// Replaces the microphone backend.
    pub fn with_input_backend(mut self, backend: Box<dyn InputBackend>) -> Self {
        if let Err(e) = self.live_input.set_backend(&mut self.bus, backend) {
            log::error!("Failed to swap microphone backend: {e}");
        }
        self
    }

    /// Replaces where finished recordings are delivered.
    pub fn with_delivery(mut self, delivery: Box<dyn Delivery>) -> Self {
        self.delivery = delivery;
        self
    }

    /// Pauses rendering. The next playback call resumes it.
    pub fn suspend(&mut self) -> Result<(), DeviceError> {
        if self.suspended {
            return Ok(());
        }
        if let Renderer::Device(handle) = &self.renderer {
            pause_stream(&handle.stream)?;
        }
        self.suspended = true;
        log::debug!("AudioEngine suspended");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), DeviceError> {
        if !self.suspended {
            return Ok(());
        }
        if let Renderer::Device(handle) = &self.renderer {
            start_stream(&handle.stream)?;
        }
        self.suspended = false;
        log::debug!("AudioEngine resumed");
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Decodes a clip on a background thread, converted to the output format.
    pub fn decode_clip(&self, source: ClipSource) -> DecodeTask {
        spawn_decode(source, self.format)
    }

    /// Decodes a clip and waits for the result.
    ///
    /// Failures are returned and also raised as [`EngineEvent::DecodeFailed`].
    pub fn load_clip(&self, source: ClipSource) -> Result<DecodedBuffer, DecodeError> {
        let name = source.name.clone().unwrap_or_else(|| "clip".to_string());
        self.decode_clip(source).wait().inspect_err(|e| {
            log::warn!("Failed to decode {name}: {e}");
            self.emit(EngineEvent::DecodeFailed {
                error: e.to_string(),
            });
        })
    }

    /// Plays `buffer` once on a fresh voice. Overlapping triggers all sound.
    pub fn trigger_one_shot(&mut self, buffer: &DecodedBuffer) -> Result<(), DeviceError> {
        self.resume()?;
        self.voices.play_one_shot(&mut self.bus, buffer)
    }

    /// Loops `buffer` on `slot`, replacing whatever loops there.
    pub fn start_loop(&mut self, slot: SlotId, buffer: &DecodedBuffer) -> Result<(), DeviceError> {
        self.resume()?;
        self.voices.start_loop(&mut self.bus, slot, buffer)
    }

    /// Stops the loop on `slot`. Stopping an idle slot is a no-op.
    pub fn stop_loop(&mut self, slot: SlotId) -> Result<(), DeviceError> {
        self.voices.stop_loop(&mut self.bus, slot)?;
        Ok(())
    }

    /// Routes the microphone into the mix. Returns `false` when it is
    /// unavailable, after raising [`EngineEvent::MicUnavailable`].
    pub fn enable_mic(&mut self) -> bool {
        if let Err(e) = self.resume() {
            log::error!("Failed to resume output before enabling microphone: {e}");
            self.emit(EngineEvent::MicUnavailable {
                reason: e.to_string(),
            });
            return false;
        }

        match self.live_input.enable(&mut self.bus, self.format) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Microphone unavailable: {e}");
                self.emit(EngineEvent::MicUnavailable {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    pub fn disable_mic(&mut self) -> Result<(), DeviceError> {
        self.live_input.disable(&mut self.bus)
    }

    /// Starts capturing the mix.
    ///
    /// Starting while already recording discards the running session.
    pub fn start_recording(&mut self) -> Result<(), DeviceError> {
        self.resume()?;

        let capacity = self.format.samples_for(self.config.capture_seconds);
        let consumer = self.bus.open_capture(capacity)?;
        let encoder =
            match CaptureEncoder::new(consumer, self.format, self.config.fragment_frames) {
                Ok(encoder) => encoder,
                Err(e) => {
                    if let Err(close) = self.bus.close_capture() {
                        log::error!("Failed to close capture tap: {close}");
                    }
                    return Err(e.into());
                }
            };
        self.capture = Some(encoder);
        self.capture_close_pending = false;
        self.recorder.start();
        log::info!("Recording started");
        Ok(())
    }

    /// Stops capturing, then delivers and returns the recording.
    ///
    /// Returns `None` when not recording. Delivery failures are raised as
    /// [`EngineEvent::DeliveryFailed`]; the payload is still returned.
    pub fn stop_recording(&mut self) -> Option<RecordingPayload> {
        if !self.recorder.is_recording() {
            return None;
        }

        self.pump_capture();
        if let Err(e) = self.bus.close_capture() {
            // Keep draining the tap until the stop reaches the mixer.
            log::warn!("Failed to close capture tap, retrying on next poll: {e}");
            self.capture_close_pending = true;
        } else {
            self.capture = None;
        }

        let payload = self.recorder.stop(epoch_millis())?;
        match self.delivery.deliver(&payload) {
            Ok(path) => self.emit(EngineEvent::RecordingDelivered {
                file_name: payload.file_name.clone(),
                path,
                bytes: payload.len(),
            }),
            Err(e) => {
                log::error!("{e}");
                self.emit(EngineEvent::DeliveryFailed {
                    file_name: payload.file_name.clone(),
                    error: e.to_string(),
                });
            }
        }
        Some(payload)
    }

    /// Housekeeping to call periodically from the control thread.
    ///
    /// Releases retired voices and moves captured audio into the recorder.
    pub fn poll(&mut self) -> BusReport {
        let report = self.bus.collect();
        if report.capture_dropped > 0 {
            log::warn!(
                "Capture overrun: {} samples dropped",
                report.capture_dropped
            );
            self.emit(EngineEvent::CaptureOverrun {
                dropped: report.capture_dropped,
            });
        }
        if self.capture_close_pending && self.bus.close_capture().is_ok() {
            self.capture_close_pending = false;
            self.capture = None;
        }
        self.pump_capture();
        report
    }

    fn pump_capture(&mut self) {
        let Some(encoder) = self.capture.as_mut() else {
            return;
        };
        for fragment in encoder.drain() {
            self.recorder.push_fragment(fragment);
        }
    }

    /// Returns the next pending notification, if any.
    pub fn poll_event(&self) -> Option<EngineEvent> {
        self.events_rx.try_recv().ok()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Renders one interleaved block on an offline engine.
    ///
    /// Returns `false`, leaving `output` silent, on device engines and while
    /// suspended.
    pub fn render_offline(&mut self, output: &mut [f32]) -> bool {
        match &mut self.renderer {
            Renderer::Offline(mixer) if !self.suspended => {
                mixer.render(output);
                true
            }
            _ => {
                output.fill(0.0);
                false
            }
        }
    }

    /// Send a ping message to the render thread.
    pub fn ping(&mut self) -> Result<(), DeviceError> {
        self.bus.ping()
    }

    pub fn is_loop_playing(&self, slot: SlotId) -> bool {
        self.voices.is_looping(slot)
    }

    pub fn loop_buffer(&self, slot: SlotId) -> Option<&DecodedBuffer> {
        self.voices.loop_buffer(slot)
    }

    pub fn active_loop_count(&self) -> usize {
        self.voices.active_loops()
    }

    /// Sources on the bus, including one-shots not yet collected by [`AudioEngine::poll`].
    pub fn attached_source_count(&self) -> usize {
        self.bus.attached_count()
    }

    pub fn is_mic_enabled(&self) -> bool {
        self.live_input.is_enabled()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shut down the audio engine, releasing the microphone and output device.
    ///
    /// A running recording is delivered first.
    pub fn shut_down(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if matches!(self.renderer, Renderer::Closed) {
            return;
        }

        if let Err(e) = self.voices.stop_all(&mut self.bus) {
            log::error!("Failed to stop loops during shutdown: {e}");
        }
        if let Err(e) = self.live_input.disable(&mut self.bus) {
            log::error!("Failed to detach microphone during shutdown: {e}");
        }
        self.stop_recording();

        if let Renderer::Device(handle) = &self.renderer {
            if let Err(e) = pause_stream(&handle.stream) {
                log::warn!("Failed to pause output stream: {e}");
            }
        }
        self.renderer = Renderer::Closed;
        self.bus.collect();
        log::info!("AudioEngine shut down");
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
