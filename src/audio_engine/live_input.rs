//! Live microphone input.
//!
//! The [`LiveInputBridge`] owns the microphone while enabled: a capture handle
//! from an [`InputBackend`] feeding a lock-free ring, and a [`LiveSource`]
//! attached to the mix bus that drains that ring at unity gain. Disabling
//! detaches the source and releases the handle, which releases the device.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_engine::channels::frame_sample;
use crate::audio_engine::config::OutputFormat;
use crate::audio_engine::constants::UNITY_GAIN;
use crate::audio_engine::errors::{DeviceError, PermissionError};
use crate::audio_engine::mix_bus::MixBus;
use crate::audio_engine::source::{Source, SourceId, SourceState};

/// Largest input frame the live source reads in one go.
const MAX_INPUT_CHANNELS: usize = 32;

/// The writing end of the live input ring, handed to an [`InputBackend`].
pub struct LiveFeed {
    pub producer: Producer<f32>,
    /// Rate the mix bus runs at; backends capture at this rate.
    pub sample_rate: u32,
}

/// A held capture device. Dropping or releasing it stops every hardware track.
pub trait CaptureHandle: Send {
    fn release(self: Box<Self>);
}

/// A successfully opened microphone.
pub struct AcquiredInput {
    pub handle: Box<dyn CaptureHandle>,
    /// Interleaved channels the backend writes into the feed.
    pub channels: usize,
}

/// Access to a microphone.
///
/// `acquire` suspends the caller until the permission layer answers. It must
/// always answer: denial or failure is reported as a [`PermissionError`].
pub trait InputBackend {
    fn acquire(&mut self, feed: LiveFeed) -> Result<AcquiredInput, PermissionError>;
}

/// Backend for engines without a capture device.
#[derive(Debug, Default)]
pub struct NoInput;

impl InputBackend for NoInput {
    fn acquire(&mut self, _feed: LiveFeed) -> Result<AcquiredInput, PermissionError> {
        Err(PermissionError::NoDevice)
    }
}

/// Bus source reading microphone samples from the live input ring.
pub struct LiveSource {
    consumer: Consumer<f32>,
    input_channels: usize,
}

impl LiveSource {
    pub fn new(consumer: Consumer<f32>, input_channels: usize) -> Self {
        Self {
            consumer,
            input_channels: input_channels.clamp(1, MAX_INPUT_CHANNELS),
        }
    }
}

impl Source for LiveSource {
    fn render(&mut self, out: &mut [f32], channels: usize) -> SourceState {
        if channels == 0 {
            return SourceState::Playing;
        }

        let mut frame = [0.0f32; MAX_INPUT_CHANNELS];
        let frame = &mut frame[..self.input_channels];

        for out_frame in out.chunks_exact_mut(channels) {
            if self.consumer.slots() < self.input_channels {
                // Underrun: the rest of the block stays silent.
                break;
            }
            for sample in frame.iter_mut() {
                *sample = self.consumer.pop().unwrap_or(0.0);
            }
            for (channel, sample) in out_frame.iter_mut().enumerate() {
                *sample += frame_sample(frame, channel, channels) * UNITY_GAIN;
            }
        }

        // The live input never ends on its own; the bridge detaches it.
        SourceState::Playing
    }

    fn kind(&self) -> &'static str {
        "live input"
    }
}

struct ActiveInput {
    handle: Box<dyn CaptureHandle>,
    source: SourceId,
}

/// Microphone state machine: `disabled --enable--> enabled --disable--> disabled`.
pub struct LiveInputBridge {
    backend: Box<dyn InputBackend>,
    ring_capacity: usize,
    active: Option<ActiveInput>,
}

impl LiveInputBridge {
    pub fn new(backend: Box<dyn InputBackend>, ring_capacity: usize) -> Self {
        Self {
            backend,
            ring_capacity: ring_capacity.max(MAX_INPUT_CHANNELS),
            active: None,
        }
    }

    /// Replaces the backend. An enabled microphone is released first.
    pub fn set_backend(
        &mut self,
        bus: &mut MixBus,
        backend: Box<dyn InputBackend>,
    ) -> Result<(), DeviceError> {
        self.disable(bus)?;
        self.backend = backend;
        Ok(())
    }

    /// Acquires the microphone and routes it into the mix bus.
    ///
    /// Calling this while enabled is a no-op, so a second hardware stream is
    /// never opened.
    pub fn enable(&mut self, bus: &mut MixBus, format: OutputFormat) -> Result<(), PermissionError> {
        if self.active.is_some() {
            log::debug!("Microphone already enabled");
            return Ok(());
        }

        let (producer, consumer) = RingBuffer::new(self.ring_capacity);
        let acquired = self.backend.acquire(LiveFeed {
            producer,
            sample_rate: format.sample_rate,
        })?;

        if acquired.channels == 0 || acquired.channels > MAX_INPUT_CHANNELS {
            let channels = acquired.channels;
            acquired.handle.release();
            return Err(PermissionError::Unavailable(format!(
                "microphone has {channels} channels, supported are 1 to {MAX_INPUT_CHANNELS}"
            )));
        }

        let source = LiveSource::new(consumer, acquired.channels);
        let source = match bus.attach(Box::new(source)) {
            Ok(id) => id,
            Err(err) => {
                acquired.handle.release();
                return Err(PermissionError::Unavailable(format!(
                    "could not route microphone into the mix: {err}"
                )));
            }
        };

        log::info!("Microphone enabled ({} ch)", acquired.channels);
        self.active = Some(ActiveInput {
            handle: acquired.handle,
            source,
        });
        Ok(())
    }

    /// Detaches the microphone and releases the device. No-op when disabled.
    ///
    /// The device is released even when the detach message cannot be sent.
    pub fn disable(&mut self, bus: &mut MixBus) -> Result<(), DeviceError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        let detached = bus.detach(active.source);
        active.handle.release();
        log::info!("Microphone disabled");
        detached
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for LiveInputBridge {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.release();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio_engine::mix_bus::mix_bus;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test backend counting how many capture handles are alive.
    pub(crate) struct FakeInput {
        pub live: Arc<AtomicUsize>,
        pub acquired: Arc<AtomicUsize>,
        pub deny: bool,
        pub channels: usize,
        /// Samples written into the feed on acquisition.
        pub preload: Vec<f32>,
    }

    impl FakeInput {
        pub(crate) fn new() -> Self {
            Self {
                live: Arc::new(AtomicUsize::new(0)),
                acquired: Arc::new(AtomicUsize::new(0)),
                deny: false,
                channels: 1,
                preload: Vec::new(),
            }
        }
    }

    struct FakeHandle {
        live: Arc<AtomicUsize>,
        _producer: Producer<f32>,
    }

    impl CaptureHandle for FakeHandle {
        fn release(self: Box<Self>) {}
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl InputBackend for FakeInput {
        fn acquire(&mut self, mut feed: LiveFeed) -> Result<AcquiredInput, PermissionError> {
            if self.deny {
                return Err(PermissionError::Denied);
            }
            for &sample in &self.preload {
                let _ = feed.producer.push(sample);
            }
            self.live.fetch_add(1, Ordering::SeqCst);
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(AcquiredInput {
                handle: Box::new(FakeHandle {
                    live: self.live.clone(),
                    _producer: feed.producer,
                }),
                channels: self.channels,
            })
        }
    }

    fn format() -> OutputFormat {
        OutputFormat::new(2, 44_100)
    }

    #[test]
    fn test_enable_disable_cycles_hold_one_stream() {
        let (mut bus, mut mixer) = mix_bus(2, 64);
        let backend = FakeInput::new();
        let live = backend.live.clone();
        let acquired = backend.acquired.clone();
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);

        for _ in 0..2 {
            bridge.enable(&mut bus, format()).unwrap();
            assert_eq!(live.load(Ordering::SeqCst), 1);
            mixer.process_messages();
            assert_eq!(mixer.active_sources(), 1);

            bridge.disable(&mut bus).unwrap();
            assert_eq!(live.load(Ordering::SeqCst), 0);
            mixer.process_messages();
            assert_eq!(mixer.active_sources(), 0);
        }

        assert_eq!(acquired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_enable_twice_does_not_leak() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let backend = FakeInput::new();
        let live = backend.live.clone();
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);

        bridge.enable(&mut bus, format()).unwrap();
        bridge.enable(&mut bus, format()).unwrap();

        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(bus.attached_count(), 1);
    }

    #[test]
    fn test_denied_stays_disabled() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let mut backend = FakeInput::new();
        backend.deny = true;
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);

        let result = bridge.enable(&mut bus, format());

        assert_eq!(result, Err(PermissionError::Denied));
        assert!(!bridge.is_enabled());
        assert_eq!(bus.attached_count(), 0);
    }

    #[test]
    fn test_wide_input_device_is_rejected() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let mut backend = FakeInput::new();
        backend.channels = MAX_INPUT_CHANNELS + 1;
        let live = backend.live.clone();
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);

        let result = bridge.enable(&mut bus, format());

        assert!(matches!(result, Err(PermissionError::Unavailable(_))));
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!bridge.is_enabled());
        assert_eq!(bus.attached_count(), 0);
    }

    #[test]
    fn test_no_input_backend() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let mut bridge = LiveInputBridge::new(Box::new(NoInput), 256);

        assert_eq!(
            bridge.enable(&mut bus, format()),
            Err(PermissionError::NoDevice)
        );
    }

    #[test]
    fn test_disable_when_disabled_is_noop() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let mut bridge = LiveInputBridge::new(Box::new(FakeInput::new()), 256);

        bridge.disable(&mut bus).unwrap();
        bridge.disable(&mut bus).unwrap();
        assert!(!bridge.is_enabled());
    }

    #[test]
    fn test_attach_failure_releases_device() {
        let (mut bus, mixer) = mix_bus(2, 64);
        drop(mixer);
        let backend = FakeInput::new();
        let live = backend.live.clone();
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);

        let result = bridge.enable(&mut bus, format());

        assert!(matches!(result, Err(PermissionError::Unavailable(_))));
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!bridge.is_enabled());
    }

    #[test]
    fn test_drop_releases_device() {
        let (mut bus, _mixer) = mix_bus(2, 64);
        let backend = FakeInput::new();
        let live = backend.live.clone();
        let mut bridge = LiveInputBridge::new(Box::new(backend), 256);
        bridge.enable(&mut bus, format()).unwrap();

        drop(bridge);

        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_source_mono_to_stereo() {
        let (mut producer, consumer) = RingBuffer::new(8);
        for s in [0.1, 0.2, 0.3] {
            producer.push(s).unwrap();
        }
        let mut source = LiveSource::new(consumer, 1);
        let mut out = vec![0.0; 8];

        assert_eq!(source.render(&mut out, 2), SourceState::Playing);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_live_source_waits_for_whole_frames() {
        let (mut producer, consumer) = RingBuffer::new(8);
        for s in [0.5, -0.5, 0.25] {
            producer.push(s).unwrap();
        }
        let mut source = LiveSource::new(consumer, 2);
        let mut out = vec![0.0; 4];

        source.render(&mut out, 2);

        assert_eq!(out, vec![0.5, -0.5, 0.0, 0.0]);
    }
}
