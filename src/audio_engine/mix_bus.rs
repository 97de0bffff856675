//! Control-side handle of the mix bus.
//!
//! [`mix_bus`] creates a connected pair: the [`MixBus`] stays on the control
//! thread, the [`RtMixer`] moves to whatever drives rendering (the device
//! callback, or the caller in offline mode). Attach and detach are messages on
//! a lock-free ring, so they apply in call order at the start of the next
//! rendered block.

use std::collections::HashSet;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_engine::errors::DeviceError;
use crate::audio_engine::mixer::RtMixer;
use crate::audio_engine::source::{Source, SourceId};
use crate::messages::{AudioMessage, ControlMessage, RetireReason};

/// What [`MixBus::collect`] found in the render thread's outbox.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BusReport {
    /// Sources that reached their end on their own.
    pub finished: Vec<SourceId>,
    /// Sources released after a detach.
    pub detached: Vec<SourceId>,
    /// Capture samples lost since the last collect.
    pub capture_dropped: usize,
    pub pongs: usize,
}

pub struct MixBus {
    channels: usize,
    commands: Producer<ControlMessage>,
    events: Consumer<AudioMessage>,
    attached: HashSet<SourceId>,
    next_id: u64,
}

/// Creates a mix bus with `channels` outputs and message rings of `queue_capacity`.
pub fn mix_bus(channels: usize, queue_capacity: usize) -> (MixBus, RtMixer) {
    let (commands_tx, commands_rx) = RingBuffer::new(queue_capacity);
    let (events_tx, events_rx) = RingBuffer::new(queue_capacity);

    let bus = MixBus {
        channels,
        commands: commands_tx,
        events: events_rx,
        attached: HashSet::new(),
        next_id: 0,
    };
    (bus, RtMixer::new(channels, commands_rx, events_tx))
}

impl MixBus {
    fn send(&mut self, message: ControlMessage, what: &'static str) -> Result<(), DeviceError> {
        if self.commands.is_abandoned() {
            return Err(DeviceError::Disconnected);
        }
        self.commands
            .push(message)
            .map_err(|_| DeviceError::QueueFull(what))
    }

    /// Connects `source` to the bus sum and returns its identity.
    pub fn attach(&mut self, source: Box<dyn Source>) -> Result<SourceId, DeviceError> {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        log::debug!("Attaching {} as {id}", source.kind());
        self.send(ControlMessage::Attach { id, source }, "Attach")?;
        self.attached.insert(id);
        Ok(id)
    }

    /// Disconnects a source. Detaching an unknown or already-finished source is a no-op.
    pub fn detach(&mut self, id: SourceId) -> Result<(), DeviceError> {
        if !self.attached.contains(&id) {
            return Ok(());
        }

        self.send(ControlMessage::Detach { id }, "Detach")?;
        self.attached.remove(&id);
        Ok(())
    }

    /// Arms the capture tap and returns the reading end.
    pub fn open_capture(&mut self, capacity: usize) -> Result<Consumer<f32>, DeviceError> {
        let (producer, consumer) = RingBuffer::new(capacity);
        self.send(ControlMessage::StartCapture(producer), "StartCapture")?;
        Ok(consumer)
    }

    pub fn close_capture(&mut self) -> Result<(), DeviceError> {
        self.send(ControlMessage::StopCapture(), "StopCapture")
    }

    pub fn ping(&mut self) -> Result<(), DeviceError> {
        self.send(ControlMessage::Ping(), "Ping")
    }

    /// Drains messages from the render thread.
    ///
    /// Retired sources are dropped here, off the audio thread.
    pub fn collect(&mut self) -> BusReport {
        let mut report = BusReport::default();

        while let Ok(message) = self.events.pop() {
            match message {
                AudioMessage::Pong() => report.pongs += 1,
                AudioMessage::Retired { id, reason, source } => {
                    log::debug!("Released {} {id} ({reason:?})", source.kind());
                    drop(source);
                    self.attached.remove(&id);
                    match reason {
                        RetireReason::Finished => report.finished.push(id),
                        RetireReason::Detached => report.detached.push(id),
                    }
                }
                AudioMessage::CaptureOverrun { dropped } => report.capture_dropped += dropped,
            }
        }

        report
    }

    pub fn is_attached(&self, id: SourceId) -> bool {
        self.attached.contains(&id)
    }

    /// Sources the control side believes are connected.
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::buffer::DecodedBuffer;
    use crate::audio_engine::voice::Voice;

    fn clip(frames: usize, value: f32) -> Box<Voice> {
        Box::new(Voice::one_shot(DecodedBuffer::new(
            1,
            44_100,
            vec![value; frames],
        )))
    }

    #[test]
    fn test_attach_assigns_unique_ids() {
        let (mut bus, _mixer) = mix_bus(1, 16);

        let a = bus.attach(clip(4, 0.1)).unwrap();
        let b = bus.attach(clip(4, 0.1)).unwrap();

        assert_ne!(a, b);
        assert_eq!(bus.attached_count(), 2);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let (mut bus, mut mixer) = mix_bus(1, 16);
        let id = bus.attach(Box::new(Voice::looping(DecodedBuffer::new(
            1,
            44_100,
            vec![0.2; 4],
        ))))
        .unwrap();

        bus.detach(id).unwrap();
        bus.detach(id).unwrap();
        mixer.process_messages();

        assert!(!bus.is_attached(id));
        assert_eq!(mixer.active_sources(), 0);
        let report = bus.collect();
        assert_eq!(report.detached, vec![id]);
    }

    #[test]
    fn test_collect_tracks_finished_sources() {
        let (mut bus, mut mixer) = mix_bus(1, 16);
        let id = bus.attach(clip(2, 0.5)).unwrap();

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        let report = bus.collect();

        assert_eq!(report.finished, vec![id]);
        assert_eq!(bus.attached_count(), 0);
        // Detaching after the voice ended on its own is harmless.
        bus.detach(id).unwrap();
    }

    #[test]
    fn test_ping_round_trip() {
        let (mut bus, mut mixer) = mix_bus(2, 16);
        bus.ping().unwrap();

        mixer.process_messages();

        assert_eq!(bus.collect().pongs, 1);
    }

    #[test]
    fn test_full_queue_is_a_device_error() {
        let (mut bus, _mixer) = mix_bus(1, 2);
        bus.ping().unwrap();
        bus.ping().unwrap();

        assert!(matches!(bus.ping(), Err(DeviceError::QueueFull("Ping"))));
    }

    #[test]
    fn test_dropped_renderer_is_disconnected() {
        let (mut bus, mixer) = mix_bus(1, 16);
        drop(mixer);

        assert!(matches!(
            bus.attach(clip(4, 0.1)),
            Err(DeviceError::Disconnected)
        ));
        assert_eq!(bus.attached_count(), 0);
    }

    #[test]
    fn test_capture_round_trip() {
        let (mut bus, mut mixer) = mix_bus(1, 16);
        let mut capture = bus.open_capture(16).unwrap();
        bus.attach(clip(4, 0.25)).unwrap();

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);

        assert_eq!(capture.slots(), 4);
        assert_eq!(capture.pop(), Ok(0.25));

        bus.close_capture().unwrap();
        mixer.process_messages();
        assert!(capture.is_abandoned());
    }
}
