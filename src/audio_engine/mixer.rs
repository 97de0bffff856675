//! Real-time mixer implementation.
//!
//! This module provides the [`RtMixer`] struct, the render side of the mix bus.
//! It owns every attached [`Source`](crate::audio_engine::source::Source), sums
//! them at unity gain, and writes the result to both taps: the monitor output
//! buffer handed in by the audio callback and, while recording, the capture ring.
//!
//! The control side talks to it exclusively through
//! [`MixBus`](crate::audio_engine::mix_bus::MixBus) messages.

use std::collections::VecDeque;

use cpal::Sample;
use rtrb::{Consumer, Producer};

use crate::audio_engine::source::{Source, SourceId, SourceState};
use crate::messages::{AudioMessage, ControlMessage, RetireReason};

/// Sources reserved up front so attaching rarely reallocates on the audio thread.
const SOURCE_CAPACITY: usize = 64;

struct AttachedSource {
    id: SourceId,
    source: Box<dyn Source>,
}

/// Real-time mixer that sums bus sources into the monitor and capture taps.
pub struct RtMixer {
    /// Number of output channels (1 for mono, 2 for stereo).
    channels: usize,

    /// Incoming control messages.
    commands: Consumer<ControlMessage>,

    /// Outgoing messages to the control side.
    events: Producer<AudioMessage>,

    /// Sources currently summed into the bus.
    sources: Vec<AttachedSource>,

    /// Per-source render scratch, resized to the callback block.
    scratch: Vec<f32>,

    /// Capture tap; `Some` while recording.
    capture: Option<Producer<f32>>,

    /// Retired sources waiting for room in the event ring.
    retired: VecDeque<(AttachedSource, RetireReason)>,
}

impl RtMixer {
    pub(crate) fn new(
        channels: usize,
        commands: Consumer<ControlMessage>,
        events: Producer<AudioMessage>,
    ) -> Self {
        Self {
            channels,
            commands,
            events,
            sources: Vec::with_capacity(SOURCE_CAPACITY),
            scratch: Vec::new(),
            capture: None,
            retired: VecDeque::with_capacity(SOURCE_CAPACITY),
        }
    }

    /// Applies every pending control message.
    pub fn process_messages(&mut self) {
        while let Ok(message) = self.commands.pop() {
            match message {
                ControlMessage::Ping() => {
                    let _ = self.events.push(AudioMessage::Pong());
                }
                ControlMessage::Attach { id, source } => {
                    self.detach(id);
                    self.sources.push(AttachedSource { id, source });
                }
                ControlMessage::Detach { id } => {
                    self.detach(id);
                }
                ControlMessage::StartCapture(producer) => {
                    self.capture = Some(producer);
                }
                ControlMessage::StopCapture() => {
                    self.capture = None;
                }
            }
        }
        self.flush_retired();
    }

    fn detach(&mut self, id: SourceId) {
        if let Some(index) = self.sources.iter().position(|s| s.id == id) {
            let attached = self.sources.remove(index);
            self.retire(attached, RetireReason::Detached);
        }
    }

    fn retire(&mut self, attached: AttachedSource, reason: RetireReason) {
        self.retired.push_back((attached, reason));
    }

    /// Hands retired sources back to the control side, oldest first, as far
    /// as the event ring has room. The rest wait for the next block.
    fn flush_retired(&mut self) {
        if self.events.is_abandoned() {
            // Nobody is left to release them.
            self.retired.clear();
            return;
        }

        while !self.events.is_full() {
            let Some((attached, reason)) = self.retired.pop_front() else {
                break;
            };
            let _ = self.events.push(AudioMessage::Retired {
                id: attached.id,
                reason,
                source: attached.source,
            });
        }
    }

    /// Processes pending messages, then renders one block.
    ///
    /// The output buffer must contain interleaved audio samples with
    /// `channels` per frame.
    pub fn render(&mut self, output: &mut [f32]) {
        self.process_messages();
        self.mix(output);
        self.flush_retired();
    }

    fn mix(&mut self, output: &mut [f32]) {
        output.fill(Sample::EQUILIBRIUM);

        if self.channels == 0 || output.len() < self.channels {
            return;
        }

        if self.scratch.len() != output.len() {
            self.scratch.resize(output.len(), 0.0);
        }

        let mut index = 0;
        while index < self.sources.len() {
            self.scratch.fill(0.0);
            let state = self.sources[index]
                .source
                .render(&mut self.scratch, self.channels);

            for (out, sample) in output.iter_mut().zip(&self.scratch) {
                *out += *sample;
            }

            if state == SourceState::Finished {
                let attached = self.sources.remove(index);
                self.retire(attached, RetireReason::Finished);
            } else {
                index += 1;
            }
        }

        self.write_capture(output);
    }

    fn write_capture(&mut self, output: &[f32]) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };

        let mut dropped = 0;
        for &sample in output {
            if capture.push(sample).is_err() {
                dropped += 1;
            }
        }

        if dropped > 0 {
            let _ = self.events.push(AudioMessage::CaptureOverrun { dropped });
        }
    }

    /// Gets the number of channels configured for this mixer.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of sources currently summed into the bus.
    pub fn active_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Retired sources not yet handed back to the control side.
    pub fn pending_retirements(&self) -> usize {
        self.retired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::buffer::DecodedBuffer;
    use crate::audio_engine::voice::Voice;
    use rtrb::RingBuffer;

    struct Harness {
        mixer: RtMixer,
        commands: Producer<ControlMessage>,
        events: Consumer<AudioMessage>,
    }

    fn harness(channels: usize) -> Harness {
        let (commands, commands_rx) = RingBuffer::new(64);
        let (events_tx, events) = RingBuffer::new(64);
        Harness {
            mixer: RtMixer::new(channels, commands_rx, events_tx),
            commands,
            events,
        }
    }

    fn constant(channels: usize, frames: usize, value: f32) -> DecodedBuffer {
        DecodedBuffer::new(channels, 44_100, vec![value; channels * frames])
    }

    fn attach(h: &mut Harness, id: u64, voice: Voice) {
        h.commands
            .push(ControlMessage::Attach {
                id: SourceId(id),
                source: Box::new(voice),
            })
            .unwrap();
    }

    #[test]
    fn test_mixer_creation() {
        let h = harness(2);
        assert_eq!(h.mixer.channels(), 2);
        assert_eq!(h.mixer.active_sources(), 0);
    }

    #[test]
    fn test_ping_pong() {
        let mut h = harness(2);
        h.commands.push(ControlMessage::Ping()).unwrap();

        h.mixer.process_messages();

        assert!(matches!(h.events.pop(), Ok(AudioMessage::Pong())));
    }

    #[test]
    fn test_render_silence() {
        let mut h = harness(2);
        let mut output = vec![1.0; 200];

        h.mixer.render(&mut output);

        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_multiple_voices_mixing() {
        let mut h = harness(2);
        attach(&mut h, 1, Voice::looping(constant(2, 10, 0.3)));
        attach(&mut h, 2, Voice::looping(constant(2, 10, 0.2)));

        let mut output = vec![0.0; 20];
        h.mixer.render(&mut output);

        assert!(output.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_detach_removes_only_that_source() {
        let mut h = harness(1);
        attach(&mut h, 1, Voice::looping(constant(1, 10, 0.3)));
        attach(&mut h, 2, Voice::looping(constant(1, 10, 0.2)));
        h.commands
            .push(ControlMessage::Detach { id: SourceId(1) })
            .unwrap();

        let mut output = vec![0.0; 8];
        h.mixer.render(&mut output);

        assert_eq!(h.mixer.active_sources(), 1);
        assert!(output.iter().all(|&s| (s - 0.2).abs() < 1e-6));
        assert!(matches!(
            h.events.pop(),
            Ok(AudioMessage::Retired {
                id: SourceId(1),
                reason: RetireReason::Detached,
                ..
            })
        ));
    }

    #[test]
    fn test_detach_unknown_id_is_noop() {
        let mut h = harness(1);
        attach(&mut h, 1, Voice::looping(constant(1, 10, 0.3)));
        h.commands
            .push(ControlMessage::Detach { id: SourceId(99) })
            .unwrap();

        h.mixer.process_messages();

        assert_eq!(h.mixer.active_sources(), 1);
        assert!(h.events.pop().is_err());
    }

    #[test]
    fn test_reattach_same_id_replaces() {
        let mut h = harness(1);
        attach(&mut h, 7, Voice::looping(constant(1, 10, 0.3)));
        attach(&mut h, 7, Voice::looping(constant(1, 10, 0.1)));

        let mut output = vec![0.0; 4];
        h.mixer.render(&mut output);

        assert_eq!(h.mixer.active_sources(), 1);
        assert!(output.iter().all(|&s| (s - 0.1).abs() < 1e-6));
    }

    #[test]
    fn test_finished_one_shot_is_retired() {
        let mut h = harness(1);
        attach(&mut h, 3, Voice::one_shot(constant(1, 5, 0.5)));

        let mut output = vec![0.0; 8];
        h.mixer.render(&mut output);

        assert_eq!(h.mixer.active_sources(), 0);
        assert!(output[..5].iter().all(|&s| s == 0.5));
        assert!(output[5..].iter().all(|&s| s == 0.0));
        assert!(matches!(
            h.events.pop(),
            Ok(AudioMessage::Retired {
                id: SourceId(3),
                reason: RetireReason::Finished,
                ..
            })
        ));
    }

    #[test]
    fn test_retirements_wait_for_room_in_event_ring() {
        let (mut commands, commands_rx) = RingBuffer::new(16);
        let (events_tx, mut events) = RingBuffer::new(2);
        let mut mixer = RtMixer::new(1, commands_rx, events_tx);
        for id in 0..5 {
            commands
                .push(ControlMessage::Attach {
                    id: SourceId(id),
                    source: Box::new(Voice::one_shot(constant(1, 2, 0.1))),
                })
                .unwrap();
        }

        let mut output = vec![0.0; 4];
        mixer.render(&mut output);
        assert_eq!(mixer.pending_retirements(), 3);

        let mut retired = Vec::new();
        while mixer.pending_retirements() > 0 || !events.is_empty() {
            while let Ok(AudioMessage::Retired { id, .. }) = events.pop() {
                retired.push(id.0);
            }
            mixer.render(&mut output);
        }

        assert_eq!(retired, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_render_loop_sample() {
        let mut h = harness(1);
        attach(&mut h, 1, Voice::looping(constant(1, 5, 0.5)));

        let mut output = vec![0.0; 20];
        h.mixer.render(&mut output);

        assert!(output.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_capture_tap_matches_monitor() {
        let mut h = harness(2);
        let (capture_tx, mut capture_rx) = RingBuffer::new(64);
        h.commands
            .push(ControlMessage::StartCapture(capture_tx))
            .unwrap();
        attach(&mut h, 1, Voice::looping(constant(2, 4, 0.25)));

        let mut output = vec![0.0; 16];
        h.mixer.render(&mut output);

        let mut captured = Vec::new();
        while let Ok(sample) = capture_rx.pop() {
            captured.push(sample);
        }
        assert_eq!(captured, output);
    }

    #[test]
    fn test_stop_capture_releases_tap() {
        let mut h = harness(1);
        let (capture_tx, capture_rx) = RingBuffer::new(8);
        h.commands
            .push(ControlMessage::StartCapture(capture_tx))
            .unwrap();
        h.mixer.process_messages();
        assert!(h.mixer.is_capturing());

        h.commands.push(ControlMessage::StopCapture()).unwrap();
        h.mixer.process_messages();

        assert!(!h.mixer.is_capturing());
        assert!(capture_rx.is_abandoned());
    }

    #[test]
    fn test_capture_overrun_is_reported() {
        let mut h = harness(1);
        let (capture_tx, _capture_rx) = RingBuffer::new(4);
        h.commands
            .push(ControlMessage::StartCapture(capture_tx))
            .unwrap();
        attach(&mut h, 1, Voice::looping(constant(1, 4, 0.1)));

        let mut output = vec![0.0; 10];
        h.mixer.render(&mut output);

        assert!(matches!(
            h.events.pop(),
            Ok(AudioMessage::CaptureOverrun { dropped: 6 })
        ));
    }
}
