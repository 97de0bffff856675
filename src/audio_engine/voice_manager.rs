//! Voice bookkeeping on the control side.
//!
//! One-shot voices are fire-and-forget: they are attached to the bus and
//! forgotten, and the mixer retires them once they play out. Loop voices are
//! registered per slot so that each slot has at most one looping voice.

use std::collections::HashMap;

use crate::audio_engine::buffer::DecodedBuffer;
use crate::audio_engine::errors::DeviceError;
use crate::audio_engine::mix_bus::MixBus;
use crate::audio_engine::source::SourceId;
use crate::audio_engine::voice::Voice;
use crate::slots::SlotId;

struct LoopVoice {
    source: SourceId,
    buffer: DecodedBuffer,
}

#[derive(Default)]
pub struct VoiceManager {
    loops: HashMap<SlotId, LoopVoice>,
}

impl VoiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an independent voice that plays `buffer` once.
    ///
    /// Empty buffers are ignored: callers are expected to only trigger pads
    /// that hold a clip.
    pub fn play_one_shot(
        &mut self,
        bus: &mut MixBus,
        buffer: &DecodedBuffer,
    ) -> Result<(), DeviceError> {
        if buffer.is_empty() {
            log::warn!("Ignoring one-shot trigger without audio");
            return Ok(());
        }

        bus.attach(Box::new(Voice::one_shot(buffer.clone())))?;
        Ok(())
    }

    /// Starts looping `buffer` on `slot`, replacing any voice already looping there.
    ///
    /// The old voice's detach is queued ahead of the new attach, so the mixer
    /// never sums both.
    pub fn start_loop(
        &mut self,
        bus: &mut MixBus,
        slot: SlotId,
        buffer: &DecodedBuffer,
    ) -> Result<(), DeviceError> {
        if buffer.is_empty() {
            log::warn!("Ignoring loop start on {slot} without audio");
            return Ok(());
        }

        self.stop_loop(bus, slot)?;

        let source = bus.attach(Box::new(Voice::looping(buffer.clone())))?;
        self.loops.insert(
            slot,
            LoopVoice {
                source,
                buffer: buffer.clone(),
            },
        );
        log::debug!("Loop started on {slot}");
        Ok(())
    }

    /// Stops the loop on `slot`. Returns whether a loop was running.
    pub fn stop_loop(&mut self, bus: &mut MixBus, slot: SlotId) -> Result<bool, DeviceError> {
        let Some(existing) = self.loops.get(&slot) else {
            return Ok(false);
        };

        bus.detach(existing.source)?;
        self.loops.remove(&slot);
        log::debug!("Loop stopped on {slot}");
        Ok(true)
    }

    /// Stops every registered loop.
    pub fn stop_all(&mut self, bus: &mut MixBus) -> Result<(), DeviceError> {
        let slots: Vec<SlotId> = self.loops.keys().copied().collect();
        for slot in slots {
            self.stop_loop(bus, slot)?;
        }
        Ok(())
    }

    pub fn is_looping(&self, slot: SlotId) -> bool {
        self.loops.contains_key(&slot)
    }

    /// The buffer currently looping on `slot`.
    pub fn loop_buffer(&self, slot: SlotId) -> Option<&DecodedBuffer> {
        self.loops.get(&slot).map(|voice| &voice.buffer)
    }

    pub fn loop_source(&self, slot: SlotId) -> Option<SourceId> {
        self.loops.get(&slot).map(|voice| voice.source)
    }

    pub fn active_loops(&self) -> usize {
        self.loops.len()
    }
}
