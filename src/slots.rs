//! Pad board data model.
//!
//! The presentation layer owns the slot records shown to the user. The engine
//! only knows slots by [`SlotId`]; a loop slot's `is_playing` flag mirrors
//! what the engine reports after each start or stop.

use std::fmt;

use crate::audio_engine::buffer::DecodedBuffer;
use crate::audio_engine::constants::{NUM_LOOP_PADS, NUM_TRIGGER_PADS};
use crate::audio_engine::decoder::ClipSource;
use crate::audio_engine::errors::{DecodeError, DeviceError};
use crate::audio_engine::AudioEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRole {
    /// Fires a one-shot per press.
    Trigger,
    /// Toggles a looping voice.
    Loop,
}

/// Stable identity of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub role: SlotRole,
    pub index: usize,
}

impl SlotId {
    pub fn trigger(index: usize) -> Self {
        Self {
            role: SlotRole::Trigger,
            index,
        }
    }

    pub fn looping(index: usize) -> Self {
        Self {
            role: SlotRole::Loop,
            index,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            SlotRole::Trigger => write!(f, "trigger-{}", self.index),
            SlotRole::Loop => write!(f, "loop-{}", self.index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoundSlot {
    pub id: SlotId,
    pub name: String,
    /// Absent until a clip is loaded; never cleared afterwards.
    pub buffer: Option<DecodedBuffer>,
    /// Only meaningful for loop slots.
    pub is_playing: bool,
}

impl SoundSlot {
    fn new(id: SlotId, name: String) -> Self {
        Self {
            id,
            name,
            buffer: None,
            is_playing: false,
        }
    }
}

/// The soundboard's pads: trigger pads `S1..S9` and loop pads `L1..L3`.
#[derive(Debug, Clone)]
pub struct PadBoard {
    slots: Vec<SoundSlot>,
}

impl Default for PadBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl PadBoard {
    pub fn new() -> Self {
        let triggers = (0..NUM_TRIGGER_PADS)
            .map(|i| SoundSlot::new(SlotId::trigger(i), format!("S{}", i + 1)));
        let loops =
            (0..NUM_LOOP_PADS).map(|i| SoundSlot::new(SlotId::looping(i), format!("L{}", i + 1)));

        Self {
            slots: triggers.chain(loops).collect(),
        }
    }

    pub fn slots(&self) -> &[SoundSlot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&SoundSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut SoundSlot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    /// Decodes `source` and attaches it to the slot.
    ///
    /// On failure the slot keeps whatever it held before. A playing loop
    /// keeps its old clip until restarted.
    pub fn load_clip(
        &mut self,
        id: SlotId,
        source: ClipSource,
        engine: &AudioEngine,
    ) -> Result<(), DecodeError> {
        let Some(slot) = self.slot_mut(id) else {
            log::warn!("Ignoring clip for unknown slot {id}");
            return Ok(());
        };

        let buffer = engine.load_clip(source)?;
        log::info!(
            "Loaded {:.2}s clip into {} ({id})",
            buffer.duration_secs(),
            slot.name
        );
        slot.buffer = Some(buffer);
        Ok(())
    }

    /// Fires a trigger pad or toggles a loop pad. Empty pads do nothing.
    pub fn press(&mut self, id: SlotId, engine: &mut AudioEngine) -> Result<(), DeviceError> {
        match id.role {
            SlotRole::Loop if engine.is_loop_playing(id) => self.stop(id, engine),
            _ => self.play(id, engine),
        }
    }

    /// Fires a trigger pad, or (re)starts a loop pad from its beginning.
    pub fn play(&mut self, id: SlotId, engine: &mut AudioEngine) -> Result<(), DeviceError> {
        let Some(slot) = self.slot_mut(id) else {
            return Ok(());
        };
        let Some(buffer) = &slot.buffer else {
            log::debug!("{} has no clip", slot.name);
            return Ok(());
        };

        match id.role {
            SlotRole::Trigger => engine.trigger_one_shot(buffer),
            SlotRole::Loop => {
                engine.start_loop(id, buffer)?;
                slot.is_playing = engine.is_loop_playing(id);
                Ok(())
            }
        }
    }

    /// Stops a loop pad. Trigger pads have nothing to stop.
    pub fn stop(&mut self, id: SlotId, engine: &mut AudioEngine) -> Result<(), DeviceError> {
        if id.role != SlotRole::Loop {
            return Ok(());
        }
        let Some(slot) = self.slot_mut(id) else {
            return Ok(());
        };

        engine.stop_loop(id)?;
        slot.is_playing = engine.is_loop_playing(id);
        Ok(())
    }
}
