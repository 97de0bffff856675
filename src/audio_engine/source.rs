//! Inputs of the mix bus.

use std::fmt;

/// Identity of a source attached to the mix bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Whether a source keeps contributing to the bus after a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Playing,
    Finished,
}

/// Something the mix bus can sum into its output.
///
/// `render` runs on the real-time audio thread and must not block or
/// allocate. Sources *add* into `out`, which holds interleaved frames of
/// `channels` samples; the bus zeroes it beforehand.
pub trait Source: Send {
    fn render(&mut self, out: &mut [f32], channels: usize) -> SourceState;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}
