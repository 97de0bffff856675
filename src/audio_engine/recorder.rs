//! Session recording.
//!
//! The [`SessionRecorder`] collects encoded fragments of the mix bus capture
//! tap while recording and, on stop, concatenates them into one payload.

use crate::audio_engine::capture::Container;

/// A finished recording, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPayload {
    pub file_name: String,
    pub container: Container,
    pub bytes: Vec<u8>,
}

impl RecordingPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `<product>-session-<epoch-millis>.<ext>`
pub fn session_file_name(product: &str, epoch_millis: u64, container: Container) -> String {
    format!("{product}-session-{epoch_millis}.{}", container.extension())
}

enum RecorderState {
    Idle,
    Recording { fragments: Vec<Vec<u8>> },
}

pub struct SessionRecorder {
    product: String,
    container: Container,
    state: RecorderState,
}

impl SessionRecorder {
    pub fn new(product: impl Into<String>, container: Container) -> Self {
        Self {
            product: product.into(),
            container,
            state: RecorderState::Idle,
        }
    }

    /// Begins a new session.
    ///
    /// Starting while already recording discards the running session's
    /// fragments and starts over.
    pub fn start(&mut self) {
        if let RecorderState::Recording { fragments } = &self.state {
            log::warn!(
                "Recording restarted; discarding {} captured fragments",
                fragments.len()
            );
        }
        self.state = RecorderState::Recording {
            fragments: Vec::new(),
        };
    }

    /// Appends a captured fragment. Zero-length fragments and fragments
    /// arriving while idle are ignored.
    pub fn push_fragment(&mut self, fragment: Vec<u8>) {
        if fragment.is_empty() {
            return;
        }
        if let RecorderState::Recording { fragments } = &mut self.state {
            fragments.push(fragment);
        }
    }

    /// Ends the session and concatenates its fragments in capture order.
    ///
    /// `epoch_millis` names the file. Returns `None` when idle.
    pub fn stop(&mut self, epoch_millis: u64) -> Option<RecordingPayload> {
        let RecorderState::Recording { fragments } =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            return None;
        };

        let bytes = fragments.concat();
        let file_name = session_file_name(&self.product, epoch_millis, self.container);
        log::info!("Recording stopped: {file_name} ({} bytes)", bytes.len());

        Some(RecordingPayload {
            file_name,
            container: self.container,
            bytes,
        })
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    /// Fragments held by the running session.
    pub fn fragment_count(&self) -> usize {
        match &self.state {
            RecorderState::Idle => 0,
            RecorderState::Recording { fragments } => fragments.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> SessionRecorder {
        SessionRecorder::new("namouradoxier", Container::Wav)
    }

    #[test]
    fn test_fragments_concatenate_in_order_skipping_empty() {
        let mut recorder = recorder();
        recorder.start();

        let f1 = vec![1u8; 120];
        let f2 = Vec::new();
        let f3 = vec![3u8; 80];
        recorder.push_fragment(f1.clone());
        recorder.push_fragment(f2);
        recorder.push_fragment(f3.clone());
        assert_eq!(recorder.fragment_count(), 2);

        let payload = recorder.stop(1_700_000_000_000).unwrap();

        assert_eq!(payload.len(), 200);
        assert_eq!(&payload.bytes[..120], f1.as_slice());
        assert_eq!(&payload.bytes[120..], f3.as_slice());
        assert_eq!(payload.container, Container::Wav);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.fragment_count(), 0);
    }

    #[test]
    fn test_file_name_from_timestamp() {
        let mut recorder = recorder();
        recorder.start();

        let payload = recorder.stop(1_234).unwrap();

        assert_eq!(payload.file_name, "namouradoxier-session-1234.wav");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut recorder = recorder();
        assert!(recorder.stop(1).is_none());

        recorder.start();
        recorder.stop(2).unwrap();
        assert!(recorder.stop(3).is_none());
    }

    #[test]
    fn test_fragments_while_idle_are_dropped() {
        let mut recorder = recorder();
        recorder.push_fragment(vec![9u8; 10]);

        recorder.start();
        let payload = recorder.stop(5).unwrap();

        assert!(payload.is_empty());
    }

    #[test]
    fn test_restart_supersedes_running_session() {
        let mut recorder = recorder();
        recorder.start();
        recorder.push_fragment(vec![1u8; 10]);

        recorder.start();
        recorder.push_fragment(vec![2u8; 4]);
        let payload = recorder.stop(6).unwrap();

        assert_eq!(payload.bytes, vec![2u8; 4]);
    }
}
