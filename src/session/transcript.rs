//! Turn-based transcript accumulation.
//!
//! Deltas for each speaker accumulate independently, so interleaved user and
//! assistant streams never corrupt each other. A turn-complete signal commits
//! every non-empty buffer as one entry.

use crate::session::event::{Speaker, TranscriptEntry};

#[derive(Debug, Default, Clone)]
pub struct TranscriptAccumulator {
    user: String,
    assistant: String,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer_mut(&mut self, speaker: Speaker) -> &mut String {
        match speaker {
            Speaker::User => &mut self.user,
            Speaker::Assistant => &mut self.assistant,
        }
    }

    pub fn push_delta(&mut self, speaker: Speaker, delta: &str) {
        self.buffer_mut(speaker).push_str(delta);
    }

    /// In-progress text for `speaker`.
    pub fn pending(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::User => &self.user,
            Speaker::Assistant => &self.assistant,
        }
    }

    /// Commit the current turn. User text is committed before assistant text.
    ///
    /// Returns the newly committed entries (empty if nothing was buffered).
    pub fn complete_turn(&mut self) -> Vec<TranscriptEntry> {
        let mut committed = Vec::new();
        for speaker in [Speaker::User, Speaker::Assistant] {
            let text = std::mem::take(self.buffer_mut(speaker));
            if !text.is_empty() {
                committed.push(TranscriptEntry { speaker, text });
            }
        }
        self.entries.extend(committed.iter().cloned());
        committed
    }

    /// Drop the in-progress text for `speaker` without committing it.
    pub fn discard(&mut self, speaker: Speaker) -> bool {
        let buffer = self.buffer_mut(speaker);
        let had_text = !buffer.is_empty();
        buffer.clear();
        had_text
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }
}
