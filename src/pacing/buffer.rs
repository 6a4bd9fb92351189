//! Display buffer: received text plus the revealed prefix of it.
//!
//! The buffer only ever grows. The revealed part is tracked as a byte
//! offset that always sits on an extended grapheme cluster boundary, so a
//! reveal step never splits a multi-byte character or a combined glyph.

use unicode_segmentation::UnicodeSegmentation;

/// Accumulation and reveal state for one session's text.
#[derive(Debug, Clone, Default)]
pub struct DisplayBuffer {
    /// Everything appended so far.
    received: String,
    /// Byte length of the revealed prefix of `received`.
    revealed: usize,
    /// Number of graphemes received so far.
    received_graphemes: usize,
    /// Byte offset where the last grapheme starts. A later fragment may
    /// still extend that cluster, so it is segmented again on every push.
    tail_start: usize,
    /// Set once the ingest side has signalled that no more text follows.
    source_complete: bool,
}

impl DisplayBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the received text.
    pub fn push(&mut self, fragment: &str) {
        let settled = self.received_graphemes.saturating_sub(1);
        self.received.push_str(fragment);

        let tail = &self.received[self.tail_start..];
        let (count, last) = tail
            .grapheme_indices(true)
            .fold((0, 0), |(n, _), (idx, _)| (n + 1, idx));
        if count > 0 {
            self.received_graphemes = settled + count;
            self.tail_start += last;
        }
    }

    /// Everything received so far.
    pub fn received(&self) -> &str {
        &self.received
    }

    /// The revealed prefix of the received text.
    pub fn revealed(&self) -> &str {
        &self.received[..self.revealed]
    }

    /// Number of characters (grapheme clusters) received so far.
    pub const fn received_graphemes(&self) -> usize {
        self.received_graphemes
    }

    /// Whether nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }

    /// Whether some received text has not been revealed yet.
    pub fn has_pending(&self) -> bool {
        self.revealed < self.received.len()
    }

    /// Reveal up to `count` more characters.
    ///
    /// Returns how many characters were actually revealed, which is less
    /// than `count` only when the buffer runs out.
    pub fn advance(&mut self, count: usize) -> usize {
        let pending = &self.received[self.revealed..];
        let (advanced, end) = pending
            .grapheme_indices(true)
            .take(count)
            .fold((0, 0), |(n, _), (idx, g)| (n + 1, idx + g.len()));
        self.revealed += end;
        advanced
    }

    /// Reveal everything received so far.
    pub fn reveal_all(&mut self) {
        self.revealed = self.received.len();
    }

    /// Mark the source as complete.
    pub fn mark_source_complete(&mut self) {
        self.source_complete = true;
    }

    /// Whether the source has signalled completion.
    pub const fn is_source_complete(&self) -> bool {
        self.source_complete
    }

    /// Source complete and everything revealed.
    pub fn is_reveal_complete(&self) -> bool {
        self.source_complete && !self.has_pending()
    }

    /// Drop all text and flags.
    pub fn clear(&mut self) {
        self.received.clear();
        self.revealed = 0;
        self.received_graphemes = 0;
        self.tail_start = 0;
        self.source_complete = false;
    }
}
