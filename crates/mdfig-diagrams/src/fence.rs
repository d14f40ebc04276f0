//! Mermaid fence tracking for line-by-line scanning.
//!
//! Only one level of blocks exists: diagrams are leaf content. While a block
//! is open, every line except a bare closing fence is body text, including
//! lines that look like another opening fence.

use crate::label::Label;

/// Marker that opens a diagram block (after trimming the line).
const OPEN_MARKER: &str = "```mermaid";

/// Exact content of a closing fence (after trimming the line).
const CLOSE_MARKER: &str = "```";

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FenceEvent {
    /// Line outside any block, passed through unchanged.
    Text,
    /// Opening fence, with the label derived from it.
    Open(Label),
    /// Line inside the open block.
    Body,
    /// Closing fence of the open block.
    Close,
}

/// Tracks whether the scanner is inside a diagram block.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    in_block: bool,
}

impl FenceTracker {
    /// Create a new fence tracker.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Check if currently inside a diagram block.
    pub(crate) fn in_block(&self) -> bool {
        self.in_block
    }

    /// Classify a line (without its terminator) and update block state.
    pub(crate) fn update(&mut self, line: &str) -> FenceEvent {
        let trimmed = line.trim();

        if self.in_block {
            if trimmed == CLOSE_MARKER {
                self.in_block = false;
                return FenceEvent::Close;
            }
            return FenceEvent::Body;
        }

        if trimmed.starts_with(OPEN_MARKER) {
            self.in_block = true;
            return FenceEvent::Open(Label::from_fence(trimmed));
        }

        FenceEvent::Text
    }
}

/// Split text into `(line, terminator)` pairs.
///
/// The terminator is `"\r\n"`, `"\n"`, or `""` for a final line without one,
/// so concatenating every pair reproduces the input byte for byte.
pub(crate) fn lines_with_endings(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.split_inclusive('\n').map(|chunk| {
        if let Some(line) = chunk.strip_suffix("\r\n") {
            (line, "\r\n")
        } else if let Some(line) = chunk.strip_suffix('\n') {
            (line, "\n")
        } else {
            (chunk, "")
        }
    })
}
