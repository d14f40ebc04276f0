//! Diagram blocks extracted from a document.

use crate::fence::{FenceEvent, FenceTracker, lines_with_endings};
use crate::label::Label;

/// A fenced Mermaid block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Label derived from the opening fence.
    pub label: Label,
    /// Interior lines, each terminated by `\n`. Fence lines are excluded.
    pub body: String,
    /// Line number of the opening fence (1-indexed).
    pub line: usize,
}

impl Block {
    /// Start a block at an opening fence.
    pub(crate) fn open(label: Label, line: usize) -> Self {
        Self {
            label,
            body: String::new(),
            line,
        }
    }

    /// Append an interior line.
    pub(crate) fn push_line(&mut self, line: &str) {
        self.body.push_str(line);
        self.body.push('\n');
    }
}

/// List every terminated diagram block in document order.
///
/// Uses the same fence rules as [`BlockScanner`](crate::BlockScanner) but
/// renders nothing. An unterminated trailing block is not returned.
///
/// # Example
///
/// ```
/// use mdfig_diagrams::extract_blocks;
///
/// let blocks = extract_blocks("intro\n```mermaid - Flow1\ngraph TD; X-->Y;\n```\n");
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].label.display(), "Flow1");
/// assert_eq!(blocks[0].line, 2);
/// ```
#[must_use]
pub fn extract_blocks(document: &str) -> Vec<Block> {
    let mut fence = FenceTracker::new();
    let mut pending: Option<Block> = None;
    let mut blocks = Vec::new();

    for (idx, (line, _)) in lines_with_endings(document).enumerate() {
        match fence.update(line) {
            FenceEvent::Text => {}
            FenceEvent::Open(label) => pending = Some(Block::open(label, idx + 1)),
            FenceEvent::Body => {
                if let Some(block) = pending.as_mut() {
                    block.push_line(line);
                }
            }
            FenceEvent::Close => blocks.extend(pending.take()),
        }
    }

    blocks
}
