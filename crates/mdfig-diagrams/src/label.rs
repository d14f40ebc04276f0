//! Diagram labels.
//!
//! A label names a diagram block. It is written by hand after the opening
//! fence (`` ```mermaid - Login flow ``) and used twice: verbatim as caption
//! text, and in sanitized form for the image file name and figure identifier.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::consts::{DEFAULT_LABEL, IMAGE_EXTENSION, IMAGE_PREFIX};

/// Label suffix of an opening fence: marker, optional whitespace, `-`, remainder.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```mermaid\s*-\s*(.*)").unwrap());

/// Runs of non-word characters, collapsed to `_` when sanitizing.
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// A diagram label in display and sanitized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    display: String,
    sanitized: String,
}

impl Label {
    /// Create a label from display text.
    #[must_use]
    pub fn new(display: impl Into<String>) -> Self {
        let display = display.into();
        let sanitized = sanitize(&display);
        Self { display, sanitized }
    }

    /// Extract the label from an opening fence line.
    ///
    /// Falls back to [`DEFAULT_LABEL`] when the `-` separator is missing or
    /// nothing but whitespace follows it.
    #[must_use]
    pub fn from_fence(line: &str) -> Self {
        let text = LABEL_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_LABEL);
        Self::new(text)
    }

    /// Text as written by the author, for captions.
    #[must_use]
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Filesystem- and identifier-safe form.
    #[must_use]
    pub fn sanitized(&self) -> &str {
        &self.sanitized
    }

    /// File name of the image rendered for this label (`image_<sanitized>.png`).
    #[must_use]
    pub fn image_file_name(&self) -> String {
        format!("{IMAGE_PREFIX}{}.{IMAGE_EXTENSION}", self.sanitized)
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Collapse every run of non-word characters into a single underscore.
fn sanitize(text: &str) -> String {
    NON_WORD_RE.replace_all(text, "_").into_owned()
}
