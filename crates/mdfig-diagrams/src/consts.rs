//! Internal constants for diagram extraction and rendering.

use std::time::Duration;

/// Label used when an opening fence carries no `- <label>` suffix.
pub const DEFAULT_LABEL: &str = "UnnamedFlowchart";

/// Prefix of every generated image file name.
pub const IMAGE_PREFIX: &str = "image_";

/// Extension of generated image files.
pub const IMAGE_EXTENSION: &str = "png";

/// Default timeout for a single render (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time the browser lets the page script run before the screenshot.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1000);

/// Default browser viewport (width, height) in CSS pixels.
pub const DEFAULT_WINDOW: (u32, u32) = (1280, 960);

/// Default Mermaid ESM bundle loaded by the browser page.
pub const DEFAULT_MERMAID_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@10.1.0/dist/mermaid.esm.min.mjs";
