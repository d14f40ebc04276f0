//! Renderer contract between the block scanner and image backends.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use crate::label::Label;

/// A diagram to render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Mermaid source (block body).
    pub source: &'a str,
    /// Block label; its sanitized form names the image file.
    pub label: &'a Label,
}

/// An image written by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Path of the written image file.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RenderedImage {
    /// File name component of [`path`](Self::path).
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// Image-producing backend.
///
/// One renderer instance serves a whole document run. The scanner awaits
/// each call before looking at the next line, so implementations are never
/// called concurrently by it.
pub trait Renderer: Send + Sync {
    /// Render one diagram to an image file.
    fn render(
        &self,
        request: &RenderRequest<'_>,
    ) -> impl Future<Output = Result<RenderedImage, RenderError>> + Send;
}

/// Error rendering a single diagram, or setting up a backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(
        "unable to locate a Chrome/Chromium binary (set MDFIG_CHROME_BIN or render.chrome_bin)"
    )]
    BrowserNotFound,

    #[error("failed to launch {}: {source}", binary.display())]
    Launch {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("browser exited with {status}: {stderr}")]
    BrowserExit { status: ExitStatus, stderr: String },

    #[error("cannot build file URL for {}", .0.display())]
    PageUrl(PathBuf),

    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PNG data in {}", .0.display())]
    InvalidPng(PathBuf),

    #[error("style serialization failed: {0}")]
    Style(#[from] serde_json::Error),

    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Extract width and height from PNG image data.
///
/// PNG format: 8-byte signature, then IHDR chunk with width/height at bytes 16-24.
pub(crate) fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 {
        return None;
    }

    if &data[0..8] != b"\x89PNG\r\n\x1a\n" {
        return None;
    }

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some((width, height))
}

/// Read an image file back and validate it as PNG.
pub(crate) async fn read_rendered_png(path: &Path) -> Result<RenderedImage, RenderError> {
    let data = tokio::fs::read(path).await?;
    let (width, height) =
        png_dimensions(&data).ok_or_else(|| RenderError::InvalidPng(path.to_path_buf()))?;

    Ok(RenderedImage {
        path: path.to_path_buf(),
        width,
        height,
    })
}
