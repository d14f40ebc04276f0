//! Mermaid diagram rendering for Markdown documents.
//!
//! This crate finds fenced Mermaid blocks in a Markdown document, renders
//! each one to a PNG image, and replaces the block with a centered image
//! and caption:
//! - [`BlockScanner`] walks the document line by line and substitutes figures
//! - [`Renderer`] is the backend seam; [`BrowserRenderer`] drives headless
//!   Chrome, [`KrokiRenderer`] posts to a Kroki server
//! - [`FigureTagGenerator`] produces the replacement lines
//! - [`ProcessJob`] ties reading, scanning and writing together for one file
//!
//! # Block syntax
//!
//! ````markdown
//! ```mermaid - Login flow
//! graph TD; A-->B;
//! ```
//! ````
//!
//! The text after `-` is the label. It names the image
//! (`image_Login_flow.png`) and appears in the caption. A block without a
//! label is called `UnnamedFlowchart`.
//!
//! # Example
//!
//! ```ignore
//! use mdfig_diagrams::{BrowserOptions, BrowserRenderer, MermaidStyle, ProcessJob};
//!
//! let job = ProcessJob::new("docs/guide.md", "docs/guide.rendered.md").image_dir("docs/images");
//! job.prepare()?;
//! let renderer = BrowserRenderer::launch(job.image_dir_path(), MermaidStyle::default(), BrowserOptions::default())?;
//! let report = job.run(&renderer).await?;
//! ```

mod block;
mod browser;
mod consts;
mod fence;
mod html;
mod kroki;
mod label;
mod output;
mod pipeline;
mod renderer;
mod scanner;
mod style;

pub use block::{Block, extract_blocks};
pub use browser::{BrowserOptions, BrowserRenderer, resolve_chrome_binary};
pub use consts::{
    DEFAULT_LABEL, DEFAULT_MERMAID_URL, DEFAULT_SETTLE, DEFAULT_TIMEOUT, DEFAULT_WINDOW,
};
pub use kroki::KrokiRenderer;
pub use label::Label;
pub use output::{CenteredFigureTags, FigureTagGenerator};
pub use pipeline::{ProcessError, ProcessJob, ProcessReport};
pub use renderer::{RenderError, RenderRequest, RenderedImage, Renderer};
pub use scanner::{BlockScanner, ScanError, ScanSummary, UnterminatedBlock};
pub use style::MermaidStyle;
