//! Block scanner: replaces Mermaid blocks with rendered figures.
//!
//! The scanner makes a single pass over the document. Lines outside blocks
//! are copied byte for byte; each terminated block is sent to the
//! [`Renderer`] and, on success, replaced by the two lines produced by the
//! [`FigureTagGenerator`]. A block that fails to render is dropped and the
//! scan continues.

use std::sync::Arc;

use crate::block::Block;
use crate::fence::{FenceEvent, FenceTracker, lines_with_endings};
use crate::output::{CenteredFigureTags, FigureTagGenerator};
use crate::renderer::{RenderRequest, Renderer};

/// What to do with a block still open at the end of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnterminatedBlock {
    /// Drop the block body without rendering it (default).
    #[default]
    Discard,
    /// Fail the scan with [`ScanError::Unterminated`].
    Error,
}

/// Error that aborts a scan.
///
/// Render failures never produce this; they are isolated to their block.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("line {line}: diagram '{label}' has no closing fence")]
    Unterminated { line: usize, label: String },
}

/// Per-block outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Terminated blocks submitted to the renderer.
    pub blocks: usize,
    /// Blocks replaced by a figure.
    pub rendered: usize,
    /// Blocks dropped because rendering failed.
    pub failed: usize,
    /// Unterminated blocks dropped at end of document.
    pub discarded: usize,
}

/// Scans a document and substitutes rendered figures for Mermaid blocks.
///
/// Renders are strictly sequential: each block's render is awaited before
/// the next line is examined.
///
/// # Example
///
/// ```ignore
/// use mdfig_diagrams::{BlockScanner, BrowserRenderer, MermaidStyle};
///
/// let renderer = BrowserRenderer::launch("images", MermaidStyle::default(), Default::default())?;
/// let mut scanner = BlockScanner::new(&renderer);
/// let output = scanner.scan("```mermaid - Flow1\ngraph TD; X-->Y;\n```\n").await?;
/// ```
pub struct BlockScanner<'r, R> {
    renderer: &'r R,
    tags: Arc<dyn FigureTagGenerator>,
    unterminated: UnterminatedBlock,
    summary: ScanSummary,
    warnings: Vec<String>,
}

impl<'r, R: Renderer> BlockScanner<'r, R> {
    /// Create a scanner that renders through `renderer`.
    #[must_use]
    pub fn new(renderer: &'r R) -> Self {
        Self {
            renderer,
            tags: Arc::new(CenteredFigureTags::default()),
            unterminated: UnterminatedBlock::default(),
            summary: ScanSummary::default(),
            warnings: Vec::new(),
        }
    }

    /// Set the generator for replacement lines.
    ///
    /// Default is [`CenteredFigureTags`] with image base `"."`.
    #[must_use]
    pub fn tag_generator(mut self, tags: Arc<dyn FigureTagGenerator>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the policy for a block left open at end of document.
    #[must_use]
    pub fn unterminated(mut self, policy: UnterminatedBlock) -> Self {
        self.unterminated = policy;
        self
    }

    /// Outcome counts accumulated over all scans.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        self.summary
    }

    /// Warnings accumulated over all scans.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Scan `input` and return the rewritten document.
    ///
    /// # Errors
    ///
    /// Only with [`UnterminatedBlock::Error`], when a block has no closing fence.
    pub async fn scan(&mut self, input: &str) -> Result<String, ScanError> {
        let mut output = String::with_capacity(input.len());
        let mut fence = FenceTracker::new();
        let mut pending: Option<Block> = None;

        for (idx, (line, eol)) in lines_with_endings(input).enumerate() {
            match fence.update(line) {
                FenceEvent::Text => {
                    output.push_str(line);
                    output.push_str(eol);
                }
                FenceEvent::Open(label) => {
                    tracing::debug!(line = idx + 1, label = %label, "Diagram block opened");
                    pending = Some(Block::open(label, idx + 1));
                }
                FenceEvent::Body => {
                    if let Some(block) = pending.as_mut() {
                        block.push_line(line);
                    }
                }
                FenceEvent::Close => {
                    if let Some(block) = pending.take() {
                        self.render_block(&block, eol, &mut output).await;
                    }
                }
            }
        }

        debug_assert_eq!(fence.in_block(), pending.is_some());
        match pending {
            Some(block) => self.finish_unterminated(block).map(|()| output),
            None => Ok(output),
        }
    }

    /// Render one block and append its figure lines, or record the failure.
    async fn render_block(&mut self, block: &Block, eol: &str, output: &mut String) {
        self.summary.blocks += 1;

        let request = RenderRequest {
            source: &block.body,
            label: &block.label,
        };

        match self.renderer.render(&request).await {
            Ok(image) => {
                tracing::info!(
                    line = block.line,
                    label = %block.label,
                    path = %image.path.display(),
                    width = image.width,
                    height = image.height,
                    "Rendered diagram"
                );
                output.push_str(&self.tags.image_tag(&image, &block.label));
                // A closing fence on the last line has no terminator; the two
                // generated lines still need one between them.
                output.push_str(if eol.is_empty() { "\n" } else { eol });
                output.push_str(&self.tags.caption(&block.label));
                output.push_str(eol);
                self.summary.rendered += 1;
            }
            Err(e) => {
                tracing::warn!(line = block.line, label = %block.label, error = %e, "Failed to render diagram");
                self.warnings.push(format!(
                    "line {}: diagram '{}' failed to render, block dropped: {e}",
                    block.line, block.label
                ));
                self.summary.failed += 1;
            }
        }
    }

    fn finish_unterminated(&mut self, block: Block) -> Result<(), ScanError> {
        match self.unterminated {
            UnterminatedBlock::Discard => {
                tracing::warn!(line = block.line, label = %block.label, "Discarding unterminated diagram block");
                self.warnings.push(format!(
                    "line {}: diagram '{}' has no closing fence, block discarded",
                    block.line, block.label
                ));
                self.summary.discarded += 1;
                Ok(())
            }
            UnterminatedBlock::Error => Err(ScanError::Unterminated {
                line: block.line,
                label: block.label.display().to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::label::Label;
    use crate::renderer::{RenderError, RenderedImage};
    use pretty_assertions::assert_eq;

    /// Renderer that records requests and fails for selected labels.
    #[derive(Default)]
    struct MockRenderer {
        failing: HashSet<String>,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl MockRenderer {
        fn failing(labels: &[&str]) -> Self {
            Self {
                failing: labels.iter().map(|&l| l.to_owned()).collect(),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<(String, String)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Renderer for MockRenderer {
        async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
            self.requests.lock().unwrap().push((
                request.label.display().to_owned(),
                request.source.to_owned(),
            ));

            if self.failing.contains(request.label.display()) {
                return Err(RenderError::Http("HTTP 400: syntax error".to_owned()));
            }

            Ok(RenderedImage {
                path: PathBuf::from("out").join(request.label.image_file_name()),
                width: 100,
                height: 50,
            })
        }
    }

    /// Renderer that always returns the same image path.
    struct FixedRenderer(&'static str);

    impl Renderer for FixedRenderer {
        async fn render(&self, _request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
            Ok(RenderedImage {
                path: PathBuf::from(self.0),
                width: 1,
                height: 1,
            })
        }
    }

    fn image_line(label: &str) -> String {
        let label = Label::new(label);
        format!(
            r#"<p align="center"><img src="img/{}" border="0" id="_FIG{{{}}}"/></p>"#,
            label.image_file_name(),
            label.sanitized()
        )
    }

    fn caption_line(label: &str) -> String {
        CenteredFigureTags::default().caption(&Label::new(label))
    }

    async fn scan_with(renderer: &MockRenderer, input: &str) -> (String, ScanSummary, Vec<String>) {
        let mut scanner = BlockScanner::new(renderer)
            .tag_generator(Arc::new(CenteredFigureTags::new("img")));
        let output = scanner.scan(input).await.unwrap();
        (output, scanner.summary(), scanner.warnings().to_vec())
    }

    #[tokio::test]
    async fn test_no_blocks_is_identity() {
        let renderer = MockRenderer::default();
        for input in [
            "",
            "plain",
            "# Title\n\nSome text.\n",
            "no trailing newline\nlast",
            "windows\r\nline endings\r\n",
            "```rust\nfn main() {}\n```\n",
            "  indented\t tabs \n\n\n",
        ] {
            let (output, summary, _) = scan_with(&renderer, input).await;
            assert_eq!(output, input);
            assert_eq!(summary, ScanSummary::default());
        }
        assert!(renderer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_single_block() {
        let renderer = MockRenderer::default();
        let input = "A\n```mermaid - Flow1\ngraph TD; X-->Y;\n```\nB\n";

        let (output, summary, warnings) = scan_with(&renderer, input).await;

        assert_eq!(
            output,
            format!("A\n{}\n{}\nB\n", image_line("Flow1"), caption_line("Flow1"))
        );
        assert_eq!(summary.rendered, 1);
        assert!(warnings.is_empty());
        assert_eq!(
            renderer.requests(),
            vec![("Flow1".to_owned(), "graph TD; X-->Y;\n".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_image_line_references_rendered_path() {
        let renderer = FixedRenderer("img1.png");
        let mut scanner = BlockScanner::new(&renderer)
            .tag_generator(Arc::new(CenteredFigureTags::new("")));

        let output = scanner
            .scan("A\n```mermaid - Flow1\ngraph TD; X-->Y;\n```\nB\n")
            .await
            .unwrap();

        assert_eq!(
            output,
            "A\n\
             <p align=\"center\"><img src=\"img1.png\" border=\"0\" id=\"_FIG{Flow1}\"/></p>\n\
             <p style=\"text-align: center; margin-bottom:1\">Figure _FIG{Flow1} : Flow1</p>\n\
             B\n"
        );
    }

    #[tokio::test]
    async fn test_blocks_render_in_order() {
        let renderer = MockRenderer::default();
        let input = "intro\n```mermaid - One\na\n```\nmiddle\n```mermaid - Two\nb\n```\n```mermaid - Three\nc\n```\nend\n";

        let (output, summary, _) = scan_with(&renderer, input).await;

        let expected = format!(
            "intro\n{}\n{}\nmiddle\n{}\n{}\n{}\n{}\nend\n",
            image_line("One"),
            caption_line("One"),
            image_line("Two"),
            caption_line("Two"),
            image_line("Three"),
            caption_line("Three"),
        );
        assert_eq!(output, expected);
        assert!(!output.contains("```"));
        assert_eq!(summary.blocks, 3);
        assert_eq!(summary.rendered, 3);

        let labels: Vec<_> = renderer.requests().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_duplicate_labels_not_deduplicated() {
        let renderer = MockRenderer::default();
        let input = "```mermaid - Same\na\n```\n```mermaid - Same\nb\n```\n";

        let (output, summary, _) = scan_with(&renderer, input).await;

        assert_eq!(output.matches(&image_line("Same")).count(), 2);
        assert_eq!(summary.rendered, 2);
    }

    #[tokio::test]
    async fn test_stray_close_fence_passes_through() {
        let renderer = MockRenderer::default();
        let input = "text\n```\nmore\n";

        let (output, _, _) = scan_with(&renderer, input).await;

        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_default_label() {
        let renderer = MockRenderer::default();
        let input = "```mermaid\na\n```\n```mermaid -  \nb\n```\n";

        let (output, _, _) = scan_with(&renderer, input).await;

        assert_eq!(output.matches("_FIG{UnnamedFlowchart}").count(), 4);
        let labels: Vec<_> = renderer.requests().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["UnnamedFlowchart", "UnnamedFlowchart"]);
    }

    #[tokio::test]
    async fn test_failed_block_is_dropped_and_scan_continues() {
        let renderer = MockRenderer::failing(&["Broken"]);
        let input = "A\n```mermaid - Broken\nnot a diagram\n```\nB\n```mermaid - Fine\ngraph TD\n```\nC\n";

        let (output, summary, warnings) = scan_with(&renderer, input).await;

        assert_eq!(
            output,
            format!("A\nB\n{}\n{}\nC\n", image_line("Fine"), caption_line("Fine"))
        );
        assert_eq!(
            summary,
            ScanSummary {
                blocks: 2,
                rendered: 1,
                failed: 1,
                discarded: 0,
            }
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 2"));
        assert!(warnings[0].contains("'Broken'"));
        assert!(warnings[0].contains("HTTP 400"));
    }

    #[tokio::test]
    async fn test_unterminated_block_is_discarded() {
        let renderer = MockRenderer::default();
        let input = "A\n```mermaid - Open\ngraph TD\nstill body\n";

        let (output, summary, warnings) = scan_with(&renderer, input).await;

        assert_eq!(output, "A\n");
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.blocks, 0);
        assert!(renderer.requests().is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no closing fence"));
    }

    #[tokio::test]
    async fn test_unterminated_block_error_policy() {
        let renderer = MockRenderer::default();
        let mut scanner = BlockScanner::new(&renderer).unterminated(UnterminatedBlock::Error);

        let err = scanner
            .scan("ok\n```mermaid - Open\ngraph TD\n")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScanError::Unterminated { line: 2, ref label } if label == "Open"
        ));
        assert!(renderer.requests().is_empty());
    }

    #[tokio::test]
    async fn test_inner_open_fence_is_body_text() {
        let renderer = MockRenderer::default();
        let input = "```mermaid - Outer\ngraph TD\n```mermaid - Inner\nA-->B\n```\nafter\n";

        let (output, summary, _) = scan_with(&renderer, input).await;

        assert_eq!(summary.blocks, 1);
        assert_eq!(
            renderer.requests(),
            vec![(
                "Outer".to_owned(),
                "graph TD\n```mermaid - Inner\nA-->B\n".to_owned()
            )]
        );
        assert!(output.ends_with("after\n"));
        assert!(!output.contains("Inner"));
    }

    #[tokio::test]
    async fn test_crlf_document_keeps_line_endings() {
        let renderer = MockRenderer::default();
        let input = "A\r\n```mermaid - Flow1\r\ngraph TD\r\n```\r\nB\r\n";

        let (output, _, _) = scan_with(&renderer, input).await;

        assert_eq!(
            output,
            format!("A\r\n{}\r\n{}\r\nB\r\n", image_line("Flow1"), caption_line("Flow1"))
        );
        assert_eq!(renderer.requests()[0].1, "graph TD\n");
    }

    #[tokio::test]
    async fn test_close_fence_on_last_line_without_newline() {
        let renderer = MockRenderer::default();
        let input = "A\n```mermaid - Flow1\ngraph TD\n```";

        let (output, _, _) = scan_with(&renderer, input).await;

        assert_eq!(
            output,
            format!("A\n{}\n{}", image_line("Flow1"), caption_line("Flow1"))
        );
    }

    #[tokio::test]
    async fn test_passthrough_keeps_whitespace() {
        let renderer = MockRenderer::default();
        let input = "   indented  \n```mermaid - X\ny\n```\n\ttabbed\t\n";

        let (output, _, _) = scan_with(&renderer, input).await;

        assert!(output.starts_with("   indented  \n"));
        assert!(output.ends_with("\ttabbed\t\n"));
    }

    #[tokio::test]
    async fn test_summary_accumulates_across_scans() {
        let renderer = MockRenderer::default();
        let mut scanner = BlockScanner::new(&renderer);

        scanner.scan("```mermaid - A\nx\n```\n").await.unwrap();
        scanner.scan("```mermaid - B\ny\n```\n").await.unwrap();

        assert_eq!(scanner.summary().rendered, 2);
    }
}
