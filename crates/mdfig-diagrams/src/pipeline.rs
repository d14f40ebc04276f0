//! Document processing: read a Markdown file, replace its diagram blocks,
//! write the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pathdiff::diff_paths;

use crate::output::CenteredFigureTags;
use crate::renderer::{RenderError, Renderer};
use crate::scanner::{BlockScanner, ScanError, ScanSummary, UnterminatedBlock};

/// Error processing a document.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create image directory {}: {source}", path.display())]
    ImageDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Renderer(#[from] RenderError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Result of a processed document.
#[derive(Debug)]
pub struct ProcessReport {
    /// Where the rewritten document was written.
    pub output_path: PathBuf,
    /// Per-block outcome counts.
    pub summary: ScanSummary,
    /// Non-fatal problems, one per dropped block.
    pub warnings: Vec<String>,
}

/// One input document and where its outputs go.
///
/// The output document is only written after the whole input has been
/// scanned; a scan error leaves any existing output untouched.
#[derive(Debug, Clone)]
pub struct ProcessJob {
    input: PathBuf,
    output: PathBuf,
    image_dir: PathBuf,
    image_base: Option<String>,
    unterminated: UnterminatedBlock,
}

impl ProcessJob {
    /// Create a job writing the rewritten document to `output` and images
    /// next to it.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let image_dir = output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            input: input.into(),
            output,
            image_dir,
            image_base: None,
            unterminated: UnterminatedBlock::default(),
        }
    }

    /// Set the directory images are written to.
    #[must_use]
    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Set the path prefix written into image tags.
    ///
    /// Defaults to the image directory relative to the output document's
    /// directory, so links resolve from where the document is written.
    #[must_use]
    pub fn image_base(mut self, base: impl Into<String>) -> Self {
        self.image_base = Some(base.into());
        self
    }

    /// Set the policy for blocks without a closing fence.
    #[must_use]
    pub fn unterminated(mut self, policy: UnterminatedBlock) -> Self {
        self.unterminated = policy;
        self
    }

    /// Input document path.
    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output document path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Directory receiving rendered images.
    #[must_use]
    pub fn image_dir_path(&self) -> &Path {
        &self.image_dir
    }

    /// Prefix used in generated `<img src>` attributes.
    #[must_use]
    pub fn effective_image_base(&self) -> String {
        if let Some(base) = &self.image_base {
            return base.clone();
        }
        let document_dir = self
            .output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        relative_link(&self.image_dir, document_dir)
    }

    /// Check the input exists and create the image directory.
    ///
    /// Call before constructing a renderer so a bad invocation fails before
    /// any browser is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InputMissing`] or [`ProcessError::ImageDir`].
    pub fn prepare(&self) -> Result<(), ProcessError> {
        if !self.input.is_file() {
            return Err(ProcessError::InputMissing(self.input.clone()));
        }

        std::fs::create_dir_all(&self.image_dir).map_err(|source| ProcessError::ImageDir {
            path: self.image_dir.clone(),
            source,
        })
    }

    /// Process the document with `renderer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, the scan is aborted,
    /// or the output cannot be written. Diagrams that fail to render are
    /// reported in [`ProcessReport::warnings`] instead.
    pub async fn run<R: Renderer>(&self, renderer: &R) -> Result<ProcessReport, ProcessError> {
        self.prepare()?;

        let input = tokio::fs::read_to_string(&self.input)
            .await
            .map_err(|source| ProcessError::Read {
                path: self.input.clone(),
                source,
            })?;

        tracing::info!(input = %self.input.display(), "Processing document");

        let tags = CenteredFigureTags::new(self.effective_image_base());
        let mut scanner = BlockScanner::new(renderer)
            .tag_generator(Arc::new(tags))
            .unterminated(self.unterminated);
        let output = scanner.scan(&input).await?;

        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ProcessError::Write {
                    path: self.output.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&self.output, output)
            .await
            .map_err(|source| ProcessError::Write {
                path: self.output.clone(),
                source,
            })?;

        let summary = scanner.summary();
        tracing::info!(
            output = %self.output.display(),
            blocks = summary.blocks,
            rendered = summary.rendered,
            failed = summary.failed,
            "Document written"
        );

        Ok(ProcessReport {
            output_path: self.output.clone(),
            summary,
            warnings: scanner.warnings().to_vec(),
        })
    }
}

/// Path of `target` as seen from `from`, with `/` separators.
///
/// Empty when both name the same directory.
fn relative_link(target: &Path, from: &Path) -> String {
    let absolute = |path: &Path| std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    diff_paths(absolute(target), absolute(from))
        .unwrap_or_else(|| target.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserOptions, BrowserRenderer};
    use crate::renderer::{RenderRequest, RenderedImage};
    use crate::style::MermaidStyle;
    use pretty_assertions::assert_eq;

    /// Renderer that writes an empty image and fails for labels starting
    /// with `Bad`.
    struct StubRenderer {
        output_dir: PathBuf,
    }

    impl Renderer for StubRenderer {
        async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
            if request.label.display().starts_with("Bad") {
                return Err(RenderError::Http("HTTP 400: bad diagram".to_owned()));
            }
            let path = self.output_dir.join(request.label.image_file_name());
            tokio::fs::write(&path, b"").await?;
            Ok(RenderedImage {
                path,
                width: 10,
                height: 10,
            })
        }
    }

    async fn run_with_browser(
        job: &ProcessJob,
        options: BrowserOptions,
    ) -> Result<ProcessReport, ProcessError> {
        let renderer =
            BrowserRenderer::launch(job.image_dir_path(), MermaidStyle::default(), options)?;
        job.run(&renderer).await
    }

    /// Pull the `src` attribute out of the first image tag.
    fn image_src(document: &str) -> &str {
        let start = document.find("src=\"").unwrap() + "src=\"".len();
        let len = document[start..].find('"').unwrap();
        &document[start..start + len]
    }

    #[test]
    fn test_new_defaults_image_dir_to_output_parent() {
        let job = ProcessJob::new("in.md", "out/doc.md");
        assert_eq!(job.image_dir_path(), Path::new("out"));
        assert_eq!(job.effective_image_base(), "");
    }

    #[test]
    fn test_default_image_base_is_relative_to_output() {
        let job = ProcessJob::new("in.md", "docs/guide.md").image_dir("build/images");
        assert_eq!(job.effective_image_base(), "../build/images");

        let job = ProcessJob::new("in.md", "guide.md").image_dir("images");
        assert_eq!(job.effective_image_base(), "images");
    }

    #[tokio::test]
    async fn test_default_links_resolve_from_output_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "A\n```mermaid - Flow1\ngraph TD\n```\nB\n").unwrap();
        let output = dir.path().join("out/doc.md");
        let images = dir.path().join("assets/img");
        let renderer = StubRenderer {
            output_dir: images.clone(),
        };

        ProcessJob::new(&input, &output)
            .image_dir(&images)
            .run(&renderer)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let src = image_src(&written);
        assert_eq!(src, "../assets/img/image_Flow1.png");
        assert!(output.parent().unwrap().join(src).is_file());
    }

    #[tokio::test]
    async fn test_default_links_next_to_output_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "```mermaid - Flow1\ngraph TD\n```\n").unwrap();
        let output = dir.path().join("out/doc.md");
        let renderer = StubRenderer {
            output_dir: dir.path().join("out"),
        };

        ProcessJob::new(&input, &output).run(&renderer).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let src = image_src(&written);
        assert_eq!(src, "image_Flow1.png");
        assert!(output.parent().unwrap().join(src).is_file());
    }

    #[tokio::test]
    async fn test_missing_browser_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "A\n```mermaid - Flow1\ngraph TD\n```\nB\n").unwrap();
        let output = dir.path().join("doc.rendered.md");
        let job = ProcessJob::new(&input, &output);
        job.prepare().unwrap();
        let options = BrowserOptions {
            chrome_bin: Some(dir.path().join("no-such-chrome")),
            ..BrowserOptions::default()
        };

        let err = run_with_browser(&job, options).await.unwrap_err();

        assert!(matches!(err, ProcessError::Renderer(RenderError::BrowserNotFound)));
        assert!(!output.exists());
    }

    #[test]
    fn test_image_base_override() {
        let job = ProcessJob::new("in.md", "doc.md")
            .image_dir("build/images")
            .image_base("/static/images");
        assert_eq!(job.effective_image_base(), "/static/images");
    }

    #[test]
    fn test_bare_output_name_uses_current_dir() {
        let job = ProcessJob::new("in.md", "doc.md");
        assert_eq!(job.image_dir_path(), Path::new("."));
    }

    #[test]
    fn test_prepare_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let job = ProcessJob::new(dir.path().join("missing.md"), dir.path().join("out.md"));

        let err = job.prepare().unwrap_err();

        assert!(matches!(err, ProcessError::InputMissing(_)));
    }

    #[test]
    fn test_prepare_creates_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "text\n").unwrap();
        let images = dir.path().join("a/b/images");

        ProcessJob::new(&input, dir.path().join("out.md"))
            .image_dir(&images)
            .prepare()
            .unwrap();

        assert!(images.is_dir());
    }

    #[tokio::test]
    async fn test_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(
            &input,
            "# Doc\n```mermaid - Flow1\ngraph TD\n```\n```mermaid - Bad one\nx\n```\nend\n",
        )
        .unwrap();
        let output = dir.path().join("out/doc.rendered.md");
        let renderer = StubRenderer {
            output_dir: dir.path().join("images"),
        };

        let report = ProcessJob::new(&input, &output)
            .image_dir(dir.path().join("images"))
            .image_base("images")
            .run(&renderer)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "# Doc\n\
             <p align=\"center\"><img src=\"images/image_Flow1.png\" border=\"0\" id=\"_FIG{Flow1}\"/></p>\n\
             <p style=\"text-align: center; margin-bottom:1\">Figure _FIG{Flow1} : Flow1</p>\n\
             end\n"
        );
        assert_eq!(report.output_path, output);
        assert_eq!(report.summary.rendered, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Bad one"));
    }

    #[tokio::test]
    async fn test_run_scan_error_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "```mermaid - Open\ngraph TD\n").unwrap();
        let output = dir.path().join("doc.rendered.md");
        std::fs::write(&output, "previous").unwrap();
        let renderer = StubRenderer {
            output_dir: dir.path().to_path_buf(),
        };

        let err = ProcessJob::new(&input, &output)
            .unterminated(UnterminatedBlock::Error)
            .run(&renderer)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Scan(ScanError::Unterminated { .. })));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
    }
}
