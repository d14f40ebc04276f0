//! `mdfig render` command implementation.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use mdfig_config::{CliSettings, Config, RenderBackend, StyleConfig, UnterminatedPolicy};
use mdfig_diagrams::{
    BrowserOptions, BrowserRenderer, DEFAULT_MERMAID_URL, KrokiRenderer, MermaidStyle,
    ProcessError, ProcessJob, ProcessReport, UnterminatedBlock,
};

use crate::error::CliError;
use crate::output::Output;

/// Suffix appended to the input stem for the default output file.
const OUTPUT_SUFFIX: &str = ".rendered.md";

/// Rendering backend selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Headless Chrome/Chromium.
    Browser,
    /// Kroki HTTP service.
    Kroki,
}

impl From<BackendArg> for RenderBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Browser => Self::Browser,
            BackendArg::Kroki => Self::Kroki,
        }
    }
}

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown file to process.
    input: PathBuf,

    /// Output Markdown file (default: `<input stem>.rendered.md` next to the input).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for rendered images (overrides config).
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Path prefix for image links in the output (overrides config).
    #[arg(long)]
    image_base: Option<String>,

    /// Path to configuration file (default: auto-discover mdfig.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rendering backend (overrides config).
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Kroki server URL (overrides config).
    #[arg(long, env = "MDFIG_KROKI_URL")]
    kroki_url: Option<String>,

    /// Chrome/Chromium executable (overrides config and detection).
    #[arg(long)]
    chrome_bin: Option<PathBuf>,

    /// Fail when a Mermaid block has no closing fence.
    #[arg(long)]
    strict: bool,

    /// Enable verbose output (per-diagram render logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the input is missing, the
    /// backend cannot start, or the output cannot be written.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let output_path = self
            .output
            .unwrap_or_else(|| default_output_path(&self.input));

        let cli_settings = CliSettings {
            backend: self.backend.map(Into::into),
            kroki_url: self.kroki_url,
            chrome_bin: self.chrome_bin,
            image_dir: self.image_dir,
            image_base: self.image_base,
            unterminated: self.strict.then_some(UnterminatedPolicy::Error),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        tracing::debug!(
            config = ?config.config_path,
            backend = ?config.render_resolved.backend,
            "Configuration loaded"
        );

        let job = build_job(&config, self.input, output_path);
        job.prepare()?;

        output.info(&format!("Input: {}", job.input().display()));
        output.info(&format!("Images: {}", job.image_dir_path().display()));

        let report = render_document(&config, &job, &output).await?;

        for warning in &report.warnings {
            output.warning(&format!("Warning: {warning}"));
        }
        output.summary(
            report.summary.rendered,
            report.summary.blocks,
            &report.output_path.display().to_string(),
        );

        Ok(())
    }
}

/// Default output path: `<stem>.rendered.md` next to the input.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |stem| stem.to_string_lossy());
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}"))
}

/// Build the processing job from resolved configuration.
fn build_job(config: &Config, input: PathBuf, output_path: PathBuf) -> ProcessJob {
    let settings = &config.output_resolved;
    let unterminated = match settings.unterminated {
        UnterminatedPolicy::Discard => UnterminatedBlock::Discard,
        UnterminatedPolicy::Error => UnterminatedBlock::Error,
    };

    let mut job = ProcessJob::new(input, output_path).unterminated(unterminated);
    if let Some(dir) = &settings.image_dir {
        job = job.image_dir(dir);
    }
    if let Some(base) = &settings.image_base {
        job = job.image_base(base.as_str());
    }
    job
}

/// Convert configured style into the renderer's style.
fn mermaid_style(style: &StyleConfig) -> MermaidStyle {
    MermaidStyle {
        background_color: style.background_color.clone(),
        node_color: style.node_color.clone(),
        font_family: style.font_family.clone(),
        font_size: style.font_size,
    }
}

/// Start the configured backend and run the job with it.
async fn render_document(
    config: &Config,
    job: &ProcessJob,
    output: &Output,
) -> Result<ProcessReport, CliError> {
    let render = &config.render_resolved;
    let style = mermaid_style(&config.style);

    let report = match render.backend {
        RenderBackend::Browser => {
            let options = BrowserOptions {
                chrome_bin: render.chrome_bin.clone(),
                mermaid_url: render
                    .mermaid_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MERMAID_URL.to_owned()),
                window: (render.window_width, render.window_height),
                settle: render.settle,
                timeout: render.timeout,
            };
            let renderer = BrowserRenderer::launch(job.image_dir_path(), style, options)
                .map_err(ProcessError::from)?;
            output.info(&format!("Browser: {}", renderer.chrome_path().display()));
            job.run(&renderer).await?
        }
        RenderBackend::Kroki => {
            let renderer = KrokiRenderer::new(&render.kroki_url, job.image_dir_path(), &style)
                .map_err(ProcessError::from)?
                .timeout(render.timeout);
            output.info(&format!("Kroki URL: {}", render.kroki_url));
            job.run(&renderer).await?
        }
    };

    Ok(report)
}
