//! Headless Chrome rendering.
//!
//! Each diagram is written into a small HTML page that loads Mermaid as an
//! ES module, and Chrome's `--screenshot` mode captures the page straight
//! into the output directory. Browser resolution order:
//!
//! 1. [`BrowserOptions::chrome_bin`]
//! 2. `MDFIG_CHROME_BIN`, `CHROME_BIN`, `GOOGLE_CHROME_BIN`
//! 3. Well-known executable names on `PATH`
//! 4. Platform install locations

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::Command;
use url::Url;
use which::which;

use crate::consts::{DEFAULT_MERMAID_URL, DEFAULT_SETTLE, DEFAULT_TIMEOUT, DEFAULT_WINDOW};
use crate::html::diagram_page;
use crate::renderer::{RenderError, RenderRequest, RenderedImage, Renderer, read_rendered_png};
use crate::style::MermaidStyle;

/// Environment variables checked for an explicit browser path, in order.
const CHROME_ENV_VARS: [&str; 3] = ["MDFIG_CHROME_BIN", "CHROME_BIN", "GOOGLE_CHROME_BIN"];

/// Executable names searched on `PATH`.
const CHROME_CANDIDATES: [&str; 6] = [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Browser session settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Explicit browser executable; detected when `None`.
    pub chrome_bin: Option<PathBuf>,
    /// Mermaid ES module URL.
    pub mermaid_url: String,
    /// Viewport `(width, height)` in pixels.
    pub window: (u32, u32),
    /// Virtual time granted to the page for layout before capture.
    pub settle: Duration,
    /// Wall-clock limit for one browser invocation.
    pub timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_bin: None,
            mermaid_url: DEFAULT_MERMAID_URL.to_owned(),
            window: DEFAULT_WINDOW,
            settle: DEFAULT_SETTLE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Renders diagrams to PNG with a headless Chrome/Chromium binary.
///
/// The scratch directory holding diagram pages lives as long as the
/// renderer and is removed when it is dropped.
#[derive(Debug)]
pub struct BrowserRenderer {
    chrome: PathBuf,
    output_dir: PathBuf,
    style: MermaidStyle,
    options: BrowserOptions,
    workdir: TempDir,
}

impl BrowserRenderer {
    /// Resolve the browser and prepare the output and scratch directories.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BrowserNotFound`] when no browser can be
    /// located or the configured one is not an executable, or
    /// [`RenderError::Io`] when a directory cannot be created.
    pub fn launch(
        output_dir: impl AsRef<Path>,
        style: MermaidStyle,
        options: BrowserOptions,
    ) -> Result<Self, RenderError> {
        let chrome = match &options.chrome_bin {
            Some(path) => locate_executable(path)?,
            None => resolve_chrome_binary()?,
        };

        std::fs::create_dir_all(output_dir.as_ref())?;
        // Chrome resolves --screenshot against its own working directory
        let output_dir = std::path::absolute(output_dir.as_ref())?;
        let workdir = tempfile::Builder::new().prefix("mdfig-").tempdir()?;

        tracing::debug!(
            chrome = %chrome.display(),
            output_dir = %output_dir.display(),
            "Browser renderer ready"
        );

        Ok(Self {
            chrome,
            output_dir,
            style,
            options,
            workdir,
        })
    }

    /// Path of the browser executable in use.
    #[must_use]
    pub fn chrome_path(&self) -> &Path {
        &self.chrome
    }

    fn screenshot_args(&self, page_url: &Url, image_path: &Path) -> Vec<String> {
        let (width, height) = self.options.window;
        vec![
            "--headless".to_owned(),
            "--disable-gpu".to_owned(),
            "--no-sandbox".to_owned(),
            "--disable-setuid-sandbox".to_owned(),
            "--disable-dev-shm-usage".to_owned(),
            "--hide-scrollbars".to_owned(),
            format!("--screenshot={}", image_path.display()),
            format!("--window-size={width},{height}"),
            format!("--virtual-time-budget={}", self.options.settle.as_millis()),
            page_url.as_str().to_owned(),
        ]
    }

    async fn screenshot(&self, page_url: &Url, image_path: &Path) -> Result<(), RenderError> {
        let child = Command::new(&self.chrome)
            .args(self.screenshot_args(page_url, image_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Launch {
                binary: self.chrome.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.options.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout(self.options.timeout))??;

        if !output.status.success() {
            return Err(RenderError::BrowserExit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(())
    }
}

impl Renderer for BrowserRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
        let image_path = self.output_dir.join(request.label.image_file_name());
        let page_path = self
            .workdir
            .path()
            .join(format!("diagram_{}.html", request.label.sanitized()));

        let page = diagram_page(request.source, &self.style, &self.options.mermaid_url)?;
        tokio::fs::write(&page_path, page).await?;
        let page_url =
            Url::from_file_path(&page_path).map_err(|()| RenderError::PageUrl(page_path.clone()))?;

        // A stale image from an earlier run must not pass for this render
        if let Err(e) = tokio::fs::remove_file(&image_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(e.into());
        }

        tracing::debug!(label = %request.label, page = %page_url, "Capturing diagram");
        let captured = self.screenshot(&page_url, &image_path).await;

        if let Err(e) = tokio::fs::remove_file(&page_path).await {
            tracing::debug!(path = %page_path.display(), error = %e, "Failed to remove diagram page");
        }

        captured?;
        read_rendered_png(&image_path).await
    }
}

/// Locate a Chrome/Chromium executable.
///
/// # Errors
///
/// Returns [`RenderError::BrowserNotFound`] when every lookup fails, or
/// when an environment variable names something that is not an executable.
pub fn resolve_chrome_binary() -> Result<PathBuf, RenderError> {
    for var in CHROME_ENV_VARS {
        if let Some(path) = env::var_os(var).filter(|path| !path.is_empty()) {
            return locate_executable(Path::new(&path));
        }
    }

    for candidate in CHROME_CANDIDATES {
        if let Ok(path) = which(candidate) {
            return Ok(path);
        }
    }

    platform_install_paths()
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .ok_or(RenderError::BrowserNotFound)
}

/// Resolve an explicitly named browser, by path or by name on `PATH`.
fn locate_executable(path: &Path) -> Result<PathBuf, RenderError> {
    which(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Configured browser is not executable");
        RenderError::BrowserNotFound
    })
}

#[cfg(target_os = "macos")]
fn platform_install_paths() -> Vec<&'static str> {
    vec![
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ]
}

#[cfg(target_os = "windows")]
fn platform_install_paths() -> Vec<&'static str> {
    vec![
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
}

#[cfg(target_os = "linux")]
fn platform_install_paths() -> Vec<&'static str> {
    vec![
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium-browser",
        "/usr/bin/chromium",
        "/snap/bin/chromium",
    ]
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_install_paths() -> Vec<&'static str> {
    Vec::new()
}
