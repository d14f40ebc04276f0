//! Kroki rendering.
//!
//! Sends diagram source to a Kroki server (`POST {server}/mermaid/png`) and
//! writes the returned PNG into the output directory. Styling travels inside
//! the source as a Mermaid `%%{init: ...}%%` directive, since Kroki has no
//! page to style.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ureq::Agent;

use crate::consts::DEFAULT_TIMEOUT;
use crate::renderer::{RenderError, RenderRequest, RenderedImage, Renderer, png_dimensions};
use crate::style::MermaidStyle;

/// Create HTTP agent with the specified timeout.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Renders diagrams to PNG through a Kroki server.
#[derive(Clone)]
pub struct KrokiRenderer {
    agent: Agent,
    server_url: String,
    output_dir: PathBuf,
    directive: String,
}

impl KrokiRenderer {
    /// Create a renderer for `server_url`, writing images to `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] when the output directory cannot be
    /// created, or [`RenderError::Style`] when the style cannot be encoded.
    pub fn new(
        server_url: &str,
        output_dir: impl AsRef<Path>,
        style: &MermaidStyle,
    ) -> Result<Self, RenderError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;

        Ok(Self {
            agent: create_agent(DEFAULT_TIMEOUT),
            server_url: server_url.trim_end_matches('/').to_owned(),
            output_dir,
            directive: style.init_directive()?,
        })
    }

    /// Replace the HTTP timeout (default 30 seconds).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.agent = create_agent(timeout);
        self
    }

    /// Full request URL for PNG rendering.
    fn endpoint(&self) -> String {
        format!("{}/mermaid/png", self.server_url)
    }

    /// Diagram source with the style directive prepended.
    fn styled_source(&self, source: &str) -> String {
        format!("{}\n{source}", self.directive)
    }
}

impl Renderer for KrokiRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage, RenderError> {
        let agent = self.agent.clone();
        let url = self.endpoint();
        let body = self.styled_source(request.source);

        tracing::debug!(label = %request.label, url = %url, "Sending diagram to Kroki");
        let data =
            tokio::task::spawn_blocking(move || send_diagram_request(&agent, &url, &body)).await??;

        let path = self.output_dir.join(request.label.image_file_name());
        let (width, height) =
            png_dimensions(&data).ok_or_else(|| RenderError::InvalidPng(path.clone()))?;
        tokio::fs::write(&path, &data).await?;

        Ok(RenderedImage {
            path,
            width,
            height,
        })
    }
}

/// Send a diagram to Kroki and return the response body as bytes.
///
/// Handles HTTP errors by reading the response body for error details.
fn send_diagram_request(agent: &Agent, url: &str, source: &str) -> Result<Vec<u8>, RenderError> {
    let response = agent
        .post(url)
        .header("Content-Type", "text/plain")
        .send(source.as_bytes())
        .map_err(|e| RenderError::Http(e.to_string()))?;

    let status = response.status().as_u16();
    let mut body = response.into_body();

    if status >= 400 {
        let error_body = body
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read error body)"));
        return Err(RenderError::Http(format!("HTTP {status}: {error_body}")));
    }

    body.read_to_vec()
        .map_err(|e| RenderError::Http(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    use super::*;
    use crate::label::Label;
    use crate::renderer::tests::png_header;
    use pretty_assertions::assert_eq;

    /// One-shot HTTP server returning a fixed response; yields the request it saw.
    fn serve_once(status: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let status = status.to_owned();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            request
        });

        (url, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).into_owned();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + length || n == 0 {
                    return text;
                }
            } else if n == 0 {
                return text;
            }
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let renderer =
            KrokiRenderer::new("https://kroki.io/", dir.path(), &MermaidStyle::default()).unwrap();
        assert_eq!(renderer.endpoint(), "https://kroki.io/mermaid/png");
    }

    #[test]
    fn test_styled_source_prepends_directive() {
        let dir = tempfile::tempdir().unwrap();
        let renderer =
            KrokiRenderer::new("https://kroki.io", dir.path(), &MermaidStyle::default()).unwrap();

        let source = renderer.styled_source("graph TD\n  A-->B\n");

        assert!(source.starts_with("%%{init: {"));
        assert!(source.ends_with("}}%%\ngraph TD\n  A-->B\n"));
    }

    #[tokio::test]
    async fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let (url, server) = serve_once("200 OK", png_header(200, 100));
        let renderer = KrokiRenderer::new(&url, dir.path().join("images"), &MermaidStyle::default())
            .unwrap()
            .timeout(Duration::from_secs(5));
        let label = Label::new("Flow 1");

        let image = renderer
            .render(&RenderRequest {
                source: "graph TD; X-->Y;\n",
                label: &label,
            })
            .await
            .unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /mermaid/png "));
        assert!(request.contains("graph TD; X-->Y;"));
        assert_eq!(image.path, dir.path().join("images/image_Flow_1.png"));
        assert_eq!((image.width, image.height), (200, 100));
        assert_eq!(std::fs::read(&image.path).unwrap(), png_header(200, 100));
    }

    #[tokio::test]
    async fn test_render_reports_http_error_body() {
        let dir = tempfile::tempdir().unwrap();
        let (url, server) = serve_once("400 Bad Request", b"Syntax error in graph".to_vec());
        let renderer = KrokiRenderer::new(&url, dir.path(), &MermaidStyle::default()).unwrap();
        let label = Label::new("Bad");

        let err = renderer
            .render(&RenderRequest {
                source: "graph ???",
                label: &label,
            })
            .await
            .unwrap_err();

        server.join().unwrap();
        match err {
            RenderError::Http(message) => {
                assert_eq!(message, "HTTP 400: Syntax error in graph");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("image_Bad.png").exists());
    }

    #[tokio::test]
    async fn test_render_rejects_non_png_response() {
        let dir = tempfile::tempdir().unwrap();
        let (url, server) = serve_once("200 OK", b"<svg/>".to_vec());
        let renderer = KrokiRenderer::new(&url, dir.path(), &MermaidStyle::default()).unwrap();
        let label = Label::new("A");

        let err = renderer
            .render(&RenderRequest {
                source: "graph TD",
                label: &label,
            })
            .await
            .unwrap_err();

        server.join().unwrap();
        assert!(matches!(err, RenderError::InvalidPng(_)));
        assert!(!dir.path().join("image_A.png").exists());
    }
}
