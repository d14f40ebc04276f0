//! Figure markup that replaces a rendered block.
//!
//! A rendered block becomes exactly two lines: a centered image and a
//! centered caption, tied together by a `_FIG{...}` figure reference.

use crate::html::escape_html;
use crate::label::Label;
use crate::renderer::RenderedImage;

/// Trait for generating the two replacement lines of a rendered block.
///
/// Implement this trait to customize how figures are embedded. Neither
/// method may return text containing a line break.
pub trait FigureTagGenerator: Send + Sync {
    /// Image line referencing the rendered file.
    fn image_tag(&self, image: &RenderedImage, label: &Label) -> String;

    /// Caption line for the figure.
    fn caption(&self, label: &Label) -> String;
}

/// Centered `<img>` + caption paragraphs.
///
/// Generates:
/// - `<p align="center"><img src="{base}/{file}" border="0" id="_FIG{sanitized}"/></p>`
/// - `<p style="text-align: center; margin-bottom:1">Figure _FIG{sanitized} : {label}</p>`
///
/// The figure reference uses the sanitized label so it is a valid identifier;
/// the caption text uses the label as written.
#[derive(Debug)]
pub struct CenteredFigureTags {
    /// Path prefix written in front of image file names (e.g., "images").
    pub image_base: String,
}

impl CenteredFigureTags {
    /// Create a tag generator with the given image path prefix.
    #[must_use]
    pub fn new(image_base: impl Into<String>) -> Self {
        Self {
            image_base: image_base.into(),
        }
    }

    fn image_src(&self, file_name: &str) -> String {
        let base = self.image_base.trim_end_matches(['/', '\\']);
        if base.is_empty() {
            file_name.to_owned()
        } else {
            format!("{base}/{file_name}")
        }
    }
}

impl Default for CenteredFigureTags {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FigureTagGenerator for CenteredFigureTags {
    fn image_tag(&self, image: &RenderedImage, label: &Label) -> String {
        let file_name = image
            .file_name()
            .map_or_else(|| label.image_file_name(), str::to_owned);
        format!(
            r#"<p align="center"><img src="{}" border="0" id="_FIG{{{}}}"/></p>"#,
            escape_html(&self.image_src(&file_name)),
            label.sanitized()
        )
    }

    fn caption(&self, label: &Label) -> String {
        format!(
            r#"<p style="text-align: center; margin-bottom:1">Figure _FIG{{{}}} : {}</p>"#,
            label.sanitized(),
            escape_html(label.display())
        )
    }
}
