//! Mermaid styling.
//!
//! Styles reach the Mermaid engine as a JSON initialize object built with
//! serde, so quotes, braces and markup in configured values cannot break the
//! surrounding page or directive.

use serde::Serialize;

/// Visual style applied to every rendered diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MermaidStyle {
    /// Page and diagram background color.
    pub background_color: String,
    /// Primary node fill color.
    pub node_color: String,
    /// Font family for all diagram text.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: u32,
}

impl Default for MermaidStyle {
    fn default() -> Self {
        Self {
            background_color: "white".to_owned(),
            node_color: "#1f78b4".to_owned(),
            font_family: "Arial, sans-serif".to_owned(),
            font_size: 14,
        }
    }
}

/// `mermaid.initialize()` argument.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_on_load: Option<bool>,
    theme: &'static str,
    theme_variables: ThemeVariables<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables<'a> {
    background: &'a str,
    primary_color: &'a str,
    font_family: &'a str,
    font_size: String,
}

impl MermaidStyle {
    fn init_config(&self, start_on_load: Option<bool>) -> InitConfig<'_> {
        InitConfig {
            start_on_load,
            // Only the "base" theme honors custom themeVariables.
            theme: "base",
            theme_variables: ThemeVariables {
                background: &self.background_color,
                primary_color: &self.node_color,
                font_family: &self.font_family,
                font_size: format!("{}px", self.font_size),
            },
        }
    }

    /// Initialize object for a page script, safe to embed inside `<script>`.
    ///
    /// Diagrams are started explicitly with `mermaid.run()`, so
    /// `startOnLoad` is `false`.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&self.init_config(Some(false)))?;
        Ok(escape_script_json(&json))
    }

    /// Mermaid `%%{init: ...}%%` directive to prepend to diagram source.
    pub fn init_directive(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&self.init_config(None))?;
        // `%` never appears in JSON outside strings; escaping it keeps `}%%` out of values
        Ok(format!("%%{{init: {}}}%%", json.replace('%', "\\u0025")))
    }
}

/// Escape characters that could end a `<script>` element or open markup.
///
/// These only occur inside JSON strings, where `\uXXXX` escapes are valid.
pub(crate) fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
