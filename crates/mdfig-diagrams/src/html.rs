//! HTML helpers: escaping and the browser page that renders one diagram.

use crate::style::{MermaidStyle, escape_script_json};

/// Escape HTML special characters.
pub(crate) fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Build a standalone page that renders `source` with Mermaid.
///
/// Every configured value enters the page as JSON inside the module script;
/// styles are applied from script rather than templated into CSS. The
/// diagram source is HTML-escaped, Mermaid reads it back as text content.
pub(crate) fn diagram_page(
    source: &str,
    style: &MermaidStyle,
    mermaid_url: &str,
) -> Result<String, serde_json::Error> {
    let config = style.to_script_json()?;
    let module_url = escape_script_json(&serde_json::to_string(mermaid_url)?);
    let source = escape_html(source);

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Mermaid Diagram</title>
<style>
  html, body {{ display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; }}
  .mermaid {{ max-width: 80%; max-height: 80%; width: auto; height: auto; }}
</style>
<script type="module">
  const config = {config};
  const vars = config.themeVariables;
  document.documentElement.style.background = vars.background;
  document.body.style.background = vars.background;
  const diagram = document.querySelector(".mermaid");
  diagram.style.fontFamily = vars.fontFamily;
  diagram.style.fontSize = vars.fontSize;
  const {{ default: mermaid }} = await import({module_url});
  mermaid.initialize(config);
  await mermaid.run({{ nodes: [diagram] }});
</script>
</head>
<body>
<div class="mermaid">
{source}</div>
</body>
</html>
"#
    ))
}
