//! Colored terminal output utilities.

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
    dim: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Print one diagram block: source line (dimmed), label, image file.
    pub(crate) fn block(&self, line: usize, label: &str, image: &str) {
        let _ = self.term.write_line(&format!(
            "{} {label:<32} {image}",
            self.dim.apply_to(format!("{line:>5}"))
        ));
    }

    /// Print the closing summary of a render run.
    ///
    /// Green when every block rendered, yellow when some were dropped.
    pub(crate) fn summary(&self, rendered: usize, total: usize, path: &str) {
        let msg = format!("Rendered {rendered}/{total} diagrams into {path}");
        if rendered == total {
            self.success(&msg);
        } else {
            self.warning(&msg);
        }
    }
}
