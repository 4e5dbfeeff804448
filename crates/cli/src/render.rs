// Nested text rendering of validation diagnostics

use crossterm::style::{StyledContent, Stylize};
use hips_recon::{Diagnostic, Severity};

const INDENT: &str = "  ";

/// Bracketed prefix shared by the tree and the `--verbose` logger.
pub fn prefix(label: &str) -> String {
    format!("[hips/{label:<8}]")
}

fn styled(severity: Severity, text: String) -> StyledContent<String> {
    match severity {
        Severity::Debug => text.dark_grey(),
        Severity::Info => text.stylize(),
        Severity::Warning => text.yellow(),
        Severity::Error => text.red(),
        Severity::Critical => text.red().bold(),
    }
}

/// One diagnostic as a single line, indented by its depth.
pub fn render_line(diagnostic: &Diagnostic, color: bool) -> String {
    let head = prefix(diagnostic.severity.as_str());
    let head = if color {
        styled(diagnostic.severity, head).to_string()
    } else {
        head
    };
    format!("{head} {}{}", INDENT.repeat(diagnostic.depth()), diagnostic.message)
}

/// Render every diagnostic at or above `min_severity`, one per line.
pub fn render_tree(diagnostics: &[Diagnostic], min_severity: Severity, color: bool) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics.iter().filter(|d| d.severity >= min_severity) {
        out.push_str(&render_line(diagnostic, color));
        out.push('\n');
    }
    out
}
