//! Colored terminal output utilities.

use std::fmt::Display;

use console::{Style, Term};

/// Terminal output formatter. Writes to stderr.
pub(crate) struct Output {
    term: Term,
    label: Style,
    ok: Style,
    warn: Style,
    err: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            label: Style::new().cyan().bold(),
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            err: Style::new().red(),
        }
    }

    /// Print a `label: value` line with a highlighted, right-aligned label.
    pub(crate) fn field(&self, label: &str, value: impl Display) {
        let label = self.label.apply_to(format!("{label:>12}"));
        self.line(&format!("{label} {value}"));
    }

    /// Print a plain message.
    pub(crate) fn info(&self, msg: &str) {
        self.line(msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(&self.ok.apply_to(msg).to_string());
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(&self.warn.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.err.apply_to(msg).to_string());
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }
}
