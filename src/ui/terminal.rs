//! Terminal presentation of a research session.

use std::borrow::Cow;
use std::io::{self, Write};

use console::{Style, style};

use crate::event::{EventKind, ModelDescriptor};
use crate::history::HistoryEntry;
use crate::render::{Body, RenderedUnit, Span};
use crate::session::ViewUpdate;
use crate::status::{Severity, StatusSnapshot};

/// Characters of a question shown in the history list.
const HISTORY_LABEL_CHARS: usize = 30;

/// Server text made safe for a terminal: escape sequences are removed and
/// other control characters except newline and tab are dropped.
#[must_use]
pub fn sanitize(text: &str) -> Cow<'_, str> {
    let stripped = console::strip_ansi_codes(text);
    if !stripped.chars().any(is_unsafe_control) {
        return stripped;
    }
    Cow::Owned(stripped.chars().filter(|&c| !is_unsafe_control(c)).collect())
}

fn is_unsafe_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Badge style for a severity.
#[must_use]
pub fn badge_style(severity: Severity) -> Style {
    match severity {
        Severity::Neutral => Style::new().white().on_black(),
        Severity::Info => Style::new().white().on_blue(),
        Severity::Success => Style::new().black().on_green(),
        Severity::Danger => Style::new().white().on_red(),
    }
}

/// Accent applied to a unit's text by kind.
fn kind_style(kind: &EventKind) -> Style {
    match kind {
        EventKind::Error => Style::new().red(),
        EventKind::Success => Style::new().green(),
        EventKind::ToolOutput => Style::new().dim(),
        _ => Style::new(),
    }
}

#[must_use]
pub fn format_status(status: &StatusSnapshot) -> String {
    badge_style(status.severity)
        .apply_to(format!(" {} ", sanitize(&status.label)))
        .to_string()
}

#[must_use]
pub fn format_spans(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text { text, bold, italic } => {
                let mut s = Style::new();
                if *bold {
                    s = s.bold();
                }
                if *italic {
                    s = s.italic();
                }
                out.push_str(&s.apply_to(sanitize(text)).to_string());
            }
            Span::LineBreak => out.push('\n'),
            Span::ParagraphBreak => out.push_str("\n\n"),
        }
    }
    out
}

/// One output unit as terminal text, without trailing newline.
#[must_use]
pub fn format_unit(unit: &RenderedUnit) -> String {
    let accent = kind_style(&unit.kind);
    match &unit.body {
        Body::Plain(text) => accent.apply_to(sanitize(text)).to_string(),
        Body::Preformatted(text) => sanitize(text)
            .lines()
            .map(|line| format!("    {}", accent.apply_to(line)))
            .collect::<Vec<_>>()
            .join("\n"),
        Body::Rich(spans) => format_spans(spans),
    }
}

/// A whole output log, one unit per line group.
#[must_use]
pub fn format_log(units: &[RenderedUnit]) -> String {
    units.iter().map(format_unit).collect::<Vec<_>>().join("\n")
}

#[must_use]
pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return style("No research history yet").dim().to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{i:>2}  {:<33}  {}  {}",
                sanitize(&entry.label(HISTORY_LABEL_CHARS)),
                style(entry.display_time()).dim(),
                style(sanitize(&entry.model_id)).cyan()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn format_models(models: &[ModelDescriptor]) -> String {
    models
        .iter()
        .map(|m| {
            format!(
                "{}  {}  {}",
                style(sanitize(&m.id)).bold(),
                sanitize(&m.name),
                style(sanitize(&m.description)).dim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes view updates to a terminal, one line group per update.
#[derive(Debug)]
pub struct TerminalView<W: Write> {
    out: W,
    show_status_line: bool,
}

impl TerminalView<io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_status_line: false,
        }
    }

    /// Also print status-line changes (they usually duplicate the log).
    #[must_use]
    pub fn with_status_line(mut self, show: bool) -> Self {
        self.show_status_line = show;
        self
    }

    pub fn apply(&mut self, update: &ViewUpdate) -> io::Result<()> {
        match update {
            ViewUpdate::Cleared => writeln!(self.out, "{}", style("─".repeat(60)).dim()),
            ViewUpdate::Appended(unit) => writeln!(self.out, "{}", format_unit(unit)),
            ViewUpdate::Status(status) => writeln!(self.out, "{}", format_status(status)),
            ViewUpdate::StatusLine(line) if self.show_status_line => {
                writeln!(self.out, "{} {}", style("»").dim(), style(sanitize(line)).dim())
            }
            ViewUpdate::Question(Some(question)) => {
                writeln!(self.out, "{} {}", style("Question:").bold(), sanitize(question))
            }
            ViewUpdate::Connection(false) => {
                writeln!(self.out, "{}", badge_style(Severity::Danger).apply_to(" Disconnected "))
            }
            _ => Ok(()),
        }?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
