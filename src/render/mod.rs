//! Output rendering.
//!
//! Turns [`ResearchEvent`]s into [`RenderedUnit`]s on an append-only
//! [`OutputSurface`]. Formatting depends on the event kind:
//!
//! - `tool_output`: text that looks like JSON is pretty-printed into a
//!   preformatted block; anything that fails to parse is shown verbatim.
//! - `answer`: restricted inline markup, see [`markup`].
//! - everything else: literal text.
//!
//! The surface exposes no removal or reordering besides a full
//! [`OutputSurface::clear`], which only the session controller calls.

pub mod markup;

use serde::Serialize;

use crate::event::{EventKind, ResearchEvent};

pub use markup::Span;

/// Displayable body of a rendered unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "content", rename_all = "snake_case")]
pub enum Body {
    /// Literal text, no interpretation.
    Plain(String),
    /// Fixed-width block (pretty-printed structured data).
    Preformatted(String),
    /// Formatted answer text.
    Rich(Vec<Span>),
}

impl Body {
    /// Plain-text projection, used for logs and status summaries.
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Plain(text) | Self::Preformatted(text) => text.clone(),
            Self::Rich(spans) => markup::to_plain_text(spans),
        }
    }
}

/// One displayed unit of the output log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedUnit {
    pub kind: EventKind,
    pub body: Body,
}

/// Format one event according to its kind. Never fails.
#[must_use]
pub fn format_event(event: &ResearchEvent) -> RenderedUnit {
    let body = match event.kind {
        EventKind::ToolOutput => format_tool_output(&event.message),
        EventKind::Answer => Body::Rich(markup::parse(&event.message)),
        _ => Body::Plain(event.message.clone()),
    };
    RenderedUnit {
        kind: event.kind.clone(),
        body,
    }
}

fn format_tool_output(message: &str) -> Body {
    let trimmed = message.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Body::Plain(message.to_string());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => Body::Preformatted(pretty),
            Err(_) => Body::Plain(message.to_string()),
        },
        Err(e) => {
            tracing::debug!(
                name: "render.tool_output.not_json",
                error = %e,
                "Tool output looked structured but did not parse; showing verbatim"
            );
            Body::Plain(message.to_string())
        }
    }
}

/// Append-only output log plus the "latest status" summary line.
#[derive(Debug, Clone, Default)]
pub struct OutputSurface {
    units: Vec<RenderedUnit>,
    status_line: String,
    revealed: Option<usize>,
}

impl OutputSurface {
    #[must_use]
    pub fn units(&self) -> &[RenderedUnit] {
        &self.units
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Index of the unit the view was last scrolled to.
    #[must_use]
    pub fn revealed(&self) -> Option<usize> {
        self.revealed
    }

    pub(crate) fn clear(&mut self) {
        self.units.clear();
        self.revealed = None;
    }

    fn append(&mut self, unit: RenderedUnit) -> usize {
        self.units.push(unit);
        let index = self.units.len() - 1;
        self.revealed = Some(index);
        index
    }
}

/// Renders events onto an [`OutputSurface`].
#[derive(Debug, Default)]
pub struct OutputRenderer {
    surface: OutputSurface,
}

impl OutputRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn surface(&self) -> &OutputSurface {
        &self.surface
    }

    /// Append an event to the log and reveal it.
    pub fn render(&mut self, event: &ResearchEvent) -> &RenderedUnit {
        let index = self.surface.append(format_event(event));
        &self.surface.units[index]
    }

    /// Append a progress-type event and mirror its text on the status line.
    pub fn render_progress(&mut self, event: &ResearchEvent) -> &RenderedUnit {
        self.surface.status_line.clone_from(&event.message);
        self.render(event)
    }

    /// Replace the status line without touching the log.
    pub fn set_status_line(&mut self, text: impl Into<String>) {
        self.surface.status_line = text.into();
    }

    pub(crate) fn clear(&mut self) {
        self.surface.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_json_is_pretty_printed() {
        let unit = format_event(&ResearchEvent::new(r#"{"a":1}"#, EventKind::ToolOutput));
        assert_eq!(unit.body, Body::Preformatted("{\n  \"a\": 1\n}".to_string()));
    }

    #[test]
    fn test_tool_output_keeps_key_order() {
        let unit = format_event(&ResearchEvent::new(
            r#"  [{"z":1,"a":2}]  "#,
            EventKind::ToolOutput,
        ));
        assert_eq!(
            unit.body,
            Body::Preformatted("[\n  {\n    \"z\": 1,\n    \"a\": 2\n  }\n]".to_string())
        );
    }

    #[test]
    fn test_tool_output_plain_text() {
        let unit = format_event(&ResearchEvent::new("not json", EventKind::ToolOutput));
        assert_eq!(unit.body, Body::Plain("not json".to_string()));
    }

    #[test]
    fn test_tool_output_broken_json_falls_back() {
        let unit = format_event(&ResearchEvent::new("{broken", EventKind::ToolOutput));
        assert_eq!(unit.body, Body::Plain("{broken".to_string()));
    }

    #[test]
    fn test_non_tool_kinds_are_literal() {
        for kind in ["info", "success", "error", "custom"] {
            let unit = format_event(&ResearchEvent::new("**x** {\"a\":1}", kind));
            assert_eq!(unit.body, Body::Plain("**x** {\"a\":1}".to_string()));
        }
    }

    #[test]
    fn test_answer_is_rich() {
        let unit = format_event(&ResearchEvent::new("**b**", EventKind::Answer));
        assert_eq!(unit.body, Body::Rich(vec![Span::bold("b")]));
    }

    #[test]
    fn test_renderer_appends_in_order_and_reveals_last() {
        let mut renderer = OutputRenderer::new();
        renderer.render(&ResearchEvent::new("one", "info"));
        renderer.render(&ResearchEvent::new("two", "tool_output"));
        let surface = renderer.surface();
        assert_eq!(surface.len(), 2);
        assert_eq!(surface.units()[0].body.to_plain_text(), "one");
        assert_eq!(surface.units()[1].body.to_plain_text(), "two");
        assert_eq!(surface.revealed(), Some(1));
        assert_eq!(surface.status_line(), "");
    }

    #[test]
    fn test_progress_updates_status_line() {
        let mut renderer = OutputRenderer::new();
        renderer.render_progress(&ResearchEvent::new("Starting", "info"));
        renderer.render(&ResearchEvent::new("tool says hi", "tool_output"));
        assert_eq!(renderer.surface().status_line(), "Starting");
        assert_eq!(renderer.surface().len(), 2);
    }
}
