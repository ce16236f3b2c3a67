//! Restricted inline markup for answer text.
//!
//! Four substitutions are applied in a fixed order, each one a global,
//! left-to-right, non-overlapping pass over the output of the previous one:
//!
//! 1. `**x**` → bold
//! 2. `*x*` → italic
//! 3. blank line (`\n\n`) → paragraph break
//! 4. remaining `\n` → line break
//!
//! Emphasis never spans a newline. The result is a flat list of typed
//! [`Span`]s; nothing in the input is ever interpreted as markup beyond
//! the asterisk and newline rules above.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("italic pattern"));

/// A typed piece of formatted answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "span", rename_all = "snake_case")]
pub enum Span {
    Text { text: String, bold: bool, italic: bool },
    LineBreak,
    ParagraphBreak,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            bold: true,
            italic: false,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            bold: false,
            italic: true,
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Style {
    bold: bool,
    italic: bool,
    hidden: bool,
}

/// Parse answer text into spans.
#[must_use]
pub fn parse(input: &str) -> Vec<Span> {
    // Pass 1: strip bold markers, remembering which bytes were inside them.
    let mut text = String::with_capacity(input.len());
    let mut styles: Vec<Style> = Vec::with_capacity(input.len());
    let mut last = 0;
    for caps in BOLD.captures_iter(input) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_styled(&mut text, &mut styles, &input[last..whole.start()], false);
        push_styled(&mut text, &mut styles, inner.as_str(), true);
        last = whole.end();
    }
    push_styled(&mut text, &mut styles, &input[last..], false);

    // Pass 2: italic over the bold-stripped text. Bold boundaries carry no
    // asterisks or newlines, so matching the stripped text is equivalent.
    for caps in ITALIC.captures_iter(&text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        styles[whole.start()].hidden = true;
        styles[whole.end() - 1].hidden = true;
        for style in &mut styles[inner.start()..inner.end()] {
            style.italic = true;
        }
    }

    // Passes 3 and 4: newlines become breaks, everything else groups into runs.
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_style = Style::default();
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let style = styles[idx];
        if style.hidden {
            continue;
        }
        if ch == '\n' {
            flush(&mut spans, &mut run, run_style);
            if chars.peek().is_some_and(|&(_, next)| next == '\n') {
                chars.next();
                spans.push(Span::ParagraphBreak);
            } else {
                spans.push(Span::LineBreak);
            }
            continue;
        }
        if !run.is_empty() && (style.bold, style.italic) != (run_style.bold, run_style.italic) {
            flush(&mut spans, &mut run, run_style);
        }
        if run.is_empty() {
            run_style = style;
        }
        run.push(ch);
    }
    flush(&mut spans, &mut run, run_style);
    spans
}

/// Plain-text projection of a span list, with breaks as newlines.
#[must_use]
pub fn to_plain_text(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text { text, .. } => out.push_str(text),
            Span::LineBreak => out.push('\n'),
            Span::ParagraphBreak => out.push_str("\n\n"),
        }
    }
    out
}

fn push_styled(text: &mut String, styles: &mut Vec<Style>, piece: &str, bold: bool) {
    text.push_str(piece);
    styles.extend(std::iter::repeat_n(
        Style {
            bold,
            ..Style::default()
        },
        piece.len(),
    ));
}

fn flush(spans: &mut Vec<Span>, run: &mut String, style: Style) {
    if run.is_empty() {
        return;
    }
    spans.push(Span::Text {
        text: std::mem::take(run),
        bold: style.bold,
        italic: style.italic,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_and_paragraph() {
        let spans = parse("**bold** and *it*\n\nend");
        assert_eq!(
            spans,
            vec![
                Span::bold("bold"),
                Span::plain(" and "),
                Span::italic("it"),
                Span::ParagraphBreak,
                Span::plain("end"),
            ]
        );
    }

    #[test]
    fn test_triple_asterisks_resolve_bold_first() {
        // "***x***" -> bold("*x") + "*" -> italic applied over the bold run.
        let spans = parse("***x***");
        assert_eq!(
            spans,
            vec![Span::Text {
                text: "x".to_string(),
                bold: true,
                italic: true,
            }]
        );
    }

    #[test]
    fn test_italic_spans_across_bold() {
        let spans = parse("*a **b** c*");
        assert_eq!(
            spans,
            vec![
                Span::italic("a "),
                Span::Text {
                    text: "b".to_string(),
                    bold: true,
                    italic: true,
                },
                Span::italic(" c"),
            ]
        );
    }

    #[test]
    fn test_newline_rules() {
        assert_eq!(
            parse("a\nb\n\n\nc"),
            vec![
                Span::plain("a"),
                Span::LineBreak,
                Span::plain("b"),
                Span::ParagraphBreak,
                Span::LineBreak,
                Span::plain("c"),
            ]
        );
    }

    #[test]
    fn test_emphasis_does_not_cross_lines() {
        assert_eq!(
            parse("*a\nb*"),
            vec![Span::plain("*a"), Span::LineBreak, Span::plain("b*")]
        );
    }

    #[test]
    fn test_unpaired_asterisk_is_literal() {
        assert_eq!(parse("2 * 3 = 6"), vec![Span::plain("2 * 3 = 6")]);
    }

    #[test]
    fn test_markup_like_text_stays_literal() {
        let spans = parse("<script>alert(1)</script>");
        assert_eq!(spans, vec![Span::plain("<script>alert(1)</script>")]);
    }

    #[test]
    fn test_empty_emphasis_produces_no_span() {
        assert_eq!(parse("****x"), vec![Span::plain("x")]);
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            parse("**héllo** ünï"),
            vec![Span::bold("héllo"), Span::plain(" ünï")]
        );
        assert_eq!(to_plain_text(&parse("é\n\nü")), "é\n\nü");
    }
}
