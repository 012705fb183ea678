//! Text formatting shared by every host.
//!
//! User text is escaped so it can never become markup. Assistant text gets a
//! tiny markdown subset: newlines become line breaks and `**x**` becomes bold.

use regex::Regex;
use std::sync::OnceLock;

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    // Non-greedy, so `**a** and **b**` yields two spans
    BOLD.get_or_init(|| Regex::new(r"(?s)\*\*(.*?)\*\*").expect("bold pattern is valid"))
}

/// Escape `<` and `>` so user input renders as literal characters
pub fn escape_user_text(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Assistant response as HTML: one pass for line breaks, one pass for bold
pub fn format_assistant_html(text: &str) -> String {
    let with_breaks = text.replace('\n', "<br>");
    bold_pattern()
        .replace_all(&with_breaks, "<strong>$1</strong>")
        .into_owned()
}

/// A run of text with uniform styling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
}

impl Segment {
    fn new(text: &str, bold: bool) -> Self {
        Self {
            text: text.to_string(),
            bold,
        }
    }
}

/// Assistant response as styled lines for hosts that don't speak HTML.
///
/// Follows the same rules as [`format_assistant_html`]: bold spans may cross a
/// line break, and an unmatched `**` stays literal.
pub fn parse_inline(text: &str) -> Vec<Vec<Segment>> {
    let mut runs: Vec<Segment> = Vec::new();
    let mut last = 0;
    for caps in bold_pattern().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            runs.push(Segment::new(&text[last..whole.start()], false));
        }
        runs.push(Segment::new(inner.as_str(), true));
        last = whole.end();
    }
    if last < text.len() {
        runs.push(Segment::new(&text[last..], false));
    }

    let mut lines: Vec<Vec<Segment>> = vec![Vec::new()];
    for run in runs {
        for (i, piece) in run.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
            }
            if !piece.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push(Segment::new(piece, run.bold));
                }
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_markup_is_escaped() {
        assert_eq!(escape_user_text("<b>hi</b>"), "&lt;b&gt;hi&lt;/b&gt;");
        assert_eq!(escape_user_text("a < b"), "a &lt; b");
    }

    #[test]
    fn test_assistant_bold_and_breaks() {
        assert_eq!(
            format_assistant_html("You need a **student visa**."),
            "You need a <strong>student visa</strong>."
        );
        assert_eq!(format_assistant_html("one\ntwo"), "one<br>two");
        assert_eq!(
            format_assistant_html("**a** and **b**"),
            "<strong>a</strong> and <strong>b</strong>"
        );
    }

    #[test]
    fn test_unmatched_bold_is_literal() {
        assert_eq!(format_assistant_html("a **b"), "a **b");
        let lines = parse_inline("a **b");
        assert_eq!(lines, vec![vec![Segment::new("a **b", false)]]);
    }

    #[test]
    fn test_parse_inline_segments() {
        let lines = parse_inline("You need a **student visa**.\nApply **now**");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            vec![
                Segment::new("You need a ", false),
                Segment::new("student visa", true),
                Segment::new(".", false),
            ]
        );
        assert_eq!(
            lines[1],
            vec![Segment::new("Apply ", false), Segment::new("now", true)]
        );
    }

    #[test]
    fn test_bold_across_line_break() {
        assert_eq!(format_assistant_html("**a\nb**"), "<strong>a<br>b</strong>");
        let lines = parse_inline("**a\nb**");
        assert_eq!(lines, vec![vec![Segment::new("a", true)], vec![Segment::new("b", true)]]);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let lines = parse_inline("a\n\nb");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_empty());
    }
}
