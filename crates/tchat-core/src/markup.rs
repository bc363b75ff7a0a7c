//! Plain-text rendering of the chatbox markup dialect.
//!
//! A monospace terminal has no bold or italic, so bold text is upper-cased,
//! italic text is wrapped in underscores and colour wrappers are dropped.

use regex::{Captures, Regex};
use std::sync::OnceLock;

struct MarkupPatterns {
    bold: Regex,
    italic: Regex,
    color: Regex,
}

fn patterns() -> &'static MarkupPatterns {
    static PATTERNS: OnceLock<MarkupPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MarkupPatterns {
        bold: Regex::new(r"(?s)\[b\](.*?)\[/b\]").expect("valid regex"),
        italic: Regex::new(r"(?s)\[i\](.*?)\[/i\]").expect("valid regex"),
        color: Regex::new(r"(?s)\[color=([^\]]+)\](.*?)\[/color\]").expect("valid regex"),
    })
}

/// Rewrites `[b]`, `[i]` and `[color=..]` spans into plain text.
///
/// Passes run in a fixed order (bold, italic, colour) and each sees the
/// output of the previous one. Tags without a matching close are kept as-is.
pub fn normalize(text: &str) -> String {
    let patterns = patterns();
    let text = patterns
        .bold
        .replace_all(text, |caps: &Captures| caps[1].to_uppercase());
    let text = patterns
        .italic
        .replace_all(&text, |caps: &Captures| format!("_{}_", &caps[1]));
    let text = patterns
        .color
        .replace_all(&text, |caps: &Captures| caps[2].to_string());
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_is_upper_cased() {
        assert_eq!(normalize("[b]hi[/b]"), "HI");
    }

    #[test]
    fn italic_is_wrapped_in_underscores() {
        assert_eq!(normalize("[i]hi[/i]"), "_hi_");
    }

    #[test]
    fn color_attribute_is_discarded() {
        assert_eq!(normalize("[color=#ff0000]hi[/color]"), "hi");
    }

    #[test]
    fn tag_free_text_is_a_fixed_point() {
        for text in [
            "",
            "plain words",
            "brackets [like this] stay",
            "multi\nline\ttext",
            "ünïcödé ✓",
        ] {
            let once = normalize(text);
            assert_eq!(once, text);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn mixed_markup_inside_color() {
        assert_eq!(
            normalize("[color=red][b]loud[/b] and [i]soft[/i][/color] done"),
            "LOUD and _soft_ done"
        );
    }

    #[test]
    fn spans_cross_newlines() {
        assert_eq!(normalize("[b]one\ntwo[/b]"), "ONE\nTWO");
    }

    #[test]
    fn each_span_matches_shortest_close() {
        assert_eq!(normalize("[b]a[/b] x [b]b[/b]"), "A x B");
    }

    #[test]
    fn malformed_tags_are_left_verbatim() {
        assert_eq!(normalize("[b]open only"), "[b]open only");
        assert_eq!(normalize("[color=]x[/color]"), "[color=]x[/color]");
        assert_eq!(normalize("close only[/i]"), "close only[/i]");
    }
}
