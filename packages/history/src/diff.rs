//! Character-level description diffs rendered as inline HTML.
//!
//! Deletions are wrapped in `<del>`, insertions in `<ins>`, both with a
//! light background tint; unchanged runs in plain `<span>`s. Newlines
//! render as a pilcrow plus `<br>` so the diff stays one readable block.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

/// Renders the difference between two descriptions as an HTML fragment.
#[must_use]
pub fn html_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_chars(old, new);

    // Coalesce per-character changes into runs per tag.
    let mut runs: Vec<(ChangeTag, String)> = Vec::new();
    for change in diff.iter_all_changes() {
        match runs.last_mut() {
            Some((tag, text)) if *tag == change.tag() => text.push_str(change.value()),
            _ => runs.push((change.tag(), change.value().to_string())),
        }
    }

    let mut out = String::new();
    for (tag, text) in runs {
        let text = escape_html(&text).replace('\n', "&para;<br>");
        match tag {
            ChangeTag::Equal => {
                let _ = write!(out, "<span>{text}</span>");
            }
            ChangeTag::Delete => {
                let _ = write!(out, "<del style=\"background:#ffe6e6;\">{text}</del>");
            }
            ChangeTag::Insert => {
                let _ = write!(out, "<ins style=\"background:#e6ffe6;\">{text}</ins>");
            }
        }
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_text_is_a_single_span() {
        assert_eq!(html_diff("päron", "päron"), "<span>päron</span>");
    }

    #[test]
    fn insertion_and_deletion_are_marked() {
        let html = html_diff("surt", "sött");
        assert!(html.contains("<del style=\"background:#ffe6e6;\">"));
        assert!(html.contains("<ins style=\"background:#e6ffe6;\">"));
    }

    #[test]
    fn html_in_descriptions_is_escaped() {
        let html = html_diff("<b>äpple</b>", "<b>päron</b>");
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn newlines_render_as_pilcrow_breaks() {
        let html = html_diff("rad1\nrad2", "rad1\nrad2");
        assert_eq!(html, "<span>rad1&para;<br>rad2</span>");
    }

    #[test]
    fn empty_to_text_is_pure_insertion() {
        assert_eq!(
            html_diff("", "nytt"),
            "<ins style=\"background:#e6ffe6;\">nytt</ins>"
        );
    }
}
