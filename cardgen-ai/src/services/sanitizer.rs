//! Text sanitization for generator output
//!
//! Card text ends up rendered as HTML by the store, so anything script-like is
//! removed before a card is accepted. Also strips the wrappers language models
//! like to add around otherwise good answers.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<iframe\b[^>]*>.*?</iframe\s*>",
    )
    .unwrap()
});

/// Unpaired or self-closing script-like tags left after block removal
static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(script|style|iframe|object|embed)\b[^>]*>").unwrap());

/// Opening or self-closing tag; attribute scrubbing only happens inside these spans
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z][^<>]*>").unwrap());

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static JAVASCRIPT_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\r]+").unwrap());

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n[ \n]*\n ?").unwrap());

static SINGLE_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r" ?\n ?").unwrap());

static PREAMBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(answer|question|front|back)\s*:\s*").unwrap());

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\n?(.*?)\n?\s*```\s*$").unwrap());

/// Remove script-like markup and collapse whitespace
///
/// Runs of spaces/tabs collapse to one space, blank-line runs collapse to a
/// single blank line, and the result is trimmed.
pub fn sanitize(text: &str) -> String {
    let text = HTML_COMMENT.replace_all(text, "");
    let text = SCRIPT_BLOCK.replace_all(&text, "");
    let text = SCRIPT_TAG.replace_all(&text, "");
    let text = scrub_tags(&text);
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = collapse_single_newlines(&text);
    text.trim().to_string()
}

/// Drop `on*=` handlers and `javascript:` schemes from tag attributes
fn scrub_tags(text: &str) -> String {
    TAG.replace_all(text, |caps: &regex::Captures| {
        let tag = EVENT_HANDLER.replace_all(&caps[0], "");
        JAVASCRIPT_SCHEME.replace_all(&tag, "").into_owned()
    })
    .into_owned()
}

fn collapse_single_newlines(text: &str) -> String {
    // Trim spaces hugging a lone newline without touching paragraph breaks
    text.split("\n\n")
        .map(|part| SINGLE_NEWLINE.replace_all(part, "\n").into_owned())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strip AI preambles (`Answer:`, `Front:`, ...) and fenced code-block wrappers
pub fn strip_preamble(text: &str) -> String {
    let unfenced = unwrap_code_fence(text);
    PREAMBLE.replace(&unfenced, "").trim().to_string()
}

/// Unwrap text entirely enclosed in a ``` fence
pub fn unwrap_code_fence(text: &str) -> String {
    match CODE_FENCE.captures(text) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => text.trim().to_string(),
    }
}

/// Sanitize then strip preambles: the full cleanup applied to card text
pub fn clean_card_text(text: &str) -> String {
    sanitize(&strip_preamble(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize("What is the capital of France?"), "What is the capital of France?");
    }

    #[test]
    fn test_script_blocks_removed() {
        let dirty = "Paris<script>alert('x')</script> is the capital";
        assert_eq!(sanitize(dirty), "Paris is the capital");

        let multiline = "A<SCRIPT type=\"text/javascript\">\nsteal();\n</SCRIPT>B";
        assert_eq!(sanitize(multiline), "AB");
    }

    #[test]
    fn test_dangling_script_tag_removed() {
        assert_eq!(sanitize("x <script src=evil.js> y"), "x y");
    }

    #[test]
    fn test_event_handlers_removed() {
        let dirty = r#"<img src="a.png" onerror="alert(1)"> <b onclick='go()'>bold</b>"#;
        assert_eq!(sanitize(dirty), r#"<img src="a.png"> <b>bold</b>"#);
    }

    #[test]
    fn test_unquoted_handler_inside_tag_removed() {
        assert_eq!(sanitize("<b onclick=go()>bold</b>"), "<b>bold</b>");
        assert_eq!(sanitize("<img src=a.png onerror=alert(1)>"), "<img src=a.png>");
    }

    #[test]
    fn test_text_resembling_handlers_untouched() {
        assert_eq!(sanitize("two plus one = three"), "two plus one = three");
        assert_eq!(sanitize("x + one = 2"), "x + one = 2");
        assert_eq!(clean_card_text("If only = 1, what is x?"), "If only = 1, what is x?");
        assert_eq!(
            sanitize("JavaScript: a language for the web"),
            "JavaScript: a language for the web"
        );
        assert_eq!(sanitize("if a < b and one = c > d"), "if a < b and one = c > d");
    }

    #[test]
    fn test_javascript_scheme_removed() {
        let dirty = r#"<a href="javascript:alert(1)">link</a>"#;
        assert_eq!(sanitize(dirty), r#"<a href="alert(1)">link</a>"#);
    }

    #[test]
    fn test_html_comments_removed() {
        assert_eq!(sanitize("keep <!-- hidden\nstuff --> this"), "keep this");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(sanitize("  a \t  b  "), "a b");
        assert_eq!(sanitize("line one\n\n\n\nline two"), "line one\n\nline two");
        assert_eq!(sanitize("item 1 \n item 2"), "item 1\nitem 2");
    }

    #[test]
    fn test_preamble_stripped() {
        assert_eq!(strip_preamble("Answer: 42"), "42");
        assert_eq!(strip_preamble("  question:  Why?"), "Why?");
        assert_eq!(strip_preamble("Back: Mitochondria"), "Mitochondria");
        // Mid-text labels stay
        assert_eq!(strip_preamble("The Answer: 42"), "The Answer: 42");
    }

    #[test]
    fn test_code_fence_unwrapped() {
        assert_eq!(unwrap_code_fence("```\nfn main() {}\n```"), "fn main() {}");
        assert_eq!(unwrap_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(unwrap_code_fence("no fence"), "no fence");
    }

    #[test]
    fn test_clean_card_text_combines_steps() {
        assert_eq!(
            clean_card_text("```\nAnswer: The <b onclick=\"x()\">cell</b>   wall\n```"),
            "The <b>cell</b> wall"
        );
    }
}
