//! Turns a raw assistant reply into lightly marked-up display text.
//!
//! The pipeline is order-sensitive: inline links become anchors first, then
//! the text is partitioned on `**bold**` spans and only the plain spans get
//! the bullet and label rewrites.

use once_cell::sync::Lazy;
use regex::Regex;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*.*?\*\*").expect("valid regex"));

const ANCHOR_TEMPLATE: &str = r#"<a href="${2}" target="_blank" rel="noopener noreferrer" class="text-blue-500 hover:underline">${1}</a>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<'a> {
    Bold(&'a str),
    Plain(&'a str),
}

pub fn format_response(raw: &str) -> String {
    let linked = materialize_links(raw);

    let mut output = String::with_capacity(linked.len() + 16);
    for span in partition_spans(&linked) {
        match span {
            Span::Bold(text) => {
                output.push('\n');
                output.push_str(text);
                output.push('\n');
            }
            Span::Plain(text) => output.push_str(&rewrite_plain(text)),
        }
    }
    output
}

pub fn materialize_links(raw: &str) -> String {
    LINK_RE.replace_all(raw, ANCHOR_TEMPLATE).into_owned()
}

pub fn partition_spans(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut last = 0;

    for found in BOLD_RE.find_iter(text) {
        if found.start() > last {
            spans.push(Span::Plain(&text[last..found.start()]));
        }
        spans.push(Span::Bold(found.as_str()));
        last = found.end();
    }

    if last < text.len() {
        spans.push(Span::Plain(&text[last..]));
    }

    spans
}

// Dash rule runs before the colon rule.
fn rewrite_plain(text: &str) -> String {
    text.replace(" - ", "\n- ").replace(": ", ":\n")
}
