//! Small HTML helpers shared by the renderer and the loader.

use std::sync::LazyLock;

use regex::Regex;

static NON_ALNUM_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").expect("valid regex"));

/// Escape text for use in element content and quoted attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Insert `<br />` before every line break, keeping the break itself.
#[must_use]
pub fn nl2br(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str("<br />\r\n");
            }
            '\r' | '\n' => {
                out.push_str("<br />");
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Collapse every run of non-alphanumeric characters into one hyphen.
#[must_use]
pub fn sanitize_id(id: &str) -> String {
    NON_ALNUM_RUN.replace_all(id, "-").into_owned()
}

/// Neutralize sequences that would end an inline `<script>` early.
#[must_use]
pub fn escape_inline_script(js: &str) -> String {
    js.replace("<!--", "<\\!--").replace("</s", "<\\/s")
}
