//! Text transformations applied to non-script resources before embedding
//!
//! Everything here is pure string handling: literal escaping, the escaping
//! of properties files, whitespace minification of markup and normalisation
//! of JSON documents.

use std::{borrow::Cow, sync::LazyLock};

use log::warn;
use regex::Regex;

/// Whitespace-significant tag (`<pre>`, optionally namespaced) in markup
static PRE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:\w+:)?pre\b").expect("PRE_TAG pattern is valid")
});

static MARKUP_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("MARKUP_COMMENT pattern is valid"));

static INTER_TAG_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("INTER_TAG_WHITESPACE pattern is valid"));

/// Double-quoted JSON string, used for module and section names
pub fn quoted_name(name: &str) -> String {
    serde_json::Value::from(name).to_string()
}

/// Single-quoted script string literal
pub fn make_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('\'');
    for ch in text.chars() {
        match ch {
            '\'' => literal.push_str("\\'"),
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\t' => literal.push_str("\\t"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\u{000C}' => literal.push_str("\\f"),
            '\u{2028}' | '\u{2029}' => {
                literal.push_str(&format!("\\u{:04x}", u32::from(ch)));
            }
            _ => literal.push(ch),
        }
    }
    literal.push('\'');
    literal
}

/// Escape every non-ASCII character as `\uXXXX`
///
/// Properties files are ISO-8859-1; escaping keeps them intact regardless of
/// the encoding the bundle is served with.
pub fn escape_properties(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04X}"));
            }
        }
    }
    Cow::Owned(escaped)
}

pub fn has_whitespace_significant_tag(markup: &str) -> bool {
    PRE_TAG.is_match(markup)
}

/// Drop comments and whitespace between tags
///
/// Markup containing a `<pre>` tag is returned untouched.
pub fn minify_markup(markup: &str) -> Cow<'_, str> {
    if has_whitespace_significant_tag(markup) {
        return Cow::Borrowed(markup);
    }
    let without_comments = MARKUP_COMMENT.replace_all(markup, "");
    let collapsed = INTER_TAG_WHITESPACE.replace_all(&without_comments, "><");
    Cow::Owned(collapsed.trim().to_owned())
}

/// Parse and re-serialise a JSON document to strip formatting
///
/// Invalid JSON is returned untouched.
pub fn normalize_json<'t>(module: &str, json: &'t str) -> Cow<'t, str> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => Cow::Owned(value.to_string()),
        Err(err) => {
            warn!("Cannot normalize JSON of {module}, embedding it as is: {err}");
            Cow::Borrowed(json)
        }
    }
}
