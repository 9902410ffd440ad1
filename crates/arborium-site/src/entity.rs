//! HTML character reference decoding and escaping.
//!
//! Rendered pages store code block interiors escaped (`&lt;?php`), while the
//! highlighter needs the text a human actually wrote (`<?php`). [`decode`] undoes
//! the escaping and [`encode`] redoes it for text that is emitted without markup.

use std::borrow::Cow;

/// Decode HTML character references into literal characters.
///
/// Covers every named reference HTML defines plus decimal (`&#39;`) and
/// hexadecimal (`&#x27;`) numeric references. Decoding is total: unknown names
/// and stray `&` pass through unchanged.
pub fn decode(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

/// Escape the characters that are special in HTML text and attribute values.
pub fn encode(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
