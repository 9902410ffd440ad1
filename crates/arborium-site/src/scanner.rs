//! Locating `<pre><code>` blocks in rendered HTML.
//!
//! This is not an HTML parser. It tokenizes the document into opening
//! `<pre><code ...>` tags and closing `</code></pre>` tags and pairs each opening
//! tag with the nearest closing tag after it. An opening tag that is followed by
//! another opening tag before any closing tag is unterminated and gets skipped,
//! so one broken block can never swallow the next one.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Match, Matches, Regex};

/// Opening or closing code block tag. Attributes may not contain `<`, which keeps
/// a malformed opening tag from running into the following markup.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<pre><code(?:\s[^<>]*)?>|</code></pre>").unwrap());

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

/// A code block found in a document.
///
/// `start..end` covers only the interior, between the end of the opening tag and
/// the start of `</code></pre>`. The interior is still HTML-escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlockSpan<'a> {
    /// Byte offset of the first interior byte.
    pub start: usize,
    /// Byte offset one past the last interior byte.
    pub end: usize,
    /// The escaped interior text, `&document[start..end]`.
    pub raw: &'a str,
    /// The full opening tag, `<pre><code ...>`.
    pub open_tag: &'a str,
}

impl<'a> CodeBlockSpan<'a> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Language named by a `language-*` (or `lang-*`) class on the opening tag.
    pub fn language_hint(&self) -> Option<&'a str> {
        let caps = CLASS_RE.captures(self.open_tag)?;
        let classes = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
        classes.as_str().split_ascii_whitespace().find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
                .filter(|lang| !lang.is_empty())
        })
    }

    /// Whether the interior already contains markup.
    ///
    /// Renderers escape code, so a literal `<` means someone (usually a previous
    /// highlighting pass) already put tags in here.
    pub fn is_marked_up(&self) -> bool {
        self.raw.contains('<')
    }
}

/// Scan `html` for code blocks.
///
/// The returned iterator is lazy, yields non-overlapping spans in document order
/// and can be recreated at any time to get the same spans again.
pub fn scan(html: &str) -> Spans<'_> {
    Spans {
        html,
        tags: TAG_RE.find_iter(html),
        pending: None,
    }
}

/// Iterator over the code blocks of a document. See [`scan`].
#[derive(Debug)]
pub struct Spans<'a> {
    html: &'a str,
    tags: Matches<'static, 'a>,
    pending: Option<Match<'a>>,
}

impl<'a> Iterator for Spans<'a> {
    type Item = CodeBlockSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for tag in self.tags.by_ref() {
            if tag.as_str().starts_with("</") {
                let Some(open) = self.pending.take() else {
                    // Stray closing tag.
                    continue;
                };
                return Some(CodeBlockSpan {
                    start: open.end(),
                    end: tag.start(),
                    raw: &self.html[open.end()..tag.start()],
                    open_tag: open.as_str(),
                });
            }

            // A second opening tag before any close: the pending one is unterminated.
            self.pending = Some(tag);
        }
        None
    }
}
