//! Splicing highlighted blocks back into a document.

use crate::engine::HighlightResult;
use crate::scanner::CodeBlockSpan;

/// Replace each span's interior with the matching result's markup.
///
/// Everything outside the spans is copied through untouched. The output is
/// never rescanned, so markup produced by the highlighter can't be mistaken for
/// another code block.
///
/// # Panics
///
/// If `spans` and `results` differ in length, or the spans are out of order,
/// overlapping or out of bounds. These are caller bugs.
pub fn rewrite(html: &str, spans: &[CodeBlockSpan<'_>], results: &[HighlightResult]) -> String {
    assert_eq!(
        spans.len(),
        results.len(),
        "every code block needs exactly one highlight result"
    );

    let replaced: usize = spans.iter().map(|span| span.end - span.start).sum();
    let added: usize = results.iter().map(|result| result.html.len()).sum();
    let mut out = String::with_capacity(html.len() - replaced.min(html.len()) + added);

    let mut cursor = 0;
    for (span, result) in spans.iter().zip(results) {
        assert!(
            span.start >= cursor && span.start <= span.end && span.end <= html.len(),
            "code block spans must be ordered, disjoint and inside the document"
        );
        out.push_str(&html[cursor..span.start]);
        out.push_str(&result.html);
        cursor = span.end;
    }
    out.push_str(&html[cursor..]);

    out
}
