//! The highlight engine seam.
//!
//! The processor only talks to [`HighlightEngine`]: give it decoded source and
//! the allowed languages, get back HTML that is safe to drop inside `<code>`.
//! [`ArboriumEngine`] is the real implementation; tests plug in their own.

use std::sync::Arc;

use arborium::{GrammarStore, Highlighter};

use crate::entity;
use crate::error::EngineError;
use crate::language::{CandidateSet, Language, detect};

/// Default cap on how much source we try to classify and tokenize per block.
pub const DEFAULT_MAX_BLOCK_BYTES: usize = 256 * 1024;

/// Highlighted (or deliberately plain) replacement for one code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    /// Markup to place between `<code ...>` and `</code>`. Always escaped.
    pub html: String,
    /// Detected language, `None` when the block was left plain.
    pub language: Option<Language>,
}

impl HighlightResult {
    /// The safe fallback: the literal source, escaped, no highlighting.
    pub fn plain(source: &str) -> Self {
        Self {
            html: entity::encode(source),
            language: None,
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.language.is_some()
    }
}

/// Something that classifies and tokenizes code.
///
/// Implementations must not return `Err` just because they can't tell what a
/// block is: that is `Ok(HighlightResult::plain(..))`. `Err` means the engine
/// itself broke.
pub trait HighlightEngine {
    fn highlight(
        &mut self,
        source: &str,
        candidates: &CandidateSet,
    ) -> Result<HighlightResult, EngineError>;
}

impl<E: HighlightEngine + ?Sized> HighlightEngine for Box<E> {
    fn highlight(
        &mut self,
        source: &str,
        candidates: &CandidateSet,
    ) -> Result<HighlightResult, EngineError> {
        (**self).highlight(source, candidates)
    }
}

/// Builds a fresh engine. Called once per worker thread, and again to replace an
/// engine that panicked or got stuck.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn HighlightEngine> + Send + Sync>;

/// How arborium should render tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MarkupStyle {
    /// arborium's compact custom elements: `<a-k>fn</a-k>`.
    #[default]
    CustomElements,
    /// `<span class="{prefix}keyword">`, for stylesheets written against classes.
    ClassNames { prefix: String },
}

impl MarkupStyle {
    fn to_config(&self) -> arborium::Config {
        match self {
            MarkupStyle::CustomElements => arborium::Config::default(),
            MarkupStyle::ClassNames { prefix } => arborium::Config {
                html_format: arborium::HtmlFormat::ClassNamesWithPrefix(prefix.clone()),
                ..Default::default()
            },
        }
    }
}

/// Tree-sitter backed engine: regex relevance scoring picks the language, then
/// arborium tokenizes the block with that language's grammar.
pub struct ArboriumEngine {
    highlighter: Highlighter,
    max_block_bytes: usize,
}

impl ArboriumEngine {
    /// Engine with its own grammar store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(GrammarStore::new()), &MarkupStyle::default())
    }

    /// Engine sharing compiled grammars with other engines.
    pub fn with_store(store: Arc<GrammarStore>, style: &MarkupStyle) -> Self {
        Self {
            highlighter: Highlighter::with_store_and_config(store, style.to_config()),
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
        }
    }

    pub fn with_max_block_bytes(mut self, max_block_bytes: usize) -> Self {
        self.max_block_bytes = max_block_bytes;
        self
    }

    /// A factory producing engines that all share one grammar store.
    pub fn factory(style: MarkupStyle, max_block_bytes: usize) -> EngineFactory {
        let store = Arc::new(GrammarStore::new());
        Arc::new(move || -> Box<dyn HighlightEngine> {
            Box::new(
                ArboriumEngine::with_store(store.clone(), &style)
                    .with_max_block_bytes(max_block_bytes),
            )
        })
    }
}

impl Default for ArboriumEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightEngine for ArboriumEngine {
    fn highlight(
        &mut self,
        source: &str,
        candidates: &CandidateSet,
    ) -> Result<HighlightResult, EngineError> {
        if source.len() > self.max_block_bytes {
            tracing::debug!(bytes = source.len(), "block too large to highlight");
            return Ok(HighlightResult::plain(source));
        }

        let Some(detection) = detect(source, candidates) else {
            return Ok(HighlightResult::plain(source));
        };
        let language = detection.language;
        tracing::debug!(%language, relevance = detection.relevance, "detected language");

        let html = self
            .highlighter
            .highlight(language.grammar(), source)
            .map_err(|e| EngineError::Highlight {
                language: language.label().to_string(),
                message: e.to_string(),
            })?;

        Ok(HighlightResult {
            html,
            language: Some(language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_tags(html: &str) -> String {
        let mut text = String::new();
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => text.push(c),
                _ => {}
            }
        }
        entity::decode(&text).into_owned()
    }

    #[test]
    fn test_plain_result_is_escaped() {
        let result = HighlightResult::plain("<b>&</b>");
        assert_eq!(result.html, "&lt;b&gt;&amp;&lt;/b&gt;");
        assert!(!result.is_highlighted());
    }

    #[test]
    fn test_highlight_shell() {
        let mut engine = ArboriumEngine::new();
        let shell = CandidateSet::new([Language::Shell]).unwrap();
        let result = engine.highlight(r#"echo "hi""#, &shell).unwrap();
        assert_eq!(result.language, Some(Language::Shell));
        assert_eq!(strip_tags(&result.html), r#"echo "hi""#);
    }

    #[test]
    fn test_markup_outside_candidates_is_not_labeled() {
        let mut engine = ArboriumEngine::new();
        let shell = CandidateSet::new([Language::Shell]).unwrap();
        let source = r#"<div class="card"><p>Hello</p></div>"#;
        let result = engine.highlight(source, &shell).unwrap();
        assert_eq!(result.language, None);
        assert_eq!(result.html, entity::encode(source));
    }

    #[test]
    fn test_output_never_leaks_raw_special_chars() {
        let mut engine = ArboriumEngine::new();
        let candidates = CandidateSet::default();
        let source = "if [ \"$a\" -lt 3 ] && echo '<ok>' > out.txt; then :; fi";
        let result = engine.highlight(source, &candidates).unwrap();
        let text = strip_tags(&result.html);
        assert_eq!(text, source);
        assert!(!result.html.contains("<ok>"));
        assert!(!result.html.contains("&&"));
    }

    #[test]
    fn test_oversized_block_stays_plain() {
        let mut engine = ArboriumEngine::new().with_max_block_bytes(4);
        let shell = CandidateSet::new([Language::Shell]).unwrap();
        let result = engine.highlight("echo hello", &shell).unwrap();
        assert_eq!(result, HighlightResult::plain("echo hello"));
    }

    #[test]
    fn test_factory_engines_share_nothing_mutable() {
        let factory = ArboriumEngine::factory(MarkupStyle::default(), DEFAULT_MAX_BLOCK_BYTES);
        let mut a = factory();
        let mut b = factory();
        let css = CandidateSet::new([Language::Css]).unwrap();
        let first = a.highlight(".a {\n  color: red;\n}", &css).unwrap();
        let second = b.highlight(".a {\n  color: red;\n}", &css).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_class_name_style() {
        let style = MarkupStyle::ClassNames {
            prefix: "hljs-".to_string(),
        };
        let mut engine = ArboriumEngine::with_store(Arc::new(GrammarStore::new()), &style);
        let js = CandidateSet::new([Language::JavaScript]).unwrap();
        let result = engine.highlight("const a = 1;", &js).unwrap();
        assert_eq!(result.language, Some(Language::JavaScript));
        assert!(!result.html.contains("<a-"));
        assert_eq!(strip_tags(&result.html), "const a = 1;");
    }
}
