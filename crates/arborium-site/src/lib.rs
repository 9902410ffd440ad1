//! Post-process a generated static site to add syntax highlighting to its code blocks.
//!
//! Static site generators render fenced code as `<pre><code>...</code></pre>` with the
//! source escaped but otherwise untouched. This crate runs over the rendered pages,
//! guesses the language of each block among a configured set of candidates, and
//! replaces the block interior with tree-sitter highlighted markup. Everything outside
//! the code blocks is left byte-for-byte as it was.
//!
//! # Usage
//!
//! ```bash
//! arborium-site ./public --languages shell,js,css
//! ```
//!
//! # How it works
//!
//! 1. **Scan**: [`scan`] finds `<pre><code ...>` / `</code></pre>` pairs in the raw HTML.
//!
//! 2. **Detect**: the escaped interior is decoded and scored against each candidate
//!    [`Language`]. A `language-*` class on the `<code>` tag short-circuits this.
//!
//! 3. **Highlight**: [`ArboriumEngine`] tokenizes the block with the winning grammar.
//!    Blocks nobody recognizes are re-emitted as plain escaped text.
//!
//! 4. **Rewrite**: [`rewrite`] splices the results back in one pass.
//!
//! Engine failures never break a page: the whole document is kept as it was.

mod config;
mod engine;
mod entity;
mod error;
mod language;
mod processor;
mod rewrite;
mod scanner;
mod store;
mod timeout;

pub use config::Config;
pub use engine::{
    ArboriumEngine, DEFAULT_MAX_BLOCK_BYTES, EngineFactory, HighlightEngine, HighlightResult,
    MarkupStyle,
};
pub use entity::{decode as decode_entities, encode as encode_entities};
pub use error::{ConfigError, EngineError, ProcessError, StoreError};
pub use language::{CandidateSet, Detection, Language, MIN_RELEVANCE, detect};
pub use processor::{
    DEFAULT_TIMEOUT, ProcessOptions, Processor, ProcessorStats, TransformResult, transform_html,
};
pub use rewrite::rewrite;
pub use scanner::{CodeBlockSpan, Spans, scan};
pub use store::{DirStore, MemoryStore, OutputStore};
pub use timeout::{DEFAULT_MAX_WORKERS, TimeoutEngine};
