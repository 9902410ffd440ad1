//! Main processor that highlights the code blocks of every document in a store.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::engine::{
    ArboriumEngine, DEFAULT_MAX_BLOCK_BYTES, EngineFactory, HighlightEngine, MarkupStyle,
};
use crate::entity;
use crate::error::{EngineError, ProcessError, StoreError};
use crate::language::{CandidateSet, Language};
use crate::rewrite::rewrite;
use crate::scanner::scan;
use crate::store::OutputStore;
use crate::timeout::TimeoutEngine;

/// Default per-block highlighting budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Options for the processor.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Languages blocks may be detected as.
    pub candidates: CandidateSet,
    /// Trust `language-*` classes that name a candidate language.
    pub class_hints: bool,
    /// Leave blocks that already contain markup alone.
    pub skip_marked_up: bool,
    /// Worker threads (None = one per core).
    pub threads: Option<usize>,
    /// Per-block highlighting budget (None = unbounded).
    pub timeout: Option<Duration>,
    /// Blocks larger than this are left plain.
    pub max_block_bytes: usize,
    /// How highlighted tokens are marked up.
    pub markup: MarkupStyle,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            candidates: CandidateSet::default(),
            class_hints: true,
            skip_marked_up: true,
            threads: None,
            timeout: Some(DEFAULT_TIMEOUT),
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
            markup: MarkupStyle::default(),
            show_progress: false,
        }
    }
}

/// What happened to the code blocks of one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Blocks that got a language and token markup.
    pub blocks_highlighted: usize,
    /// Blocks left as escaped plain text (language not recognized).
    pub blocks_plain: usize,
    /// Blocks not touched because they already contained markup.
    pub blocks_skipped: usize,
    /// How many blocks were detected as each language.
    pub languages: BTreeMap<Language, usize>,
}

/// Highlight every code block in `html`.
///
/// Fails only if the engine fails; the caller should then keep `html` as it is.
pub fn transform_html<E>(
    html: &str,
    engine: &mut E,
    options: &ProcessOptions,
) -> Result<(String, TransformResult), EngineError>
where
    E: HighlightEngine + ?Sized,
{
    let mut result = TransformResult::default();
    let mut spans = Vec::new();
    let mut replacements = Vec::new();

    for span in scan(html) {
        if options.skip_marked_up && span.is_marked_up() {
            result.blocks_skipped += 1;
            continue;
        }

        let pinned = if options.class_hints {
            span.language_hint()
                .and_then(|hint| options.candidates.narrow_to_hint(hint))
        } else {
            None
        };
        let candidates = pinned.as_ref().unwrap_or(&options.candidates);

        let source = entity::decode(span.raw);
        let highlighted = engine.highlight(&source, candidates)?;

        match highlighted.language {
            Some(language) => {
                result.blocks_highlighted += 1;
                *result.languages.entry(language).or_default() += 1;
            }
            None => result.blocks_plain += 1,
        }

        spans.push(span);
        replacements.push(highlighted);
    }

    if spans.is_empty() {
        return Ok((html.to_string(), result));
    }

    Ok((rewrite(html, &spans, &replacements), result))
}

/// Statistics from processing.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    /// Number of documents read.
    pub documents_processed: usize,
    /// Number of documents written back with changes.
    pub documents_rewritten: usize,
    /// Documents kept unchanged because the engine failed on them.
    pub documents_abandoned: usize,
    /// Number of code blocks highlighted.
    pub blocks_highlighted: usize,
    /// Number of code blocks left plain.
    pub blocks_plain: usize,
    /// Number of code blocks skipped.
    pub blocks_skipped: usize,
    /// Detections per language.
    pub languages: BTreeMap<Language, usize>,
    /// Total bytes read.
    pub bytes_input: u64,
    /// Total bytes of resulting documents.
    pub bytes_output: u64,
    /// Wall time spent processing.
    pub process_duration: Duration,
}

impl ProcessorStats {
    /// Calculate HTML inflation ratio (output / input).
    pub fn html_inflation_ratio(&self) -> f64 {
        if self.bytes_input == 0 {
            1.0
        } else {
            self.bytes_output as f64 / self.bytes_input as f64
        }
    }

    /// Calculate HTML inflation percentage ((output - input) / input * 100).
    pub fn html_inflation_percent(&self) -> f64 {
        if self.bytes_input == 0 {
            0.0
        } else {
            (self.bytes_output as f64 - self.bytes_input as f64) / self.bytes_input as f64 * 100.0
        }
    }

    /// Calculate processing throughput in MB/s.
    pub fn throughput_mb_s(&self) -> f64 {
        let secs = self.process_duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            (self.bytes_input as f64 / (1024.0 * 1024.0)) / secs
        }
    }
}

/// Highlights the code blocks of every document in an [`OutputStore`].
pub struct Processor {
    options: ProcessOptions,
    factory: EngineFactory,
}

impl Processor {
    /// Create a processor backed by [`ArboriumEngine`].
    pub fn new(options: ProcessOptions) -> Self {
        let factory = ArboriumEngine::factory(options.markup.clone(), options.max_block_bytes);
        Self::with_engine_factory(options, factory)
    }

    /// Create a processor with a custom engine. The timeout option still applies.
    pub fn with_engine_factory(options: ProcessOptions, factory: EngineFactory) -> Self {
        let factory = match options.timeout {
            Some(budget) => TimeoutEngine::factory(factory, budget),
            None => factory,
        };
        Self { options, factory }
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Process every document in `store`, writing changed documents back.
    ///
    /// Engine failures only cost the document they happened in. Store errors
    /// abort the run.
    pub fn process(&self, store: &dyn OutputStore) -> Result<ProcessorStats, ProcessError> {
        let paths = store.paths()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.unwrap_or(0))
            .thread_name(|i| format!("arborium-site-{i}"))
            .build()?;

        let progress = if self.options.show_progress {
            let bar = ProgressBar::new(paths.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            {
                bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let process_start = Instant::now();

        // Atomic counters for parallel aggregation
        let documents_processed = AtomicUsize::new(0);
        let documents_rewritten = AtomicUsize::new(0);
        let documents_abandoned = AtomicUsize::new(0);
        let blocks_highlighted = AtomicUsize::new(0);
        let blocks_plain = AtomicUsize::new(0);
        let blocks_skipped = AtomicUsize::new(0);
        let bytes_input = AtomicUsize::new(0);
        let bytes_output = AtomicUsize::new(0);
        let languages = Mutex::new(BTreeMap::<Language, usize>::new());

        // One engine per worker, not per document.
        pool.install(|| {
            paths.par_iter().try_for_each_init(
                || (self.factory)(),
                |engine, path| -> Result<(), StoreError> {
                    let html = store.read(path)?;
                    bytes_input.fetch_add(html.len(), Ordering::Relaxed);

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        transform_html(&html, engine, &self.options)
                    }));

                    let failure = match outcome {
                        Ok(Ok((transformed, result))) => {
                            blocks_highlighted
                                .fetch_add(result.blocks_highlighted, Ordering::Relaxed);
                            blocks_plain.fetch_add(result.blocks_plain, Ordering::Relaxed);
                            blocks_skipped.fetch_add(result.blocks_skipped, Ordering::Relaxed);
                            bytes_output.fetch_add(transformed.len(), Ordering::Relaxed);

                            if !result.languages.is_empty() {
                                let mut langs = languages.lock().unwrap_or_else(|e| e.into_inner());
                                for (language, count) in result.languages {
                                    *langs.entry(language).or_default() += count;
                                }
                            }

                            // Only write if we actually changed something
                            if transformed != html {
                                store.write(path, &transformed)?;
                                documents_rewritten.fetch_add(1, Ordering::Relaxed);
                            }

                            tracing::debug!(
                                path = %path.display(),
                                highlighted = result.blocks_highlighted,
                                plain = result.blocks_plain,
                                skipped = result.blocks_skipped,
                                "processed document"
                            );
                            None
                        }
                        Ok(Err(e)) => Some(e),
                        Err(_) => {
                            // Whatever state the engine was left in, don't reuse it.
                            *engine = (self.factory)();
                            Some(EngineError::Panicked)
                        }
                    };

                    if let Some(e) = failure {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "highlighting failed, keeping document unchanged"
                        );
                        documents_abandoned.fetch_add(1, Ordering::Relaxed);
                        bytes_output.fetch_add(html.len(), Ordering::Relaxed);
                    }

                    documents_processed.fetch_add(1, Ordering::Relaxed);
                    progress.inc(1);
                    Ok(())
                },
            )
        })?;

        let process_duration = process_start.elapsed();
        progress.finish_and_clear();

        let stats = ProcessorStats {
            documents_processed: documents_processed.load(Ordering::Relaxed),
            documents_rewritten: documents_rewritten.load(Ordering::Relaxed),
            documents_abandoned: documents_abandoned.load(Ordering::Relaxed),
            blocks_highlighted: blocks_highlighted.load(Ordering::Relaxed),
            blocks_plain: blocks_plain.load(Ordering::Relaxed),
            blocks_skipped: blocks_skipped.load(Ordering::Relaxed),
            languages: languages.into_inner().unwrap_or_else(|e| e.into_inner()),
            bytes_input: bytes_input.load(Ordering::Relaxed) as u64,
            bytes_output: bytes_output.load(Ordering::Relaxed) as u64,
            process_duration,
        };

        tracing::info!(
            documents = stats.documents_processed,
            rewritten = stats.documents_rewritten,
            abandoned = stats.documents_abandoned,
            highlighted = stats.blocks_highlighted,
            "highlighting finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HighlightResult;

    /// Wraps every block in brackets and calls it shell.
    struct Brackets;

    impl HighlightEngine for Brackets {
        fn highlight(
            &mut self,
            source: &str,
            _candidates: &CandidateSet,
        ) -> Result<HighlightResult, EngineError> {
            Ok(HighlightResult {
                html: format!("[{}]", entity::encode(source)),
                language: Some(Language::Shell),
            })
        }
    }

    /// Records the candidate sets it was called with.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<CandidateSet>,
    }

    impl HighlightEngine for Recorder {
        fn highlight(
            &mut self,
            source: &str,
            candidates: &CandidateSet,
        ) -> Result<HighlightResult, EngineError> {
            self.seen.push(candidates.clone());
            Ok(HighlightResult::plain(source))
        }
    }

    #[test]
    fn test_transform_decodes_before_highlighting() {
        let html = "<pre><code>a &amp;&amp; b</code></pre>";
        let (out, result) =
            transform_html(html, &mut Brackets, &ProcessOptions::default()).unwrap();
        assert_eq!(out, "<pre><code>[a &amp;&amp; b]</code></pre>");
        assert_eq!(result.blocks_highlighted, 1);
        assert_eq!(result.languages.get(&Language::Shell), Some(&1));
    }

    #[test]
    fn test_transform_without_blocks_is_identity() {
        let html = "<p>nothing</p>";
        let (out, result) =
            transform_html(html, &mut Brackets, &ProcessOptions::default()).unwrap();
        assert_eq!(out, html);
        assert_eq!(result, TransformResult::default());
    }

    #[test]
    fn test_transform_skips_marked_up_blocks() {
        let html = "<pre><code><a-k>echo</a-k></code></pre><pre><code>ls</code></pre>";
        let (out, result) =
            transform_html(html, &mut Brackets, &ProcessOptions::default()).unwrap();
        assert_eq!(
            out,
            "<pre><code><a-k>echo</a-k></code></pre><pre><code>[ls]</code></pre>"
        );
        assert_eq!(result.blocks_skipped, 1);
        assert_eq!(result.blocks_highlighted, 1);

        let options = ProcessOptions {
            skip_marked_up: false,
            ..Default::default()
        };
        let (_, result) = transform_html(html, &mut Brackets, &options).unwrap();
        assert_eq!(result.blocks_skipped, 0);
        assert_eq!(result.blocks_highlighted, 2);
    }

    #[test]
    fn test_transform_pins_hinted_language() {
        let html = r#"<pre><code class="language-bash">ls</code></pre><pre><code class="language-ruby">x</code></pre><pre><code>y</code></pre>"#;
        let mut recorder = Recorder::default();
        transform_html(html, &mut recorder, &ProcessOptions::default()).unwrap();

        assert_eq!(recorder.seen.len(), 3);
        assert_eq!(recorder.seen[0], CandidateSet::pinned(Language::Shell));
        // Not a candidate: fall back to detection over the configured set.
        assert_eq!(recorder.seen[1], CandidateSet::default());
        assert_eq!(recorder.seen[2], CandidateSet::default());
    }

    #[test]
    fn test_transform_ignores_hints_when_disabled() {
        let html = r#"<pre><code class="language-bash">ls</code></pre>"#;
        let options = ProcessOptions {
            class_hints: false,
            ..Default::default()
        };
        let mut recorder = Recorder::default();
        transform_html(html, &mut recorder, &options).unwrap();
        assert_eq!(recorder.seen, vec![CandidateSet::default()]);
    }

    #[test]
    fn test_hint_outside_candidates_is_ignored() {
        let html = r#"<pre><code class="language-php">x</code></pre>"#;
        let options = ProcessOptions {
            candidates: CandidateSet::new([Language::Shell]).unwrap(),
            ..Default::default()
        };
        let mut recorder = Recorder::default();
        transform_html(html, &mut recorder, &options).unwrap();
        assert_eq!(recorder.seen, vec![CandidateSet::new([Language::Shell]).unwrap()]);
    }

    #[test]
    fn test_stats_ratios() {
        let stats = ProcessorStats {
            bytes_input: 100,
            bytes_output: 150,
            process_duration: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(stats.html_inflation_ratio(), 1.5);
        assert_eq!(stats.html_inflation_percent(), 50.0);
        assert!(stats.throughput_mb_s() > 0.0);
        assert_eq!(ProcessorStats::default().html_inflation_ratio(), 1.0);
        assert_eq!(ProcessorStats::default().throughput_mb_s(), 0.0);
    }
}
