//! Languages we can highlight and guessing which one a code block is written in.
//!
//! Guessing is relevance scoring: each language has a handful of weighted
//! signature patterns, a candidate scores the weights of the signatures it
//! matches, and the best candidate wins if it clears [`MIN_RELEVANCE`]. Only
//! languages in the [`CandidateSet`] are ever scored.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Scores below this are too weak to call.
pub const MIN_RELEVANCE: u32 = 2;

/// A signature contributes at most this many times its weight.
const MAX_HITS_PER_SIGNATURE: u32 = 3;

/// A language the highlighter knows how to tokenize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Dockerfile,
    Html,
    Php,
    Css,
    JavaScript,
    Shell,
}

impl Language {
    /// Every supported language, in default candidate order.
    pub const ALL: [Language; 6] = [
        Language::Dockerfile,
        Language::Html,
        Language::Php,
        Language::Css,
        Language::JavaScript,
        Language::Shell,
    ];

    /// Short label used in configuration and statistics.
    pub fn label(self) -> &'static str {
        match self {
            Language::Dockerfile => "dockerfile",
            Language::Html => "html",
            Language::Php => "php",
            Language::Css => "css",
            Language::JavaScript => "js",
            Language::Shell => "shell",
        }
    }

    /// Name of the arborium grammar that tokenizes this language.
    pub fn grammar(self) -> &'static str {
        match self {
            Language::Dockerfile => "dockerfile",
            Language::Html => "html",
            Language::Php => "php",
            Language::Css => "css",
            Language::JavaScript => "javascript",
            Language::Shell => "bash",
        }
    }

    fn signatures(self) -> &'static [Signature] {
        match self {
            Language::Dockerfile => &DOCKERFILE,
            Language::Html => &HTML,
            Language::Php => &PHP,
            Language::Css => &CSS,
            Language::JavaScript => &JAVASCRIPT,
            Language::Shell => &SHELL,
        }
    }

    /// How strongly `source` looks like this language.
    pub fn relevance(self, source: &str) -> u32 {
        self.signatures()
            .iter()
            .map(|sig| {
                let hits = sig.pattern.find_iter(source).take(MAX_HITS_PER_SIGNATURE as usize);
                sig.weight * hits.count() as u32
            })
            .sum()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = s.trim().to_ascii_lowercase();
        Ok(match lang.as_str() {
            "dockerfile" | "docker" => Language::Dockerfile,
            "html" | "xhtml" => Language::Html,
            "php" => Language::Php,
            "css" => Language::Css,
            "js" | "javascript" | "jsx" | "mjs" => Language::JavaScript,
            "shell" | "bash" | "sh" | "console" | "zsh" => Language::Shell,
            _ => return Err(ConfigError::UnknownLanguage(s.to_string())),
        })
    }
}

struct Signature {
    pattern: Regex,
    weight: u32,
}

fn signatures(table: &[(&str, u32)]) -> Vec<Signature> {
    table
        .iter()
        .map(|&(pattern, weight)| Signature {
            pattern: Regex::new(pattern).unwrap(),
            weight,
        })
        .collect()
}

static DOCKERFILE: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"(?m)^FROM\s+\S+", 5),
        (
            r"(?m)^(?:RUN|COPY|ADD|WORKDIR|ENTRYPOINT|CMD|EXPOSE|ENV|ARG|USER|VOLUME|LABEL|HEALTHCHECK)\s",
            3,
        ),
        (r"(?m)^FROM\s+\S+\s+(?i:AS)\s+\w+", 2),
    ])
});

static HTML: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"(?i)<!DOCTYPE\s+html", 10),
        (
            r"(?i)<(?:html|head|body|div|span|p|a|ul|ol|li|nav|main|section|article|header|footer|form|input|button|label|select|option|table|tr|td|th|img|link|meta|script|style|template|h[1-6])\b",
            2,
        ),
        (r"</[a-zA-Z][\w-]*>", 1),
        (r#"\s[a-z][\w:-]*="[^"]*""#, 1),
    ])
});

static PHP: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"<\?php", 10),
        (r"\$this->", 3),
        (r"\$[A-Za-z_]\w*\s*(?:=|->)", 2),
        (r"\b(?:public|protected|private)\s+(?:static\s+)?function\b", 4),
        (r"(?m)^\s*namespace\s+[A-Z][\w\\]*;", 4),
        (r"(?m)^\s*use\s+[A-Z][\w\\]+(?:\s+as\s+\w+)?;", 3),
        (r"\b[A-Z]\w*::(?:class|\w+\()", 2),
        (r"\bfn\s*\(", 1),
        (r"=>", 1),
    ])
});

static CSS: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"(?m)^\s*[-a-z]+\s*:\s*[^;{}\n]+;\s*$", 2),
        (r"(?m)^\s*[.#]?[a-zA-Z][\w\s.#:>,\[\]=-]*\{\s*$", 1),
        (r"@(?:media|import|font-face|keyframes|tailwind|apply)\b", 3),
        (r"!important", 2),
        (r"\b\d+(?:px|rem|em|vh|vw)\b", 1),
    ])
});

static JAVASCRIPT: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*=", 3),
        (r"\bfunction\s*[A-Za-z_$]*\s*\([^)]*\)\s*\{", 2),
        (r"=>\s*[{(]?", 1),
        (r"\b(?:console|document|window)\.\w+", 3),
        (r#"(?m)^\s*import\s+.+\s+from\s+['"]"#, 3),
        (r"(?m)^\s*export\s+(?:default|const|function|class)\b", 3),
        (r"\b(?:async|await)\b", 1),
        (r"===|!==", 2),
    ])
});

static SHELL: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    signatures(&[
        (r"(?m)^#!/(?:usr/)?bin/(?:env\s+)?(?:ba|z)?sh", 10),
        (
            r"(?m)^\s*(?:\$\s+)?(?:sudo\s+)?(?:echo|cd|ls|mkdir|rm|cp|mv|cat|grep|chmod|chown|curl|wget|export|source|apt|apt-get|brew|yum|git|docker|docker-compose|kubectl|helm|composer|npm|npx|yarn|php|node|make|ssh|tar|touch|sed|awk|systemctl)\b",
            3,
        ),
        (r"(?m)^\s*\$\s+\S", 2),
        (r"\s(?:&&|\|\|)\s", 1),
        (r"\s\|\s*[a-z]", 1),
        (r"\$\{?[A-Z_][A-Z0-9_]*\}?", 1),
        (r"\s--?[a-zA-Z][\w-]*", 1),
    ])
});

/// The languages a code block may be classified as.
///
/// Order matters: when two candidates score the same, the earlier one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    languages: Vec<Language>,
    pinned: bool,
}

impl CandidateSet {
    /// Build a candidate set, dropping duplicates but keeping first-seen order.
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Result<Self, ConfigError> {
        let mut deduped = Vec::new();
        for lang in languages {
            if !deduped.contains(&lang) {
                deduped.push(lang);
            }
        }
        if deduped.is_empty() {
            return Err(ConfigError::EmptyCandidateSet);
        }
        Ok(Self {
            languages: deduped,
            pinned: false,
        })
    }

    /// Parse labels such as `["shell", "js"]`.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, ConfigError> {
        let languages = labels
            .iter()
            .map(|label| label.as_ref().parse())
            .collect::<Result<Vec<Language>, _>>()?;
        Self::new(languages)
    }

    /// A set containing only `language`, trusted without scoring.
    ///
    /// Used when the page already says what the block is.
    pub fn pinned(language: Language) -> Self {
        Self {
            languages: vec![language],
            pinned: true,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn contains(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Narrow to the language named by a `language-*` class, if it is a candidate.
    pub fn narrow_to_hint(&self, hint: &str) -> Option<Self> {
        let language = hint.parse::<Language>().ok()?;
        self.contains(language).then(|| Self::pinned(language))
    }
}

impl Default for CandidateSet {
    fn default() -> Self {
        Self {
            languages: Language::ALL.to_vec(),
            pinned: false,
        }
    }
}

/// Outcome of a confident guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub language: Language,
    pub relevance: u32,
}

/// Guess the language of `source` among `candidates`.
///
/// Returns `None` when no candidate reaches [`MIN_RELEVANCE`]. Never returns a
/// language outside `candidates`.
pub fn detect(source: &str, candidates: &CandidateSet) -> Option<Detection> {
    if candidates.is_pinned() {
        let language = *candidates.languages.first()?;
        return Some(Detection {
            language,
            relevance: language.relevance(source),
        });
    }

    let mut best: Option<Detection> = None;
    for &language in &candidates.languages {
        let relevance = language.relevance(source);
        if best.is_none_or(|b| relevance > b.relevance) {
            best = Some(Detection {
                language,
                relevance,
            });
        }
    }

    best.filter(|b| b.relevance >= MIN_RELEVANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn guess(source: &str) -> Option<Language> {
        detect(source, &CandidateSet::default()).map(|d| d.language)
    }

    #[test]
    fn test_parse_labels_and_aliases() {
        assert_eq!("shell".parse::<Language>().unwrap(), Language::Shell);
        assert_eq!("bash".parse::<Language>().unwrap(), Language::Shell);
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!(" js ".parse::<Language>().unwrap(), Language::JavaScript);
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(ConfigError::UnknownLanguage(name)) if name == "cobol"
        ));
    }

    #[test]
    fn test_label_round_trips() {
        for lang in Language::ALL {
            assert_eq!(lang.label().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn test_candidate_set_dedupes_and_keeps_order() {
        let set = CandidateSet::from_labels(&["shell", "bash", "php"]).unwrap();
        assert_eq!(set.languages(), &[Language::Shell, Language::Php]);
        assert!(!set.is_pinned());
    }

    #[test]
    fn test_empty_candidate_set_is_rejected() {
        let labels: [&str; 0] = [];
        assert!(matches!(
            CandidateSet::from_labels(&labels),
            Err(ConfigError::EmptyCandidateSet)
        ));
    }

    #[test]
    fn test_detect_shell() {
        assert_eq!(guess(r#"echo "hi""#), Some(Language::Shell));
        assert_eq!(
            guess("composer require tonysm/turbo-laravel\nphp artisan turbo:install"),
            Some(Language::Shell)
        );
    }

    #[test]
    fn test_detect_dockerfile() {
        let source = indoc! {"
            FROM php:8.2-fpm
            RUN apt-get update && apt-get install -y git
            WORKDIR /var/www/html
            COPY . .
        "};
        assert_eq!(guess(source), Some(Language::Dockerfile));
    }

    #[test]
    fn test_detect_php() {
        let source = indoc! {r#"
            <?php

            namespace App\Http\Controllers;

            class PostsController extends Controller
            {
                public function index()
                {
                    return view('posts.index', ['posts' => Post::latest()->get()]);
                }
            }
        "#};
        assert_eq!(guess(source), Some(Language::Php));
    }

    #[test]
    fn test_detect_html() {
        let source = indoc! {r#"
            <div class="card">
                <h2 class="title">Hello</h2>
                <p>World</p>
            </div>
        "#};
        assert_eq!(guess(source), Some(Language::Html));
    }

    #[test]
    fn test_detect_css() {
        let source = indoc! {"
            .btn {
                color: red;
                padding: 4px 8px;
            }
        "};
        assert_eq!(guess(source), Some(Language::Css));
    }

    #[test]
    fn test_detect_javascript() {
        let source = "const greet = (name) => console.log(`hi ${name}`);";
        assert_eq!(guess(source), Some(Language::JavaScript));
    }

    #[test]
    fn test_detect_indeterminate() {
        assert_eq!(guess("hello world"), None);
        assert_eq!(guess(""), None);
    }

    #[test]
    fn test_detection_stays_inside_candidates() {
        let shell_only = CandidateSet::new([Language::Shell]).unwrap();
        let markup = r#"<div class="card"><p>Hello</p></div>"#;
        let detected = detect(markup, &shell_only);
        assert!(detected.is_none_or(|d| d.language == Language::Shell));
        assert_eq!(detected, None);
    }

    #[test]
    fn test_ties_go_to_earlier_candidate() {
        // `=>` is worth the same to both languages.
        let source = "a => b; c => d";
        let php_first = CandidateSet::new([Language::Php, Language::JavaScript]).unwrap();
        let js_first = CandidateSet::new([Language::JavaScript, Language::Php]).unwrap();
        assert_eq!(detect(source, &php_first).unwrap().language, Language::Php);
        assert_eq!(detect(source, &js_first).unwrap().language, Language::JavaScript);
    }

    #[test]
    fn test_pinned_set_skips_threshold() {
        let pinned = CandidateSet::pinned(Language::Css);
        let detection = detect("hello world", &pinned).unwrap();
        assert_eq!(detection.language, Language::Css);
    }

    #[test]
    fn test_narrow_to_hint() {
        let set = CandidateSet::from_labels(&["php", "shell"]).unwrap();
        let narrowed = set.narrow_to_hint("bash").unwrap();
        assert!(narrowed.is_pinned());
        assert_eq!(narrowed.languages(), &[Language::Shell]);

        assert_eq!(set.narrow_to_hint("css"), None);
        assert_eq!(set.narrow_to_hint("klingon"), None);
    }
}
