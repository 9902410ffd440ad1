//! Error types.

use std::path::PathBuf;

/// Reading or writing a document in the output store failed.
///
/// Fatal for a run: there is nothing safe to put in place of a page we can't
/// read or write.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no document at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to walk output directory {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

/// The highlight engine itself broke (as opposed to not recognizing a language).
///
/// Caught per document by the processor; the document is kept as it was.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("highlighting {language} failed: {message}")]
    Highlight { language: String, message: String },

    #[error("highlighter panicked")]
    Panicked,

    #[error("highlight worker thread went away")]
    WorkerLost,
}

/// Invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown language `{0}`")]
    UnknownLanguage(String),

    #[error("candidate language list is empty")]
    EmptyCandidateSet,
}

/// Errors that abort a processing run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
