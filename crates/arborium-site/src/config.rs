//! Configuration file (`arborium-site.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{DEFAULT_MAX_BLOCK_BYTES, MarkupStyle};
use crate::error::ConfigError;
use crate::language::{CandidateSet, Language};
use crate::processor::{DEFAULT_TIMEOUT, ProcessOptions};

/// Settings read from TOML. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Candidate languages, in tie-break order.
    pub languages: Vec<String>,
    pub class_hints: bool,
    pub skip_marked_up: bool,
    /// Path prefixes (relative to the output dir) to process; empty = everything.
    pub include: Vec<PathBuf>,
    pub threads: Option<usize>,
    /// Per-block budget in milliseconds, 0 disables the timeout.
    pub timeout_ms: u64,
    pub max_block_bytes: usize,
    /// Emit `<span class="{prefix}...">` instead of custom elements.
    pub class_prefix: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: Language::ALL.iter().map(|l| l.label().to_string()).collect(),
            class_hints: true,
            skip_marked_up: true,
            include: Vec::new(),
            threads: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_block_bytes: DEFAULT_MAX_BLOCK_BYTES,
            class_prefix: None,
        }
    }
}

impl Config {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn candidates(&self) -> Result<CandidateSet, ConfigError> {
        CandidateSet::from_labels(&self.languages)
    }

    pub fn markup(&self) -> MarkupStyle {
        match &self.class_prefix {
            Some(prefix) => MarkupStyle::ClassNames {
                prefix: prefix.clone(),
            },
            None => MarkupStyle::CustomElements,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Processor options for these settings. Fails on unknown or missing languages.
    pub fn to_options(&self) -> Result<ProcessOptions, ConfigError> {
        Ok(ProcessOptions {
            candidates: self.candidates()?,
            class_hints: self.class_hints,
            skip_marked_up: self.skip_marked_up,
            threads: self.threads,
            timeout: self.timeout(),
            max_block_bytes: self.max_block_bytes,
            markup: self.markup(),
            show_progress: false,
        })
    }
}
