//! arborium-site CLI - Syntax-highlight the code blocks of a generated site in place.

use anyhow::{Context, Result, bail};
use arborium_site::{CandidateSet, Config, DirStore, Processor};
use facet::Facet;
use facet_args as args;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Syntax-highlight the code blocks of a generated static site.
///
/// Every `<pre><code>` block in the site's HTML files is classified among the
/// configured languages and replaced with highlighted markup. Files are modified
/// in place; pages whose blocks can't be highlighted are left untouched.
#[derive(Debug, Facet)]
struct Args {
    /// Output directory of the site generator (e.g., public)
    #[facet(args::positional)]
    input: PathBuf,

    /// Config file (TOML)
    #[facet(args::named, args::short = 'c', default)]
    config: Option<PathBuf>,

    /// Comma-separated candidate languages, overrides the config file
    #[facet(args::named, default)]
    languages: Option<String>,

    /// Number of worker threads
    #[facet(args::named, args::short = 'j', default)]
    threads: Option<usize>,

    /// Show verbose output
    #[facet(args::named, args::short = 'v', default)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "arborium_site=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

fn main() -> Result<()> {
    let args: Args = facet_args::from_std_args()?;
    init_tracing(args.verbose);

    // Validate input directory
    if !args.input.exists() {
        bail!("Input directory does not exist: {}", args.input.display());
    }

    if !args.input.is_dir() {
        bail!("Input path is not a directory: {}", args.input.display());
    }

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut options = config.to_options()?;
    if let Some(languages) = &args.languages {
        let labels: Vec<&str> = languages.split(',').filter(|s| !s.trim().is_empty()).collect();
        options.candidates =
            CandidateSet::from_labels(&labels).context("invalid --languages")?;
    }
    if args.threads.is_some() {
        options.threads = args.threads;
    }
    options.show_progress = !args.verbose;

    let store = DirStore::new(&args.input).with_include(config.include.iter().cloned());

    // Print header
    eprintln!(
        "{} Highlighting site output: {}",
        "arborium-site".green().bold(),
        args.input.display()
    );
    let labels: Vec<&str> = options
        .candidates
        .languages()
        .iter()
        .map(|l| l.label())
        .collect();
    eprintln!("  Languages: {}", labels.join(", "));
    if !config.include.is_empty() {
        let include: Vec<String> = config
            .include
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        eprintln!("  Only: {}", include.join(", "));
    }
    eprintln!();

    // Process
    let processor = Processor::new(options);
    let start = Instant::now();
    let stats = processor.process(&store)?;
    let elapsed = start.elapsed();

    // Print results
    eprintln!("{}", "Results:".bold());
    eprintln!(
        "  {} HTML files processed, {} rewritten",
        stats.documents_processed.to_string().cyan(),
        stats.documents_rewritten.to_string().cyan()
    );
    eprintln!(
        "  {} code blocks highlighted",
        stats.blocks_highlighted.to_string().green()
    );
    eprintln!(
        "  {} code blocks left plain (language not recognized)",
        stats.blocks_plain.to_string().yellow()
    );
    if stats.blocks_skipped > 0 {
        eprintln!(
            "  {} code blocks skipped (already highlighted)",
            stats.blocks_skipped.to_string().yellow()
        );
    }

    if !stats.languages.is_empty() {
        let counts: Vec<String> = stats
            .languages
            .iter()
            .map(|(language, count)| format!("{language} {count}"))
            .collect();
        eprintln!("  Detected: {}", counts.join(", "));
    }

    if stats.documents_abandoned > 0 {
        eprintln!(
            "\n  {} {} files kept unchanged after highlighter errors (see log)",
            "Warning:".red().bold(),
            stats.documents_abandoned
        );
    }

    eprintln!(
        "\n  Completed in {:.2}s ({:.1} MB/s, HTML {:.2}x, {:+.1}%)",
        elapsed.as_secs_f64(),
        stats.throughput_mb_s(),
        stats.html_inflation_ratio(),
        stats.html_inflation_percent()
    );

    Ok(())
}
