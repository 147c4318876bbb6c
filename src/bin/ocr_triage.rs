//! CLI binary for ocr-triage.
//!
//! A thin shim over the library crate that maps CLI flags to the engine
//! builder and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_triage::{
    ContentCache, Engine, EngineConfig, FilePageSource, LanguageCode, QualityPreset,
    TesseractEngine, TextSource,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Triage + extract, text to stdout
  ocr-triage scan.pdf

  # Best quality, German documents
  ocr-triage --quality accurate --language german brief.pdf

  # Force a fresh run, ignoring the cache
  ocr-triage --force scan.pdf

  # Show the classifier's signal readings for threshold tuning
  ocr-triage --signals suspicious.pdf

  # Structured JSON (per-page sources, confidences, warnings)
  ocr-triage --json scan.pdf > result.json

  # Process straight from a URL
  ocr-triage https://example.org/minutes.pdf

  # Cache maintenance
  ocr-triage --cache-stats .
  ocr-triage --clear-cache .

CLOUD ESCALATION:
  The CLI runs local-only: low-confidence pages keep their local text with a
  warning. Cloud escalation is a library feature; implement the
  CloudOcrProvider trait over your vision API and inject it through
  Engine::builder().

ENVIRONMENT VARIABLES:
  OCR_TRIAGE_CACHE_DIR  Result cache directory (default: ~/.cache/ocr-triage)

SETUP:
  1. Install tesseract:  apt install tesseract-ocr (plus language packs)
  2. Run:                ocr-triage document.pdf
"#;

/// Detect scanned documents and extract their text via tiered OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-triage",
    version,
    about = "Detect scanned documents and extract their text via tiered OCR",
    long_about = "Classify documents (local files or URLs) as scanned or born-digital, then \
extract text the cheapest way that works: native text layer, local Tesseract OCR, or cloud \
vision escalation for low-confidence pages. Results are content-addressed and cached.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local document path (PDF or image) or HTTP/HTTPS URL.
    input: String,

    /// Write extracted text to this file instead of stdout.
    #[arg(short, long, env = "OCR_TRIAGE_OUTPUT")]
    output: Option<PathBuf>,

    /// Recognition quality preset: fast, balanced, accurate.
    #[arg(long, env = "OCR_TRIAGE_QUALITY", value_enum, default_value = "balanced")]
    quality: QualityArg,

    /// Recognition language.
    #[arg(long, env = "OCR_TRIAGE_LANGUAGE", value_enum, default_value = "english")]
    language: LanguageArg,

    /// Ignore any cached result and reprocess from scratch.
    #[arg(short, long)]
    force: bool,

    /// Minimum local confidence (0.0-1.0) before cloud escalation.
    #[arg(long, env = "OCR_TRIAGE_CONFIDENCE", default_value_t = 0.60)]
    confidence: f32,

    /// Concurrent local OCR workers.
    #[arg(short, long, env = "OCR_TRIAGE_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Result cache directory.
    #[arg(long, env = "OCR_TRIAGE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Print the classifier's per-signal readings after processing.
    #[arg(long)]
    signals: bool,

    /// Output the full structured result as JSON instead of plain text.
    #[arg(long, env = "OCR_TRIAGE_JSON")]
    json: bool,

    /// Print cache entry count and size, then exit (input ignored).
    #[arg(long)]
    cache_stats: bool,

    /// Delete all cache entries, then exit (input ignored).
    #[arg(long)]
    clear_cache: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_TRIAGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the extracted text.
    #[arg(short, long, env = "OCR_TRIAGE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Fast,
    Balanced,
    Accurate,
}

impl From<QualityArg> for QualityPreset {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Fast => QualityPreset::Fast,
            QualityArg::Balanced => QualityPreset::Balanced,
            QualityArg::Accurate => QualityPreset::Accurate,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    English,
    German,
    French,
    Spanish,
    Italian,
    Dutch,
}

impl From<LanguageArg> for LanguageCode {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::English => LanguageCode::English,
            LanguageArg::German => LanguageCode::German,
            LanguageArg::French => LanguageCode::French,
            LanguageArg::Spanish => LanguageCode::Spanish,
            LanguageArg::Italian => LanguageCode::Italian,
            LanguageArg::Dutch => LanguageCode::Dutch,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".cache")
        .join("ocr-triage")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner is the user-facing feedback; library logs go to stderr
    // only when asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let cache_dir = cli.cache_dir.clone().unwrap_or_else(default_cache_dir);
    let cache = ContentCache::new(&cache_dir)
        .with_context(|| format!("cannot open cache at {}", cache_dir.display()))?;

    // ── Cache maintenance modes ──────────────────────────────────────────
    if cli.cache_stats {
        let stats = cache.stats().await.context("cannot read cache")?;
        println!(
            "{} entries, {:.1} KiB in {}",
            stats.entries,
            stats.total_bytes as f64 / 1024.0,
            cache_dir.display()
        );
        return Ok(());
    }
    if cli.clear_cache {
        let removed = cache.clear().await.context("cannot clear cache")?;
        eprintln!("{} removed {removed} cache entries", green("✔"));
        return Ok(());
    }

    // ── Build the engine ─────────────────────────────────────────────────
    let config = EngineConfig::builder()
        .ocr_workers(cli.workers)
        .confidence_threshold(cli.confidence)
        .build()
        .context("invalid configuration")?;

    let engine = Engine::builder()
        .source(Arc::new(FilePageSource))
        .local_engine(Arc::new(TesseractEngine))
        .cache(cache)
        .config(config)
        .build()
        .context("cannot build engine")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let show_spinner = !cli.quiet && !cli.json;
    let spinner = if show_spinner {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Processing");
        bar.set_message(cli.input.clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let result = engine
        .process(
            &cli.input,
            cli.quality.into(),
            cli.language.into(),
            cli.force,
        )
        .await;

    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let result = result.context("processing failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("cannot serialise result")?
        );
    } else {
        let text = result.full_text();
        if let Some(ref path) = cli.output {
            tokio::fs::write(path, &text)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(text.as_bytes()).context("cannot write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet && !cli.json {
        let s = &result.stats;
        eprintln!(
            "{} {:?}  {} pages  {}",
            if s.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            result.verdict,
            bold(&s.total_pages.to_string()),
            dim(&format!(
                "native {} / local {} / cloud {} / failed {}",
                s.native_pages, s.local_ocr_pages, s.cloud_ocr_pages, s.failed_pages
            )),
        );
        for warning in &result.warnings {
            eprintln!("  {} {warning}", cyan("⚠"));
        }
        for page in result.pages.iter().filter(|p| p.source == TextSource::Error) {
            if let Some(failure) = &page.failure {
                eprintln!("  {} {failure}", red("✗"));
            }
        }
    }

    if cli.signals {
        match engine.last_classifier_signals(&cli.input) {
            Some(report) => {
                eprintln!("{}", bold("Classifier signals:"));
                for reading in &report.readings {
                    eprintln!(
                        "  {} {:<18} {:>9.3}  {}",
                        if reading.fired { red("●") } else { green("○") },
                        reading.signal.name(),
                        reading.value,
                        dim(&format!("threshold {:.3}", reading.threshold)),
                    );
                }
            }
            None => eprintln!(
                "{}",
                dim("No classifier signals (cache hit, or the run stopped before classification).")
            ),
        }
    }

    Ok(())
}
