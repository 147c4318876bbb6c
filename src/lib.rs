//! # ocr-triage
//!
//! Decide whether a document is scanned or born-digital, then extract its
//! text the cheapest way that actually works.
//!
//! ## Why this crate?
//!
//! Running OCR on a born-digital PDF wastes minutes of CPU to reproduce text
//! that was already there; trusting the text layer of a scanned PDF silently
//! returns garbage. This crate classifies each document from its embedded
//! text layer, routes pages to native extraction or a local OCR engine, and
//! escalates only the low-confidence pages to a cloud vision model. Results
//! are content-addressed, so the same bytes at the same settings are never
//! processed twice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Identity   SHA-256 + size → cache lookup (hit ⇒ done)
//!  ├─ 3. Pre-screen killable subprocess probe for hostile PDFs
//!  ├─ 4. Classify   five text-layer signals → native vs scanned
//!  ├─ 5. Extract    native text layer, or
//!  ├─ 6. Recognise  local OCR → confidence gate → cloud escalation
//!  └─ 7. Seal       ordered per-page results + verdict, cached
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ocr_triage::{
//!     ContentCache, Engine, EngineConfig, FilePageSource, LanguageCode,
//!     QualityPreset, TesseractEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder()
//!         .source(Arc::new(FilePageSource))
//!         .local_engine(Arc::new(TesseractEngine))
//!         .cache(ContentCache::new("/tmp/ocr-cache")?)
//!         .config(EngineConfig::default())
//!         .build()?;
//!
//!     let result = engine
//!         .process("scan.pdf", QualityPreset::Balanced, LanguageCode::English, false)
//!         .await?;
//!     println!("{:?}: {} pages", result.verdict, result.pages.len());
//!     println!("{}", result.full_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-triage` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr-triage = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod output;
pub mod pipeline;
pub mod prescreen;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheError, CacheStats, ContentCache};
pub use classify::{ScanVerdict, Signal, SignalReading, SignalReport};
pub use config::{
    ClassifierThresholds, EngineConfig, EngineConfigBuilder, LanguageCode, PreScreenConfig,
    ProbeCommand, QualityPreset, TextType,
};
pub use engine::{CancelToken, Engine, EngineBuilder};
pub use error::{EngineError, PageFailure, SourceError};
pub use identity::{CacheKey, DocumentIdentity};
pub use output::{DocumentResult, DocumentVerdict, PageResult, PipelinePath, RunStats, TextSource};
pub use pipeline::cloud::{CloudError, CloudOcrProvider, EncodedPage, RecognitionHint};
pub use pipeline::local::{LocalOcrEngine, LocalRecognition, TesseractEngine};
pub use pipeline::source::{FilePageSource, PageProvider, PageSource};
pub use prescreen::PreScreenVerdict;
