//! Error types for the ocr-triage library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EngineError`] — **Fatal**: the run cannot proceed at all (missing
//!   input file, local recognition toolchain absent, bad configuration).
//!   Returned as `Err(EngineError)` from [`crate::engine::Engine::process`].
//!
//! * [`PageFailure`] — **Non-fatal**: a single page failed (render glitch,
//!   recognition error with no fallback left) but all other pages are fine.
//!   Stored inside [`crate::output::PageResult`] so callers can inspect
//!   partial success rather than losing the whole document to one bad page.
//!
//! The separation is deliberate policy, not just typing convenience: page
//! errors never abort a document run, and document errors are never
//! swallowed into an empty result.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-triage library.
///
/// Page-level failures use [`PageFailure`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Source errors ─────────────────────────────────────────────────────
    /// The page source could not open or render the document at all.
    ///
    /// Fatal for the whole run; no cache entry is written.
    #[error("page source cannot open '{path}': {detail}")]
    SourceUnavailable { path: PathBuf, detail: String },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The local recognition toolchain is missing or misconfigured.
    ///
    /// Fatal for the run and surfaced exactly once. Silently skipping local
    /// OCR would misrepresent which pipeline tiers actually ran.
    #[error("local OCR engine unavailable: {detail}")]
    LocalEngineUnavailable { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page degrades to an
/// error placeholder. The overall run continues regardless.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageFailure {
    /// The page image could not be produced.
    #[error("page {page}: render failed: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// Local recognition failed and no cloud fallback was available.
    #[error("page {page}: local OCR failed: {detail}")]
    LocalOcrFailed { page: u32, detail: String },

    /// Cloud recognition failed and no local text existed to fall back to.
    #[error("page {page}: cloud OCR failed: {detail}")]
    CloudFailed { page: u32, detail: String },
}

impl PageFailure {
    /// The 1-based page number this failure belongs to.
    pub fn page(&self) -> u32 {
        match self {
            PageFailure::RenderFailed { page, .. }
            | PageFailure::LocalOcrFailed { page, .. }
            | PageFailure::CloudFailed { page, .. } => *page,
        }
    }
}

/// Errors surfaced by a [`crate::pipeline::source::PageSource`] collaborator.
///
/// Typed rather than a boxed `dyn Error` so the orchestrator can tell "the
/// whole document is unopenable" (fatal) apart from "one page is bad"
/// (degrade that page only).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document cannot be opened or its structure is unreadable.
    #[error("cannot open '{path}': {detail}")]
    CannotOpen { path: PathBuf, detail: String },

    /// One page could not be rasterised.
    #[error("page {page}: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// The embedded text layer for one page could not be decoded.
    #[error("page {page}: text layer unreadable: {detail}")]
    TextUnavailable { page: u32, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_engine_unavailable_display() {
        let e = EngineError::LocalEngineUnavailable {
            detail: "tesseract not found in PATH".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("tesseract not found"), "got: {msg}");
    }

    #[test]
    fn page_failure_page_number() {
        let f = PageFailure::RenderFailed {
            page: 7,
            detail: "bitmap allocation failed".into(),
        };
        assert_eq!(f.page(), 7);
        assert!(f.to_string().contains("page 7"));
    }

    #[test]
    fn page_failure_roundtrips_through_json() {
        let f = PageFailure::CloudFailed {
            page: 2,
            detail: "HTTP 503".into(),
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: PageFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page(), 2);
    }

    #[test]
    fn source_error_distinguishes_document_from_page() {
        let doc = SourceError::CannotOpen {
            path: "/tmp/x.pdf".into(),
            detail: "xref broken".into(),
        };
        let page = SourceError::RenderFailed {
            page: 3,
            detail: "oom".into(),
        };
        assert!(doc.to_string().contains("x.pdf"));
        assert!(page.to_string().contains("page 3"));
    }
}
