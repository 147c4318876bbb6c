//! Output types: per-page and per-document results.
//!
//! A [`DocumentResult`] is sealed once the orchestrator finishes assembling
//! it: any later change (a forced reprocess, a different preset) produces a
//! new value that replaces the cache entry wholesale. Nothing patches a
//! sealed result in place, which is what makes the cache artifact safe to
//! serve byte-identically on repeat lookups.

use crate::error::PageFailure;
use serde::{Deserialize, Serialize};

/// Which tier produced a page's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Extracted from the document's embedded text layer; no recognition ran.
    Native,
    /// Local recognition engine output.
    LocalOcr,
    /// Cloud escalation output (replaces, never merges with, local text).
    CloudOcr,
    /// The page degraded to an error placeholder.
    Error,
}

/// One page's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number; unique and contiguous within a document result.
    pub page_number: u32,
    /// Extracted or recognised text. Empty for error placeholders.
    pub text: String,
    /// Which tier produced `text`.
    pub source: TextSource,
    /// Recognition confidence in [0, 1]. `None` for native pages — no
    /// recognition ran, so there is nothing to be confident about.
    pub confidence: Option<f32>,
    /// Ordered warnings attached while the page moved through the pipeline.
    pub warnings: Vec<String>,
    /// Present when the page degraded to an error placeholder.
    pub failure: Option<PageFailure>,
}

impl PageResult {
    /// An error placeholder keeping the page slot in the ordered result.
    pub fn placeholder(page_number: u32, failure: PageFailure) -> Self {
        Self {
            page_number,
            text: String::new(),
            source: TextSource::Error,
            confidence: None,
            warnings: vec![failure.to_string()],
            failure: Some(failure),
        }
    }
}

/// Document-level verdict derived from the distribution of per-page sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentVerdict {
    /// Every non-error page came from the embedded text layer.
    NativeText,
    /// Every non-error page required recognition.
    Scanned,
    /// Some pages native, some recognised.
    Mixed,
}

/// Which pipeline tiers were invoked during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePath {
    /// At least one page was served from the native text layer.
    pub native: bool,
    /// At least one page ran through the local recognition engine.
    pub local_ocr: bool,
    /// At least one page escalated to the cloud provider.
    pub cloud_ocr: bool,
    /// Pre-screening failed and native extraction was bypassed entirely.
    pub prescreen_bypassed: bool,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub native_pages: usize,
    pub local_ocr_pages: usize,
    pub cloud_ocr_pages: usize,
    pub failed_pages: usize,
}

/// The sealed outcome of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Page results ordered by `page_number`, contiguous from 1 for a
    /// complete run.
    pub pages: Vec<PageResult>,
    /// Verdict derived from per-page sources, not recomputed independently.
    pub verdict: DocumentVerdict,
    /// Which tiers actually ran.
    pub pipeline_path: PipelinePath,
    /// Document-level warnings (pre-screen bypass, cache write failure,
    /// cancellation). Always present, possibly empty, so callers can show
    /// "processed with caveats" without typed-error inspection.
    pub warnings: Vec<String>,
    /// True when cancellation stopped the run before all pages dispatched.
    /// Incomplete results are returned to the caller but never cached.
    pub incomplete: bool,
    pub stats: RunStats,
}

impl DocumentResult {
    /// Derive the document verdict from per-page sources.
    ///
    /// Error placeholders carry no evidence either way and are ignored; a
    /// document where every page failed is reported as scanned, matching the
    /// safe default used everywhere else in the pipeline.
    pub fn derive_verdict(pages: &[PageResult]) -> DocumentVerdict {
        let native = pages
            .iter()
            .filter(|p| p.source == TextSource::Native)
            .count();
        let recognised = pages
            .iter()
            .filter(|p| matches!(p.source, TextSource::LocalOcr | TextSource::CloudOcr))
            .count();
        match (native, recognised) {
            (n, 0) if n > 0 => DocumentVerdict::NativeText,
            (0, _) => DocumentVerdict::Scanned,
            _ => DocumentVerdict::Mixed,
        }
    }

    /// Aggregate run statistics from the page list.
    pub fn tally(pages: &[PageResult]) -> RunStats {
        RunStats {
            total_pages: pages.len(),
            native_pages: pages
                .iter()
                .filter(|p| p.source == TextSource::Native)
                .count(),
            local_ocr_pages: pages
                .iter()
                .filter(|p| p.source == TextSource::LocalOcr)
                .count(),
            cloud_ocr_pages: pages
                .iter()
                .filter(|p| p.source == TextSource::CloudOcr)
                .count(),
            failed_pages: pages
                .iter()
                .filter(|p| p.source == TextSource::Error)
                .count(),
        }
    }

    /// Concatenate all page text in order, separated by blank lines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .filter(|p| !p.text.is_empty())
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, source: TextSource) -> PageResult {
        PageResult {
            page_number: n,
            text: format!("page {n}"),
            source,
            confidence: None,
            warnings: Vec::new(),
            failure: None,
        }
    }

    #[test]
    fn verdict_all_native() {
        let pages = vec![page(1, TextSource::Native), page(2, TextSource::Native)];
        assert_eq!(
            DocumentResult::derive_verdict(&pages),
            DocumentVerdict::NativeText
        );
    }

    #[test]
    fn verdict_all_ocr() {
        let pages = vec![page(1, TextSource::LocalOcr), page(2, TextSource::CloudOcr)];
        assert_eq!(
            DocumentResult::derive_verdict(&pages),
            DocumentVerdict::Scanned
        );
    }

    #[test]
    fn verdict_mixed() {
        let pages = vec![page(1, TextSource::Native), page(2, TextSource::LocalOcr)];
        assert_eq!(
            DocumentResult::derive_verdict(&pages),
            DocumentVerdict::Mixed
        );
    }

    #[test]
    fn verdict_ignores_error_placeholders() {
        let pages = vec![
            page(1, TextSource::Native),
            PageResult::placeholder(
                2,
                crate::error::PageFailure::RenderFailed {
                    page: 2,
                    detail: "x".into(),
                },
            ),
        ];
        assert_eq!(
            DocumentResult::derive_verdict(&pages),
            DocumentVerdict::NativeText
        );
    }

    #[test]
    fn tally_counts_each_source() {
        let pages = vec![
            page(1, TextSource::Native),
            page(2, TextSource::LocalOcr),
            page(3, TextSource::CloudOcr),
            PageResult::placeholder(
                4,
                crate::error::PageFailure::RenderFailed {
                    page: 4,
                    detail: "x".into(),
                },
            ),
        ];
        let stats = DocumentResult::tally(&pages);
        assert_eq!(stats.total_pages, 4);
        assert_eq!(stats.native_pages, 1);
        assert_eq!(stats.local_ocr_pages, 1);
        assert_eq!(stats.cloud_ocr_pages, 1);
        assert_eq!(stats.failed_pages, 1);
    }

    #[test]
    fn placeholder_carries_failure_and_warning() {
        let p = PageResult::placeholder(
            5,
            crate::error::PageFailure::RenderFailed {
                page: 5,
                detail: "bad page".into(),
            },
        );
        assert_eq!(p.source, TextSource::Error);
        assert!(p.text.is_empty());
        assert_eq!(p.warnings.len(), 1);
        assert!(p.failure.is_some());
    }
}
