//! The triage orchestrator.
//!
//! [`Engine`] wires the pipeline stages together: resolve the input, hash
//! it, consult the cache, pre-screen PDFs, classify scanned vs native, then
//! route each page to native extraction or the recognition ladder. Pages run
//! concurrently under a worker limit; a single bad page degrades to a
//! placeholder and the rest of the document survives.
//!
//! The cache check is a hard short-circuit: on a hit the document is never
//! opened, no engines are touched, and the sealed result is returned as-is.

use crate::cache::ContentCache;
use crate::classify::{classify, ScanVerdict, SignalReport};
use crate::config::{EngineConfig, LanguageCode, QualityPreset};
use crate::error::{EngineError, PageFailure, SourceError};
use crate::identity::{CacheKey, DocumentIdentity};
use crate::output::{DocumentResult, PageResult, PipelinePath, TextSource};
use crate::pipeline::cloud::CloudOcrProvider;
use crate::pipeline::escalate::{run_page, EscalationContext};
use crate::pipeline::input::resolve_input;
use crate::pipeline::local::LocalOcrEngine;
use crate::pipeline::source::{PageProvider, PageSource};
use crate::prescreen::{prescreen_pdf, prescreen_warning};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Cooperative cancellation handle.
///
/// Cancellation is checked between pages, never mid-recognition: a page that
/// has started finishes, pages that have not started are skipped, and the
/// returned result is marked incomplete and kept out of the cache.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How many inputs' classifier reports are kept for diagnostics.
const SIGNAL_HISTORY: usize = 64;

/// Bounded per-input store for classifier reports. Oldest input is evicted
/// once the cap is reached, so a long-lived engine cannot grow without
/// limit.
#[derive(Default)]
struct SignalLog {
    order: VecDeque<String>,
    reports: HashMap<String, SignalReport>,
}

impl SignalLog {
    fn record(&mut self, input: &str, report: SignalReport) {
        if self.reports.insert(input.to_string(), report).is_none() {
            self.order.push_back(input.to_string());
            if self.order.len() > SIGNAL_HISTORY {
                if let Some(evicted) = self.order.pop_front() {
                    self.reports.remove(&evicted);
                }
            }
        }
    }

    fn get(&self, input: &str) -> Option<SignalReport> {
        self.reports.get(input).cloned()
    }
}

/// Scanned-document triage and OCR engine.
///
/// Construct with [`Engine::builder`], injecting the page source, the local
/// engine, and (optionally) a cloud provider. All collaborators sit behind
/// traits so tests drive the full decision logic with stubs.
pub struct Engine {
    source: Arc<dyn PageSource>,
    local: Arc<dyn LocalOcrEngine>,
    cloud: Option<Arc<dyn CloudOcrProvider>>,
    cache: ContentCache,
    config: EngineConfig,
    /// Classifier diagnostics from the most recent runs, for threshold
    /// tuning and the CLI's `--signals` view.
    signals: Mutex<SignalLog>,
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    source: Option<Arc<dyn PageSource>>,
    local: Option<Arc<dyn LocalOcrEngine>>,
    cloud: Option<Arc<dyn CloudOcrProvider>>,
    cache: Option<ContentCache>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn local_engine(mut self, local: Arc<dyn LocalOcrEngine>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn cloud_provider(mut self, cloud: Arc<dyn CloudOcrProvider>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let source = self
            .source
            .ok_or_else(|| EngineError::InvalidConfig("a page source is required".into()))?;
        let local = self
            .local
            .ok_or_else(|| EngineError::InvalidConfig("a local OCR engine is required".into()))?;
        let cache = self
            .cache
            .ok_or_else(|| EngineError::InvalidConfig("a result cache is required".into()))?;
        Ok(Engine {
            source,
            local,
            cloud: self.cloud,
            cache,
            config: self.config,
            signals: Mutex::new(SignalLog::default()),
        })
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            source: None,
            local: None,
            cloud: None,
            cache: None,
            config: EngineConfig::default(),
        }
    }

    /// Process a document (local path or HTTP URL) end to end.
    pub async fn process(
        &self,
        input: &str,
        preset: QualityPreset,
        language: LanguageCode,
        force: bool,
    ) -> Result<DocumentResult, EngineError> {
        self.process_with_cancel(input, preset, language, force, &CancelToken::new())
            .await
    }

    /// Like [`Engine::process`], observing `cancel` between pages.
    pub async fn process_with_cancel(
        &self,
        input: &str,
        preset: QualityPreset,
        language: LanguageCode,
        force: bool,
        cancel: &CancelToken,
    ) -> Result<DocumentResult, EngineError> {
        // Keep the resolved input alive for the whole run; a downloaded
        // temp file is deleted when this drops.
        let resolved = resolve_input(input, self.config.download_timeout_secs).await?;
        let path = resolved.path();

        let identity = DocumentIdentity::for_file(path).await?;
        let key = CacheKey::new(identity, preset, language);
        info!(input, hash = key.identity.short_hash(), "processing document");

        if force {
            // Forced runs drop the old entry up front so an interrupted run
            // cannot leave a stale result behind.
            self.cache.invalidate(&key).await;
        } else if let Some(hit) = self.cache.get(&key).await {
            info!(input, "cache hit, skipping all processing");
            return Ok(hit);
        }

        let provider = self.source.open(path).await.map_err(|e| {
            EngineError::SourceUnavailable {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        })?;

        let mut result = self
            .run_pipeline(input, path, provider.as_ref(), preset, language, cancel)
            .await?;

        if result.incomplete {
            debug!(input, "run incomplete, not caching");
        } else if let Err(e) = self.cache.put(&key, &result).await {
            warn!(input, error = %e, "cache write failed");
            result.warnings.push(format!("cache write failed: {e}"));
        }
        Ok(result)
    }

    /// Remove the cached result for an input, if any.
    pub async fn invalidate_cache(
        &self,
        input: &str,
        preset: QualityPreset,
        language: LanguageCode,
    ) -> Result<(), EngineError> {
        let resolved = resolve_input(input, self.config.download_timeout_secs).await?;
        let identity = DocumentIdentity::for_file(resolved.path()).await?;
        self.cache
            .invalidate(&CacheKey::new(identity, preset, language))
            .await;
        Ok(())
    }

    /// Classifier diagnostics from the most recent (non-cached) run of
    /// `input`, when classification ran at all.
    pub fn last_classifier_signals(&self, input: &str) -> Option<SignalReport> {
        self.signals
            .lock()
            .ok()
            .and_then(|log| log.get(input))
    }

    async fn run_pipeline(
        &self,
        input: &str,
        path: &std::path::Path,
        provider: &dyn PageProvider,
        preset: QualityPreset,
        language: LanguageCode,
        cancel: &CancelToken,
    ) -> Result<DocumentResult, EngineError> {
        let page_count = provider.page_count();
        let mut doc_warnings: Vec<String> = Vec::new();
        let mut pipeline_path = PipelinePath::default();

        // PDFs get the subprocess parse probe before the in-process
        // renderer touches them. A failed probe switches the document to
        // OCR-only mode instead of rejecting it.
        let mut ocr_only = false;
        if provider.is_pdf() {
            let verdict = prescreen_pdf(path, &self.config.prescreen).await;
            if !verdict.passed {
                ocr_only = true;
                pipeline_path.prescreen_bypassed = true;
                doc_warnings.push(prescreen_warning(&verdict));
            } else if let Some(reason) = &verdict.reason {
                doc_warnings.push(format!("pre-screen skipped: {reason}"));
            }
        }

        // Classify from the leading pages' text layer, unless the probe
        // already ruled the text layer out of bounds.
        let scanned = if ocr_only {
            true
        } else {
            let sample_count = self.config.sample_pages.min(page_count);
            let mut samples: Vec<String> = Vec::new();
            // A page that refuses to yield its text layer is evidence of a
            // scanned document, not noise: it enters the window as an empty
            // sample and drags the density signal down.
            for page in 1..=sample_count {
                match provider.native_text(page).await {
                    Ok(text) => samples.push(text),
                    Err(e) => {
                        debug!(page, error = %e, "sample extraction failed, counting page as empty");
                        samples.push(String::new());
                    }
                }
            }
            let report = classify(&samples, &self.config.classifier);
            info!(
                input,
                verdict = ?report.verdict,
                fired = ?report.fired().iter().map(|s| s.name()).collect::<Vec<_>>(),
                "classification complete"
            );
            let is_scanned = report.verdict == ScanVerdict::Scanned;
            if let Ok(mut log) = self.signals.lock() {
                log.record(input, report);
            }
            is_scanned
        };

        // Split pages into native extractions and recognition candidates.
        // Even under a native verdict, a page whose text layer fails to
        // decode is routed to recognition rather than dropped.
        let mut native_pages: Vec<PageResult> = Vec::new();
        let mut ocr_pages: Vec<u32> = Vec::new();
        let mut incomplete = false;

        if scanned {
            ocr_pages = (1..=page_count).collect();
        } else {
            for page in 1..=page_count {
                if cancel.is_cancelled() {
                    incomplete = true;
                    break;
                }
                match provider.native_text(page).await {
                    Ok(text) => native_pages.push(PageResult {
                        page_number: page,
                        text,
                        source: TextSource::Native,
                        confidence: None,
                        warnings: Vec::new(),
                        failure: None,
                    }),
                    Err(e) => {
                        debug!(page, error = %e, "text layer unreadable, routing page to OCR");
                        ocr_pages.push(page);
                    }
                }
            }
        }

        let mut pages = native_pages;

        if !ocr_pages.is_empty() && !incomplete {
            // Verified lazily: a fully native document never pays for this,
            // and the failure is fatal exactly once rather than per page.
            self.local.verify().await?;

            let ctx = EscalationContext {
                local: Arc::clone(&self.local),
                cloud: self.cloud.clone(),
                cloud_permits: Arc::new(Semaphore::new(self.config.cloud_concurrency)),
                config: self.config.clone(),
                preset,
                language,
            };

            let ocr_results: Vec<Option<PageResult>> = stream::iter(ocr_pages)
                .map(|page| {
                    let ctx = &ctx;
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        let image = match provider.render_page(page).await {
                            Ok(img) => img,
                            Err(SourceError::CannotOpen { detail, .. }) => {
                                return Some(PageResult::placeholder(
                                    page,
                                    PageFailure::RenderFailed { page, detail },
                                ))
                            }
                            Err(e) => {
                                return Some(PageResult::placeholder(
                                    page,
                                    PageFailure::RenderFailed {
                                        page,
                                        detail: e.to_string(),
                                    },
                                ))
                            }
                        };
                        Some(run_page(ctx, page, &image).await)
                    }
                })
                .buffer_unordered(self.config.ocr_workers)
                .collect()
                .await;

            for slot in ocr_results {
                match slot {
                    Some(result) => pages.push(result),
                    None => incomplete = true,
                }
            }
        }

        if incomplete {
            doc_warnings.push("processing cancelled before all pages completed".into());
        }

        pages.sort_by_key(|p| p.page_number);

        pipeline_path.native |= pages.iter().any(|p| p.source == TextSource::Native);
        pipeline_path.local_ocr |= pages.iter().any(|p| p.source == TextSource::LocalOcr);
        pipeline_path.cloud_ocr |= pages.iter().any(|p| p.source == TextSource::CloudOcr);

        let stats = DocumentResult::tally(&pages);
        let verdict = DocumentResult::derive_verdict(&pages);
        info!(input, ?verdict, pages = pages.len(), failed = stats.failed_pages, "run complete");

        Ok(DocumentResult {
            pages,
            verdict,
            pipeline_path,
            warnings: doc_warnings,
            incomplete,
            stats,
        })
    }
}
