//! Per-page escalation: local recognition, confidence gate, cloud fallback.
//!
//! Each OCR page walks an explicit state machine:
//!
//! ```text
//! LocalPending ──ok──▶ LocalDone ──conf ≥ gate──▶ Accepted
//!      │                   │
//!      │ error             │ conf < gate, cloud configured
//!      ▼                   ▼
//!  Escalating ◀────────────┘
//!      │
//!      ├─ cloud ok ──▶ CloudDone ──▶ Accepted   (cloud text replaces local)
//!      └─ cloud err ─▶ local text kept with warning, or Failed if none
//! ```
//!
//! The states are a real enum rather than implicit control flow because the
//! transitions are the contract: cloud output replaces local output, never
//! merges with it, and a page without cloud access is accepted low-confidence
//! rather than dropped. Every transition is logged at debug.

use crate::config::EngineConfig;
use crate::config::{LanguageCode, QualityPreset};
use crate::error::PageFailure;
use crate::output::{PageResult, TextSource};
use crate::pipeline::cloud::{encode_page, CloudError, CloudOcrProvider, RecognitionHint};
use crate::pipeline::local::{LocalOcrEngine, LocalRecognition};
use crate::pipeline::postprocess::clean_ocr_text;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Everything a page needs to run the escalation ladder.
pub struct EscalationContext {
    pub local: Arc<dyn LocalOcrEngine>,
    pub cloud: Option<Arc<dyn CloudOcrProvider>>,
    /// Shared limiter for in-flight cloud calls across all pages.
    pub cloud_permits: Arc<Semaphore>,
    pub config: EngineConfig,
    pub preset: QualityPreset,
    pub language: LanguageCode,
}

enum PageState {
    LocalPending,
    LocalDone(LocalRecognition),
    Escalating {
        /// Local text kept in reserve; `None` when local itself failed.
        fallback: Option<LocalRecognition>,
        reason: String,
    },
    CloudDone {
        text: String,
    },
    Accepted(PageResult),
    Failed(PageFailure),
}

/// Run one rendered page through local recognition and, when warranted,
/// cloud escalation. Always returns a `PageResult`; failures degrade to an
/// error placeholder rather than propagating.
pub async fn run_page(ctx: &EscalationContext, page_number: u32, image: &DynamicImage) -> PageResult {
    let mut warnings: Vec<String> = Vec::new();
    let mut state = PageState::LocalPending;

    loop {
        state = match state {
            PageState::LocalPending => {
                match ctx.local.recognize(image, ctx.preset, ctx.language).await {
                    Ok(recognition) => {
                        debug!(page = page_number, confidence = recognition.confidence, "local pass done");
                        PageState::LocalDone(recognition)
                    }
                    Err(e) if ctx.cloud.is_some() => {
                        let reason = format!("local OCR failed: {e}");
                        warn!(page = page_number, error = %e, "local OCR failed, escalating");
                        PageState::Escalating {
                            fallback: None,
                            reason,
                        }
                    }
                    Err(e) => PageState::Failed(PageFailure::LocalOcrFailed {
                        page: page_number,
                        detail: e.to_string(),
                    }),
                }
            }

            PageState::LocalDone(recognition) => {
                let gate = ctx.config.confidence_threshold;
                if recognition.confidence >= gate {
                    PageState::Accepted(accept_local(page_number, recognition, warnings.clone()))
                } else if ctx.cloud.is_some() {
                    debug!(
                        page = page_number,
                        confidence = recognition.confidence,
                        gate,
                        "below confidence gate, escalating"
                    );
                    PageState::Escalating {
                        reason: format!(
                            "confidence {:.2} below threshold {:.2}",
                            recognition.confidence, gate
                        ),
                        fallback: Some(recognition),
                    }
                } else {
                    // No escalation path: best available text, flagged.
                    warnings.push(format!(
                        "low confidence {:.2} (threshold {:.2}), no cloud provider configured",
                        recognition.confidence, gate
                    ));
                    PageState::Accepted(accept_local(page_number, recognition, warnings.clone()))
                }
            }

            PageState::Escalating { fallback, reason } => match ctx.cloud.as_ref() {
                None => PageState::Failed(PageFailure::LocalOcrFailed {
                    page: page_number,
                    detail: reason,
                }),
                Some(cloud) => match call_cloud(ctx, cloud.as_ref(), image).await {
                    Ok(text) => {
                        debug!(page = page_number, provider = cloud.name(), %reason, "cloud escalation succeeded");
                        PageState::CloudDone { text }
                    }
                    Err(e) => match fallback {
                        Some(recognition) => {
                            warn!(page = page_number, error = %e, "cloud escalation failed, keeping local text");
                            warnings.push(format!(
                                "cloud escalation via {} failed ({e}); local text retained",
                                cloud.name()
                            ));
                            PageState::Accepted(accept_local(
                                page_number,
                                recognition,
                                warnings.clone(),
                            ))
                        }
                        None => PageState::Failed(PageFailure::CloudFailed {
                            page: page_number,
                            detail: format!("{reason}; cloud also failed: {e}"),
                        }),
                    },
                },
            },

            PageState::CloudDone { text } => PageState::Accepted(PageResult {
                page_number,
                text: clean_ocr_text(&text),
                source: TextSource::CloudOcr,
                confidence: None,
                warnings: warnings.clone(),
                failure: None,
            }),

            PageState::Accepted(result) => return result,
            PageState::Failed(failure) => return PageResult::placeholder(page_number, failure),
        };
    }
}

fn accept_local(page_number: u32, r: LocalRecognition, warnings: Vec<String>) -> PageResult {
    PageResult {
        page_number,
        text: clean_ocr_text(&r.text),
        source: TextSource::LocalOcr,
        confidence: Some(r.confidence),
        warnings,
        failure: None,
    }
}

/// One cloud call under the shared permit, with a deadline and a single
/// retry for transient failures.
async fn call_cloud(
    ctx: &EscalationContext,
    cloud: &dyn CloudOcrProvider,
    image: &DynamicImage,
) -> Result<String, CloudError> {
    let _permit = ctx
        .cloud_permits
        .acquire()
        .await
        .map_err(|_| CloudError::Permanent("cloud limiter closed".into()))?;

    let page = encode_page(image)?;
    let hint = RecognitionHint {
        language: ctx.language,
        text_type: ctx.config.text_type,
    };
    let deadline = Duration::from_secs(ctx.config.cloud_timeout_secs);

    let mut last_err: Option<CloudError> = None;
    for attempt in 0..2 {
        match tokio::time::timeout(deadline, cloud.recognize(&page, &hint)).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e @ CloudError::Transient(_))) if attempt == 0 => {
                warn!(error = %e, "transient cloud error, retrying once");
                last_err = Some(e);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let e = CloudError::Transient(format!(
                    "timed out after {}s",
                    ctx.config.cloud_timeout_secs
                ));
                if attempt == 0 {
                    warn!("cloud call timed out, retrying once");
                    last_err = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CloudError::Permanent("cloud call failed".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextType;
    use crate::error::EngineError;
    use crate::pipeline::cloud::EncodedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLocal {
        text: &'static str,
        confidence: f32,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocalOcrEngine for FixedLocal {
        async fn verify(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn recognize(
            &self,
            _image: &DynamicImage,
            _preset: QualityPreset,
            _language: LanguageCode,
        ) -> Result<LocalRecognition, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::Internal("simulated local failure".into()));
            }
            Ok(LocalRecognition {
                text: self.text.to_string(),
                confidence: self.confidence,
            })
        }
    }

    struct FixedCloud {
        text: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CloudOcrProvider for FixedCloud {
        fn name(&self) -> &str {
            "fixed-cloud"
        }
        async fn recognize(
            &self,
            _page: &EncodedPage,
            _hint: &RecognitionHint,
        ) -> Result<String, CloudError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CloudError::Permanent("simulated cloud failure".into()));
            }
            Ok(self.text.to_string())
        }
    }

    fn context(local: FixedLocal, cloud: Option<FixedCloud>) -> EscalationContext {
        EscalationContext {
            local: Arc::new(local),
            cloud: cloud.map(|c| Arc::new(c) as Arc<dyn CloudOcrProvider>),
            cloud_permits: Arc::new(Semaphore::new(2)),
            config: EngineConfig::default(),
            preset: QualityPreset::Balanced,
            language: LanguageCode::English,
        }
    }

    fn blank_image() -> DynamicImage {
        DynamicImage::new_luma8(4, 4)
    }

    #[tokio::test]
    async fn confident_local_result_is_accepted_without_cloud_call() {
        let cloud = FixedCloud {
            text: "cloud text",
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let ctx = context(
            FixedLocal {
                text: "local text",
                confidence: 0.95,
                fail: false,
                calls: AtomicUsize::new(0),
            },
            Some(cloud),
        );
        let result = run_page(&ctx, 1, &blank_image()).await;
        assert_eq!(result.source, TextSource::LocalOcr);
        assert_eq!(result.text, "local text");
        assert_eq!(result.confidence, Some(0.95));
    }

    #[tokio::test]
    async fn low_confidence_escalates_and_cloud_replaces_local() {
        let ctx = context(
            FixedLocal {
                text: "garbled",
                confidence: 0.30,
                fail: false,
                calls: AtomicUsize::new(0),
            },
            Some(FixedCloud {
                text: "clean transcription",
                fail: false,
                calls: AtomicUsize::new(0),
            }),
        );
        let result = run_page(&ctx, 3, &blank_image()).await;
        assert_eq!(result.source, TextSource::CloudOcr);
        assert_eq!(result.text, "clean transcription");
        assert!(result.confidence.is_none());
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn cloud_failure_falls_back_to_local_with_warning() {
        let ctx = context(
            FixedLocal {
                text: "shaky local text",
                confidence: 0.30,
                fail: false,
                calls: AtomicUsize::new(0),
            },
            Some(FixedCloud {
                text: "",
                fail: true,
                calls: AtomicUsize::new(0),
            }),
        );
        let result = run_page(&ctx, 2, &blank_image()).await;
        assert_eq!(result.source, TextSource::LocalOcr);
        assert_eq!(result.text, "shaky local text");
        assert!(result.warnings.iter().any(|w| w.contains("local text retained")));
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn low_confidence_without_cloud_is_accepted_with_warning() {
        let ctx = context(
            FixedLocal {
                text: "best effort",
                confidence: 0.30,
                fail: false,
                calls: AtomicUsize::new(0),
            },
            None,
        );
        let result = run_page(&ctx, 1, &blank_image()).await;
        assert_eq!(result.source, TextSource::LocalOcr);
        assert!(result.warnings.iter().any(|w| w.contains("low confidence")));
    }

    #[tokio::test]
    async fn local_failure_with_cloud_still_produces_text() {
        let ctx = context(
            FixedLocal {
                text: "",
                confidence: 0.0,
                fail: true,
                calls: AtomicUsize::new(0),
            },
            Some(FixedCloud {
                text: "rescued by cloud",
                fail: false,
                calls: AtomicUsize::new(0),
            }),
        );
        let result = run_page(&ctx, 1, &blank_image()).await;
        assert_eq!(result.source, TextSource::CloudOcr);
        assert_eq!(result.text, "rescued by cloud");
    }

    #[tokio::test]
    async fn both_tiers_failing_degrades_to_placeholder() {
        let ctx = context(
            FixedLocal {
                text: "",
                confidence: 0.0,
                fail: true,
                calls: AtomicUsize::new(0),
            },
            Some(FixedCloud {
                text: "",
                fail: true,
                calls: AtomicUsize::new(0),
            }),
        );
        let result = run_page(&ctx, 4, &blank_image()).await;
        assert_eq!(result.source, TextSource::Error);
        assert!(matches!(
            result.failure,
            Some(PageFailure::CloudFailed { page: 4, .. })
        ));
    }
}
