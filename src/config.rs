//! Configuration types for the OCR triage engine.
//!
//! All engine behaviour is controlled through [`EngineConfig`], built via its
//! [`EngineConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across tasks, serialise them for logging, and diff two
//! runs to understand why their outputs differ.
//!
//! The classifier thresholds live in their own [`ClassifierThresholds`]
//! struct. They were tuned empirically against a small document sample and
//! are configuration defaults requiring separate calibration, not verified
//! constants — which is exactly why they are data here rather than literals
//! inside the classifier.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a triage/OCR run.
///
/// Built via [`EngineConfig::builder()`] or using
/// [`EngineConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_triage::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .ocr_workers(2)
///     .confidence_threshold(0.75)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of pages recognised concurrently by the local engine. Default: 4.
    ///
    /// Recognition is CPU-bound; unconstrained parallelism degrades
    /// throughput through cache and memory contention rather than improving
    /// it. Four workers saturates a typical desktop without starving the
    /// async runtime.
    pub ocr_workers: usize,

    /// Number of concurrent cloud escalation calls. Default: 2.
    ///
    /// Cloud calls are network-bound, not CPU-bound, so they get their own
    /// limit independent of `ocr_workers`. Kept low because vision APIs
    /// rate-limit aggressively.
    pub cloud_concurrency: usize,

    /// Minimum local confidence to accept a page without escalation.
    /// Range: 0.0–1.0. Default: 0.60.
    ///
    /// Below this the page escalates to the cloud provider when one is
    /// configured, otherwise the local text is kept with a warning — the
    /// engine always returns the best text it has.
    pub confidence_threshold: f32,

    /// How many leading pages feed the scan classifier. Default: 3.
    ///
    /// Three pages is enough to catch the common failure shapes (empty text
    /// layer, garbage OCR layer) without paying full-document extraction
    /// cost on large files.
    pub sample_pages: u32,

    /// Scan classifier signal thresholds.
    pub classifier: ClassifierThresholds,

    /// Pre-screen probe configuration (timeout, probe command).
    pub prescreen: PreScreenConfig,

    /// Per-cloud-call timeout in seconds. Default: 60.
    pub cloud_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Recognition hint forwarded to the cloud provider. Default: Printed.
    pub text_type: TextType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ocr_workers: 4,
            cloud_concurrency: 2,
            confidence_threshold: 0.60,
            sample_pages: 3,
            classifier: ClassifierThresholds::default(),
            prescreen: PreScreenConfig::default(),
            cloud_timeout_secs: 60,
            download_timeout_secs: 120,
            text_type: TextType::Printed,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn ocr_workers(mut self, n: usize) -> Self {
        self.config.ocr_workers = n.max(1);
        self
    }

    pub fn cloud_concurrency(mut self, n: usize) -> Self {
        self.config.cloud_concurrency = n.max(1);
        self
    }

    pub fn confidence_threshold(mut self, t: f32) -> Self {
        self.config.confidence_threshold = t;
        self
    }

    pub fn sample_pages(mut self, n: u32) -> Self {
        self.config.sample_pages = n.max(1);
        self
    }

    pub fn classifier(mut self, thresholds: ClassifierThresholds) -> Self {
        self.config.classifier = thresholds;
        self
    }

    pub fn prescreen(mut self, prescreen: PreScreenConfig) -> Self {
        self.config.prescreen = prescreen;
        self
    }

    pub fn prescreen_timeout(mut self, timeout: Duration) -> Self {
        self.config.prescreen.timeout = timeout;
        self
    }

    pub fn cloud_timeout_secs(mut self, secs: u64) -> Self {
        self.config.cloud_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn text_type(mut self, t: TextType) -> Self {
        self.config.text_type = t;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "confidence_threshold must be within 0.0–1.0, got {}",
                c.confidence_threshold
            )));
        }
        if c.ocr_workers == 0 {
            return Err(EngineError::InvalidConfig("ocr_workers must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Recognition quality preset.
///
/// The preset is a closed enumeration because it participates in the cache
/// key: reprocessing the same file at a different preset must be a cache
/// miss, never a stale hit. Each preset fixes the Tesseract page-segmentation
/// mode and the image preprocessing applied before recognition; the mapping
/// is a pure function of the preset, never adaptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    /// Quick processing for clean, high-contrast documents.
    Fast,
    /// Good mix of speed and accuracy. (default)
    #[default]
    Balanced,
    /// Best quality for faded or noisy documents; slowest.
    Accurate,
}

impl QualityPreset {
    /// Tesseract page-segmentation mode for this preset.
    pub fn page_segmentation_mode(&self) -> u32 {
        match self {
            QualityPreset::Fast | QualityPreset::Balanced => 3,
            QualityPreset::Accurate => 1,
        }
    }

    /// Whether contrast/sharpness enhancement runs before recognition.
    pub fn enhance(&self) -> bool {
        !matches!(self, QualityPreset::Fast)
    }

    /// Whether the denoise filter runs before recognition.
    pub fn denoise(&self) -> bool {
        matches!(self, QualityPreset::Accurate)
    }

    /// Stable identifier used in cache keys and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::Balanced => "balanced",
            QualityPreset::Accurate => "accurate",
        }
    }
}

/// Recognition language.
///
/// Closed enumeration for the same cache-key reason as [`QualityPreset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageCode {
    #[default]
    English,
    German,
    French,
    Spanish,
    Italian,
    Dutch,
}

impl LanguageCode {
    /// ISO 639-2 code as understood by `tesseract -l`.
    pub fn as_tesseract(&self) -> &'static str {
        match self {
            LanguageCode::English => "eng",
            LanguageCode::German => "deu",
            LanguageCode::French => "fra",
            LanguageCode::Spanish => "spa",
            LanguageCode::Italian => "ita",
            LanguageCode::Dutch => "nld",
        }
    }

    /// Human-readable name for prompts and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::English => "English",
            LanguageCode::German => "German",
            LanguageCode::French => "French",
            LanguageCode::Spanish => "Spanish",
            LanguageCode::Italian => "Italian",
            LanguageCode::Dutch => "Dutch",
        }
    }
}

/// What kind of text the cloud provider should expect.
///
/// Handwriting transcription needs a different prompt than printed text;
/// the hint comes from the caller (typically a UI choice) and only affects
/// the escalation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    #[default]
    Printed,
    Handwriting,
}

// ── Classifier thresholds ────────────────────────────────────────────────

/// Tunable thresholds for the five scan-classifier signals.
///
/// Any single signal firing marks the document as scanned: a false positive
/// costs one redundant OCR pass, a false negative silently delivers garbage
/// text to the user. The defaults below came from empirical tuning against a
/// small sample and should be treated as a starting point for calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Density signal fires below this many characters per sampled page.
    pub min_chars_per_page: f64,
    /// Spacing signal fires when a page's space ratio drops below this floor.
    pub space_ratio_floor: f64,
    /// Spacing signal fires when a page's space ratio exceeds this ceiling.
    pub space_ratio_ceiling: f64,
    /// Word-count signal fires below this many words across all samples.
    pub min_word_count: usize,
    /// Alpha-ratio signal fires when letters / total characters drops below.
    pub min_alpha_ratio: f64,
    /// Single-char signal fires when the fraction of one-character words
    /// exceeds this.
    pub max_single_char_ratio: f64,
    /// Spacing is only meaningful on pages with at least this many
    /// characters; shorter pages are skipped for that signal.
    pub spacing_min_page_chars: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            min_chars_per_page: 500.0,
            space_ratio_floor: 0.05,
            space_ratio_ceiling: 0.40,
            min_word_count: 150,
            min_alpha_ratio: 0.40,
            max_single_char_ratio: 0.20,
            spacing_min_page_chars: 50,
        }
    }
}

// ── Pre-screen probe configuration ───────────────────────────────────────

/// How the pre-screen probe is executed.
///
/// The probe must run in a separate, killable process: the failure mode
/// being guarded against is a foreign parsing library entering an unbounded
/// loop below any in-process timeout mechanism. A thread cannot be killed;
/// a child process can.
#[derive(Debug, Clone)]
pub struct PreScreenConfig {
    /// Wall-clock budget for the probe. Default: 10 s.
    ///
    /// Converting one page at probe resolution should take well under a
    /// second; a probe that is still running at the deadline has almost
    /// certainly hit a pathological structure.
    pub timeout: Duration,
    /// The command the probe runs.
    pub command: ProbeCommand,
}

impl Default for PreScreenConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            command: ProbeCommand::default(),
        }
    }
}

/// The external command used as the parse probe.
#[derive(Debug, Clone)]
pub enum ProbeCommand {
    /// `pdftoppm -f 1 -l 1 -r <dpi> <pdf> <tmp-prefix>` — converts only the
    /// first page at low resolution, exercising the same parser family that
    /// full rendering will use.
    Pdftoppm { dpi: u32 },
    /// An arbitrary command run verbatim (used by tests to simulate hangs
    /// and crashes without a pathological fixture file).
    Custom { program: String, args: Vec<String> },
}

impl Default for ProbeCommand {
    fn default() -> Self {
        ProbeCommand::Pdftoppm { dpi: 36 }
    }
}
