//! Scanned-vs-native page classifier.
//!
//! Works purely on text extracted from the document's embedded text layer;
//! it never looks at pixels. Five independent signals each look for a
//! different failure shape of that text layer, and any single firing signal
//! marks the document as scanned. The asymmetry is intentional: a false
//! "scanned" costs one redundant recognition pass, a false "native" silently
//! delivers garbage text.
//!
//! All five signals are always evaluated even after one fires, so
//! [`SignalReport`] can show the complete picture for threshold tuning.

use crate::config::ClassifierThresholds;
use serde::{Deserialize, Serialize};

/// The five classifier signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Mean characters per sampled page below threshold. A scanned page's
    /// text layer is empty or near-empty.
    Density,
    /// Space ratio on some sampled page outside the plausible band. Both
    /// extremes indicate broken extraction rather than prose.
    Spacing,
    /// Total word count across samples below threshold.
    WordCount,
    /// Fraction of alphabetic characters below threshold. Vector-art and
    /// form documents extract as symbol soup.
    AlphaRatio,
    /// Fraction of single-character words above threshold. Shredded
    /// extraction splits words into letters.
    SingleCharWords,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Density => "density",
            Signal::Spacing => "spacing",
            Signal::WordCount => "word_count",
            Signal::AlphaRatio => "alpha_ratio",
            Signal::SingleCharWords => "single_char_words",
        }
    }
}

/// One evaluated signal: the measured value, the threshold it was compared
/// against, and whether it fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReading {
    pub signal: Signal,
    /// The measured value.
    pub value: f64,
    /// The threshold in effect for this run. For the spacing signal this is
    /// the violated bound of the band: the floor, unless the ceiling was
    /// exceeded.
    pub threshold: f64,
    pub fired: bool,
}

/// Classifier verdict for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    /// The text layer looks like real prose; native extraction is trusted.
    Native,
    /// At least one signal fired (or extraction failed); pages go to OCR.
    Scanned,
}

/// Full diagnostic output of one classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReport {
    pub verdict: ScanVerdict,
    /// All five readings, in declaration order, every run.
    pub readings: Vec<SignalReading>,
    /// True when no sample text could be extracted at all, which forces
    /// the scanned verdict without evaluating signals.
    pub extraction_failed: bool,
}

impl SignalReport {
    /// The signals that fired, for log lines.
    pub fn fired(&self) -> Vec<Signal> {
        self.readings
            .iter()
            .filter(|r| r.fired)
            .map(|r| r.signal)
            .collect()
    }
}

/// Classify a document from its sampled page texts.
///
/// `samples` holds the extracted text of the first N pages, one entry per
/// page. An empty slice, or samples that are all blank, means extraction
/// failed and the document is scanned by definition.
pub fn classify(samples: &[String], thresholds: &ClassifierThresholds) -> SignalReport {
    let total_chars: usize = samples.iter().map(|s| s.chars().count()).sum();
    if samples.is_empty() || total_chars == 0 {
        return SignalReport {
            verdict: ScanVerdict::Scanned,
            readings: Vec::new(),
            extraction_failed: true,
        };
    }

    let combined: String = samples.join(" ");
    let words: Vec<&str> = combined.split_whitespace().collect();

    let density = total_chars as f64 / samples.len() as f64;
    let density_fired = density < thresholds.min_chars_per_page;

    // Spacing is per page: one shredded page in an otherwise fine sample is
    // still evidence of a broken layer.
    let mut worst_space_ratio = f64::NAN;
    let mut spacing_fired = false;
    for sample in samples {
        let chars = sample.chars().count();
        if chars < thresholds.spacing_min_page_chars {
            continue;
        }
        let spaces = sample.chars().filter(|c| *c == ' ').count();
        let ratio = spaces as f64 / chars as f64;
        let out_of_band =
            ratio < thresholds.space_ratio_floor || ratio > thresholds.space_ratio_ceiling;
        if out_of_band || worst_space_ratio.is_nan() {
            worst_space_ratio = ratio;
        }
        spacing_fired |= out_of_band;
    }

    let word_count = words.len();
    let word_count_fired = word_count < thresholds.min_word_count;

    // Letters over ALL characters, whitespace included. Counting only
    // non-whitespace inflates the ratio and lets boundary documents slip
    // past the floor.
    let combined_chars = combined.chars().count();
    let alpha: usize = combined.chars().filter(|c| c.is_alphabetic()).count();
    // Guard the denominators: a ratio over zero characters is no evidence.
    let (alpha_ratio, alpha_fired) = if combined_chars == 0 {
        (0.0, false)
    } else {
        let r = alpha as f64 / combined_chars as f64;
        (r, r < thresholds.min_alpha_ratio)
    };

    let (single_char_ratio, single_char_fired) = if words.is_empty() {
        (0.0, false)
    } else {
        let singles = words.iter().filter(|w| w.chars().count() == 1).count();
        let r = singles as f64 / words.len() as f64;
        (r, r > thresholds.max_single_char_ratio)
    };

    let readings = vec![
        SignalReading {
            signal: Signal::Density,
            value: density,
            threshold: thresholds.min_chars_per_page,
            fired: density_fired,
        },
        SignalReading {
            signal: Signal::Spacing,
            value: if worst_space_ratio.is_nan() {
                0.0
            } else {
                worst_space_ratio
            },
            threshold: if !worst_space_ratio.is_nan()
                && worst_space_ratio > thresholds.space_ratio_ceiling
            {
                thresholds.space_ratio_ceiling
            } else {
                thresholds.space_ratio_floor
            },
            fired: spacing_fired,
        },
        SignalReading {
            signal: Signal::WordCount,
            value: word_count as f64,
            threshold: thresholds.min_word_count as f64,
            fired: word_count_fired,
        },
        SignalReading {
            signal: Signal::AlphaRatio,
            value: alpha_ratio,
            threshold: thresholds.min_alpha_ratio,
            fired: alpha_fired,
        },
        SignalReading {
            signal: Signal::SingleCharWords,
            value: single_char_ratio,
            threshold: thresholds.max_single_char_ratio,
            fired: single_char_fired,
        },
    ];

    let verdict = if readings.iter().any(|r| r.fired) {
        ScanVerdict::Scanned
    } else {
        ScanVerdict::Native
    };

    SignalReport {
        verdict,
        readings,
        extraction_failed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ClassifierThresholds {
        ClassifierThresholds::default()
    }

    /// A page of realistic prose comfortably above every threshold.
    fn prose_page() -> String {
        "The committee reviewed the quarterly filings and noted that several \
         departments had exceeded their allocated budgets during the reporting \
         period. Corrective measures were proposed, discussed at length, and \
         adopted with minor amendments after the finance officer presented the \
         reconciled figures for each cost centre in the organisation. "
            .repeat(3)
    }

    #[test]
    fn clean_prose_is_native() {
        let samples = vec![prose_page(), prose_page(), prose_page()];
        let report = classify(&samples, &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Native);
        assert!(report.fired().is_empty());
        assert_eq!(report.readings.len(), 5);
    }

    #[test]
    fn empty_extraction_is_scanned() {
        let report = classify(&[], &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Scanned);
        assert!(report.extraction_failed);

        let report = classify(&[String::new(), String::new()], &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Scanned);
        assert!(report.extraction_failed);
    }

    #[test]
    fn sparse_text_fires_density() {
        let samples = vec!["just a title".to_string(), "page 2".to_string()];
        let report = classify(&samples, &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Scanned);
        assert!(report.fired().contains(&Signal::Density));
    }

    #[test]
    fn shredded_words_fire_single_char_signal() {
        // Letters split apart by broken extraction. Dense enough to clear the
        // density and word-count thresholds on its own.
        let shredded = "T h e q u i c k b r o w n f o x j u m p s ".repeat(60);
        let samples = vec![shredded];
        let report = classify(&samples, &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Scanned);
        assert!(report.fired().contains(&Signal::SingleCharWords));
    }

    #[test]
    fn symbol_soup_fires_alpha_ratio() {
        let soup = "|--|__|==|  0123 4567 89.. ---- ++++ %%%% $$$$ #### ".repeat(40);
        let samples = vec![soup];
        let report = classify(&samples, &thresholds());
        assert_eq!(report.verdict, ScanVerdict::Scanned);
        assert!(report.fired().contains(&Signal::AlphaRatio));
    }

    #[test]
    fn alpha_ratio_counts_whitespace_in_the_denominator() {
        // 3 letters out of 8 characters per unit once the trailing space is
        // counted: 0.375, below the 0.40 floor. Measured over non-whitespace
        // alone the ratio would be 3/7 and the document would pass.
        let sample = "abc1234 ".repeat(200);
        let report = classify(&[sample], &thresholds());
        let alpha = report
            .readings
            .iter()
            .find(|r| r.signal == Signal::AlphaRatio)
            .unwrap();
        assert!((alpha.value - 0.375).abs() < 1e-9);
        assert!(alpha.fired);
        assert_eq!(report.verdict, ScanVerdict::Scanned);
    }

    #[test]
    fn spacing_reading_reports_the_violated_bound() {
        let t = thresholds();

        let spaceless = "lowercaseletterswithoutanyspacingatall".repeat(40);
        let report = classify(&[spaceless], &t);
        let reading = report
            .readings
            .iter()
            .find(|r| r.signal == Signal::Spacing)
            .unwrap();
        assert!(reading.fired);
        assert!(reading.value < t.space_ratio_floor);
        assert!((reading.threshold - t.space_ratio_floor).abs() < f64::EPSILON);

        // 3 spaces per 7 characters: over the ceiling, so the reading must
        // point at the ceiling rather than claim the value sits above the
        // floor it cleared.
        let gappy = "word   ".repeat(100);
        let report = classify(&[gappy], &t);
        let reading = report
            .readings
            .iter()
            .find(|r| r.signal == Signal::Spacing)
            .unwrap();
        assert!(reading.fired);
        assert!(reading.value > t.space_ratio_ceiling);
        assert!((reading.threshold - t.space_ratio_ceiling).abs() < f64::EPSILON);
    }

    #[test]
    fn spaceless_page_fires_spacing() {
        let dense_no_spaces: String = "lowercaseletterswithoutanyspacingatall".repeat(40);
        let report = classify(&[dense_no_spaces], &thresholds());
        assert!(report.fired().contains(&Signal::Spacing));
    }

    #[test]
    fn short_pages_skip_spacing_signal() {
        // Below spacing_min_page_chars the spacing signal must not fire even
        // though the ratio is degenerate.
        let tiny = "abc".to_string();
        let report = classify(&[tiny], &thresholds());
        let spacing = report
            .readings
            .iter()
            .find(|r| r.signal == Signal::Spacing)
            .unwrap();
        assert!(!spacing.fired);
    }

    #[test]
    fn all_signals_evaluated_even_after_one_fires() {
        // Sparse AND symbol-heavy: multiple signals should appear fired.
        let samples = vec!["@#$ %^& *()".to_string()];
        let report = classify(&samples, &thresholds());
        assert_eq!(report.readings.len(), 5);
        assert!(report.fired().len() >= 2);
    }

    /// Lowering a threshold can only move documents toward Native, never
    /// toward Scanned.
    #[test]
    fn relaxing_density_threshold_is_monotonic() {
        let samples = vec!["a modest amount of text on this page here".to_string(); 3];

        let strict = thresholds();
        let mut relaxed = thresholds();
        relaxed.min_chars_per_page = 1.0;
        relaxed.min_word_count = 1;

        let strict_report = classify(&samples, &strict);
        let relaxed_report = classify(&samples, &relaxed);

        assert_eq!(strict_report.verdict, ScanVerdict::Scanned);
        assert_eq!(relaxed_report.verdict, ScanVerdict::Native);
    }
}
