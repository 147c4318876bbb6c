//! Local recognition tier: Tesseract via subprocess.
//!
//! One Tesseract invocation per page, in TSV mode, which yields word-level
//! confidences in the same pass as the text. Text and confidence coming from
//! one pass means the reported confidence always describes the text that was
//! actually returned.
//!
//! Image preprocessing is a pure function of the quality preset. The same
//! page at the same preset is always prepared identically, which is what
//! makes cached results trustworthy.

use crate::config::{LanguageCode, QualityPreset};
use crate::error::EngineError;
use async_trait::async_trait;
use image::DynamicImage;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Text plus confidence from one local recognition pass.
#[derive(Debug, Clone)]
pub struct LocalRecognition {
    pub text: String,
    /// Mean word confidence, normalised to [0, 1].
    pub confidence: f32,
}

/// The local recognition engine seam.
#[async_trait]
pub trait LocalOcrEngine: Send + Sync {
    /// Check that the engine's toolchain is actually present.
    ///
    /// Called lazily, once per run, and only when at least one page needs
    /// recognition; a fully native document never pays for it.
    async fn verify(&self) -> Result<(), EngineError>;

    /// Recognise one prepared page image.
    async fn recognize(
        &self,
        image: &DynamicImage,
        preset: QualityPreset,
        language: LanguageCode,
    ) -> Result<LocalRecognition, EngineError>;
}

/// Tesseract-backed implementation of [`LocalOcrEngine`].
#[derive(Debug, Default, Clone)]
pub struct TesseractEngine;

#[async_trait]
impl LocalOcrEngine for TesseractEngine {
    async fn verify(&self) -> Result<(), EngineError> {
        let output = Command::new("tesseract")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| EngineError::LocalEngineUnavailable {
                detail: format!("tesseract not found in PATH: {e}"),
            })?;
        if !output.success() {
            return Err(EngineError::LocalEngineUnavailable {
                detail: format!("tesseract --version exited with {output}"),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, image), fields(preset = preset.as_str()))]
    async fn recognize(
        &self,
        image: &DynamicImage,
        preset: QualityPreset,
        language: LanguageCode,
    ) -> Result<LocalRecognition, EngineError> {
        let prepared = preprocess_page(image, preset);

        // Tesseract reads from a file; hand it a temp PNG that lives for the
        // duration of the call.
        let dir = tempfile::tempdir()
            .map_err(|e| EngineError::Internal(format!("cannot create OCR scratch dir: {e}")))?;
        let png_path = dir.path().join("page.png");
        {
            let png_path = png_path.clone();
            tokio::task::spawn_blocking(move || prepared.save(&png_path))
                .await
                .map_err(|e| EngineError::Internal(format!("encode task panicked: {e}")))?
                .map_err(|e| EngineError::Internal(format!("cannot write OCR input: {e}")))?;
        }

        let output = Command::new("tesseract")
            .arg(&png_path)
            .arg("stdout")
            .arg("-l")
            .arg(language.as_tesseract())
            .arg("--psm")
            .arg(preset.page_segmentation_mode().to_string())
            .arg("tsv")
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::LocalEngineUnavailable {
                detail: format!("failed to run tesseract: {e}"),
            })?;

        if !output.status.success() {
            return Err(EngineError::Internal(format!(
                "tesseract exited with {}",
                output.status
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let recognition = parse_tsv(&tsv);
        debug!(
            confidence = recognition.confidence,
            chars = recognition.text.len(),
            "local recognition complete"
        );
        Ok(recognition)
    }
}

/// Prepare a page image for recognition according to the preset.
///
/// Grayscale always helps Tesseract; contrast/sharpen and denoise are
/// progressively enabled by the slower presets.
pub fn preprocess_page(image: &DynamicImage, preset: QualityPreset) -> DynamicImage {
    let mut img = image.grayscale();
    if preset.enhance() {
        img = img.adjust_contrast(15.0);
        img = DynamicImage::ImageLuma8(image::imageops::unsharpen(&img.to_luma8(), 1.0, 2));
    }
    if preset.denoise() {
        img = img.blur(0.8);
    }
    img
}

/// Reconstruct text and mean confidence from Tesseract's TSV output.
///
/// TSV rows at level 5 are words; grouping by (block, paragraph, line)
/// rebuilds line structure. Rows with negative confidence are structural
/// markers, not recognised words, and are excluded from both text and the
/// confidence mean.
fn parse_tsv(tsv: &str) -> LocalRecognition {
    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;
    let mut current_words: Vec<String> = Vec::new();
    let mut conf_sum = 0.0f64;
    let mut conf_count = 0usize;

    for (i, row) in tsv.lines().enumerate() {
        if i == 0 {
            // Header row.
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let block: u32 = cols[2].parse().unwrap_or(0);
        let par: u32 = cols[3].parse().unwrap_or(0);
        let line: u32 = cols[4].parse().unwrap_or(0);
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);
        let word = cols[11].trim();

        if conf < 0.0 || word.is_empty() {
            continue;
        }

        let key = (block, par, line);
        if current_key != Some(key) {
            if !current_words.is_empty() {
                lines.push(current_words.join(" "));
                current_words.clear();
            }
            current_key = Some(key);
        }
        current_words.push(word.to_string());
        conf_sum += conf;
        conf_count += 1;
    }
    if !current_words.is_empty() {
        lines.push(current_words.join(" "));
    }

    let confidence = if conf_count == 0 {
        0.0
    } else {
        (conf_sum / conf_count as f64 / 100.0) as f32
    };

    LocalRecognition {
        text: lines.join("\n"),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: u32, par: u32, line: u32, word_num: u32, conf: f64, text: &str) -> String {
        format!("5\t1\t{block}\t{par}\t{line}\t{word_num}\t0\t0\t10\t10\t{conf}\t{text}")
    }

    #[test]
    fn tsv_reconstructs_lines_and_confidence() {
        let tsv = [
            HEADER.to_string(),
            // Structural rows carry conf -1 and must be ignored.
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            word_row(1, 1, 1, 1, 90.0, "Invoice"),
            word_row(1, 1, 1, 2, 80.0, "Number"),
            word_row(1, 1, 2, 1, 70.0, "2024-001"),
        ]
        .join("\n");

        let r = parse_tsv(&tsv);
        assert_eq!(r.text, "Invoice Number\n2024-001");
        assert!((r.confidence - 0.80).abs() < 1e-5);
    }

    #[test]
    fn empty_page_yields_zero_confidence() {
        let r = parse_tsv(HEADER);
        assert_eq!(r.text, "");
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn blank_words_excluded_from_mean() {
        let tsv = [
            HEADER.to_string(),
            word_row(1, 1, 1, 1, 95.0, "hello"),
            word_row(1, 1, 1, 2, 10.0, "  "),
        ]
        .join("\n");
        let r = parse_tsv(&tsv);
        assert_eq!(r.text, "hello");
        assert!((r.confidence - 0.95).abs() < 1e-5);
    }

    #[test]
    fn preprocess_is_deterministic_per_preset() {
        let img = DynamicImage::new_rgb8(16, 16);
        let a = preprocess_page(&img, QualityPreset::Accurate);
        let b = preprocess_page(&img, QualityPreset::Accurate);
        assert_eq!(a.to_luma8().as_raw(), b.to_luma8().as_raw());
    }
}
