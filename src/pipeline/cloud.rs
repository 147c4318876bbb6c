//! Cloud escalation tier: vision-model transcription over HTTP.
//!
//! The provider seam is deliberately small: encode a page, send it with a
//! transcription prompt, get text back. Escalation policy (when to call,
//! retries, timeouts, fallback) lives in [`crate::pipeline::escalate`], so a
//! provider implementation only has to classify its own failures as
//! transient or permanent.

use crate::config::{LanguageCode, TextType};
use async_trait::async_trait;
use base64::Engine as _;
use image::DynamicImage;
use std::io::Cursor;
use thiserror::Error;

/// A page image encoded for transport.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub base64: String,
    pub mime_type: &'static str,
}

/// Encode a rendered page as base64 PNG.
///
/// PNG over JPEG: recognition accuracy degrades visibly on JPEG text edges,
/// and escalated pages are exactly the hard ones.
pub fn encode_page(image: &DynamicImage) -> Result<EncodedPage, CloudError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| CloudError::Permanent(format!("PNG encode failed: {e}")))?;
    Ok(EncodedPage {
        base64: base64::engine::general_purpose::STANDARD.encode(buf.into_inner()),
        mime_type: "image/png",
    })
}

/// What the provider should expect on the page.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionHint {
    pub language: LanguageCode,
    pub text_type: TextType,
}

/// Build the transcription prompt for a hint.
///
/// Kept in one place so prompt changes never touch retry or transport code.
pub fn transcription_prompt(hint: &RecognitionHint) -> String {
    let base = match hint.text_type {
        TextType::Printed => {
            "Transcribe all printed text in this scanned document page exactly as it appears. \
             Preserve the reading order and line structure. Output only the transcribed text, \
             with no commentary and no markdown fences."
        }
        TextType::Handwriting => {
            "Transcribe all handwritten text in this document page exactly as written. \
             Preserve the reading order. Where a word is genuinely illegible write [illegible]. \
             Output only the transcribed text, with no commentary and no markdown fences."
        }
    };
    format!("{base} The text is in {}.", hint.language.display_name())
}

/// Cloud call failure, classified for retry policy.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// Worth one retry (rate limit, 5xx, connection reset).
    #[error("transient cloud error: {0}")]
    Transient(String),
    /// Retrying cannot help (auth failure, bad request, encode failure).
    #[error("permanent cloud error: {0}")]
    Permanent(String),
}

/// A cloud transcription backend.
///
/// This trait is the system boundary: the crate ships no vendor client.
/// Callers implement it over whatever vision API they use and hand it to
/// [`crate::engine::Engine::builder`]; [`encode_page`] and
/// [`transcription_prompt`] do the format-and-prompt work so an
/// implementation is usually a single HTTP call.
#[async_trait]
pub trait CloudOcrProvider: Send + Sync {
    /// Provider name for logs and warnings.
    fn name(&self) -> &str;

    async fn recognize(
        &self,
        page: &EncodedPage,
        hint: &RecognitionHint,
    ) -> Result<String, CloudError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_page_produces_png_base64() {
        let img = DynamicImage::new_luma8(4, 4);
        let page = encode_page(&img).unwrap();
        assert_eq!(page.mime_type, "image/png");
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&page.base64)
            .unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn prompt_varies_by_text_type_and_language() {
        let printed = transcription_prompt(&RecognitionHint {
            language: LanguageCode::German,
            text_type: TextType::Printed,
        });
        let hand = transcription_prompt(&RecognitionHint {
            language: LanguageCode::German,
            text_type: TextType::Handwriting,
        });
        assert!(printed.contains("printed"));
        assert!(hand.contains("handwritten"));
        assert!(printed.contains("German"));
        assert_ne!(printed, hand);
    }
}
