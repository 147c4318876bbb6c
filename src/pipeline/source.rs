//! Page sources: the seam between the engine and document formats.
//!
//! The orchestrator never touches pdfium or image decoding directly; it
//! talks to a [`PageProvider`] obtained from a [`PageSource`]. That keeps
//! the decision logic testable with stub providers and keeps format
//! knowledge (PDF vs flat image, magic-byte dispatch) in one place.
//!
//! pdfium wraps a C++ library with thread-local state, so every pdfium call
//! runs inside `tokio::task::spawn_blocking`. Documents are re-opened per
//! operation rather than held across await points; opening is cheap next to
//! rasterisation and it keeps the provider `Send + Sync` without holding C++
//! handles hostage.

use crate::error::SourceError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest rendered edge in pixels. Page sizes vary wildly, so the cap is on
/// pixels rather than DPI; 2048 px is comfortably above what recognition
/// needs while keeping an A0 poster from allocating gigabytes.
const MAX_RENDER_EDGE: i32 = 2048;

/// Opens documents and hands back per-document page providers.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn PageProvider>, SourceError>;
}

/// Per-document page access: count, rasterised pixels, embedded text.
///
/// Page numbers are 1-based everywhere in this crate.
#[async_trait]
pub trait PageProvider: Send + Sync {
    fn page_count(&self) -> u32;

    /// Whether the underlying document is a PDF (drives pre-screening and
    /// native-text sampling; flat images have neither).
    fn is_pdf(&self) -> bool;

    /// Rasterise one page for recognition.
    async fn render_page(&self, page: u32) -> Result<DynamicImage, SourceError>;

    /// The page's embedded text layer. Flat images return an empty string,
    /// which the classifier reads as "no text layer" and routes to OCR.
    async fn native_text(&self, page: u32) -> Result<String, SourceError>;
}

/// Default source: dispatches on magic bytes between the PDF provider and
/// the single-image provider.
#[derive(Debug, Default, Clone)]
pub struct FilePageSource;

#[async_trait]
impl PageSource for FilePageSource {
    async fn open(&self, path: &Path) -> Result<Box<dyn PageProvider>, SourceError> {
        let mut magic = [0u8; 4];
        {
            use std::io::Read;
            let mut f = std::fs::File::open(path).map_err(|e| SourceError::CannotOpen {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            // Short files simply won't match the PDF magic.
            let _ = f.read(&mut magic).map_err(|e| SourceError::CannotOpen {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        }

        if &magic == b"%PDF" {
            let provider = PdfProvider::open(path).await?;
            Ok(Box::new(provider))
        } else {
            let provider = ImageProvider::open(path).await?;
            Ok(Box::new(provider))
        }
    }
}

// ── PDF provider ─────────────────────────────────────────────────────────

struct PdfProvider {
    path: PathBuf,
    page_count: u32,
}

fn bind_pdfium() -> Result<Pdfium, String> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| format!("pdfium library not available: {e:?}"))
}

impl PdfProvider {
    async fn open(path: &Path) -> Result<Self, SourceError> {
        let path_buf = path.to_path_buf();
        let count = tokio::task::spawn_blocking(move || -> Result<u32, SourceError> {
            let pdfium = bind_pdfium().map_err(|detail| SourceError::CannotOpen {
                path: path_buf.clone(),
                detail,
            })?;
            let document =
                pdfium
                    .load_pdf_from_file(&path_buf, None)
                    .map_err(|e| SourceError::CannotOpen {
                        path: path_buf.clone(),
                        detail: format!("{e:?}"),
                    })?;
            Ok(document.pages().len() as u32)
        })
        .await
        .map_err(|e| SourceError::CannotOpen {
            path: path.to_path_buf(),
            detail: format!("open task panicked: {e}"),
        })??;

        debug!(path = %path.display(), pages = count, "opened PDF");
        Ok(Self {
            path: path.to_path_buf(),
            page_count: count,
        })
    }
}

#[async_trait]
impl PageProvider for PdfProvider {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn is_pdf(&self) -> bool {
        true
    }

    async fn render_page(&self, page: u32) -> Result<DynamicImage, SourceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<DynamicImage, SourceError> {
            let pdfium = bind_pdfium().map_err(|detail| SourceError::CannotOpen {
                path: path.clone(),
                detail,
            })?;
            let document =
                pdfium
                    .load_pdf_from_file(&path, None)
                    .map_err(|e| SourceError::CannotOpen {
                        path: path.clone(),
                        detail: format!("{e:?}"),
                    })?;

            let render_config = PdfRenderConfig::new()
                .set_target_width(MAX_RENDER_EDGE)
                .set_maximum_height(MAX_RENDER_EDGE);

            let pdf_page = document
                .pages()
                .get((page - 1) as u16)
                .map_err(|e| SourceError::RenderFailed {
                    page,
                    detail: format!("{e:?}"),
                })?;
            let bitmap =
                pdf_page
                    .render_with_config(&render_config)
                    .map_err(|e| SourceError::RenderFailed {
                        page,
                        detail: format!("{e:?}"),
                    })?;
            Ok(bitmap.as_image())
        })
        .await
        .map_err(|e| SourceError::RenderFailed {
            page,
            detail: format!("render task panicked: {e}"),
        })?
    }

    async fn native_text(&self, page: u32) -> Result<String, SourceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<String, SourceError> {
            let pdfium = bind_pdfium().map_err(|detail| SourceError::CannotOpen {
                path: path.clone(),
                detail,
            })?;
            let document =
                pdfium
                    .load_pdf_from_file(&path, None)
                    .map_err(|e| SourceError::CannotOpen {
                        path: path.clone(),
                        detail: format!("{e:?}"),
                    })?;
            let pdf_page = document
                .pages()
                .get((page - 1) as u16)
                .map_err(|e| SourceError::TextUnavailable {
                    page,
                    detail: format!("{e:?}"),
                })?;
            let text = pdf_page
                .text()
                .map_err(|e| SourceError::TextUnavailable {
                    page,
                    detail: format!("{e:?}"),
                })?
                .all();
            Ok(text)
        })
        .await
        .map_err(|e| SourceError::TextUnavailable {
            page,
            detail: format!("text task panicked: {e}"),
        })?
    }
}

// ── Flat image provider ──────────────────────────────────────────────────

/// A single raster image treated as a one-page document. It has no text
/// layer by construction, so classification always sends it to OCR.
struct ImageProvider {
    path: PathBuf,
}

impl ImageProvider {
    async fn open(path: &Path) -> Result<Self, SourceError> {
        // Validate decodability up front so a garbage file fails the run as
        // unopenable instead of as a page-level render error later.
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            image::image_dimensions(&path_buf).map_err(|e| SourceError::CannotOpen {
                path: path_buf.clone(),
                detail: e.to_string(),
            })
        })
        .await
        .map_err(|e| SourceError::CannotOpen {
            path: path.to_path_buf(),
            detail: format!("probe task panicked: {e}"),
        })??;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl PageProvider for ImageProvider {
    fn page_count(&self) -> u32 {
        1
    }

    fn is_pdf(&self) -> bool {
        false
    }

    async fn render_page(&self, page: u32) -> Result<DynamicImage, SourceError> {
        if page != 1 {
            return Err(SourceError::RenderFailed {
                page,
                detail: "image documents have exactly one page".into(),
            });
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            image::open(&path).map_err(|e| SourceError::RenderFailed {
                page: 1,
                detail: e.to_string(),
            })
        })
        .await
        .map_err(|e| SourceError::RenderFailed {
            page: 1,
            detail: format!("decode task panicked: {e}"),
        })?
    }

    async fn native_text(&self, _page: u32) -> Result<String, SourceError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_path_is_cannot_open() {
        let source = FilePageSource;
        let err = source
            .open(Path::new("/no/such/file.pdf"))
            .await
            .err()
            .expect("open should fail");
        assert!(matches!(err, SourceError::CannotOpen { .. }));
    }

    #[tokio::test]
    async fn png_dispatches_to_image_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let img = image::DynamicImage::new_luma8(8, 8);
        img.save(&path).unwrap();

        let provider = FilePageSource.open(&path).await.unwrap();
        assert!(!provider.is_pdf());
        assert_eq!(provider.page_count(), 1);
        assert_eq!(provider.native_text(1).await.unwrap(), "");
        assert!(provider.render_page(1).await.is_ok());
        assert!(provider.render_page(2).await.is_err());
    }

    #[tokio::test]
    async fn garbage_file_is_rejected_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        tokio::fs::write(&path, b"not an image at all").await.unwrap();
        let err = FilePageSource.open(&path).await.err().unwrap();
        assert!(matches!(err, SourceError::CannotOpen { .. }));
    }
}
