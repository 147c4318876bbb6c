//! Content-addressed document identity.
//!
//! Cache lookups are keyed by what the bytes *are*, not where they live:
//! the same file copied to a new path, or re-downloaded from a URL, hits the
//! same cache entry. Identity is the SHA-256 of the full content plus the
//! byte size; the size is kept alongside the hash as a cheap cross-check and
//! to make key collisions against truncated files impossible in practice.

use crate::config::{LanguageCode, QualityPreset};
use crate::error::EngineError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Content identity of one document: full SHA-256 plus byte size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    /// Lowercase hex SHA-256 of the file content.
    pub sha256: String,
    /// File size in bytes.
    pub size: u64,
}

impl DocumentIdentity {
    /// Hash a file on disk, streaming in chunks so large scans never load
    /// fully into memory.
    pub async fn for_file(path: &Path) -> Result<Self, EngineError> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => EngineError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => EngineError::SourceUnavailable {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| EngineError::SourceUnavailable {
                path: path.to_path_buf(),
                detail: format!("read failed while hashing: {e}"),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        Ok(Self {
            sha256: hex::encode(hasher.finalize()),
            size,
        })
    }

    /// Hash an in-memory buffer (used for downloaded inputs already held in
    /// a temp file, and in tests).
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            sha256: hex::encode(hasher.finalize()),
            size: bytes.len() as u64,
        }
    }

    /// Short hash prefix for log lines and cache file names.
    pub fn short_hash(&self) -> &str {
        &self.sha256[..16.min(self.sha256.len())]
    }
}

/// Full cache key: document identity plus the two recognition parameters
/// that change the output text.
///
/// Preset and language are part of the key because they change what the
/// engines produce; everything else in [`crate::config::EngineConfig`]
/// (worker counts, timeouts) only changes how fast it is produced and is
/// deliberately excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub identity: DocumentIdentity,
    pub preset: QualityPreset,
    pub language: LanguageCode,
}

impl CacheKey {
    pub fn new(identity: DocumentIdentity, preset: QualityPreset, language: LanguageCode) -> Self {
        Self {
            identity,
            preset,
            language,
        }
    }

    /// Stable file stem for the on-disk cache entry.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.identity.short_hash(),
            self.identity.size,
            self.preset.as_str(),
            self.language.as_tesseract()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_hash_matches_buffer_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        let content = b"hello scanned world";
        tokio::fs::write(&path, content).await.unwrap();

        let from_file = DocumentIdentity::for_file(&path).await.unwrap();
        let from_bytes = DocumentIdentity::for_bytes(content);
        assert_eq!(from_file, from_bytes);
        assert_eq!(from_file.size, content.len() as u64);
    }

    #[tokio::test]
    async fn missing_file_maps_to_file_not_found() {
        let err = DocumentIdentity::for_file(Path::new("/nonexistent/doc.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
    }

    #[test]
    fn key_stem_discriminates_preset_and_language() {
        let id = DocumentIdentity::for_bytes(b"same bytes");
        let a = CacheKey::new(id.clone(), QualityPreset::Fast, LanguageCode::English);
        let b = CacheKey::new(id.clone(), QualityPreset::Accurate, LanguageCode::English);
        let c = CacheKey::new(id, QualityPreset::Fast, LanguageCode::German);
        assert_ne!(a.file_stem(), b.file_stem());
        assert_ne!(a.file_stem(), c.file_stem());
        assert!(a.file_stem().ends_with("_fast_eng"));
    }

    #[test]
    fn identical_content_yields_identical_identity() {
        let a = DocumentIdentity::for_bytes(b"abc");
        let b = DocumentIdentity::for_bytes(b"abc");
        assert_eq!(a, b);
        assert_eq!(a.short_hash().len(), 16);
    }
}
