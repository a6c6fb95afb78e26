use crate::error::{Error, ExtractionError, Result};
use crate::types::{ArchiveKind, ExtractedItem};
use async_trait::async_trait;
use std::path::Path;

use super::shared::{extract_blocking, is_password_error};
use super::ExtractionBackend;

/// 7z backend built on `sevenz-rust` (LZMA/LZMA2, AES-256 encrypted entries)
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZipBackend;

#[async_trait]
impl ExtractionBackend for SevenZipBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::SevenZip
    }

    fn name(&self) -> &'static str {
        "7z"
    }

    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<ExtractedItem>> {
        extract_blocking(self.name(), Self::try_extract, archive, dest, password).await
    }
}

impl SevenZipBackend {
    pub(crate) fn try_extract(
        archive_path: &Path,
        password: Option<&str>,
        dest_path: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(dest_path)?;

        let result = match password {
            None => sevenz_rust::decompress_file(archive_path, dest_path),
            Some(password) => sevenz_rust::decompress_file_with_password(
                archive_path,
                dest_path,
                sevenz_rust::Password::from(password),
            ),
        };

        match result {
            Ok(()) => validate_extracted_paths(dest_path, archive_path),
            Err(e) if is_password_error(&e.to_string()) => Err(ExtractionError::WrongPassword {
                archive: archive_path.to_path_buf(),
            }
            .into()),
            Err(
                e @ (sevenz_rust::Error::UnsupportedCompressionMethod(_)
                | sevenz_rust::Error::Unsupported(_)
                | sevenz_rust::Error::UnsupportedVersion { .. }
                | sevenz_rust::Error::ExternalUnsupported),
            ) => Err(ExtractionError::Unsupported {
                archive: archive_path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()),
            Err(e) => Err(ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            }
            .into()),
        }
    }
}

/// Reject the extraction if anything resolved outside `dest_path`.
///
/// `sevenz-rust` writes entries itself, so traversal can only be detected afterwards.
pub(crate) fn validate_extracted_paths(dest_path: &Path, archive_path: &Path) -> Result<()> {
    let canonical_dest = dest_path.canonicalize()?;

    fn check_dir(dir: &Path, canonical_dest: &Path, archive_path: &Path) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let canonical = path.canonicalize()?;

            if !canonical.starts_with(canonical_dest) {
                return Err(Error::Extraction(ExtractionError::Failed {
                    archive: archive_path.to_path_buf(),
                    reason: format!(
                        "path traversal detected: {:?} is outside the destination",
                        canonical
                    ),
                }));
            }

            if path.is_dir() {
                check_dir(&path, canonical_dest, archive_path)?;
            }
        }
        Ok(())
    }

    check_dir(dest_path, &canonical_dest, archive_path)
}
