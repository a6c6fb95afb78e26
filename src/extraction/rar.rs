use crate::error::{Error, ExtractionError, Result};
use crate::types::{ArchiveKind, ExtractedItem};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::shared::{extract_blocking, is_password_error, sanitize_entry_path};
use super::ExtractionBackend;

/// RAR backend built on `unrar` (RAR4 and RAR5)
#[derive(Debug, Clone, Copy, Default)]
pub struct RarBackend;

#[async_trait]
impl ExtractionBackend for RarBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Rar
    }

    fn name(&self) -> &'static str {
        "RAR"
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

impl RarBackend {
    fn convert_unrar_error(e: unrar::error::UnrarError, archive_path: &Path) -> Error {
        let err_str = e.to_string();
        if is_password_error(&err_str) {
            ExtractionError::WrongPassword {
                archive: archive_path.to_path_buf(),
            }
            .into()
        } else {
            ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: err_str,
            }
            .into()
        }
    }

    /// Walk the archive headers and extract every file entry into `dest_path`
    pub(crate) fn try_extract(
        archive_path: &Path,
        password: Option<&str>,
        dest_path: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(dest_path)?;

        let archive = match password {
            None => unrar::Archive::new(archive_path),
            Some(password) => unrar::Archive::with_password(archive_path, password.as_bytes()),
        };

        let mut at_header = archive
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path))?;

        let mut count = 0usize;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path)),
            };

            let header = at_file.entry();
            let Some(sanitized) = sanitize_entry_path(&header.filename.to_string_lossy()) else {
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
                continue;
            };

            let target = dest_path.join(&sanitized);

            if header.is_directory() {
                // Empty directories only exist as headers; create them so they are listed.
                std::fs::create_dir_all(&target)?;
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                at_header = at_file
                    .extract_to(&target)
                    .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
                count += 1;
            }
        }

        debug!(?archive_path, files = count, "RAR entries written");
        Ok(())
    }
}
