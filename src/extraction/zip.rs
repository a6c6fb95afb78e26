use crate::error::{Error, ExtractionError, Result};
use crate::types::{ArchiveKind, ExtractedItem};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use super::shared::{extract_blocking, is_password_error};
use super::ExtractionBackend;

/// ZIP backend built on the `zip` crate (stored, deflate and ZipCrypto entries)
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBackend;

#[async_trait]
impl ExtractionBackend for ZipBackend {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    fn name(&self) -> &'static str {
        "ZIP"
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

impl ZipBackend {
    fn entry_error(e: ::zip::result::ZipError, archive_path: &Path) -> Error {
        match e {
            ::zip::result::ZipError::UnsupportedArchive(detail) if !is_password_error(detail) => {
                ExtractionError::Unsupported {
                    archive: archive_path.to_path_buf(),
                    reason: detail.to_string(),
                }
                .into()
            }
            e if is_password_error(&e.to_string()) => ExtractionError::WrongPassword {
                archive: archive_path.to_path_buf(),
            }
            .into(),
            e => ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to read ZIP entry: {}", e),
            }
            .into(),
        }
    }

    /// Open a ZIP entry by index, decrypting it when a password was supplied
    fn open_entry<'a>(
        archive: &'a mut ::zip::ZipArchive<std::fs::File>,
        index: usize,
        password: Option<&str>,
        archive_path: &Path,
    ) -> Result<::zip::read::ZipFile<'a>> {
        match password {
            None => archive
                .by_index(index)
                .map_err(|e| Self::entry_error(e, archive_path)),
            Some(password) => archive
                .by_index_decrypt(index, password.as_bytes())
                .map_err(|e| Self::entry_error(e, archive_path))?
                .map_err(|_| {
                    ExtractionError::WrongPassword {
                        archive: archive_path.to_path_buf(),
                    }
                    .into()
                }),
        }
    }

    /// Write one entry below `dest_path`, creating parent directories as needed
    fn write_entry(
        mut file: ::zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<()> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(entry = file.name(), "skipping ZIP entry with unsafe path");
                return Ok(());
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&file_path)?;
            return Ok(());
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = std::fs::File::create(&file_path)?;
        std::io::copy(&mut file, &mut outfile).map_err(|e| -> Error {
            if is_password_error(&e.to_string()) {
                ExtractionError::WrongPassword {
                    archive: archive_path.to_path_buf(),
                }
                .into()
            } else {
                ExtractionError::Failed {
                    archive: archive_path.to_path_buf(),
                    reason: format!("failed to decompress {}: {}", file_path.display(), e),
                }
                .into()
            }
        })?;

        Ok(())
    }

    /// Extract every entry of a ZIP archive into `dest_path`
    pub(crate) fn try_extract(
        archive_path: &Path,
        password: Option<&str>,
        dest_path: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(dest_path)?;

        let file = std::fs::File::open(archive_path)?;
        let mut archive = ::zip::ZipArchive::new(file).map_err(|e| match e {
            ::zip::result::ZipError::UnsupportedArchive(detail) => ExtractionError::Unsupported {
                archive: archive_path.to_path_buf(),
                reason: detail.to_string(),
            },
            e => ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to read ZIP archive: {}", e),
            },
        })?;

        debug!(?archive_path, entries = archive.len(), "opened ZIP archive");

        for i in 0..archive.len() {
            let entry = Self::open_entry(&mut archive, i, password, archive_path)?;
            Self::write_entry(entry, dest_path, archive_path)?;
        }

        Ok(())
    }
}
