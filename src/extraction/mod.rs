//! Archive extraction backends
//!
//! Decompression is delegated to one backend per archive kind behind the
//! [`ExtractionBackend`] trait. The [`BackendRegistry`] maps each [`ArchiveKind`] to its
//! backend and is the single registration point for additional formats.
//!
//! Every backend extracts into a destination directory and reports the top-level
//! entries it produced; the organizer never looks deeper than that.

mod rar;
mod sevenz;
mod shared;
mod zip;


pub use rar::RarBackend;
pub use sevenz::SevenZipBackend;
pub use shared::list_top_level;
pub use zip::ZipBackend;

use crate::error::{ExtractionError, Result};
use crate::types::{ArchiveDescriptor, ArchiveKind, ExtractedItem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Decompressor for one archive kind
///
/// Implementations run the blocking decoder off the async runtime and return the
/// top-level entries found in `dest` afterwards.
///
/// # Examples
///
/// ```no_run
/// use archive_organizer::extraction::{ExtractionBackend, ZipBackend};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> archive_organizer::Result<()> {
/// let items = ZipBackend
///     .extract(Path::new("RJ123456.zip"), Path::new("/tmp/unpack"), Some("secret"))
///     .await?;
/// for item in items {
///     println!("{} ({:?})", item.name, item.kind);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Archive kind handled by this backend
    fn kind(&self) -> ArchiveKind;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Extract `archive` into `dest`, optionally with a password.
    ///
    /// `Some("")` is a real (empty) password and is tried as such; `None` opens the
    /// archive without one.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::WrongPassword`] for a missing or wrong password,
    /// [`ExtractionError::Failed`] for corrupt input and I/O errors for write failures.
    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        password: Option<&str>,
    ) -> Result<Vec<ExtractedItem>>;
}

/// Maps archive kinds to their extraction backends
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<ArchiveKind, Arc<dyn ExtractionBackend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.backends.values().map(|b| b.name()).collect();
        names.sort_unstable();
        f.debug_struct("BackendRegistry")
            .field("backends", &names)
            .finish()
    }
}

impl BackendRegistry {
    /// Registry with no backends at all
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with the built-in ZIP, RAR and 7z backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ZipBackend));
        registry.register(Arc::new(RarBackend));
        registry.register(Arc::new(SevenZipBackend));
        registry
    }

    /// Register a backend for its kind, returning the backend it replaced
    pub fn register(
        &mut self,
        backend: Arc<dyn ExtractionBackend>,
    ) -> Option<Arc<dyn ExtractionBackend>> {
        self.backends.insert(backend.kind(), backend)
    }

    /// Backend registered for `kind`
    pub fn get(&self, kind: ArchiveKind) -> Option<&Arc<dyn ExtractionBackend>> {
        self.backends.get(&kind)
    }

    /// Extract the archive described by `descriptor` into `dest`
    pub async fn extract(
        &self,
        descriptor: &ArchiveDescriptor,
        dest: &Path,
    ) -> Result<Vec<ExtractedItem>> {
        let backend = self
            .get(descriptor.kind)
            .ok_or_else(|| ExtractionError::NoBackend {
                kind: descriptor.kind.to_string(),
            })?;

        info!(
            archive = ?descriptor.path,
            backend = backend.name(),
            with_password = descriptor.password.is_some(),
            "dispatching extraction"
        );

        backend
            .extract(&descriptor.path, dest, descriptor.password.as_deref())
            .await
    }
}
