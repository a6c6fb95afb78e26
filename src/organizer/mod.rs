//! Archive organizer
//!
//! Runs the full per-archive pipeline: type detection, password peeling, extraction
//! into scratch space, rule evaluation and the single resulting filesystem action.
//!
//! Nested archives found by the cascade rule are queued and processed breadth-first
//! within the same [`Organizer::process`] call. Every archive is handled in isolation:
//! a failure is recorded in the [`ProcessReport`] and leaves that archive untouched
//! without stopping the rest of the queue.

mod actions;
pub mod rules;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use rules::{ClassifiedEntry, decide};

use crate::config::OrganizeConfig;
use crate::detect::detect_archive_kind;
use crate::error::{Error, FilesystemError, Result};
use crate::extraction::BackendRegistry;
use crate::password::PasswordParser;
use crate::types::{ArchiveDescriptor, Disposition, Event, ExtractedItem};
use std::collections::VecDeque;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use actions::Manifest;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Name prefix of the per-archive extraction directories inside the watch root
pub(crate) const SCRATCH_PREFIX: &str = ".unpack-";

/// Name prefix of the directories archives are parked in while their content is filed
pub(crate) const HOLDING_PREFIX: &str = ".hold-";

/// Result of successfully organizing one archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Organized {
    /// The disposition that was applied
    pub disposition: Disposition,
    /// Paths created in the watch root (folders, or the quarantine folder)
    pub outputs: Vec<PathBuf>,
    /// Nested archives moved into the watch root by a cascade
    pub nested: Vec<PathBuf>,
}

/// What happened to one archive during a [`Organizer::process`] run
#[derive(Debug)]
pub struct ArchiveOutcome {
    /// Archive path as it was processed
    pub archive: PathBuf,
    /// Cascade depth: 0 for the archive passed in, 1 for archives nested in it, ...
    pub depth: u32,
    /// The applied disposition, or why the archive was left alone
    pub result: Result<Organized>,
}

impl ArchiveOutcome {
    /// Whether the archive was organized and deleted
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything one [`Organizer::process`] call did, in processing order
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// One entry per archive that was attempted
    pub outcomes: Vec<ArchiveOutcome>,
    /// Nested archives left in the watch root because of the cascade depth guard
    pub skipped: Vec<PathBuf>,
}

impl ProcessReport {
    /// True when every attempted archive was organized
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ArchiveOutcome::is_success)
    }

    /// Number of archives that failed
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    fn merge(&mut self, other: ProcessReport) {
        self.outcomes.extend(other.outcomes);
        self.skipped.extend(other.skipped);
    }
}

/// Extracts archives and files their content into the watch root
///
/// # Examples
///
/// ```no_run
/// use archive_organizer::{OrganizeConfig, Organizer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> archive_organizer::Result<()> {
/// let organizer = Organizer::new("/downloads", OrganizeConfig::default())?;
/// let report = organizer
///     .process(Path::new("/downloads/RJ123456 pass-(my password).zip"))
///     .await;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Organizer {
    root: PathBuf,
    config: OrganizeConfig,
    parser: PasswordParser,
    backends: BackendRegistry,
    event_tx: broadcast::Sender<Event>,
}

impl Organizer {
    /// Create an organizer for `root` with the built-in extraction backends
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the password marker cannot be compiled.
    pub fn new(root: impl Into<PathBuf>, config: OrganizeConfig) -> Result<Self> {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_events(root.into(), config, BackendRegistry::with_defaults(), event_tx)
    }

    pub(crate) fn with_events(
        root: PathBuf,
        config: OrganizeConfig,
        backends: BackendRegistry,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        let parser = PasswordParser::new(&config.password_marker)?;
        Ok(Self {
            root,
            config,
            parser,
            backends,
            event_tx,
        })
    }

    /// Replace the extraction backends
    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    /// The watch root that organized content is moved into
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subscribe to organizer events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: Event) {
        // no receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Process `path` and, breadth-first, every archive it cascades into.
    ///
    /// Never fails as a whole; each archive's result is in the report.
    pub async fn process(&self, path: &Path) -> ProcessReport {
        let mut report = ProcessReport::default();
        let mut queue = VecDeque::from([(path.to_path_buf(), 0u32)]);

        while let Some((archive, depth)) = queue.pop_front() {
            let result = self.process_one(&archive).await;

            match &result {
                Ok(organized) => {
                    for nested in &organized.nested {
                        let next_depth = depth + 1;
                        match self.config.max_cascade_depth {
                            Some(max) if next_depth > max => {
                                warn!(
                                    archive = ?nested,
                                    depth = next_depth,
                                    max,
                                    "cascade depth limit reached, leaving nested archive in place"
                                );
                                report.skipped.push(nested.clone());
                            }
                            _ => queue.push_back((nested.clone(), next_depth)),
                        }
                    }
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(archive = ?archive, error = %e, "archive processing failed");
                    } else {
                        error!(archive = ?archive, error = %e, "archive processing failed");
                    }
                    self.emit(Event::Failed {
                        archive: archive.clone(),
                        code: e.code().to_string(),
                        message: e.to_string(),
                    });
                }
            }

            report.outcomes.push(ArchiveOutcome {
                archive,
                depth,
                result,
            });
        }

        report
    }

    /// Process every archive currently sitting directly in the watch root.
    ///
    /// Directories and non-archives are ignored, so an already organized tree is left
    /// exactly as it is.
    pub async fn process_root(&self) -> Result<ProcessReport> {
        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if !hidden && detect_archive_kind(&path).is_some() {
                candidates.push(path);
            }
        }
        candidates.sort();

        let mut report = ProcessReport::default();
        for path in candidates {
            // may already have been consumed as a cascade target of an earlier archive
            if std::fs::symlink_metadata(&path).is_err() {
                continue;
            }
            report.merge(self.process(&path).await);
        }
        Ok(report)
    }

    /// Run the pipeline for exactly one archive without following cascades.
    ///
    /// On success the archive has been deleted and the applied disposition is
    /// returned; nested archives are left in the watch root for the caller. On failure
    /// the archive is left where it was.
    pub async fn process_one(&self, path: &Path) -> Result<Organized> {
        if std::fs::symlink_metadata(path).is_err() {
            return Err(Error::AlreadyProcessed {
                path: path.to_path_buf(),
            });
        }

        let kind = detect_archive_kind(path).ok_or_else(|| Error::NotAnArchive {
            path: path.to_path_buf(),
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FilesystemError::InvalidPath {
                path: path.to_path_buf(),
                reason: "no file name".to_string(),
            })?;

        let peeled = self.parser.peel(&file_name);
        let descriptor = ArchiveDescriptor {
            path: path.to_path_buf(),
            kind,
            password: peeled.password,
            remaining: peeled.remaining,
            cleaned_name: peeled.cleaned,
        };

        info!(
            archive = ?path,
            %kind,
            with_password = descriptor.password.is_some(),
            remaining_layers = descriptor.remaining.len(),
            "processing archive"
        );

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| FilesystemError::CreateDirFailed {
                path: self.root.clone(),
                reason: format!("scratch directory: {}", e),
            })?;

        let items = self.backends.extract(&descriptor, scratch.path()).await?;
        self.emit(Event::Extracted {
            archive: path.to_path_buf(),
            kind,
            entries: items.len(),
        });

        let entries = classify(scratch.path(), items);
        let base_name = descriptor.base_name();
        let disposition = decide(&entries, &base_name, &self.config.product_prefix);
        debug!(archive = ?path, disposition = disposition.label(), "rule matched");

        // The archive's own name must be free for its content (`RJ1.zip` holding
        // `RJ1.zip`, or `RJ77` holding `RJ77/`), so park it until the disposition lands.
        let holding = tempfile::Builder::new()
            .prefix(HOLDING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| FilesystemError::CreateDirFailed {
                path: self.root.clone(),
                reason: format!("holding directory: {}", e),
            })?;
        let held = holding.path().join(&file_name);
        actions::move_entry(path, &held)?;

        let organized = match self.apply(&descriptor, scratch.path(), &entries, disposition) {
            Ok(organized) => organized,
            Err(e) => {
                self.restore(holding, &held, path, &file_name);
                return Err(e);
            }
        };

        holding.close().map_err(|e| FilesystemError::RemoveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!(
            archive = ?path,
            disposition = organized.disposition.label(),
            outputs = organized.outputs.len(),
            nested = organized.nested.len(),
            "archive organized and removed"
        );

        if !organized.nested.is_empty() {
            self.emit(Event::Cascaded {
                archive: path.to_path_buf(),
                nested: organized.nested.clone(),
            });
        }
        self.emit(Event::Organized {
            archive: path.to_path_buf(),
            disposition: organized.disposition.clone(),
            outputs: organized.outputs.clone(),
        });

        Ok(organized)
    }

    /// Put a parked archive back after a failed disposition.
    ///
    /// If a partial output now occupies the original name the archive goes next to it
    /// with a collision suffix; if even that fails the holding directory is kept so the
    /// archive is never lost.
    fn restore(&self, holding: TempDir, held: &Path, original: &Path, file_name: &str) {
        let target = if std::fs::symlink_metadata(original).is_err() {
            Ok(original.to_path_buf())
        } else {
            actions::unique_path(&self.root, file_name, |n, i| {
                self.parser.with_collision_suffix(n, i)
            })
        };

        match target.and_then(|target| actions::move_entry(held, &target).map(|()| target)) {
            Ok(target) => {
                if target.as_path() != original {
                    warn!(archive = ?original, restored = ?target, "archive restored under a new name");
                }
            }
            Err(e) => {
                let kept = holding.keep();
                error!(
                    archive = ?original,
                    kept = ?kept,
                    error = %e,
                    "could not restore archive, leaving it in the holding directory"
                );
            }
        }
    }

    fn apply(
        &self,
        descriptor: &ArchiveDescriptor,
        scratch: &Path,
        entries: &[ClassifiedEntry],
        disposition: Disposition,
    ) -> Result<Organized> {
        let items: Vec<ExtractedItem> = entries.iter().map(|e| e.item.clone()).collect();
        let mut outputs = Vec::new();
        let mut nested = Vec::new();

        match &disposition {
            Disposition::KeepAsIs => {
                outputs = actions::keep_folders(scratch, &self.root, &items)?;
            }
            Disposition::RenameSingleFolder { new_name } => {
                if let [item] = items.as_slice() {
                    outputs.push(actions::rename_folder(scratch, &self.root, item, new_name)?);
                }
            }
            Disposition::CascadeArchives => {
                nested = actions::forward_archives(
                    scratch,
                    &self.root,
                    &items,
                    &self.parser,
                    &descriptor.remaining,
                )?;
            }
            Disposition::Quarantine { reason } => {
                let date = chrono::Local::now();
                let mut folder_name = String::new();
                write!(
                    folder_name,
                    "{}-{}",
                    date.format(&self.config.quarantine_date_format),
                    descriptor.base_name()
                )
                .map_err(|_| Error::Config {
                    message: format!(
                        "invalid quarantine date format {:?}",
                        self.config.quarantine_date_format
                    ),
                    key: Some("quarantine_date_format".to_string()),
                })?;
                let archive_name = descriptor
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let manifest = Manifest {
                    file_name: &self.config.manifest_name,
                    archive_name: &archive_name,
                    reason: *reason,
                    processed_at: date,
                };
                outputs.push(actions::quarantine(
                    scratch,
                    &self.root,
                    &items,
                    &folder_name,
                    &manifest,
                )?);
            }
        }

        Ok(Organized {
            disposition,
            outputs,
            nested,
        })
    }
}

/// Tag every extracted entry with its archive kind, if it is one
fn classify(scratch: &Path, items: Vec<ExtractedItem>) -> Vec<ClassifiedEntry> {
    items
        .into_iter()
        .map(|item| {
            let kind = if item.is_dir() {
                None
            } else {
                detect_archive_kind(&scratch.join(&item.name))
            };
            ClassifiedEntry {
                item,
                archive: kind,
            }
        })
        .collect()
}
