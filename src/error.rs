//! Error types for archive-organizer
//!
//! Every failure that can happen while organizing a single archive maps onto one of
//! four families:
//! - [`Error::NotAnArchive`] when type detection finds nothing supported
//! - [`Error::Extraction`] for wrong passwords, corruption and unsupported features
//! - [`Error::Filesystem`] for rename/move/mkdir failures
//! - [`Error::AlreadyProcessed`] when the archive vanished before it could be handled
//!
//! The organizer catches all of them at the per-archive boundary, so none of them ever
//! stops the watch loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archive-organizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive-organizer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "poll_interval")
        key: Option<String>,
    },

    /// Type detection found no supported archive format
    #[error("not a supported archive: {path}")]
    NotAnArchive {
        /// The file that was inspected
        path: PathBuf,
    },

    /// Decompression failed (bad password, corruption, unsupported feature)
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Rename, move, mkdir or delete failed while organizing extracted content
    #[error("filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// The archive disappeared between detection and processing
    #[error("archive already processed or removed: {path}")]
    AlreadyProcessed {
        /// The archive path that no longer exists
        path: PathBuf,
    },

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Archive decompression errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Wrong (or missing) password for an encrypted archive
    #[error("wrong password for encrypted archive {archive}")]
    WrongPassword {
        /// The encrypted archive that could not be opened
        archive: PathBuf,
    },

    /// Archive is corrupt or could not be read
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// Archive uses a feature the backend cannot decode
    #[error("unsupported archive feature in {archive}: {reason}")]
    Unsupported {
        /// The archive using the unsupported feature
        archive: PathBuf,
        /// Which feature is unsupported
        reason: String,
    },

    /// No backend is registered for the detected archive kind
    #[error("no extraction backend registered for {kind} archives")]
    NoBackend {
        /// Display name of the archive kind
        kind: String,
    },
}

/// Filesystem mutation errors raised while applying a disposition
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// File or directory move/rename failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the entry being moved
        source_path: PathBuf,
        /// The destination path where the entry should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Directory creation failed
    #[error("failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// The directory that could not be created
        path: PathBuf,
        /// The reason creation failed
        reason: String,
    },

    /// Removing the processed archive failed
    #[error("failed to remove {path}: {reason}")]
    RemoveFailed {
        /// The path that could not be removed
        path: PathBuf,
        /// The reason removal failed
        reason: String,
    },

    /// Writing the quarantine manifest failed
    #[error("failed to write manifest {path}: {reason}")]
    ManifestFailed {
        /// The manifest path
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Every numeric suffix for a destination name was already taken
    #[error("no free name for {path} after {attempts} attempts")]
    CollisionExhausted {
        /// The desired destination path
        path: PathBuf,
        /// How many suffixed names were tried
        attempts: u32,
    },

    /// A path had no usable file name or parent
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

impl Error {
    /// Whether retrying the same archive later could plausibly succeed.
    ///
    /// Transient filesystem trouble (locks, permissions being fixed, a full disk) is
    /// retryable; a wrong password or a file that is not an archive is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Filesystem(_) | Error::Io(_) => true,
            Error::Extraction(ExtractionError::Failed { .. }) => true,
            Error::Extraction(_)
            | Error::NotAnArchive { .. }
            | Error::AlreadyProcessed { .. }
            | Error::Config { .. }
            | Error::FolderWatch(_)
            | Error::Serialization(_) => false,
        }
    }

    /// Short machine-readable code for events and logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::NotAnArchive { .. } => "not_an_archive",
            Error::Extraction(ExtractionError::WrongPassword { .. }) => "wrong_password",
            Error::Extraction(ExtractionError::Unsupported { .. }) => "unsupported_archive",
            Error::Extraction(_) => "extraction_failed",
            Error::Filesystem(_) => "filesystem",
            Error::AlreadyProcessed { .. } => "already_processed",
            Error::FolderWatch(_) => "folder_watch",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}
