//! Core types and events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Archive kind detected by extension or signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// ZIP archive (.zip)
    Zip,
    /// RAR archive (.rar)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
}

impl ArchiveKind {
    /// All supported kinds, in registration order
    pub const ALL: [ArchiveKind; 3] = [ArchiveKind::Zip, ArchiveKind::Rar, ArchiveKind::SevenZip];

    /// Canonical file extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
            ArchiveKind::SevenZip => "7z",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Whether an extracted entry is a file or a directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or anything that is not a directory)
    File,
    /// Directory
    Directory,
}

/// One top-level entry produced by an extraction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    /// Entry name relative to the extraction directory
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

impl ExtractedItem {
    /// Convenience constructor for a directory entry
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    /// Convenience constructor for a file entry
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
        }
    }

    /// Whether this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Everything known about one archive for a single processing attempt.
///
/// Derived fresh each time an archive is processed; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// Path of the archive on disk (its name is never changed)
    pub path: PathBuf,
    /// Detected archive kind
    pub kind: ArchiveKind,
    /// Password to use for this layer, if the name carried one
    pub password: Option<String>,
    /// Passwords left over for nested layers, in order
    pub remaining: Vec<String>,
    /// File name with the first password layer peeled off
    pub cleaned_name: String,
}

impl ArchiveDescriptor {
    /// Base name used for rename and quarantine targets: the cleaned name without its
    /// extension.
    pub fn base_name(&self) -> String {
        let (stem, _) = crate::password::split_extension(&self.cleaned_name);
        if stem.is_empty() {
            self.cleaned_name.clone()
        } else {
            stem.to_string()
        }
    }
}

/// Why a quarantine disposition was chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    /// Nested archives mixed with other content at top level
    MixedArchives,
    /// Loose files at top level
    LooseFiles,
    /// Folders that do not follow the product-code naming
    UnrecognizedFolders,
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            QuarantineReason::MixedArchives => {
                "nested archives mixed with other content; needs manual processing"
            }
            QuarantineReason::LooseFiles => "loose files at top level; needs manual processing",
            QuarantineReason::UnrecognizedFolders => {
                "folders do not follow product-code naming; needs manual processing"
            }
        };
        f.write_str(text)
    }
}

/// The single side-effecting action chosen for one archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Disposition {
    /// Move every top-level folder unchanged into the watch root
    KeepAsIs,
    /// Move the single folder into the watch root under the archive's base name
    RenameSingleFolder {
        /// The new folder name
        new_name: String,
    },
    /// Move nested archives into the watch root and process them in turn
    CascadeArchives,
    /// Move everything into a dated folder with a manifest
    Quarantine {
        /// Why the content could not be filed automatically
        reason: QuarantineReason,
    },
}

impl Disposition {
    /// Short label used in logs and events
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::KeepAsIs => "keep_as_is",
            Disposition::RenameSingleFolder { .. } => "rename_single_folder",
            Disposition::CascadeArchives => "cascade_archives",
            Disposition::Quarantine { .. } => "quarantine",
        }
    }
}

/// Why a pending file was handed to the organizer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionReason {
    /// Size and mtime stayed unchanged for the required number of ticks
    Stable {
        /// Consecutive stable ticks observed
        stable_ticks: u32,
    },
    /// The maximum wait elapsed; promoted regardless of stability
    Forced {
        /// Seconds since the file was first seen
        waited_secs: u64,
    },
}

/// Event emitted while watching and organizing
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new candidate file entered the readiness tracker
    Observed {
        /// Candidate path
        path: PathBuf,
    },

    /// A candidate disappeared before it became ready
    Abandoned {
        /// Candidate path
        path: PathBuf,
    },

    /// A candidate became ready and is about to be processed
    Promoted {
        /// Candidate path
        path: PathBuf,
        /// Why it was promoted
        reason: PromotionReason,
    },

    /// An archive was fully extracted into scratch space
    Extracted {
        /// Archive path
        archive: PathBuf,
        /// Detected kind
        kind: ArchiveKind,
        /// Number of top-level entries
        entries: usize,
    },

    /// A disposition was applied and the archive deleted
    Organized {
        /// Archive path
        archive: PathBuf,
        /// The applied disposition
        disposition: Disposition,
        /// Paths created in the watch root
        outputs: Vec<PathBuf>,
    },

    /// Nested archives were forwarded for processing
    Cascaded {
        /// Outer archive path
        archive: PathBuf,
        /// Nested archives now sitting in the watch root
        nested: Vec<PathBuf>,
    },

    /// Processing failed; the archive was left untouched
    Failed {
        /// Archive path
        archive: PathBuf,
        /// Machine-readable error code
        code: String,
        /// Human-readable error message
        message: String,
    },

    /// Watcher stopped
    Shutdown,
}
