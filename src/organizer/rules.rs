//! Disposition rules
//!
//! Pure decision over the top-level entries of one extracted archive. Nothing here
//! touches the filesystem; [`super::actions`] carries out whatever [`decide`] returns.

use crate::types::{ArchiveKind, Disposition, ExtractedItem, QuarantineReason};

/// An extracted top-level entry together with its detected archive kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedEntry {
    /// The entry as reported by the extraction backend
    pub item: ExtractedItem,
    /// Archive kind if the entry is itself a supported archive
    pub archive: Option<ArchiveKind>,
}

impl ClassifiedEntry {
    /// Entry that is not an archive
    pub fn plain(item: ExtractedItem) -> Self {
        Self {
            item,
            archive: None,
        }
    }

    /// Entry detected as a nested archive
    pub fn archive(item: ExtractedItem, kind: ArchiveKind) -> Self {
        Self {
            item,
            archive: Some(kind),
        }
    }

    /// Whether the entry is a nested archive
    pub fn is_archive(&self) -> bool {
        self.archive.is_some()
    }
}

/// Pick the disposition for one archive's extracted entries.
///
/// Rules are tried in order and the first match wins:
///
/// 1. every entry is an archive: cascade
/// 2. archives mixed with anything else: quarantine
/// 3. any loose file: quarantine
/// 4. only directories:
///    - all carry `prefix`: keep as is
///    - exactly one directory without `prefix` and `base_name` has it: rename it to
///      `base_name`
///    - anything else: quarantine
///
/// An archive that extracted to nothing is kept as is, which just deletes it.
///
/// Prefix matching is case-sensitive.
pub fn decide(entries: &[ClassifiedEntry], base_name: &str, prefix: &str) -> Disposition {
    if entries.is_empty() {
        return Disposition::KeepAsIs;
    }

    let archives = entries.iter().filter(|e| e.is_archive()).count();

    if archives == entries.len() {
        return Disposition::CascadeArchives;
    }

    if archives > 0 {
        return Disposition::Quarantine {
            reason: QuarantineReason::MixedArchives,
        };
    }

    if entries.iter().any(|e| !e.item.is_dir()) {
        return Disposition::Quarantine {
            reason: QuarantineReason::LooseFiles,
        };
    }

    if entries.iter().all(|e| e.item.name.starts_with(prefix)) {
        return Disposition::KeepAsIs;
    }

    if let [single] = entries
        && !single.item.name.starts_with(prefix)
        && base_name.starts_with(prefix)
    {
        return Disposition::RenameSingleFolder {
            new_name: base_name.to_string(),
        };
    }

    Disposition::Quarantine {
        reason: QuarantineReason::UnrecognizedFolders,
    }
}
