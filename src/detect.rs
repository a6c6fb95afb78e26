//! Archive type detection
//!
//! Pure classification with no side effects: directories are never archives, a
//! recognised extension wins, and only files with a missing or unrecognised extension
//! are sniffed by their leading bytes.

use crate::types::ArchiveKind;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Number of leading bytes read for signature sniffing
pub const SNIFF_LEN: usize = 32;

/// Known signatures, longest first so RAR5 is tried before the shorter RAR4 prefix.
const SIGNATURES: &[(&[u8], ArchiveKind)] = &[
    (b"Rar!\x1a\x07\x01\x00", ArchiveKind::Rar),
    (b"Rar!\x1a\x07\x00", ArchiveKind::Rar),
    (b"7z\xbc\xaf\x27\x1c", ArchiveKind::SevenZip),
    (b"PK\x03\x04", ArchiveKind::Zip),
    (b"PK\x05\x06", ArchiveKind::Zip),
    (b"PK\x07\x08", ArchiveKind::Zip),
];

/// Detect the archive kind of a filesystem entry.
///
/// Returns `None` for directories, unreadable files and anything that is not a
/// supported archive.
pub fn detect_archive_kind(path: &Path) -> Option<ArchiveKind> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            debug!(?path, error = %e, "cannot stat entry for type detection");
            return None;
        }
    };

    if !metadata.is_file() {
        return None;
    }

    if let Some(kind) = kind_from_extension(path) {
        return Some(kind);
    }

    match read_prefix(path) {
        Ok(prefix) => {
            let kind = sniff_signature(&prefix);
            if let Some(kind) = kind {
                debug!(?path, %kind, "archive kind detected by signature");
            }
            kind
        }
        Err(e) => {
            warn!(?path, error = %e, "failed to read file prefix for type detection");
            None
        }
    }
}

/// Detect archive kind by file extension (case-insensitive)
pub fn kind_from_extension(path: &Path) -> Option<ArchiveKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "zip" => Some(ArchiveKind::Zip),
        "rar" => Some(ArchiveKind::Rar),
        "7z" => Some(ArchiveKind::SevenZip),
        _ => None,
    }
}

/// Match a byte prefix against the known archive signatures
pub fn sniff_signature(prefix: &[u8]) -> Option<ArchiveKind> {
    SIGNATURES
        .iter()
        .find(|(signature, _)| prefix.starts_with(signature))
        .map(|(_, kind)| *kind)
}

/// Whether a freshly observed file is worth tracking: supported extension or none at all.
///
/// Files with other extensions (partial downloads, text files) are ignored until they
/// are renamed into place.
pub fn is_candidate_name(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    if hidden {
        return false;
    }

    path.extension().is_none() || kind_from_extension(path).is_some()
}

fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}
