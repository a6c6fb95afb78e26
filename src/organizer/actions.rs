//! Filesystem side of the dispositions
//!
//! Every function moves entries out of the scratch directory into the watch root.
//! Scratch space lives inside the root, so each move is a same-device rename.

use crate::error::{FilesystemError, Result};
use crate::password::PasswordParser;
use crate::types::{ExtractedItem, QuarantineReason};
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum number of `_N` suffixes tried before giving up on a destination name
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Find a free path in `dir` for `name`.
///
/// Tries `name` first, then `suffixed(name, 1)`, `suffixed(name, 2)` and so on.
pub(crate) fn unique_path(
    dir: &Path,
    name: &str,
    suffixed: impl Fn(&str, u32) -> String,
) -> Result<PathBuf> {
    let candidate = dir.join(name);
    if !exists(&candidate) {
        return Ok(candidate);
    }

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = dir.join(suffixed(name, i));
        if !exists(&candidate) {
            debug!(wanted = name, chosen = ?candidate, "destination taken, using suffix");
            return Ok(candidate);
        }
    }

    Err(FilesystemError::CollisionExhausted {
        path: dir.join(name),
        attempts: MAX_RENAME_ATTEMPTS,
    }
    .into())
}

/// Plain `_N` suffix appended to a folder name
pub(crate) fn folder_suffix(name: &str, n: u32) -> String {
    format!("{name}_{n}")
}

/// `_N` suffix placed before a file's extension
pub(crate) fn file_suffix(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{name}_{n}"),
    }
}

// symlink_metadata so that dangling links still count as taken
fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Rename `source` to `dest`
pub(crate) fn move_entry(source: &Path, dest: &Path) -> Result<()> {
    std::fs::rename(source, dest).map_err(|e| {
        FilesystemError::MoveFailed {
            source_path: source.to_path_buf(),
            dest_path: dest.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Move every folder into `root` under its own name
pub(crate) fn keep_folders(
    scratch: &Path,
    root: &Path,
    items: &[ExtractedItem],
) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(items.len());
    for item in items {
        let dest = unique_path(root, &item.name, folder_suffix)?;
        move_entry(&scratch.join(&item.name), &dest)?;
        info!(folder = %item.name, dest = ?dest, "kept folder");
        outputs.push(dest);
    }
    Ok(outputs)
}

/// Move a single folder into `root` as `new_name`
pub(crate) fn rename_folder(
    scratch: &Path,
    root: &Path,
    item: &ExtractedItem,
    new_name: &str,
) -> Result<PathBuf> {
    let dest = unique_path(root, new_name, folder_suffix)?;
    move_entry(&scratch.join(&item.name), &dest)?;
    info!(from = %item.name, dest = ?dest, "renamed folder");
    Ok(dest)
}

/// Move nested archives into `root`, forwarding the leftover password chain.
///
/// Collision suffixes are inserted ahead of the marker so the chain stays parseable.
pub(crate) fn forward_archives(
    scratch: &Path,
    root: &Path,
    items: &[ExtractedItem],
    parser: &PasswordParser,
    remaining: &[String],
) -> Result<Vec<PathBuf>> {
    let mut nested = Vec::with_capacity(items.len());
    for item in items {
        let name = parser.append_chain(&item.name, remaining);
        let dest = unique_path(root, &name, |n, i| parser.with_collision_suffix(n, i))?;
        move_entry(&scratch.join(&item.name), &dest)?;
        info!(archive = %item.name, dest = ?dest, "forwarded nested archive");
        nested.push(dest);
    }
    Ok(nested)
}

/// Details recorded in a quarantine manifest
#[derive(Debug, Clone)]
pub(crate) struct Manifest<'a> {
    pub file_name: &'a str,
    pub archive_name: &'a str,
    pub reason: QuarantineReason,
    pub processed_at: DateTime<Local>,
}

impl Manifest<'_> {
    fn render(&self, target_name: &str) -> String {
        format!(
            "archive-organizer processing log\n\
             {rule}\n\
             Processed at: {at}\n\
             Original file: {archive}\n\
             Reason: {reason}\n\
             Target folder: {target}\n\
             \n\
             Note: this folder needs manual review\n",
            rule = "=".repeat(50),
            at = self.processed_at.format("%Y-%m-%d %H:%M:%S"),
            archive = self.archive_name,
            reason = self.reason,
            target = target_name,
        )
    }
}

/// Move everything into a fresh `<date>-<base name>` folder and write the manifest.
///
/// A manifest that cannot be written is logged but does not fail the quarantine; the
/// content has already been moved by then.
pub(crate) fn quarantine(
    scratch: &Path,
    root: &Path,
    items: &[ExtractedItem],
    folder_name: &str,
    manifest: &Manifest<'_>,
) -> Result<PathBuf> {
    let target = unique_path(root, folder_name, folder_suffix)?;
    std::fs::create_dir(&target).map_err(|e| FilesystemError::CreateDirFailed {
        path: target.clone(),
        reason: e.to_string(),
    })?;

    for item in items {
        move_entry(&scratch.join(&item.name), &target.join(&item.name))?;
    }

    let target_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder_name.to_string());

    match write_manifest(&target, manifest, &target_name) {
        Ok(path) => debug!(manifest = ?path, "quarantine manifest written"),
        Err(e) => warn!(error = %e, "quarantine manifest not written"),
    }

    info!(
        target = ?target,
        entries = items.len(),
        reason = %manifest.reason,
        "quarantined archive content"
    );
    Ok(target)
}

/// Write the manifest next to the quarantined entries.
///
/// An extracted entry may already use the manifest's name; it is never overwritten and
/// the manifest takes a suffixed name instead.
fn write_manifest(target: &Path, manifest: &Manifest<'_>, target_name: &str) -> Result<PathBuf> {
    let path = unique_path(target, manifest.file_name, file_suffix)?;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .and_then(|mut file| file.write_all(manifest.render(target_name).as_bytes()))
        .map_err(|e| FilesystemError::ManifestFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(path)
}
