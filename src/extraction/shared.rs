use crate::error::{ExtractionError, Result};
use crate::types::{EntryKind, ExtractedItem};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Shared implementation behind every backend's `extract`.
///
/// Runs `try_extract_fn` on the blocking pool, then lists the top-level entries that
/// ended up in `dest_path`.
pub(crate) async fn extract_blocking(
    format_name: &'static str,
    try_extract_fn: fn(&Path, Option<&str>, &Path) -> Result<()>,
    archive_path: &Path,
    dest_path: &Path,
    password: Option<&str>,
) -> Result<Vec<ExtractedItem>> {
    debug!(
        ?archive_path,
        ?dest_path,
        with_password = password.is_some(),
        "attempting {} extraction",
        format_name
    );

    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();
    let password_owned = password.map(str::to_owned);

    let result = spawn_blocking(move || {
        try_extract_fn(&archive_owned, password_owned.as_deref(), &dest_owned)?;
        list_top_level(&dest_owned)
    })
    .await
    .map_err(|e| ExtractionError::Failed {
        archive: archive_path.to_path_buf(),
        reason: format!("extraction task panicked: {}", e),
    })?;

    match &result {
        Ok(items) => info!(
            ?archive_path,
            entries = items.len(),
            "{} extraction successful",
            format_name
        ),
        Err(e) => warn!(
            ?archive_path,
            error = %e,
            "{} extraction failed",
            format_name
        ),
    }

    result
}

/// List the direct children of `dir` as extracted items, sorted by name.
///
/// Symlinks and other special entries are reported as files.
pub fn list_top_level(dir: &Path) -> Result<Vec<ExtractedItem>> {
    let mut items = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            items.push(ExtractedItem {
                name,
                kind: EntryKind::Directory,
                size: 0,
            });
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            items.push(ExtractedItem {
                name,
                kind: EntryKind::File,
                size,
            });
        }
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Strip anything but normal components from an archive entry name so it cannot
/// escape the destination (e.g. `../../etc/passwd`).
pub(crate) fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let sanitized = Path::new(name)
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Whether a decoder error message points at a password problem
pub(crate) fn is_password_error(error_msg: &str) -> bool {
    let lower = error_msg.to_lowercase();
    lower.contains("password") || lower.contains("encrypted") || lower.contains("erar_bad_password")
}
