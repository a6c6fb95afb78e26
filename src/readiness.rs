//! Readiness tracking for files that are still being written
//!
//! Every observed candidate goes through a small per-path state machine:
//!
//! ```text
//! Observed ──► Stabilizing ──► Ready
//!     │             │
//!     └─────────────┴──► Abandoned (file disappeared)
//! ```
//!
//! On each tick the file is re-stat'ed. Any size or mtime change resets the stable
//! count; an unchanged file that is older than the grace delay earns one stable tick.
//! A file is promoted once it has enough stable ticks, or unconditionally once it has
//! been pending longer than the maximum wait, so a file whose size keeps fluctuating
//! cannot starve forever.

use crate::config::ReadinessConfig;
use crate::types::PromotionReason;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

/// Where a pending file currently sits in the readiness state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessState {
    /// Seen but not yet re-checked
    Observed,
    /// Re-checked at least once, waiting for enough stable ticks
    Stabilizing,
}

/// Bookkeeping for one candidate file
#[derive(Clone, Debug)]
pub struct PendingFile {
    /// Candidate path
    pub path: PathBuf,
    /// Size at the previous poll
    pub last_size: u64,
    /// Modification time at the previous poll
    pub last_mtime: Option<SystemTime>,
    /// When the file was first observed
    pub first_seen: Instant,
    /// When the file was last re-checked
    pub last_check: Instant,
    /// Consecutive polls without a size or mtime change
    pub stable_count: u32,
    /// Current state
    pub state: ReadinessState,
}

/// A file that left the tracker because it is ready for processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    /// Path to process
    pub path: PathBuf,
    /// Why the file was promoted
    pub reason: PromotionReason,
}

/// Outcome of one tick over all pending files
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Files that became ready, in path order
    pub ready: Vec<Promotion>,
    /// Files that disappeared and were dropped
    pub abandoned: Vec<PathBuf>,
}

/// Per-path debounce state machine deciding when a file is safe to process
#[derive(Debug)]
pub struct ReadinessTracker {
    config: ReadinessConfig,
    pending: HashMap<PathBuf, PendingFile>,
}

impl ReadinessTracker {
    /// Create an empty tracker
    pub fn new(config: ReadinessConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
        }
    }

    /// Start tracking `path`, first seen at `now`.
    ///
    /// Returns `false` if the path was already tracked; its state is left alone since
    /// the next tick will notice any change anyway.
    pub fn observe(&mut self, path: &Path, now: Instant) -> bool {
        if self.pending.contains_key(path) {
            return false;
        }

        let (size, mtime) = match std::fs::metadata(path) {
            Ok(m) => (m.len(), m.modified().ok()),
            Err(_) => (0, None),
        };

        info!(
            ?path,
            size_mb = %format!("{:.2}", size as f64 / 1024.0 / 1024.0),
            "file added to pending queue"
        );

        self.pending.insert(
            path.to_path_buf(),
            PendingFile {
                path: path.to_path_buf(),
                last_size: size,
                last_mtime: mtime,
                first_seen: now,
                last_check: now,
                stable_count: 0,
                state: ReadinessState::Observed,
            },
        );
        true
    }

    /// Stop tracking `path` without processing it
    pub fn forget(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Re-check every pending file and promote the ones that are ready.
    ///
    /// Stat failures other than "not found" are logged and leave the entry untouched
    /// for this tick.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let mut paths: Vec<PathBuf> = self.pending.keys().cloned().collect();
        paths.sort();

        for path in paths {
            let metadata = match std::fs::metadata(&path) {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(?path, "pending file was removed before processing");
                    self.pending.remove(&path);
                    report.abandoned.push(path);
                    continue;
                }
                Err(e) => {
                    warn!(?path, error = %e, "cannot stat pending file, skipping this tick");
                    continue;
                }
            };

            let Some(entry) = self.pending.get_mut(&path) else {
                continue;
            };
            let promotion = Self::advance(
                &self.config,
                entry,
                metadata.len(),
                metadata.modified().ok(),
                now,
            );

            if let Some(reason) = promotion {
                info!(?path, ?reason, "file ready for processing");
                self.pending.remove(&path);
                report.ready.push(Promotion { path, reason });
            }
        }

        report
    }

    fn advance(
        config: &ReadinessConfig,
        entry: &mut PendingFile,
        size: u64,
        mtime: Option<SystemTime>,
        now: Instant,
    ) -> Option<PromotionReason> {
        let changed = size != entry.last_size || mtime != entry.last_mtime;
        let age = now.saturating_duration_since(entry.first_seen);

        entry.last_size = size;
        entry.last_mtime = mtime;
        entry.last_check = now;
        entry.state = ReadinessState::Stabilizing;

        if changed {
            entry.stable_count = 0;
            debug!(path = ?entry.path, size, "file changed, stable count reset");
        } else if age >= config.min_grace_delay {
            entry.stable_count += 1;
            debug!(path = ?entry.path, stable_count = entry.stable_count, "file unchanged");
        } else {
            // too new to judge
            entry.stable_count = 0;
        }

        if entry.stable_count >= config.stability_threshold {
            Some(PromotionReason::Stable {
                stable_ticks: entry.stable_count,
            })
        } else if age > config.max_wait {
            Some(PromotionReason::Forced {
                waited_secs: age.as_secs(),
            })
        } else {
            debug!(
                path = ?entry.path,
                waited_secs = age.as_secs(),
                stable_count = entry.stable_count,
                threshold = config.stability_threshold,
                "file still pending"
            );
            None
        }
    }

    /// Number of pending files
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `path` is being tracked
    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    /// Current bookkeeping for `path`
    pub fn get(&self, path: &Path) -> Option<&PendingFile> {
        self.pending.get(path)
    }
}
