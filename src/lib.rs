//! # archive-organizer
//!
//! Watches a download folder, waits until new archives have finished being written,
//! unpacks them and files their content back into the same folder by product-code
//! naming rules.
//!
//! ## Pipeline
//!
//! - **Readiness**: every candidate is re-stat'ed on a timer until its size and mtime
//!   stop changing ([`readiness`])
//! - **Detection**: extension first, then byte signatures ([`detect`])
//! - **Passwords**: an ordered chain is read from the file name, one layer per archive
//!   (`RJ123456 pass-(outer pw) inner.zip`) ([`password`])
//! - **Extraction**: one backend per archive kind behind a trait ([`extraction`])
//! - **Organizing**: exactly one disposition per archive: keep, rename, cascade into
//!   nested archives, or quarantine with a manifest ([`organizer`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use archive_organizer::{ArchiveWatcher, Config, run_until_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::for_root("/downloads");
//!     config.apply_env()?;
//!
//!     let mut watcher = ArchiveWatcher::new(config)?;
//!
//!     let mut events = watcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     watcher.start()?;
//!     run_until_signal(&mut watcher).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Archive type detection
pub mod detect;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Extraction, rule evaluation and filing
pub mod organizer;
/// Password chains embedded in file names
pub mod password;
/// Per-file readiness tracking
pub mod readiness;
/// Core types and events
pub mod types;
/// Folder watching
pub mod watcher;

// Re-export commonly used types
pub use config::{Config, OrganizeConfig, ReadinessConfig, WatchConfig};
pub use error::{Error, ExtractionError, FilesystemError, Result};
pub use extraction::{BackendRegistry, ExtractionBackend};
pub use organizer::{ArchiveOutcome, Organized, Organizer, ProcessReport};
pub use password::{PasswordParser, PeeledName};
pub use readiness::ReadinessTracker;
pub use types::{
    ArchiveDescriptor, ArchiveKind, Disposition, EntryKind, Event, ExtractedItem,
    PromotionReason, QuarantineReason,
};
pub use watcher::ArchiveWatcher;

/// Run a started watcher until a termination signal arrives, then stop it.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The in-flight tick is allowed to finish before this returns.
pub async fn run_until_signal(watcher: &mut ArchiveWatcher) {
    wait_for_signal().await;
    watcher.stop().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (sigterm, sigint) => {
            tracing::warn!(
                sigterm_ok = sigterm.is_ok(),
                sigint_ok = sigint.is_ok(),
                "Could not register signal handlers, using ctrl_c fallback"
            );
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
