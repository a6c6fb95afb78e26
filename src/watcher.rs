//! Watch-folder orchestration
//!
//! Ties the pieces together for one watch root:
//! - `notify` delivers change events for direct children of the root (non-recursive)
//! - events only enqueue candidates into the [`ReadinessTracker`]; they never trigger
//!   extraction directly
//! - a periodic tick re-stats candidates and hands promoted ones to the [`Organizer`],
//!   one archive at a time
//!
//! The tracker is owned by the single loop task, so notifications and ticks never
//! touch it concurrently.
//!
//! # Example
//!
//! ```no_run
//! use archive_organizer::{ArchiveWatcher, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> archive_organizer::Result<()> {
//! let mut watcher = ArchiveWatcher::new(Config::for_root("/downloads"))?;
//! let mut events = watcher.subscribe();
//! watcher.start()?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::detect::is_candidate_name;
use crate::error::{Error, Result};
use crate::extraction::BackendRegistry;
use crate::organizer::{HOLDING_PREFIX, Organizer, ProcessReport, SCRATCH_PREFIX};
use crate::readiness::ReadinessTracker;
use crate::types::Event;
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Watches one directory and organizes archives once they stop changing
pub struct ArchiveWatcher {
    config: Config,
    organizer: Arc<Organizer>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    /// Filesystem watcher; dropping it stops notifications
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl ArchiveWatcher {
    /// Create a watcher for `config.watch.root` with the built-in backends
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_backends(config, BackendRegistry::with_defaults())
    }

    /// Create a watcher with a custom set of extraction backends
    pub fn with_backends(config: Config, backends: BackendRegistry) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let organizer = Organizer::with_events(
            config.watch.root.clone(),
            config.organize.clone(),
            backends,
            event_tx.clone(),
        )?;

        Ok(Self {
            config,
            organizer: Arc::new(organizer),
            event_tx,
            cancel: CancellationToken::new(),
            watcher: None,
            task: None,
        })
    }

    /// The watched directory
    pub fn root(&self) -> &Path {
        &self.config.watch.root
    }

    /// Subscribe to watcher and organizer events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether the loop task is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start watching the root directory
    ///
    /// Creates the directory if needed, registers a non-recursive watch and spawns the
    /// tick loop.
    ///
    /// # Errors
    /// Returns [`Error::FolderWatch`] if the directory cannot be created or watched, or
    /// if the watcher is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::FolderWatch("watcher already started".to_string()));
        }

        let root = self.config.watch.root.clone();
        if !root.exists() {
            std::fs::create_dir_all(&root)
                .map_err(|e| Error::FolderWatch(format!("failed to create watch root: {}", e)))?;
            info!(root = %root.display(), "created watch root");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("failed to forward filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| Error::FolderWatch(format!("failed to watch folder: {}", e)))?;

        let mut tracker = ReadinessTracker::new(self.config.readiness.clone());
        if self.config.watch.scan_existing_on_start {
            for path in existing_candidates(&root)? {
                if tracker.observe(&path, Instant::now()) {
                    let _ = self.event_tx.send(Event::Observed { path });
                }
            }
        }

        let task = LoopTask {
            rx,
            tracker,
            organizer: Arc::clone(&self.organizer),
            event_tx: self.event_tx.clone(),
            cancel: self.cancel.clone(),
            poll_interval: self.config.readiness.poll_interval,
        };

        self.watcher = Some(watcher);
        self.task = Some(tokio::spawn(task.run()));

        info!(
            root = %root.display(),
            poll_secs = self.config.readiness.poll_interval.as_secs_f64(),
            threshold = self.config.readiness.stability_threshold,
            "watching folder"
        );
        Ok(())
    }

    /// Stop watching and wait for the in-flight tick to finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.watcher.take();

        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "watch loop task failed");
        }

        let _ = self.event_tx.send(Event::Shutdown);
        info!(root = %self.config.watch.root.display(), "folder watcher stopped");
    }

    /// Process one archive immediately, without waiting for it to become stable
    pub async fn process(&self, path: &Path) -> ProcessReport {
        self.organizer.process(path).await
    }

    /// The organizer used for promoted archives
    pub fn organizer(&self) -> &Organizer {
        &self.organizer
    }
}

/// State owned by the spawned loop
struct LoopTask {
    rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    tracker: ReadinessTracker,
    organizer: Arc<Organizer>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl LoopTask {
    async fn run(mut self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("watch loop cancelled");
                    break;
                }
                received = self.rx.recv() => match received {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => warn!(error = %e, "filesystem watcher error"),
                    None => {
                        debug!("notification channel closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    fn handle_event(&mut self, event: notify::Event) {
        let relevant = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        );
        if !relevant {
            return;
        }

        for path in event.paths {
            if in_work_dir(&path) || !is_candidate_name(&path) || !path.is_file() {
                continue;
            }
            if self.tracker.observe(&path, Instant::now()) {
                let _ = self.event_tx.send(Event::Observed { path });
            }
        }
    }

    async fn tick(&mut self) {
        if self.tracker.is_empty() {
            return;
        }

        let report = self.tracker.tick(Instant::now());

        for path in report.abandoned {
            let _ = self.event_tx.send(Event::Abandoned { path });
        }

        for promotion in report.ready {
            let _ = self.event_tx.send(Event::Promoted {
                path: promotion.path.clone(),
                reason: promotion.reason,
            });

            let result = self.organizer.process(&promotion.path).await;
            if result.is_success() {
                debug!(archive = ?promotion.path, archives = result.outcomes.len(), "promotion handled");
            } else {
                warn!(
                    archive = ?promotion.path,
                    failures = result.failures(),
                    "promotion finished with failures"
                );
            }
        }
    }
}

/// Whether `path` sits in one of the organizer's scratch or holding directories
fn in_work_dir(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .map(|dir| {
            let dir = dir.to_string_lossy();
            dir.starts_with(SCRATCH_PREFIX) || dir.starts_with(HOLDING_PREFIX)
        })
        .unwrap_or(false)
}

/// Candidate files already present in `root`
fn existing_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() && is_candidate_name(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
