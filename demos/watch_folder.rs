//! Watch folder example
//!
//! Watches `./downloads` (or the directory given as the first argument), prints every
//! event and stops cleanly on Ctrl+C.
//!
//! ```text
//! cargo run --example watch_folder -- /path/to/downloads
//! ```

use archive_organizer::{ArchiveWatcher, Config, Event, ReadinessConfig, run_until_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let root = std::env::args().nth(1).unwrap_or_else(|| "downloads".to_string());

    let mut config = Config::for_root(&root);
    // Quick turnaround for interactive use
    config.readiness = ReadinessConfig::responsive();
    config.watch.scan_existing_on_start = true;
    config.apply_env()?;

    let mut watcher = ArchiveWatcher::new(config)?;

    let mut events = watcher.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Observed { path } => println!("observed   {}", path.display()),
                Event::Promoted { path, reason } => {
                    println!("ready      {} ({:?})", path.display(), reason)
                }
                Event::Organized {
                    archive,
                    disposition,
                    outputs,
                } => println!(
                    "organized  {} -> {} {:?}",
                    archive.display(),
                    disposition.label(),
                    outputs
                ),
                Event::Failed {
                    archive, message, ..
                } => println!("failed     {}: {}", archive.display(), message),
                Event::Shutdown => break,
                other => println!("{:?}", other),
            }
        }
    });

    watcher.start()?;
    println!("watching {root}, press Ctrl+C to stop");
    run_until_signal(&mut watcher).await;

    Ok(())
}
