//! Scratch file janitor.
//!
//! Populated packages, staged public copies, and abandoned converter scratch
//! dirs are ephemeral; the janitor periodically removes anything in the
//! swept directories older than the configured age, the backstop against
//! crash-leaked scratch files. Only top-level entries are swept, so the
//! artifact store under the work dir is never touched.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Default wait between sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Periodic sweep of the pipeline's scratch directories.
pub struct Janitor {
    directories: Vec<PathBuf>,
    max_age: Duration,
    interval: Duration,
}

impl Janitor {
    /// Janitor over the work and public staging directories.
    pub fn from_config(config: &Config) -> Self {
        Self {
            directories: vec![config.work_dir.clone(), config.public_dir.clone()],
            max_age: Duration::from_secs(config.temp_max_age_secs),
            interval: SWEEP_INTERVAL,
        }
    }

    /// Override the sweep interval (used by tests with short deadlines).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start sweeping in the background until shut down.
    pub fn spawn(self) -> JanitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(self.interval);
            // The first tick fires immediately; a freshly started process
            // has nothing stale yet.
            ticks.tick().await;

            info!(
                interval_secs = self.interval.as_secs(),
                max_age_secs = self.max_age.as_secs(),
                "Scratch janitor running"
            );

            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        match self.sweep().await {
                            Ok(0) => {}
                            Ok(removed) => info!(removed, "Swept stale scratch entries"),
                            Err(e) => error!(error = %e, "Scratch sweep failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Scratch janitor stopping");
                            break;
                        }
                    }
                }
            }
        });

        JanitorHandle {
            shutdown_tx,
            handle,
        }
    }

    /// One pass: remove top-level entries older than the cutoff.
    async fn sweep(&self) -> Result<u64, std::io::Error> {
        let cutoff = SystemTime::now() - self.max_age;
        let mut removed: u64 = 0;

        for dir in &self.directories {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Sweep directory unreadable");
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(_) => continue,
                };
                let modified = match metadata.modified() {
                    Ok(modified) => modified,
                    Err(_) => continue,
                };
                if modified >= cutoff {
                    continue;
                }

                let path = entry.path();
                let result = if metadata.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else if metadata.is_file() {
                    tokio::fs::remove_file(&path).await
                } else {
                    continue;
                };

                match result {
                    Ok(()) => {
                        debug!(path = %path.display(), "Removed stale scratch entry");
                        removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove scratch entry");
                    }
                }
            }
        }

        Ok(removed)
    }
}

/// Handle to a running janitor.
pub struct JanitorHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl JanitorHandle {
    /// Signal shutdown; returns immediately.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the sweep loop to exit, up to `timeout`.
    pub async fn wait(self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.handle).await.is_err() {
            warn!("Janitor did not stop within {:?}", timeout);
        }
    }
}
