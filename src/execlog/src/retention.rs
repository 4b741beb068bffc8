//! Deletion of stale session files.
//!
//! Sweeps are on demand. [`spawn_periodic_cleanup`] composes a timer around
//! the sweep for hosts that want one; nothing starts it implicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::logger::SessionLogger;
use crate::paths;
use crate::sessions::SessionRegistry;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Scans a logging directory for session files older than a cutoff.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    root: PathBuf,
    registry: Arc<SessionRegistry>,
}

impl RetentionSweeper {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete session files last modified more than `days_old` days ago.
    ///
    /// Files owned by an active session are never deleted. Files that cannot
    /// be inspected or removed are reported and skipped. Only a failure to
    /// list the directory itself is returned as an error.
    pub fn sweep(&self, days_old: u32) -> Result<usize> {
        let age = Duration::from_secs(u64::from(days_old) * SECS_PER_DAY);
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.sweep_before(cutoff)
    }

    /// Delete session files last modified before `cutoff`.
    pub fn sweep_before(&self, cutoff: SystemTime) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let protected = self.registry.active_file_names();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };
            if paths::parse_log_file_name(name_str).is_none() {
                continue;
            }
            if protected.contains(&name) {
                debug!(file = %name_str, "Skipping log of active session");
                continue;
            }

            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read log file metadata");
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed old session log");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old session log"),
            }
        }

        if removed > 0 {
            info!(removed, dir = %self.root.display(), "Old session logs removed");
        }
        Ok(removed)
    }
}

/// Run `cleanup_old_logs(days_old)` on `logger` every `every`, starting
/// immediately. Abort the returned handle to stop.
///
/// Must be called from within a tokio runtime.
pub fn spawn_periodic_cleanup(
    logger: Arc<SessionLogger>,
    every: Duration,
    days_old: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let logger = Arc::clone(&logger);
            match tokio::task::spawn_blocking(move || logger.cleanup_old_logs(days_old)).await {
                Ok(Ok(removed)) => debug!(removed, "Periodic log cleanup finished"),
                Ok(Err(e)) => warn!(error = %e, "Periodic log cleanup failed"),
                Err(e) => warn!(error = %e, "Periodic log cleanup task panicked"),
            }
        }
    })
}
