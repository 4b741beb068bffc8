//! Session registry.
//!
//! Owns the id -> session mapping. Producers hold the read lock while they
//! enqueue work for an active session and `finalize` holds the write lock
//! while it enqueues the footer, so no entry can be queued behind a footer.
//! The registry never opens session files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use parking_lot::RwLock;
use tracing::debug;

use super::types::{Session, SessionKey, SessionStatus};
use crate::entry::Metadata;
use crate::paths;

/// Outcome of [`SessionRegistry::create_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Created {
    /// A new session was registered at this path.
    New(PathBuf),
    /// The id was already active; its path is returned unchanged.
    Existing(PathBuf),
}

impl Created {
    #[cfg(test)]
    pub(crate) fn into_path(self) -> PathBuf {
        match self {
            Created::New(path) | Created::Existing(path) => path,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    next_key: u64,
    sessions: HashMap<SessionKey, Session>,
    active: HashMap<String, SessionKey>,
    /// Most recent finalized session per id.
    finalized: HashMap<String, SessionKey>,
    /// Every path handed out, including those of pruned sessions.
    paths: HashSet<PathBuf>,
}

impl RegistryState {
    /// Drop a session whose footer is written and that `get` no longer
    /// reaches because a newer session with the same id replaced it.
    fn prune(&mut self, key: SessionKey) {
        let Some(session) = self.sessions.get(&key) else {
            return;
        };
        let indexed = self.active.get(&session.id) == Some(&key)
            || self.finalized.get(&session.id) == Some(&key);
        if session.footer_written && !indexed {
            self.sessions.remove(&key);
        }
    }
}

/// Thread-safe index of active and finalized sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under `root`, or return the path of the active
    /// session already using `id`.
    ///
    /// `on_created` runs under the write lock for new sessions only, so work
    /// it enqueues precedes anything enqueued for the session afterwards.
    pub(crate) fn create_with<F>(
        &self,
        id: &str,
        metadata: Metadata,
        root: &Path,
        on_created: F,
    ) -> Created
    where
        F: FnOnce(&Session),
    {
        let mut state = self.state.write();

        if let Some(key) = state.active.get(id)
            && let Some(existing) = state.sessions.get(key)
        {
            return Created::Existing(existing.path.clone());
        }

        let created_at = Local::now();
        let path = allocate_path(&state, root, id, &created_at);

        state.next_key += 1;
        let key = SessionKey(state.next_key);
        let session = Session::new(key, id.to_string(), path.clone(), created_at, metadata);

        on_created(&session);

        state.paths.insert(path.clone());
        state.active.insert(id.to_string(), key);
        state.sessions.insert(key, session);
        debug!(session_id = %id, key = %key, path = %path.display(), "Session registered");

        Created::New(path)
    }

    /// Run `f` against the active session with this id, under the read lock.
    ///
    /// Returns `None` when the id is unknown or already finalized.
    pub(crate) fn with_active<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        let state = self.state.read();
        let key = state.active.get(id)?;
        let session = state.sessions.get(key)?;
        Some(f(session))
    }

    /// Move the active session with this id to `Finalized` and run `f` under
    /// the write lock.
    ///
    /// Returns `None` when there is no active session with this id.
    pub(crate) fn finalize_with<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&Session) -> R,
    {
        let mut state = self.state.write();
        let key = state.active.remove(id)?;
        if let Some(superseded) = state.finalized.insert(id.to_string(), key) {
            state.prune(superseded);
        }

        let session = state.sessions.get_mut(&key)?;
        session.status = SessionStatus::Finalized;
        session.finalized_at = Some(Local::now());
        Some(f(session))
    }

    /// Snapshot of a session by id: the active one first, else the most
    /// recently finalized one.
    pub fn get(&self, id: &str) -> Option<Session> {
        let state = self.state.read();
        let key = state.active.get(id).or_else(|| state.finalized.get(id))?;
        state.sessions.get(key).cloned()
    }

    /// Ids of every active session.
    pub fn active_ids(&self) -> BTreeSet<String> {
        self.state.read().active.keys().cloned().collect()
    }

    /// File names owned by active sessions.
    pub fn active_file_names(&self) -> HashSet<OsString> {
        let state = self.state.read();
        state
            .active
            .values()
            .filter_map(|key| state.sessions.get(key))
            .filter_map(|s| s.path.file_name().map(OsString::from))
            .collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state.read().active.contains_key(id)
    }

    // ========================================================================
    // Writer-side bookkeeping
    // ========================================================================

    pub(crate) fn by_key(&self, key: SessionKey) -> Option<Session> {
        self.state.read().sessions.get(&key).cloned()
    }

    pub(crate) fn path_of(&self, key: SessionKey) -> Option<(PathBuf, bool)> {
        self.state
            .read()
            .sessions
            .get(&key)
            .map(|s| (s.path.clone(), s.footer_written))
    }

    pub(crate) fn record_write(&self, key: SessionKey, at: DateTime<Local>) {
        if let Some(session) = self.state.write().sessions.get_mut(&key) {
            session.entry_count += 1;
            session.last_write_at = Some(at);
        }
    }

    pub(crate) fn mark_footer_written(&self, key: SessionKey) {
        let mut state = self.state.write();
        if let Some(session) = state.sessions.get_mut(&key) {
            session.footer_written = true;
        }
        state.prune(key);
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.state.read().sessions.len()
    }
}

/// Pick a file path that no known session and no existing file uses.
///
/// The name carries second resolution, so a quick reuse of an id moves the
/// stamp forward until the name is free.
fn allocate_path(
    state: &RegistryState,
    root: &Path,
    id: &str,
    created_at: &DateTime<Local>,
) -> PathBuf {
    let mut stamp = *created_at;
    loop {
        let path = paths::log_file_path(root, id, &stamp);
        if !state.paths.contains(&path) && !path.exists() {
            return path;
        }
        stamp += Duration::seconds(1);
    }
}
