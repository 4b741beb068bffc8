//! Session data types.
//!
//! - `Session` - snapshot of one session's state
//! - `SessionStatus` - `Active` or `Finalized`
//! - `SessionKey` - internal handle distinguishing sessions that reuse an id

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::entry::Metadata;

/// Lifecycle state. `Active -> Finalized` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Finalized,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => f.write_str("ACTIVE"),
            SessionStatus::Finalized => f.write_str("FINALIZED"),
        }
    }
}

/// Registry-assigned session handle, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SessionKey(pub(crate) u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of a session as returned by `get_session_info`.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Caller-assigned identifier.
    pub id: String,
    /// Absolute path of the session file.
    pub path: PathBuf,
    /// Wall-clock creation time.
    pub created_at: DateTime<Local>,
    /// Metadata given at creation, rendered in the header.
    pub metadata: Metadata,
    pub status: SessionStatus,
    /// Entries written so far (header and footer excluded).
    pub entry_count: u64,
    /// Time of the last successful entry write.
    pub last_write_at: Option<DateTime<Local>>,
    /// When `finalize_session` was accepted.
    pub finalized_at: Option<DateTime<Local>>,
    #[serde(skip)]
    pub(crate) key: SessionKey,
    #[serde(skip)]
    pub(crate) footer_written: bool,
}

impl Session {
    pub(crate) fn new(
        key: SessionKey,
        id: String,
        path: PathBuf,
        created_at: DateTime<Local>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id,
            path,
            created_at,
            metadata,
            status: SessionStatus::Active,
            entry_count: 0,
            last_write_at: None,
            finalized_at: None,
            key,
            footer_written: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// File name of the session file.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}
