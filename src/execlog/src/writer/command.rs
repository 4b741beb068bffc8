//! Messages carried by the writer queue.

use chrono::{DateTime, Local};

use crate::entry::ExtraMap;
use crate::sessions::SessionKey;

/// One unit of work for the writer thread.
#[derive(Debug)]
pub(crate) enum WriteCommand {
    /// Create the session file and write its header.
    Header { key: SessionKey, text: String },

    /// Append a formatted entry.
    Entry {
        key: SessionKey,
        text: String,
        /// `component - message`, echoed at debug level once written.
        echo: String,
    },

    /// Render and append the footer, then close the file.
    ///
    /// The footer is rendered by the writer so its entry count includes
    /// every entry queued ahead of it.
    Finalize {
        key: SessionKey,
        ended_at: DateTime<Local>,
        summary: ExtraMap,
    },

    /// Acknowledged once everything queued ahead of it has been handled.
    Barrier(flume::Sender<()>),

    /// Close every file and stop the consumer loop.
    Shutdown(flume::Sender<ShutdownReport>),

    /// Panic inside the consumer loop.
    #[cfg(test)]
    Crash,
}

impl WriteCommand {
    /// Whether this command carries data destined for a session file.
    pub(crate) fn is_block(&self) -> bool {
        matches!(
            self,
            WriteCommand::Header { .. } | WriteCommand::Entry { .. } | WriteCommand::Finalize { .. }
        )
    }
}

/// Result of stopping the writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// `true` when the writer acknowledged shutdown before the deadline.
    pub completed: bool,
    /// Blocks discarded because the drain deadline passed.
    pub discarded: u64,
    /// Session files still open when shutdown began.
    pub closed_files: usize,
}
