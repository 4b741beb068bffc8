//! The single consumer that owns every session file handle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Local;
use tracing::{debug, warn};

use super::command::{ShutdownReport, WriteCommand};
use super::queue::Shared;
use crate::entry::format_footer;
use crate::sessions::{SessionKey, SessionRegistry};

pub(crate) struct WriterConsumer {
    registry: Arc<SessionRegistry>,
    shared: Arc<Shared>,
    files: HashMap<SessionKey, BufWriter<File>>,
    echo: bool,
}

impl WriterConsumer {
    pub(crate) fn new(registry: Arc<SessionRegistry>, shared: Arc<Shared>, echo: bool) -> Self {
        Self {
            registry,
            shared,
            files: HashMap::new(),
            echo,
        }
    }

    /// Drain `rx` in FIFO order until a shutdown command arrives or every
    /// sender is gone.
    pub(crate) fn run(&mut self, rx: &flume::Receiver<WriteCommand>) {
        while let Ok(command) = rx.recv() {
            if command.is_block() && self.past_deadline() {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            match command {
                WriteCommand::Header { key, text } => self.write_header(key, &text),
                WriteCommand::Entry { key, text, echo } => self.write_entry(key, &text, &echo),
                WriteCommand::Finalize {
                    key,
                    ended_at,
                    summary,
                } => self.write_footer(key, ended_at, &summary),
                WriteCommand::Barrier(ack) => {
                    let _ = ack.send(());
                }
                WriteCommand::Shutdown(ack) => {
                    let closed_files = self.close_all();
                    let _ = ack.send(ShutdownReport {
                        completed: true,
                        discarded: self.shared.discarded.load(Ordering::Relaxed),
                        closed_files,
                    });
                    return;
                }
                #[cfg(test)]
                WriteCommand::Crash => panic!("injected writer fault"),
            }
        }

        self.close_all();
    }

    fn past_deadline(&self) -> bool {
        self.shared
            .drain_deadline
            .lock()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn write_header(&mut self, key: SessionKey, text: &str) {
        let Some((path, _)) = self.registry.path_of(key) else {
            return;
        };

        let opened = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map(BufWriter::new);
        match opened {
            Ok(mut file) => {
                if self.append(key, &mut file, text) {
                    debug!(key = %key, path = %path.display(), "Session file created");
                }
                self.files.insert(key, file);
            }
            Err(e) => {
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path.display(), error = %e, "Failed to create session log file; header dropped");
            }
        }
    }

    fn write_entry(&mut self, key: SessionKey, text: &str, echo: &str) {
        let Some(mut file) = self.take_handle(key) else {
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        if self.append(key, &mut file, text) {
            self.registry.record_write(key, Local::now());
            if self.echo {
                debug!(key = %key, "{echo}");
            }
        }
        self.files.insert(key, file);
    }

    fn write_footer(
        &mut self,
        key: SessionKey,
        ended_at: chrono::DateTime<Local>,
        summary: &crate::entry::ExtraMap,
    ) {
        let Some(session) = self.registry.by_key(key) else {
            return;
        };

        match self.take_handle(key) {
            Some(mut file) => {
                let footer = format_footer(
                    &session.id,
                    &session.created_at,
                    &ended_at,
                    session.entry_count,
                    summary,
                );
                if self.append(key, &mut file, &footer) {
                    debug!(
                        session_id = %session.id,
                        entries = session.entry_count,
                        "Session log finalized"
                    );
                }
                // Dropping the writer closes the file.
            }
            None => {
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.registry.mark_footer_written(key);
    }

    /// Write and flush one block. Failures are reported and the block is
    /// dropped.
    fn append(&self, key: SessionKey, file: &mut BufWriter<File>, text: &str) -> bool {
        let result = file
            .write_all(text.as_bytes())
            .and_then(|()| file.flush());
        match result {
            Ok(()) => {
                self.shared.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Failed to write session log block; block dropped");
                false
            }
        }
    }

    /// Open handle for `key`, reopening the file in append mode when the
    /// handle was lost (writer restart, failed header). Files whose footer is
    /// already written are never reopened.
    fn take_handle(&mut self, key: SessionKey) -> Option<BufWriter<File>> {
        if let Some(file) = self.files.remove(&key) {
            return Some(file);
        }

        let (path, footer_written) = self.registry.path_of(key)?;
        if footer_written {
            warn!(key = %key, path = %path.display(), "Session already finalized; block dropped");
            return None;
        }

        match OpenOptions::new().append(true).open(&path) {
            Ok(file) => {
                debug!(key = %key, path = %path.display(), "Reopened session log file");
                Some(BufWriter::new(file))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Session log file unavailable; block dropped");
                None
            }
        }
    }

    fn close_all(&mut self) -> usize {
        let count = self.files.len();
        for (key, mut file) in self.files.drain() {
            if let Err(e) = file.flush() {
                warn!(key = %key, error = %e, "Failed to flush session log on close");
            }
        }
        count
    }
}
