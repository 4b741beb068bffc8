//! Public facade over the registry, the writer queue and the retention
//! sweeper.
//!
//! Every mutating call validates its arguments, formats the block on the
//! calling thread and hands it to the writer queue. Logging to an unknown or
//! finalized session is reported through `tracing` and otherwise ignored.

use std::collections::BTreeSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::LoggerConfig;
use crate::entry::{ExtraMap, FileOperation, Level, LogEntry, Metadata, events, format_entry, format_header};
use crate::error::{LoggerError, Result};
use crate::paths;
use crate::retention::RetentionSweeper;
use crate::sessions::{Created, Session, SessionRegistry};
use crate::writer::{ShutdownReport, WriteCommand, WriterQueue, WriterStats};

/// Session-scoped execution logger.
///
/// Construct one per process and share it behind an `Arc`.
pub struct SessionLogger {
    config: LoggerConfig,
    root_dir: PathBuf,
    registry: Arc<SessionRegistry>,
    writer: WriterQueue,
    retention: RetentionSweeper,
}

impl SessionLogger {
    /// Resolve the logging directory, create it and start the writer thread.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        config.validate()?;

        let root_dir = paths::resolve_root_dir(&config)?;
        std::fs::create_dir_all(&root_dir)?;

        let registry = Arc::new(SessionRegistry::new());
        let writer = WriterQueue::start(
            Arc::clone(&registry),
            config.queue_capacity,
            config.echo_entries,
        )?;
        let retention = RetentionSweeper::new(root_dir.clone(), Arc::clone(&registry));

        info!(root = %root_dir.display(), "Session logger started");
        Ok(Self {
            config,
            root_dir,
            registry,
            writer,
            retention,
        })
    }

    /// Directory where session files are created.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Open a session and queue its header.
    ///
    /// Creating an id that is already active returns the existing path and
    /// queues nothing. A finalized id may be reused; it gets a new file.
    pub fn create_session(&self, session_id: &str, metadata: Metadata) -> Result<PathBuf> {
        paths::validate_session_id(session_id)?;

        let created = self
            .registry
            .create_with(session_id, metadata, &self.root_dir, |session| {
                let header = format_header(
                    &session.id,
                    &session.created_at,
                    &session.path,
                    &session.metadata,
                );
                self.writer.enqueue(WriteCommand::Header {
                    key: session.key,
                    text: header,
                });

                if self.config.initial_entry {
                    let entry = events::session_started(&session.id);
                    self.writer.enqueue(entry_command(session, &entry));
                }
            });

        match created {
            Created::New(path) => {
                info!(session_id, path = %path.display(), "Session log created");
                Ok(path)
            }
            Created::Existing(path) => {
                debug!(session_id, "Session already active; reusing its log");
                Ok(path)
            }
        }
    }

    /// Close a session: queue its footer and stop accepting entries for it.
    ///
    /// Finalizing an unknown or already finalized id is reported and
    /// ignored.
    pub fn finalize_session(&self, session_id: &str, summary: ExtraMap) -> Result<()> {
        if session_id.is_empty() {
            return Err(LoggerError::invalid_id(session_id, "must not be empty"));
        }

        let ended_at = Local::now();
        let queued = self.registry.finalize_with(session_id, |session| {
            self.writer.enqueue(WriteCommand::Finalize {
                key: session.key,
                ended_at,
                summary,
            })
        });

        match queued {
            Some(_) => info!(session_id, "Session finalized"),
            None if self.registry.get(session_id).is_some() => {
                warn!(session_id, "Session already finalized; finalize ignored")
            }
            None => warn!(session_id, "Unknown session; finalize ignored"),
        }
        Ok(())
    }

    /// Snapshot of a session, active or finalized.
    pub fn get_session_info(&self, session_id: &str) -> Option<Session> {
        self.registry.get(session_id)
    }

    pub fn list_active_sessions(&self) -> BTreeSet<String> {
        self.registry.active_ids()
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Append a generic entry.
    pub fn log(
        &self,
        session_id: &str,
        component: &str,
        level: Level,
        message: &str,
        extra: Option<ExtraMap>,
    ) -> Result<()> {
        let mut entry = LogEntry::new(session_id, level, component, message);
        if let Some(extra) = extra {
            entry = entry.with_extra(extra);
        }
        self.log_entry(entry)
    }

    /// Append a prebuilt entry.
    pub fn log_entry(&self, entry: LogEntry) -> Result<()> {
        if entry.session_id.is_empty() {
            return Err(LoggerError::invalid_id(&entry.session_id, "must not be empty"));
        }
        if entry.component.trim().is_empty() {
            return Err(LoggerError::InvalidComponent);
        }

        let queued = self
            .registry
            .with_active(&entry.session_id, |session| {
                self.writer.enqueue(entry_command(session, &entry))
            });

        if queued.is_none() {
            self.report_inactive(&entry.session_id);
        }
        Ok(())
    }

    pub fn info(&self, session_id: &str, component: &str, message: &str) -> Result<()> {
        self.log(session_id, component, Level::Info, message, None)
    }

    pub fn warning(&self, session_id: &str, component: &str, message: &str) -> Result<()> {
        self.log(session_id, component, Level::Warning, message, None)
    }

    pub fn debug(&self, session_id: &str, component: &str, message: &str) -> Result<()> {
        self.log(session_id, component, Level::Debug, message, None)
    }

    pub fn error(&self, session_id: &str, component: &str, message: &str) -> Result<()> {
        self.log(session_id, component, Level::Error, message, None)
    }

    pub fn log_step_started(
        &self,
        session_id: &str,
        step_number: u32,
        step_name: &str,
        params: Option<ExtraMap>,
    ) -> Result<()> {
        self.log_entry(events::step_started(session_id, step_number, step_name, params))
    }

    pub fn log_step_completed(
        &self,
        session_id: &str,
        step_number: u32,
        step_name: &str,
        result: Option<ExtraMap>,
        elapsed_secs: f64,
    ) -> Result<()> {
        check_elapsed(elapsed_secs)?;
        self.log_entry(events::step_completed(
            session_id,
            step_number,
            step_name,
            result,
            elapsed_secs,
        ))
    }

    pub fn log_code_executed(
        &self,
        session_id: &str,
        component: &str,
        code: &str,
        result: Option<ExtraMap>,
    ) -> Result<()> {
        self.log_entry(events::code_executed(session_id, component, code, result))
    }

    pub fn log_code_failed(
        &self,
        session_id: &str,
        component: &str,
        code: &str,
        error: &str,
    ) -> Result<()> {
        self.log_entry(events::code_failed(session_id, component, code, error))
    }

    pub fn log_api_call(
        &self,
        session_id: &str,
        component: &str,
        api_name: &str,
        params: Option<ExtraMap>,
        elapsed_secs: f64,
        error: Option<&str>,
    ) -> Result<()> {
        check_elapsed(elapsed_secs)?;
        self.log_entry(events::api_call(
            session_id,
            component,
            api_name,
            params,
            elapsed_secs,
            error,
        ))
    }

    pub fn log_file_processed(
        &self,
        session_id: &str,
        component: &str,
        file: impl AsRef<Path>,
        operation: FileOperation,
        details: Option<ExtraMap>,
    ) -> Result<()> {
        self.log_entry(events::file_processed(
            session_id,
            component,
            file.as_ref(),
            operation,
            details,
        ))
    }

    /// Append an ERROR entry carrying `error` and its source chain.
    pub fn log_error(
        &self,
        session_id: &str,
        component: &str,
        message: &str,
        error: &(dyn Error + 'static),
    ) -> Result<()> {
        self.log_entry(events::error(session_id, component, message, error))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete session files older than `days_old` days, sparing active
    /// sessions. Returns the number of files deleted.
    pub fn cleanup_old_logs(&self, days_old: u32) -> Result<usize> {
        self.retention.sweep(days_old)
    }

    /// Wait until everything queued so far has been written.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.writer.barrier(timeout)
    }

    /// Drain the queue within the configured timeout and stop the writer.
    ///
    /// Later calls are no-ops and return a default report.
    pub fn shutdown(&self) -> ShutdownReport {
        self.writer.shutdown(self.config.drain_timeout())
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    fn report_inactive(&self, session_id: &str) {
        if self.registry.get(session_id).is_some() {
            warn!(session_id, "Session already finalized; entry dropped");
        } else {
            warn!(session_id, "Unknown session; entry dropped");
        }
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("root_dir", &self.root_dir)
            .field("active_sessions", &self.registry.active_ids().len())
            .field("writer_running", &self.writer.is_running())
            .finish()
    }
}

fn entry_command(session: &Session, entry: &LogEntry) -> WriteCommand {
    WriteCommand::Entry {
        key: session.key,
        text: format_entry(entry),
        echo: format!("[{}] {} - {}", session.id, entry.component, entry.message),
    }
}

fn check_elapsed(secs: f64) -> Result<()> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(())
    } else {
        Err(LoggerError::InvalidArgument {
            name: "elapsed_secs",
            message: format!("must be a finite, non-negative number of seconds (got {secs})"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extra, metadata};
    use tempfile::{TempDir, tempdir};

    const WAIT: Duration = Duration::from_secs(5);

    fn logger() -> (TempDir, SessionLogger) {
        let dir = tempdir().unwrap();
        let config = LoggerConfig::default().with_root_dir(dir.path());
        (dir, SessionLogger::new(config).unwrap())
    }

    #[test]
    fn test_create_session_writes_header_and_initial_entry() {
        let (dir, logger) = logger();
        let path = logger
            .create_session("s1", metadata! { "tipo" => "test" })
            .unwrap();
        assert!(logger.flush(WAIT));

        assert_eq!(path.parent(), Some(dir.path()));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SESSÃO: s1\n"));
        assert!(content.contains("  tipo: test\n"));
        assert!(content.contains("[SISTEMA        ] Log iniciado para sessão s1\n"));
        assert_eq!(logger.get_session_info("s1").unwrap().entry_count, 1);
    }

    #[test]
    fn test_create_session_is_idempotent_while_active() {
        let (_dir, logger) = logger();
        let first = logger.create_session("s1", Metadata::new()).unwrap();
        let second = logger
            .create_session("s1", metadata! { "ignored" => "yes" })
            .unwrap();
        assert_eq!(first, second);
        assert!(logger.flush(WAIT));

        let content = std::fs::read_to_string(&first).unwrap();
        assert_eq!(content.matches("LOG DE EXECUÇÃO EM TEMPO REAL").count(), 1);
        assert!(!content.contains("ignored"));
    }

    #[test]
    fn test_invalid_arguments_are_rejected() {
        let (_dir, logger) = logger();
        assert!(matches!(
            logger.create_session("", Metadata::new()),
            Err(LoggerError::InvalidSessionId { .. })
        ));
        assert!(matches!(
            logger.create_session("a/b", Metadata::new()),
            Err(LoggerError::InvalidSessionId { .. })
        ));

        logger.create_session("s1", Metadata::new()).unwrap();
        assert!(matches!(
            logger.info("s1", " ", "msg"),
            Err(LoggerError::InvalidComponent)
        ));
        assert!(matches!(
            logger.log_api_call("s1", "API", "x", None, f64::NAN, None),
            Err(LoggerError::InvalidArgument { name: "elapsed_secs", .. })
        ));
        assert!(matches!(
            logger.log_step_completed("s1", 1, "x", None, -1.0),
            Err(LoggerError::InvalidArgument { .. })
        ));
        assert!(logger.finalize_session("", ExtraMap::new()).is_err());
    }

    #[test]
    fn test_unknown_and_finalized_sessions_are_ignored() {
        let (_dir, logger) = logger();
        assert!(logger.info("ghost", "X", "nobody home").is_ok());
        assert!(logger.finalize_session("ghost", ExtraMap::new()).is_ok());

        let path = logger.create_session("s1", Metadata::new()).unwrap();
        logger.finalize_session("s1", extra! { "status" => "OK" }).unwrap();
        assert!(logger.info("s1", "X", "too late").is_ok());
        assert!(logger.finalize_session("s1", ExtraMap::new()).is_ok());
        assert!(logger.flush(WAIT));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("too late"));
        assert_eq!(content.matches("SESSÃO FINALIZADA").count(), 1);
        assert!(logger.list_active_sessions().is_empty());
        assert!(!logger.get_session_info("s1").unwrap().is_active());
        assert!(logger.get_session_info("ghost").is_none());
    }

    #[test]
    fn test_log_error_records_cause_chain() {
        let (_dir, logger) = logger();
        let path = logger.create_session("s1", Metadata::new()).unwrap();
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        let err = LoggerError::ConfigRead {
            path: PathBuf::from("/etc/app.toml"),
            source: io,
        };
        logger
            .log_error("s1", "CONFIG", "Falha ao carregar", &err)
            .unwrap();
        assert!(logger.flush(WAIT));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[ERROR  ] [CONFIG         ] ❌ Falha ao carregar\n"));
        assert!(content.contains("\"config missing\""));
        assert!(content.contains("CODE EXECUTED:"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_dir, logger) = logger();
        logger.create_session("s1", Metadata::new()).unwrap();
        let report = logger.shutdown();
        assert!(report.completed);
        assert_eq!(report.closed_files, 1);
        assert_eq!(logger.shutdown(), ShutdownReport::default());

        // Entries after shutdown are refused without surfacing an error.
        assert!(logger.info("s1", "X", "late").is_ok());
        assert_eq!(logger.writer_stats().rejected, 1);
    }
}
