//! Execlog - Real-time, session-scoped execution logs.
//!
//! Each workflow session gets its own human-readable text file:
//!
//! - a header with the session id and metadata
//! - one block per event (steps, code, API calls, files, errors)
//! - a footer with the duration, entry count and a summary
//!
//! # Features
//!
//! - Non-blocking producers: every call is queued for a single writer thread
//! - Strict FIFO per process; the footer is always the last block of a file
//! - Writer faults are absorbed and the writer restarts itself
//! - Bounded drain at shutdown
//! - Age-based retention that never touches active sessions
//!
//! # Usage
//!
//! ```rust,no_run
//! use execlog::{LoggerConfig, SessionLogger, extra, metadata};
//!
//! fn main() -> execlog::Result<()> {
//!     let logger = SessionLogger::new(LoggerConfig::default().with_root_dir("logs"))?;
//!
//!     let path = logger.create_session("s1", metadata! { "tipo" => "test" })?;
//!     logger.log_step_started("s1", 1, "Coleta", Some(extra! { "max" => 50 }))?;
//!     logger.log_step_completed("s1", 1, "Coleta", None, 1.25)?;
//!     logger.finalize_session("s1", extra! { "status" => "SUCESSO" })?;
//!
//!     logger.shutdown();
//!     println!("Log written to {}", path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod logger;
pub mod paths;
pub mod retention;
pub mod sessions;
pub mod writer;

// Re-export main types at crate root
pub use config::LoggerConfig;
pub use entry::{ExtraMap, ExtraValue, FileOperation, Level, LogEntry, Metadata};
pub use error::{LoggerError, Result};
pub use logger::SessionLogger;
pub use retention::{RetentionSweeper, spawn_periodic_cleanup};
pub use sessions::{Session, SessionRegistry, SessionStatus};
pub use writer::{ShutdownReport, WriterStats};
