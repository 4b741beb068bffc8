//! Logging directory resolution and session file naming.
//!
//! Session files are named `log_<session_id>_<YYYYMMDD>_<HHMMSS>.txt`.
//! The creation timestamp in the name keeps a reused session id from
//! reopening the file of an earlier, finalized session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::debug;

use crate::config::LoggerConfig;
use crate::error::{LoggerError, Result};

/// Session file name prefix.
pub const LOG_FILE_PREFIX: &str = "log_";
/// Session file name extension (with dot).
pub const LOG_FILE_EXTENSION: &str = ".txt";

const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// `YYYYMMDD_HHMMSS`
const FILE_STAMP_LEN: usize = 15;

/// Characters that cannot appear in a session id.
const FORBIDDEN_ID_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Resolve the directory session files are written to.
///
/// Order: explicit `root_dir`, then the nearest ancestor of the current
/// directory whose name contains one of `root_markers`, then the current
/// directory itself.
pub fn resolve_root_dir(config: &LoggerConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.root_dir {
        return Ok(absolute(dir)?);
    }

    let cwd = std::env::current_dir()?;
    if let Some(root) = find_marked_ancestor(&cwd, &config.root_markers) {
        debug!(root = %root.display(), "Detected application root from marker");
        return Ok(root);
    }
    Ok(cwd)
}

/// Walk up from `start` looking for a directory whose name contains one of
/// `markers`, compared case-insensitively.
pub fn find_marked_ancestor(start: &Path, markers: &[String]) -> Option<PathBuf> {
    if markers.is_empty() {
        return None;
    }
    let markers: Vec<String> = markers.iter().map(|m| m.to_uppercase()).collect();

    start
        .ancestors()
        .find(|dir| {
            dir.file_name()
                .map(|name| name.to_string_lossy().to_uppercase())
                .is_some_and(|name| markers.iter().any(|m| name.contains(m.as_str())))
        })
        .map(Path::to_path_buf)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Check that a session id is non-empty and safe to embed in a file name.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LoggerError::invalid_id(id, "must not be empty"));
    }
    if id.contains("..") {
        return Err(LoggerError::invalid_id(id, "must not contain '..'"));
    }
    if id
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_ID_CHARS.contains(&c))
    {
        return Err(LoggerError::invalid_id(
            id,
            "must not contain path separators or reserved file name characters",
        ));
    }
    Ok(())
}

/// File name for a session created at `created_at`.
pub fn log_file_name(session_id: &str, created_at: &DateTime<Local>) -> String {
    format!(
        "{LOG_FILE_PREFIX}{session_id}_{}{LOG_FILE_EXTENSION}",
        created_at.format(FILE_STAMP_FORMAT)
    )
}

/// Full path for a session file under `root`.
pub fn log_file_path(root: &Path, session_id: &str, created_at: &DateTime<Local>) -> PathBuf {
    root.join(log_file_name(session_id, created_at))
}

/// Components recovered from a session file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    pub session_id: String,
    pub created_at: NaiveDateTime,
}

/// Parse a session file name. Returns `None` for anything that does not
/// follow the `log_<id>_<YYYYMMDD>_<HHMMSS>.txt` pattern.
pub fn parse_log_file_name(name: &str) -> Option<LogFileName> {
    let stem = name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_EXTENSION)?;

    // "<id>_" plus the stamp
    if stem.len() < FILE_STAMP_LEN + 2 || !stem.is_char_boundary(stem.len() - FILE_STAMP_LEN) {
        return None;
    }
    let (head, stamp) = stem.split_at(stem.len() - FILE_STAMP_LEN);
    let session_id = head.strip_suffix('_')?;
    if session_id.is_empty() {
        return None;
    }

    let created_at = NaiveDateTime::parse_from_str(stamp, FILE_STAMP_FORMAT).ok()?;
    Some(LogFileName {
        session_id: session_id.to_string(),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name("s1", &stamp()), "log_s1_20260314_090507.txt");
    }

    #[test]
    fn test_parse_log_file_name() {
        let parsed = parse_log_file_name("log_session_abc_20260314_090507.txt").unwrap();
        assert_eq!(parsed.session_id, "session_abc");
        assert_eq!(parsed.created_at, stamp().naive_local());
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(parse_log_file_name("notes.txt").is_none());
        assert!(parse_log_file_name("log_s1.txt").is_none());
        assert!(parse_log_file_name("log__20260314_090507.txt").is_none());
        assert!(parse_log_file_name("log_s1_20261399_090507.txt").is_none());
        assert!(parse_log_file_name("log_s1_20260314_090507.log").is_none());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("session_123").is_ok());
        assert!(validate_session_id("análise-1").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("   ").is_err());
        assert!(validate_session_id("../escape").is_err());
        assert!(validate_session_id("a/b").is_err());
        assert!(validate_session_id("a\\b").is_err());
        assert!(validate_session_id("a:b").is_err());
        assert!(validate_session_id("a\nb").is_err());
    }

    #[test]
    fn test_find_marked_ancestor() {
        let start = Path::new("/opt/ARQ-ALPHA-V9/src/services");
        let markers = vec!["arq-alpha".to_string()];
        assert_eq!(
            find_marked_ancestor(start, &markers),
            Some(PathBuf::from("/opt/ARQ-ALPHA-V9"))
        );
        assert_eq!(find_marked_ancestor(start, &[]), None);
        assert_eq!(
            find_marked_ancestor(start, &["missing".to_string()]),
            None
        );
    }

    #[test]
    fn test_resolve_explicit_root() {
        let config = LoggerConfig::default().with_root_dir("/var/log/workflow");
        assert_eq!(
            resolve_root_dir(&config).unwrap(),
            PathBuf::from("/var/log/workflow")
        );
    }
}
