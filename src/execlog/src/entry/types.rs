//! Entry data types.
//!
//! - `Level` - entry severity label
//! - `ExtraValue` / `ExtraMap` - ordered, JSON-serializable extra data
//! - `Metadata` - session metadata fixed at creation
//! - `FileOperation` - file I/O direction for file-processed entries
//! - `LogEntry` - one structured event bound for a session file

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping of extra data. Insertion order is the render order.
pub type ExtraMap = IndexMap<String, ExtraValue>;

/// Session metadata, rendered key-by-key in the header.
pub type Metadata = IndexMap<String, String>;

/// Entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "DEBUG" => Ok(Level::Debug),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// Direction of a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileOperation {
    Read,
    Write,
}

impl FileOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOperation::Read => "READ",
            FileOperation::Write => "WRITE",
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value inside extra data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ExtraValue>),
    Map(ExtraMap),
}

impl ExtraValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ExtraValue::Null)
    }
}

/// Scalars render bare; lists and maps render as compact JSON.
impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraValue::Null => f.write_str("null"),
            ExtraValue::Bool(b) => write!(f, "{b}"),
            ExtraValue::Int(i) => write!(f, "{i}"),
            ExtraValue::Float(x) => write!(f, "{x}"),
            ExtraValue::Text(s) => f.write_str(s),
            ExtraValue::List(_) | ExtraValue::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ExtraValue {
                fn from(value: $ty) -> Self {
                    ExtraValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for ExtraValue {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(ExtraValue::Int)
            .unwrap_or(ExtraValue::Float(value as f64))
    }
}

impl From<u64> for ExtraValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(ExtraValue::Int)
            .unwrap_or(ExtraValue::Float(value as f64))
    }
}

impl From<f32> for ExtraValue {
    fn from(value: f32) -> Self {
        ExtraValue::Float(f64::from(value))
    }
}

impl From<f64> for ExtraValue {
    fn from(value: f64) -> Self {
        ExtraValue::Float(value)
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Text(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Text(value)
    }
}

impl From<&String> for ExtraValue {
    fn from(value: &String) -> Self {
        ExtraValue::Text(value.clone())
    }
}

impl From<ExtraMap> for ExtraValue {
    fn from(value: ExtraMap) -> Self {
        ExtraValue::Map(value)
    }
}

impl<T: Into<ExtraValue>> From<Vec<T>> for ExtraValue {
    fn from(value: Vec<T>) -> Self {
        ExtraValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ExtraValue>> From<Option<T>> for ExtraValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ExtraValue::Null)
    }
}

impl From<serde_json::Value> for ExtraValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ExtraValue::Null,
            Value::Bool(b) => ExtraValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ExtraValue::Int(i),
                None => ExtraValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ExtraValue::Text(s),
            Value::Array(items) => ExtraValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ExtraValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Build an [`ExtraMap`] literal.
///
/// ```
/// use execlog::extra;
///
/// let params = extra! { "query" => "market", "max_results" => 50 };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! extra {
    () => { $crate::ExtraMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ExtraMap::new();
        $( map.insert(::std::string::String::from($key), $crate::ExtraValue::from($value)); )+
        map
    }};
}

/// Build a [`Metadata`] literal.
#[macro_export]
macro_rules! metadata {
    () => { $crate::Metadata::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Metadata::new();
        $( map.insert(::std::string::String::from($key), ::std::string::ToString::to_string(&$value)); )+
        map
    }};
}

/// One structured event bound for a session file.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub component: String,
    /// Prefix placed before the message, e.g. `"🚀 "`.
    pub marker: Option<&'static str>,
    pub message: String,
    pub extra: Option<ExtraMap>,
    /// Verbatim code rendered in a CODE EXECUTED block.
    pub code: Option<String>,
    /// Elapsed time in seconds carried by the event, if any.
    pub elapsed_secs: Option<f64>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        session_id: impl Into<String>,
        level: Level,
        component: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Local::now(),
            level,
            component: component.into(),
            marker: None,
            message: message.into(),
            extra: None,
            code: None,
            elapsed_secs: None,
        }
    }

    pub fn with_marker(mut self, marker: &'static str) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Attach extra data. An empty map is treated as absent.
    pub fn with_extra(mut self, extra: ExtraMap) -> Self {
        self.extra = (!extra.is_empty()).then_some(extra);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_elapsed(mut self, secs: f64) -> Self {
        self.elapsed_secs = Some(secs);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
