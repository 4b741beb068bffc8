//! Log entries - data model, templates and text rendering.
//!
//! # Module Structure
//!
//! - [`types`] - `LogEntry`, `Level`, `ExtraValue` and friends
//! - [`events`] - canonical templates (step, code, API, file, error)
//! - [`format`] - rendering of entries, headers and footers

pub mod events;
pub mod format;
mod types;

pub use format::{format_entry, format_footer, format_header, render_extra};
pub use types::{ExtraMap, ExtraValue, FileOperation, Level, LogEntry, Metadata};
