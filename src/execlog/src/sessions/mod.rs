//! Session state - registry and snapshot types.
//!
//! # Module Structure
//!
//! - [`types`] - `Session`, `SessionStatus`
//! - [`registry`] - `SessionRegistry`, the id -> session index

mod registry;
mod types;

pub use registry::SessionRegistry;
pub(crate) use registry::Created;
pub(crate) use types::SessionKey;
pub use types::{Session, SessionStatus};
