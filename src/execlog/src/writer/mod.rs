//! Single-writer pipeline for session files.
//!
//! Every mutating call becomes a [`command::WriteCommand`] on one FIFO queue.
//! One consumer thread owns all file handles and applies the commands in
//! queue order, flushing after each block.
//!
//! # Module Structure
//!
//! - [`command`] - queue messages and the shutdown report
//! - [`consumer`] - the loop that performs the file I/O
//! - [`queue`] - producer handle, supervision and lifecycle

pub(crate) mod command;
mod consumer;
mod queue;

pub use command::ShutdownReport;
pub(crate) use command::WriteCommand;
pub use queue::WriterStats;
pub(crate) use queue::WriterQueue;
