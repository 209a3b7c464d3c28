//! # Rill Sink
//!
//! The backend sink interface the control plane writes to, and the
//! manager that multiplexes many per-table sinks onto one backend
//! while keeping checkpoint accounting conservative.
//!
//! Real message-bus and SQL backends live outside this workspace; the
//! [`blackhole`] backend ships here for wiring and tests.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// The counting no-op backend.
pub mod blackhole;

/// Table-sink multiplexing and flush-watermark accounting.
pub mod manager;

/// Syncpoint stores.
pub mod syncpoint;

mod error;
mod sink;

pub use blackhole::BlackholeSink;
pub use error::SinkError;
pub use manager::{SinkManager, TableSink};
pub use sink::Sink;
pub use syncpoint::{InMemorySyncpointStore, SyncpointStore};
