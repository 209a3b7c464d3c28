//! # Rill Owner
//!
//! The per-changefeed owner loop: the elected capture's control plane
//! for one replication job. Three coordinated pieces live here:
//!
//! - [`DdlPuller`] consumes the source's schema-change stream and
//!   exposes a deduplicated FIFO of finished DDL jobs plus a resolved
//!   timestamp.
//! - [`AsyncSink`] serialises checkpoints and DDL events onto the
//!   backend sink from one background worker, so the owner tick never
//!   blocks on downstream I/O.
//! - [`Changefeed`] owns the table set and the barrier queue, and
//!   computes the feed's resolved timestamp. It guarantees that no
//!   event is shipped past an unresolved DDL.
//!
//! Invariant violations inside the controller are bugs in the caller,
//! not runtime conditions, and panic loudly. Runtime failures travel
//! through the [`ErrorReporter`] injected at owner startup.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Checkpoint/DDL serialisation onto the backend sink.
pub mod async_sink;

/// The changefeed controller: table set, barriers, resolved-ts.
pub mod changefeed;

/// The schema-change stream puller.
pub mod ddl_puller;

/// Table-task scheduling contract.
pub mod scheduler;

mod error;

pub use async_sink::AsyncSink;
pub use changefeed::{Barrier, BarrierKind, Changefeed, DdlAction, DdlResult, TableTask};
pub use ddl_puller::DdlPuller;
pub use error::{pause_changefeed, ErrorReporter, OwnerError};
pub use scheduler::{RecordingScheduler, Scheduler};
