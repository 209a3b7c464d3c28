//! # Rill Coordination Layer
//!
//! The owner's view of the external coordination store: a structured
//! keyspace, an in-memory reactor state projected from key events, and
//! a patch queue carrying every durable mutation back out.
//!
//! The flow is one-directional in each direction. Store watches drive
//! [`ReactorState::update`]; owner logic mutates nothing directly and
//! instead enqueues [`DataPatch`]es, which a commit layer applies with
//! optimistic read-modify-write. Patch closures are re-applicable by
//! contract: on a compare-and-swap conflict the commit layer re-reads
//! and re-runs them against fresh bytes.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Structured coordination-store keys.
pub mod keyspace;

/// Read-modify-write patches against the store.
pub mod patch;

/// Reactor state: the in-memory projection of store keys.
pub mod state;

/// In-memory commit layer implementing the patch protocol.
pub mod store;

mod error;
mod reactor;

pub use error::CoordError;
pub use keyspace::MetaKey;
pub use patch::{DataPatch, PatchFn, PatchOutcome, SingleDataPatch};
pub use reactor::ReactorState;
pub use state::{ChangefeedReactorState, GlobalReactorState};
pub use store::MemStore;
