//! # Rill Source
//!
//! The consumed interface to the upstream key-value store's change
//! feed, plus the sort stage that turns per-region disorder into a
//! single commit-ts-ordered stream with resolved markers.
//!
//! The real gRPC client lives outside this workspace; everything here
//! is written against the [`EventFeed`] trait. The [`testing`] module
//! ships a scripted feed for exercising consumers.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Raw feed events and the `EventFeed` trait.
pub mod feed;

/// Resolved-ts frontier across multiple feed spans.
pub mod frontier;

/// Commit-ts sort stage between the feed and its consumer.
pub mod sorter;

/// Key spans.
pub mod span;

/// Scripted feeds for tests.
pub mod testing;

mod error;

pub use error::SourceError;
pub use feed::{EventFeed, OpType, RawKvEntry, RegionFeedEvent};
pub use frontier::ResolvedFrontier;
pub use sorter::run_sorter;
pub use span::Span;
