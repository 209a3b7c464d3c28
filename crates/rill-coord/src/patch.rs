//! Read-modify-write patches against the coordination store.
//!
//! A patch pairs a key with a function over the key's current bytes.
//! The commit layer reads the key, runs the function, and commits the
//! outcome under compare-and-swap; on conflict it re-reads and re-runs.
//! Patch functions therefore must be pure with respect to their input
//! and safe to call more than once.

use std::fmt;

use crate::{CoordError, MetaKey};

/// What a patch function decided about the key's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Leave the value as it is.
    Unchanged,
    /// Replace the value with these bytes.
    Update(Vec<u8>),
    /// Delete the key.
    Delete,
}

/// A re-applicable function from current bytes to a [`PatchOutcome`].
///
/// `None` input means the key is absent.
pub type PatchFn =
    Box<dyn Fn(Option<&[u8]>) -> Result<PatchOutcome, CoordError> + Send + Sync>;

/// A patch against a single key.
pub struct SingleDataPatch {
    /// The key to read, transform, and write.
    pub key: MetaKey,
    /// The transformation.
    pub func: PatchFn,
}

impl SingleDataPatch {
    /// Creates a patch from a key and transformation.
    pub fn new(
        key: MetaKey,
        func: impl Fn(Option<&[u8]>) -> Result<PatchOutcome, CoordError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            func: Box::new(func),
        }
    }

    /// Runs the patch function against the freshly-read value.
    ///
    /// # Errors
    ///
    /// Propagates whatever the patch function raises; the commit layer
    /// aborts the batch on any error.
    pub fn apply(&self, current: Option<&[u8]>) -> Result<PatchOutcome, CoordError> {
        (self.func)(current)
    }
}

impl fmt::Debug for SingleDataPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleDataPatch")
            .field("key", &self.key.to_string())
            .finish_non_exhaustive()
    }
}

/// A pending store mutation carried in reactor patch queues.
///
/// Currently only the single-key form exists; the enum leaves room for
/// multi-key patches without touching queue plumbing.
#[derive(Debug)]
pub enum DataPatch {
    /// A single-key read-modify-write.
    Single(SingleDataPatch),
}

impl DataPatch {
    /// The key this patch touches.
    #[must_use]
    pub fn key(&self) -> &MetaKey {
        match self {
            DataPatch::Single(p) => &p.key,
        }
    }

    /// Applies the patch to the freshly-read value.
    ///
    /// # Errors
    ///
    /// See [`SingleDataPatch::apply`].
    pub fn apply(&self, current: Option<&[u8]>) -> Result<PatchOutcome, CoordError> {
        match self {
            DataPatch::Single(p) => p.apply(current),
        }
    }
}
