//! In-memory commit layer implementing the patch protocol.
//!
//! `MemStore` is the reference semantics for applying a patch batch:
//! read every touched key, run each patch against the freshly-read
//! bytes (later patches in the batch observe earlier patches' writes
//! to the same key), and commit the whole write set atomically. Any
//! patch error aborts the batch with nothing written.
//!
//! A real store adapter adds compare-and-swap on the read revisions
//! and retries the batch from a fresh snapshot on conflict; patch
//! functions are re-applicable for exactly that reason.

use std::collections::HashMap;

use crate::patch::{DataPatch, PatchOutcome};
use crate::CoordError;

/// A revisioned in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemStore {
    data: HashMap<String, Vec<u8>>,
    revision: u64,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Writes a key directly, outside the patch protocol.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
        self.revision += 1;
    }

    /// Deletes a key directly, outside the patch protocol.
    pub fn delete(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.revision += 1;
        }
    }

    /// The store revision, bumped once per committed mutation batch.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Applies a patch batch under the read-apply-commit protocol.
    ///
    /// # Errors
    ///
    /// Propagates the first patch error; the store is left untouched
    /// in that case.
    pub fn apply_patches(&mut self, patches: &[DataPatch]) -> Result<(), CoordError> {
        // Staged writes double as the batch's read-your-writes view.
        let mut staged: HashMap<String, Option<Vec<u8>>> = HashMap::new();
        let mut changed = false;

        for patch in patches {
            let key = patch.key().to_string();
            let current = match staged.get(&key) {
                Some(staged_value) => staged_value.as_deref(),
                None => self.get(&key),
            };
            match patch.apply(current)? {
                PatchOutcome::Unchanged => {}
                PatchOutcome::Update(bytes) => {
                    staged.insert(key, Some(bytes));
                    changed = true;
                }
                PatchOutcome::Delete => {
                    staged.insert(key, None);
                    changed = true;
                }
            }
        }

        if !changed {
            return Ok(());
        }
        for (key, value) in staged {
            match value {
                Some(bytes) => {
                    self.data.insert(key, bytes);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        self.revision += 1;
        Ok(())
    }
}
