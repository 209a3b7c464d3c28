use crate::{CoordError, DataPatch};

/// In-memory projection of coordination-store keys.
///
/// The commit layer drives `update` for every observed key event and
/// drains `get_patches` after each owner tick. Both are owner-thread
/// only; a reactor state is never shared across tasks.
pub trait ReactorState {
    /// Applies one key event to the projection.
    ///
    /// `value` of `None` means the key was deleted. `is_init` is true
    /// during the initial snapshot replay.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError`] when the key is malformed or its value
    /// cannot be decoded; the projection is left unchanged for that
    /// key.
    fn update(&mut self, key: &str, value: Option<&[u8]>, is_init: bool)
        -> Result<(), CoordError>;

    /// Drains every pending patch accumulated since the last call.
    fn get_patches(&mut self) -> Vec<DataPatch>;
}
