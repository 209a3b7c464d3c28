//! Reactor state: the owner's in-memory projection of the store.
//!
//! [`GlobalReactorState`] folds the full key stream: owner leases,
//! capture heartbeats, and one [`ChangefeedReactorState`] per observed
//! changefeed. Durable mutations never touch these structs directly;
//! they are expressed as patches and drained through
//! [`ReactorState::get_patches`].
//!
//! Lifecycle: a changefeed projection appears on the first key bearing
//! its id and is dropped once every key is gone, hoisting whatever
//! patches it still holds to the global queue so deletes commit.

use std::collections::hash_map::Entry;
use std::collections::HashSet;

use fxhash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use rill_model::{
    CaptureId, CaptureInfo, ChangeFeedInfo, ChangeFeedStatus, ChangefeedId, TaskPosition,
    TaskStatus, TaskWorkload,
};

use crate::patch::{DataPatch, PatchOutcome, SingleDataPatch};
use crate::reactor::ReactorState;
use crate::{CoordError, MetaKey};

/// Cluster-wide reactor state held by the elected owner.
#[derive(Debug, Default)]
pub struct GlobalReactorState {
    /// Live owner-election lease ids.
    pub owners: HashSet<String>,
    /// Known captures by id.
    pub captures: FxHashMap<CaptureId, CaptureInfo>,
    /// Per-changefeed projections.
    pub changefeeds: FxHashMap<ChangefeedId, ChangefeedReactorState>,
    pending_patches: Vec<DataPatch>,
}

impl GlobalReactorState {
    /// Creates an empty global state, as at owner-election start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a probe that fails the patch batch with
    /// [`CoordError::LeaseExpired`] if the capture's key is absent at
    /// commit time.
    pub fn check_capture_alive(&mut self, capture_id: &CaptureId) {
        let id = capture_id.clone();
        let patch = SingleDataPatch::new(
            MetaKey::Capture {
                capture_id: capture_id.clone(),
            },
            move |value| {
                if value.map_or(true, <[u8]>::is_empty) {
                    Err(CoordError::LeaseExpired(id.clone()))
                } else {
                    Ok(PatchOutcome::Unchanged)
                }
            },
        );
        self.pending_patches.push(DataPatch::Single(patch));
    }
}

impl ReactorState for GlobalReactorState {
    fn update(
        &mut self,
        key: &str,
        value: Option<&[u8]>,
        _is_init: bool,
    ) -> Result<(), CoordError> {
        let parsed = match MetaKey::parse(key) {
            Ok(parsed) => parsed,
            Err(CoordError::UnknownKey(raw)) => {
                tracing::warn!(key = %raw, "ignoring unexpected meta key");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match parsed {
            MetaKey::Owner { lease_id } => {
                if value.is_some() {
                    self.owners.insert(lease_id);
                } else {
                    self.owners.remove(&lease_id);
                }
                Ok(())
            }
            MetaKey::Capture { capture_id } => {
                match value {
                    Some(bytes) => {
                        let info = CaptureInfo::from_json(bytes)?;
                        self.captures.insert(capture_id, info);
                    }
                    None => {
                        self.captures.remove(&capture_id);
                    }
                }
                Ok(())
            }
            ref cf_key => {
                let changefeed_id = cf_key
                    .changefeed_id()
                    .expect("remaining tags all carry a changefeed id")
                    .clone();
                let state = match self.changefeeds.entry(changefeed_id.clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        if value.is_none() {
                            return Ok(());
                        }
                        entry.insert(ChangefeedReactorState::new(changefeed_id.clone()))
                    }
                };
                state.update_key(cf_key, value)?;
                if value.is_none() && !state.exist() {
                    let mut removed = self
                        .changefeeds
                        .remove(&changefeed_id)
                        .expect("present above");
                    self.pending_patches.append(&mut removed.pending_patches);
                }
                Ok(())
            }
        }
    }

    fn get_patches(&mut self) -> Vec<DataPatch> {
        let mut patches = std::mem::take(&mut self.pending_patches);
        for state in self.changefeeds.values_mut() {
            patches.append(&mut state.pending_patches);
        }
        patches
    }
}

/// Projection of one changefeed's store records.
#[derive(Debug)]
pub struct ChangefeedReactorState {
    /// The changefeed every contained record belongs to.
    pub id: ChangefeedId,
    /// Configuration record, if present.
    pub info: Option<ChangeFeedInfo>,
    /// Progress record, if present.
    pub status: Option<ChangeFeedStatus>,
    /// Positions reported per capture.
    pub task_positions: FxHashMap<CaptureId, TaskPosition>,
    /// Table assignments per capture.
    pub task_statuses: FxHashMap<CaptureId, TaskStatus>,
    /// Workload reports per capture.
    pub workloads: FxHashMap<CaptureId, TaskWorkload>,
    pending_patches: Vec<DataPatch>,
}

impl ChangefeedReactorState {
    /// Creates an empty projection for `id`.
    #[must_use]
    pub fn new(id: ChangefeedId) -> Self {
        Self {
            id,
            info: None,
            status: None,
            task_positions: FxHashMap::default(),
            task_statuses: FxHashMap::default(),
            workloads: FxHashMap::default(),
            pending_patches: Vec::new(),
        }
    }

    /// Applies one key event belonging to this changefeed.
    ///
    /// Keys bearing a different changefeed id are ignored; the caller
    /// routes by id but this guard keeps the projection self-contained.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::Decode`] when the value cannot be parsed;
    /// the previous value is left in place.
    pub fn update_key(&mut self, key: &MetaKey, value: Option<&[u8]>) -> Result<(), CoordError> {
        if key.changefeed_id() != Some(&self.id) {
            return Ok(());
        }
        match key {
            MetaKey::ChangefeedInfo { .. } => {
                self.info = match value {
                    Some(bytes) => Some(ChangeFeedInfo::from_json(bytes)?),
                    None => None,
                };
            }
            MetaKey::ChangefeedStatus { .. } => {
                self.status = match value {
                    Some(bytes) => Some(serde_json::from_slice(bytes)?),
                    None => None,
                };
            }
            MetaKey::TaskPosition { capture_id, .. } => {
                Self::update_capture_map(&mut self.task_positions, capture_id, value)?;
            }
            MetaKey::TaskStatus { capture_id, .. } => {
                Self::update_capture_map(&mut self.task_statuses, capture_id, value)?;
            }
            MetaKey::TaskWorkload { capture_id, .. } => {
                Self::update_capture_map(&mut self.workloads, capture_id, value)?;
            }
            MetaKey::Owner { .. } | MetaKey::Capture { .. } => {}
        }
        Ok(())
    }

    fn update_capture_map<T: DeserializeOwned>(
        map: &mut FxHashMap<CaptureId, T>,
        capture_id: &CaptureId,
        value: Option<&[u8]>,
    ) -> Result<(), CoordError> {
        match value {
            Some(bytes) => {
                let decoded = serde_json::from_slice(bytes)?;
                map.insert(capture_id.clone(), decoded);
            }
            None => {
                map.remove(capture_id);
            }
        }
        Ok(())
    }

    /// Whether any record of this changefeed is still present.
    #[must_use]
    pub fn exist(&self) -> bool {
        self.info.is_some()
            || self.status.is_some()
            || !self.task_positions.is_empty()
            || !self.task_statuses.is_empty()
            || !self.workloads.is_empty()
    }

    /// Whether the changefeed is actively hosted on `capture_id`:
    /// info and status present, and the capture holds a task status.
    #[must_use]
    pub fn active(&self, capture_id: &CaptureId) -> bool {
        self.info.is_some() && self.status.is_some() && self.task_statuses.contains_key(capture_id)
    }

    /// Drains this changefeed's pending patches.
    pub fn get_patches(&mut self) -> Vec<DataPatch> {
        std::mem::take(&mut self.pending_patches)
    }

    /// Enqueues a read-modify-write of the info record.
    pub fn patch_info<F>(&mut self, f: F)
    where
        F: Fn(Option<ChangeFeedInfo>) -> Result<(Option<ChangeFeedInfo>, bool), CoordError>
            + Send
            + Sync
            + 'static,
    {
        let key = MetaKey::ChangefeedInfo {
            changefeed_id: self.id.clone(),
        };
        self.push_typed_patch(key, f);
    }

    /// Enqueues a read-modify-write of the status record.
    pub fn patch_status<F>(&mut self, f: F)
    where
        F: Fn(Option<ChangeFeedStatus>) -> Result<(Option<ChangeFeedStatus>, bool), CoordError>
            + Send
            + Sync
            + 'static,
    {
        let key = MetaKey::ChangefeedStatus {
            changefeed_id: self.id.clone(),
        };
        self.push_typed_patch(key, f);
    }

    /// Enqueues a read-modify-write of a capture's position record.
    pub fn patch_task_position<F>(&mut self, capture_id: &CaptureId, f: F)
    where
        F: Fn(Option<TaskPosition>) -> Result<(Option<TaskPosition>, bool), CoordError>
            + Send
            + Sync
            + 'static,
    {
        let key = MetaKey::TaskPosition {
            capture_id: capture_id.clone(),
            changefeed_id: self.id.clone(),
        };
        self.push_typed_patch(key, f);
    }

    /// Enqueues a read-modify-write of a capture's task status record.
    pub fn patch_task_status<F>(&mut self, capture_id: &CaptureId, f: F)
    where
        F: Fn(Option<TaskStatus>) -> Result<(Option<TaskStatus>, bool), CoordError>
            + Send
            + Sync
            + 'static,
    {
        let key = MetaKey::TaskStatus {
            capture_id: capture_id.clone(),
            changefeed_id: self.id.clone(),
        };
        self.push_typed_patch(key, f);
    }

    /// Enqueues a read-modify-write of a capture's workload record.
    pub fn patch_task_workload<F>(&mut self, capture_id: &CaptureId, f: F)
    where
        F: Fn(Option<TaskWorkload>) -> Result<(Option<TaskWorkload>, bool), CoordError>
            + Send
            + Sync
            + 'static,
    {
        let key = MetaKey::TaskWorkload {
            capture_id: capture_id.clone(),
            changefeed_id: self.id.clone(),
        };
        self.push_typed_patch(key, f);
    }

    /// Wraps a typed transformation into a byte-level patch: decode
    /// the on-store JSON (absent stays `None`), run `f`, and re-encode.
    /// `changed == false` keeps the stored bytes; a `None` result
    /// deletes the key.
    fn push_typed_patch<T, F>(&mut self, key: MetaKey, f: F)
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Option<T>) -> Result<(Option<T>, bool), CoordError> + Send + Sync + 'static,
    {
        let patch = SingleDataPatch::new(key, move |current| {
            let decoded = match current {
                Some(bytes) => Some(serde_json::from_slice::<T>(bytes)?),
                None => None,
            };
            let (next, changed) = f(decoded)?;
            if !changed {
                return Ok(PatchOutcome::Unchanged);
            }
            match next {
                Some(v) => Ok(PatchOutcome::Update(serde_json::to_vec(&v)?)),
                None => Ok(PatchOutcome::Delete),
            }
        });
        self.pending_patches.push(DataPatch::Single(patch));
    }
}
