//! Voice registry - the only state shared between the control plane and the
//! voice supervisors.
//!
//! Two parallel stores keyed by voice id: parameter records and the most
//! recently rendered buffer. Each write replaces a whole value under the
//! store's lock, so a read issued after a write returns that write (or a later
//! one). Entries are never removed; a stopped voice keeps its record with
//! `loop` set to false.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use super::VoiceId;
use crate::params::ParamRecord;

/// Rendered audio for one voice.
pub type Buffer = Arc<[f32]>;

#[derive(Debug, Default)]
pub struct VoiceRegistry {
    params: RwLock<BTreeMap<VoiceId, ParamRecord>>,
    buffers: RwLock<BTreeMap<VoiceId, Buffer>>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the parameter record for `id`
    pub fn register(&self, id: VoiceId, params: ParamRecord) {
        write(&self.params).insert(id, params);
    }

    /// Store (or replace) the buffer for `id`
    pub fn register_buffer(&self, id: VoiceId, data: impl Into<Buffer>) {
        write(&self.buffers).insert(id, data.into());
    }

    pub fn get(&self, id: VoiceId) -> Option<ParamRecord> {
        read(&self.params).get(&id).cloned()
    }

    pub fn get_buffer(&self, id: VoiceId) -> Option<Buffer> {
        read(&self.buffers).get(&id).cloned()
    }

    /// Read-modify-write the record for `id`.
    ///
    /// The write lock is held for the whole closure, so two updates to the same
    /// voice never lose each other's changes. Returns `false` when `id` has no
    /// record.
    pub fn update<F>(&self, id: VoiceId, mutate: F) -> bool
    where
        F: FnOnce(&mut ParamRecord),
    {
        match write(&self.params).get_mut(&id) {
            Some(record) => {
                mutate(record);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        read(&self.params).contains_key(&id)
    }

    /// Registered ids, ascending
    pub fn ids(&self) -> Vec<VoiceId> {
        read(&self.params).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.params).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Poisoned locks are recovered: every write swaps or mutates a single record.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
