use crate::errors::{JobError, Result};
use crate::handle::JobHandle;
use crate::types::JobId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe map of every job the supervisor knows about.
///
/// The lock is only held for the map operation itself. Handles are shared out as `Arc`s, so a
/// slow poller never holds up registration or other lookups.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobHandle>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // a panic elsewhere can't leave the map half-updated, so a poisoned lock is still usable
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobHandle>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, handle: Arc<JobHandle>) -> Result<()> {
        let mut jobs = self.jobs();
        let id = handle.id();
        if jobs.contains_key(&id) {
            return Err(JobError::DuplicateIdentifier(id));
        }
        jobs.insert(id, handle);
        Ok(())
    }

    pub fn lookup(&self, id: JobId) -> Result<Arc<JobHandle>> {
        self.jobs().get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    pub fn remove(&self, id: JobId) -> Result<Arc<JobHandle>> {
        self.jobs().remove(&id).ok_or(JobError::NotFound(id))
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self.jobs().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
