//! Concurrency-safe registry of busy targets.
//!
//! The registry is the sole enforcement point of the at-most-one-job-per-
//! target invariant: `try_reserve` claims a target atomically through the
//! DashMap entry API before any worker is launched, and `remove` is
//! idempotent so the supervisor's reap and an explicit stop can race on the
//! same target without consequence.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::AbortHandle;

use crate::util::now_ts;

/// Handle to one in-flight load job, attached after the worker is launched.
#[derive(Debug)]
pub struct JobHandle {
    /// Docker exec id of the worker process.
    pub exec_id: String,
    /// Abort handle of the supervising task that waits on the worker.
    pub abort: AbortHandle,
    pub requests: u64,
    pub concurrency: u64,
    /// Wall-clock bound on the wait, in seconds; 0 means unbounded.
    pub deadline_secs: u64,
    pub started_at: u64,
}

/// Registry slot lifecycle: reserved at admission, running once the worker
/// has been launched and its handle attached.
#[derive(Debug)]
pub enum JobSlot {
    Reserved { reserved_at: u64 },
    Running(JobHandle),
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    slots: DashMap<String, JobSlot>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `target` if it has no live job. Returns whether the
    /// reservation succeeded. Concurrent callers racing on the same target
    /// serialize on the map shard lock, so at most one wins.
    pub fn try_reserve(&self, target: &str) -> bool {
        match self.slots.entry(target.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(JobSlot::Reserved {
                    reserved_at: now_ts(),
                });
                true
            }
        }
    }

    /// Attach the real job handle to a previously reserved slot. A no-op
    /// when the slot is already gone: a short-lived worker may finish and
    /// deregister before the supervisor gets here.
    pub fn attach(&self, target: &str, job: JobHandle) {
        if let Some(mut slot) = self.slots.get_mut(target) {
            *slot = JobSlot::Running(job);
        }
    }

    /// Remove the job for `target` if present. Returns whether an entry was
    /// removed; calling again for the same job is a no-op.
    pub fn remove(&self, target: &str) -> bool {
        self.slots.remove(target).is_some()
    }

    /// Exec id of the running worker for `target`, if a handle has been
    /// attached. `None` while the slot is still only reserved.
    pub fn exec_id_of(&self, target: &str) -> Option<String> {
        self.slots.get(target).and_then(|slot| match &*slot {
            JobSlot::Running(job) => Some(job.exec_id.clone()),
            JobSlot::Reserved { .. } => None,
        })
    }

    /// Point-in-time view of the currently busy target names, sorted for
    /// stable status output.
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
