//! Tracking of jobs whose executor is currently running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Entry {
    cancel: CancellationToken,
    finished: CancellationToken,
}

/// Handles of one running job.
#[derive(Debug, Clone)]
pub(crate) struct RunningHandle {
    /// Cancels the executor.
    pub cancel: CancellationToken,
    /// Fired once the job has left the running set.
    pub finished: CancellationToken,
}

/// Map from job id to its running handles. Every operation takes the lock
/// once.
#[derive(Debug, Default, Clone)]
pub(crate) struct RunningJobs {
    inner: Arc<Mutex<HashMap<i64, Entry>>>,
}

impl RunningJobs {
    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Entry>> {
        // Entries stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track `job_id` until the returned guard is dropped.
    pub fn register(&self, job_id: i64, cancel: CancellationToken) -> RunningGuard {
        let finished = CancellationToken::new();
        self.lock().insert(
            job_id,
            Entry {
                cancel,
                finished: finished.clone(),
            },
        );
        RunningGuard {
            jobs: self.clone(),
            job_id,
            finished,
        }
    }

    pub fn get(&self, job_id: i64) -> Option<RunningHandle> {
        self.lock().get(&job_id).map(|entry| RunningHandle {
            cancel: entry.cancel.clone(),
            finished: entry.finished.clone(),
        })
    }

    pub fn contains(&self, job_id: i64) -> bool {
        self.lock().contains_key(&job_id)
    }

    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn remove(&self, job_id: i64) {
        self.lock().remove(&job_id);
    }
}

/// Removes its job from [`RunningJobs`] and fires the completion token when
/// dropped, on every exit path of the executor.
#[derive(Debug)]
pub(crate) struct RunningGuard {
    jobs: RunningJobs,
    job_id: i64,
    finished: CancellationToken,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.jobs.remove(self.job_id);
        self.finished.cancel();
    }
}
