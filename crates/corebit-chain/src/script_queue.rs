//! Script-check queue (§4.6, §5): a small worker pool the connector hands
//! per-input checks to once `connect_block` has already walked the block's
//! other rules under `chain_lock`. [`CheckQueueControl`] is the scoped
//! collector for one block's worth of checks — it fans them out to
//! [`ScriptCheckQueue`]'s workers and joins on `wait()`, returning one
//! pass/fail verdict for the whole batch (§4.6: "a single boolean").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A fixed-size worker pool. Sized once at construction; each batch spins up
/// scoped threads bounded by `workers`, drains the batch, and rejoins —
/// there is no persistent thread pool to keep alive between blocks.
pub struct ScriptCheckQueue {
    workers: usize,
}

impl ScriptCheckQueue {
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1) }
    }

    fn run_all<'env>(&self, checks: Vec<Box<dyn FnOnce() -> bool + Send + 'env>>) -> bool {
        if checks.is_empty() {
            return true;
        }
        let queue = Mutex::new(VecDeque::from(checks));
        let all_ok = AtomicBool::new(true);
        let n = self.workers.min(queue.lock().unwrap().len());
        std::thread::scope(|scope| {
            for _ in 0..n {
                scope.spawn(|| loop {
                    let job = queue.lock().expect("script check queue mutex poisoned").pop_front();
                    let Some(job) = job else { break };
                    if !job() {
                        all_ok.store(false, Ordering::SeqCst);
                    }
                });
            }
        });
        all_ok.load(Ordering::SeqCst)
    }
}

/// One `connect_block`'s worth of deferred script checks. Collected
/// synchronously while the caller still holds `chain_lock`; `wait()` is the
/// join point, run with the lock still held per §5 — script verification
/// happens off-lock inside the worker threads, but the decision to commit
/// or reject the block is made back on the chain-lock-holding thread.
pub struct CheckQueueControl<'q, 'env> {
    queue: &'q ScriptCheckQueue,
    checks: Vec<Box<dyn FnOnce() -> bool + Send + 'env>>,
}

impl<'q, 'env> CheckQueueControl<'q, 'env> {
    pub fn new(queue: &'q ScriptCheckQueue) -> Self {
        Self { queue, checks: Vec::new() }
    }

    pub fn add(&mut self, check: impl FnOnce() -> bool + Send + 'env) {
        self.checks.push(Box::new(check));
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Hands every collected check to the worker pool and blocks until all
    /// have run. A consuming method rather than a `Drop` impl, since the
    /// whole point is to hand back a verdict — `Drop` can't return one.
    pub fn wait(self) -> bool {
        self.queue.run_all(self.checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_checks_passing_reports_true() {
        let queue = ScriptCheckQueue::new(4);
        let mut control = CheckQueueControl::new(&queue);
        for _ in 0..50 {
            control.add(|| true);
        }
        assert!(control.wait());
    }

    #[test]
    fn a_single_failure_fails_the_whole_batch() {
        let queue = ScriptCheckQueue::new(4);
        let mut control = CheckQueueControl::new(&queue);
        for i in 0..20 {
            control.add(move || i != 7);
        }
        assert!(!control.wait());
    }

    #[test]
    fn empty_batch_is_vacuously_ok() {
        let queue = ScriptCheckQueue::new(2);
        let control = CheckQueueControl::new(&queue);
        assert!(control.is_empty());
        assert!(control.wait());
    }

    #[test]
    fn single_worker_still_drains_the_whole_queue() {
        let queue = ScriptCheckQueue::new(1);
        let mut control = CheckQueueControl::new(&queue);
        for _ in 0..10 {
            control.add(|| true);
        }
        assert!(control.wait());
    }
}
