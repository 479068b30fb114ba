//! A small fixed-size thread pool that drives channel I/O off the selector
//! thread.
//!
//! Grounded on the teacher's `flume`-channel idiom (`monitor.rs`'s
//! `create_monitor` sender/receiver pair, `actor.rs`'s `cmd_rx`/`event_tx`):
//! here a `flume::unbounded` channel carries boxed jobs instead of typed
//! socket events, since the pool is generic over what the coordinator asks
//! it to run.

use flume::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::trace;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads pulling jobs from a shared queue.
///
/// No ordering is guaranteed across jobs for different channels; the
/// coordinator's own "at most one outstanding read task per channel"
/// invariant is what keeps a single channel's reads ordered, not the pool.
pub struct WorkerPool {
    tx: Sender<Job>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is 0.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        assert!(threads >= 1, "worker pool needs at least one thread");
        let (tx, rx): (Sender<Job>, Receiver<Job>) = flume::unbounded();
        let mut handles = Vec::with_capacity(threads);
        for id in 0..threads {
            let rx = rx.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("reactor-worker-{id}"))
                    .spawn(move || worker_loop(id, &rx))
                    .expect("spawn worker thread"),
            );
        }
        Self { tx, handles }
    }

    /// Submit a job to the pool. Any idle worker thread picks it up.
    ///
    /// Silently dropped if the pool has already been shut down — callers
    /// that care should check `is_closed` first; in practice this only
    /// races during test teardown.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Box::new(job));
    }

    /// Close the job queue and join every worker thread. Already
    /// in-flight jobs run to completion; no new jobs are accepted after
    /// this returns the sender dropped.
    pub fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, rx: &Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        trace!(worker = id, "picked up job");
        job();
    }
    trace!(worker = id, "queue closed, exiting");
}

/// A cheaply cloneable handle to a [`WorkerPool`]'s submit side, for
/// components (the coordinator) that need to hand out submission access
/// without owning pool shutdown.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: Sender<Job>,
}

impl WorkerHandle {
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Box::new(job));
    }
}

impl WorkerPool {
    /// Obtain a cloneable submission handle, decoupled from pool lifetime
    /// management.
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> WorkerHandle {
        WorkerHandle {
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn jobs_run_and_pool_joins_cleanly() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn handle_can_submit_independently_of_pool_owner() {
        let pool = Arc::new(WorkerPool::new(2));
        let handle = pool.handle();
        let counter = Arc::new(AtomicUsize::new(0));
        let c2 = Arc::clone(&counter);
        handle.submit(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        // Give the worker a chance to run before we tear down.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
