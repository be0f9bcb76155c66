// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size worker pool with a single shared FIFO ready queue.
//!
//! No work-stealing, no priorities. Workers block on external process I/O
//! routinely, so the pool is sized to tolerate that rather than to
//! saturate CPU.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    ready: Condvar,
    shutdown: AtomicBool,
}

/// A fixed-size pool of worker threads sharing one FIFO ready queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Spawn `workers` threads. `workers` must be at least 1.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let handles = (0..workers)
            .map(|idx| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("odb-worker-{idx}"))
                    .spawn(move || worker_loop(shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { shared, workers: Mutex::new(handles) }
    }

    /// Default pool size: the host's available parallelism, or 1 if it
    /// can't be determined.
    pub fn default_worker_count() -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    /// Submit a job to the FIFO. Legal to call from inside a running job
    /// (it is simply appended to the same queue).
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.queue.lock().push_back(Box::new(job));
        self.shared.ready.notify_one();
    }

    /// Signal shutdown, drain the remaining queue, and join every worker.
    /// Already-queued jobs run to completion; no new jobs may be submitted
    /// after this returns (the pool is still usable for `submit` calls
    /// already in flight, but nothing new will be picked up once drained).
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.ready.notify_all();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    break Some(job);
                }
                if shared.shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                shared.ready.wait(&mut queue);
            }
        };
        match job {
            Some(job) => job(),
            None => return,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
