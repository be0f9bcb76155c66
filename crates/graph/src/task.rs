// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task objects: predecessor/successor edges, states, callbacks.
//!
//! A [`Task`] is a cheap handle (`Arc`-backed, `Clone`) around the shared
//! task state. Dropping every handle to a task that never ran leaks no
//! closure run, only memory — there's no destructor-driven cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pool::ThreadPool;

/// The outcome a task's closure reports when it finishes running.
pub type TaskResult = Result<(), ()>;

/// A task's work. Closures run on a pool worker (or, for predecessor-
/// triggered dispatch with `immediate = true`, inline on the completing
/// predecessor's thread).
pub type TaskClosure = Box<dyn FnOnce() -> TaskResult + Send + 'static>;

type Callback = Box<dyn FnOnce(TaskState) + Send + 'static>;

/// Lifecycle states. Advances only in this order; SUCCEEDED/FAILED are
/// terminal and entered exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    WaitingForStart,
    Running,
    WaitingForComplete,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

struct Edge {
    successor: Task,
    immediate: bool,
}

struct Inner {
    id: odb_core::TaskId,
    pool: Arc<ThreadPool>,
    cancelled: Arc<AtomicBool>,

    state: Mutex<TaskState>,
    closure: Mutex<Option<TaskClosure>>,

    pending_preds: AtomicUsize,
    pred_failed: AtomicBool,
    successors: Mutex<Vec<Edge>>,

    pending_completes: AtomicUsize,
    complete_failed: AtomicBool,
    complete_waiters: Mutex<Vec<Task>>,

    callbacks: Mutex<Vec<Callback>>,
}

/// A handle to a task in the graph. Cheap to clone; all clones refer to
/// the same underlying state.
#[derive(Clone)]
pub struct Task(Arc<Inner>);

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Task {}

impl Task {
    pub fn id(&self) -> odb_core::TaskId {
        self.0.id
    }

    pub fn state(&self) -> TaskState {
        *self.0.state.lock()
    }

    /// `startAfter`: wait on `preds` before becoming eligible to run. If
    /// `immediate` and a predecessor is already terminal (or becomes
    /// terminal later), this task is dispatched inline on the completing
    /// thread rather than resubmitted to the pool.
    ///
    /// Panics if any predecessor is already terminal and adding an edge to
    /// it would be a cycle through an already-finished node — per the
    /// invariant that attempting to add an already-terminal *successor* is
    /// rejected, this task itself must not already be terminal.
    pub fn start_after(&self, preds: &[Task], immediate: bool) {
        let self_state = *self.0.state.lock();
        assert!(
            !self_state.is_terminal(),
            "cannot add a predecessor edge to an already-terminal task"
        );

        for pred in preds {
            let pred_state = *pred.0.state.lock();
            match pred_state {
                TaskState::Succeeded => {}
                TaskState::Failed => {
                    self.0.pred_failed.store(true, Ordering::SeqCst);
                }
                _ => {
                    self.0.pending_preds.fetch_add(1, Ordering::SeqCst);
                    pred.0.successors.lock().push(Edge { successor: self.clone(), immediate });
                }
            }
        }
    }

    /// `completeAfter`: this task does not reach a terminal state until
    /// `others` do. Failure of any of them fails this task too, even if its
    /// own closure succeeded.
    pub fn complete_after(&self, others: &[Task]) {
        for other in others {
            let other_state = *other.0.state.lock();
            match other_state {
                TaskState::Succeeded => {}
                TaskState::Failed => {
                    self.0.complete_failed.store(true, Ordering::SeqCst);
                }
                _ => {
                    self.0.pending_completes.fetch_add(1, Ordering::SeqCst);
                    other.0.complete_waiters.lock().push(self.clone());
                }
            }
        }
    }

    /// Registers a callback fired exactly once, after the terminal
    /// transition, in the order added. If the task is already terminal,
    /// fires immediately.
    pub fn add_callback(&self, cb: impl FnOnce(TaskState) + Send + 'static) {
        let state = *self.0.state.lock();
        if state.is_terminal() {
            cb(state);
        } else {
            self.0.callbacks.lock().push(Box::new(cb));
        }
    }

    /// NEW → WAITING_FOR_START. Dispatches to the pool immediately if every
    /// predecessor is already terminal.
    pub fn start(&self) {
        {
            let mut state = self.0.state.lock();
            assert_eq!(*state, TaskState::New, "start() called twice");
            *state = TaskState::WaitingForStart;
        }
        if self.0.pending_preds.load(Ordering::SeqCst) == 0 {
            self.dispatch(false);
        }
    }

    /// Called by a predecessor (or by `start`) once it is eligible to run.
    /// `inline`: if true and the caller is itself a completing predecessor
    /// with `immediate = true`, runs synchronously; otherwise submits to
    /// the pool.
    fn dispatch(&self, inline: bool) {
        if inline {
            self.run_and_finish();
        } else {
            let this = self.clone();
            self.0.pool.submit(move || this.run_and_finish());
        }
    }

    fn run_and_finish(&self) {
        let cancelled = self.0.cancelled.load(Ordering::SeqCst);
        let pred_failed = self.0.pred_failed.load(Ordering::SeqCst);

        let own_result: TaskResult = if pred_failed || cancelled {
            Err(())
        } else {
            *self.0.state.lock() = TaskState::Running;
            let closure = self.0.closure.lock().take();
            match closure {
                Some(closure) => closure(),
                None => Ok(()),
            }
        };

        if own_result.is_err() {
            self.0.complete_failed.store(true, Ordering::SeqCst);
        }

        if self.0.pending_completes.load(Ordering::SeqCst) == 0 {
            self.finish(own_result);
        } else {
            *self.0.state.lock() = TaskState::WaitingForComplete;
        }
    }

    /// Called when a `completeAfter` dependency terminates, to decrement
    /// this task's outstanding count and possibly finalize it.
    fn notify_complete_after_done(&self, failed: bool) {
        if failed {
            self.0.complete_failed.store(true, Ordering::SeqCst);
        }
        let remaining = self.0.pending_completes.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            let state = *self.0.state.lock();
            if state == TaskState::WaitingForComplete {
                let failed = self.0.complete_failed.load(Ordering::SeqCst);
                self.finish(if failed { Err(()) } else { Ok(()) });
            }
        }
    }

    fn finish(&self, result: TaskResult) {
        let final_state = if result.is_ok() { TaskState::Succeeded } else { TaskState::Failed };
        *self.0.state.lock() = final_state;

        let callbacks = std::mem::take(&mut *self.0.callbacks.lock());
        for cb in callbacks {
            cb(final_state);
        }

        let failed = final_state == TaskState::Failed;
        for edge in std::mem::take(&mut *self.0.successors.lock()) {
            if failed {
                edge.successor.0.pred_failed.store(true, Ordering::SeqCst);
            }
            let remaining =
                edge.successor.0.pending_preds.fetch_sub(1, Ordering::SeqCst) - 1;
            if remaining == 0 {
                let succ_state = *edge.successor.0.state.lock();
                if succ_state == TaskState::WaitingForStart {
                    edge.successor.dispatch(edge.immediate);
                }
            }
        }

        for waiter in std::mem::take(&mut *self.0.complete_waiters.lock()) {
            waiter.notify_complete_after_done(failed);
        }
    }
}

/// Factory for tasks sharing a pool and a cancellation flag.
///
/// The cancellation flag is owned by the engine: once set, every task
/// whose predecessors have all completed (or that has none) short-circuits
/// to FAILED instead of running its closure, without counting against the
/// error budget (the engine is responsible for not counting `Cancelled`
/// diagnostics).
pub struct TaskGraph {
    pool: Arc<ThreadPool>,
    cancelled: Arc<AtomicBool>,
}

impl TaskGraph {
    pub fn new(pool: Arc<ThreadPool>, cancelled: Arc<AtomicBool>) -> Self {
        Self { pool, cancelled }
    }

    /// `create`: a new task in the NEW state. The closure may be omitted
    /// (synchronization-only task).
    pub fn create(&self, closure: Option<TaskClosure>) -> Task {
        Task(Arc::new(Inner {
            id: odb_core::TaskId::new(),
            pool: Arc::clone(&self.pool),
            cancelled: Arc::clone(&self.cancelled),
            state: Mutex::new(TaskState::New),
            closure: Mutex::new(closure),
            pending_preds: AtomicUsize::new(0),
            pred_failed: AtomicBool::new(false),
            successors: Mutex::new(Vec::new()),
            pending_completes: AtomicUsize::new(0),
            complete_failed: AtomicBool::new(false),
            complete_waiters: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
        }))
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
