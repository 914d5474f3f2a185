#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-threaded cooperative task scheduler advanced once per frame.
//!
//! Tasks are state-holding objects polled by [`Scheduler::tick`] in
//! registration order. A task suspends by returning [`Progress::Pending`] and
//! is polled again on the next tick; nothing blocks and no task runs inline at
//! registration time. Every task receives a [`TaskContext`] giving it mutable
//! access to the shared state `C` and the ability to register or cancel
//! further tasks.

use std::{collections::BTreeSet, fmt, time::Duration};

use thiserror::Error;
use tracing::{trace, warn};

/// Stable identifier of a scheduled task.
///
/// Handles are allocated monotonically and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Result of polling a task once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Poll again on the next tick.
    Pending,
    /// The task finished and is deregistered.
    Complete,
}

impl Progress {
    /// Maps a completion predicate onto progress.
    #[must_use]
    pub const fn from_done(done: bool) -> Self {
        if done {
            Self::Complete
        } else {
            Self::Pending
        }
    }
}

/// Failure raised by a task while it was polled.
///
/// A faulted task is deregistered and never retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskFault {
    message: String,
}

impl TaskFault {
    /// Creates a fault carrying a human readable description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the fault.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Timing of the tick currently being executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    dt: Duration,
    index: u64,
}

impl Frame {
    /// Time elapsed since the previous tick.
    #[must_use]
    pub const fn dt(&self) -> Duration {
        self.dt
    }

    /// Zero-based index of the tick.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }
}

/// Unit of cooperative work polled once per tick.
pub trait Task<C> {
    /// Advances the task by one tick.
    fn poll(&mut self, cx: &mut TaskContext<'_, C>) -> Result<Progress, TaskFault>;
}

struct PredicateTask<F>(F);

impl<C, F> Task<C> for PredicateTask<F>
where
    F: FnMut(&mut TaskContext<'_, C>) -> bool,
{
    fn poll(&mut self, cx: &mut TaskContext<'_, C>) -> Result<Progress, TaskFault> {
        Ok(Progress::from_done((self.0)(cx)))
    }
}

/// Waits until the accumulated frame time reaches a threshold, then runs an action once.
pub struct Delay<F> {
    threshold: Duration,
    elapsed: Duration,
    action: Option<F>,
}

impl<F> Delay<F> {
    /// Creates a delay that fires `action` once `threshold` has elapsed.
    #[must_use]
    pub fn new(threshold: Duration, action: F) -> Self {
        Self {
            threshold,
            elapsed: Duration::ZERO,
            action: Some(action),
        }
    }
}

impl<F> fmt::Debug for Delay<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delay")
            .field("threshold", &self.threshold)
            .field("elapsed", &self.elapsed)
            .field("fired", &self.action.is_none())
            .finish()
    }
}

impl<C, F> Task<C> for Delay<F>
where
    F: FnOnce(&mut TaskContext<'_, C>),
{
    fn poll(&mut self, cx: &mut TaskContext<'_, C>) -> Result<Progress, TaskFault> {
        self.elapsed = self.elapsed.saturating_add(cx.frame().dt());
        if self.elapsed < self.threshold {
            return Ok(Progress::Pending);
        }
        if let Some(action) = self.action.take() {
            action(cx);
        }
        Ok(Progress::Complete)
    }
}

struct Entry<C> {
    handle: TaskHandle,
    task: Box<dyn Task<C>>,
}

struct Registrar<C> {
    next_handle: u64,
    live: BTreeSet<TaskHandle>,
    spawned: Vec<Entry<C>>,
}

impl<C> Registrar<C> {
    fn new() -> Self {
        Self {
            next_handle: 0,
            live: BTreeSet::new(),
            spawned: Vec::new(),
        }
    }

    fn register(&mut self, task: Box<dyn Task<C>>) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        let _ = self.live.insert(handle);
        self.spawned.push(Entry { handle, task });
        trace!(%handle, "task registered");
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        if !self.live.remove(&handle) {
            return false;
        }
        self.spawned.retain(|entry| entry.handle != handle);
        trace!(%handle, "task cancelled");
        true
    }
}

/// View handed to a task while it is polled.
pub struct TaskContext<'a, C> {
    state: &'a mut C,
    frame: Frame,
    handle: TaskHandle,
    registrar: &'a mut Registrar<C>,
}

impl<C> TaskContext<'_, C> {
    /// Shared state the scheduler was ticked with.
    #[must_use]
    pub fn state(&self) -> &C {
        &*self.state
    }

    /// Mutable access to the shared state.
    pub fn state_mut(&mut self) -> &mut C {
        &mut *self.state
    }

    /// Timing of the current tick.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Handle of the task being polled.
    #[must_use]
    pub const fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Registers a predicate task; it is first polled on the next tick.
    pub fn schedule<F>(&mut self, predicate: F) -> TaskHandle
    where
        F: FnMut(&mut TaskContext<'_, C>) -> bool + 'static,
    {
        self.registrar.register(Box::new(PredicateTask(predicate)))
    }

    /// Registers a task object; it is first polled on the next tick.
    pub fn schedule_task(&mut self, task: Box<dyn Task<C>>) -> TaskHandle {
        self.registrar.register(task)
    }

    /// Registers a [`Delay`] task.
    pub fn delay<F>(&mut self, threshold: Duration, action: F) -> TaskHandle
    where
        F: FnOnce(&mut TaskContext<'_, C>) + 'static,
    {
        self.registrar.register(Box::new(Delay::new(threshold, action)))
    }

    /// Cancels a task; tasks later in the current tick are no longer polled.
    ///
    /// Returns `false` without effect when the handle is unknown or finished.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.registrar.cancel(handle)
    }
}

/// Tasks that finished during one tick.
#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    /// Tasks that completed, in polling order.
    pub completed: Vec<TaskHandle>,
    /// Tasks that faulted, in polling order, with their faults.
    pub faulted: Vec<(TaskHandle, TaskFault)>,
}

/// Registry of cooperative tasks polled against shared state `C`.
pub struct Scheduler<C> {
    tasks: Vec<Entry<C>>,
    registrar: Registrar<C>,
    ticks: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.registrar.live)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl<C> Scheduler<C> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            registrar: Registrar::new(),
            ticks: 0,
        }
    }

    /// Registers a predicate polled every tick until it returns `true`.
    ///
    /// The predicate is not invoked before the next call to [`Scheduler::tick`].
    pub fn schedule<F>(&mut self, predicate: F) -> TaskHandle
    where
        F: FnMut(&mut TaskContext<'_, C>) -> bool + 'static,
    {
        self.registrar.register(Box::new(PredicateTask(predicate)))
    }

    /// Registers a task object.
    pub fn schedule_task(&mut self, task: Box<dyn Task<C>>) -> TaskHandle {
        self.registrar.register(task)
    }

    /// Registers a [`Delay`] task.
    pub fn delay<F>(&mut self, threshold: Duration, action: F) -> TaskHandle
    where
        F: FnOnce(&mut TaskContext<'_, C>) + 'static,
    {
        self.registrar.register(Box::new(Delay::new(threshold, action)))
    }

    /// Stops a task before its next poll.
    ///
    /// Returns `false` without effect when the handle is unknown or finished.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        if !self.registrar.cancel(handle) {
            return false;
        }
        self.tasks.retain(|entry| entry.handle != handle);
        true
    }

    /// Cancels every pending task, returning how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.registrar.live.len();
        self.registrar.live.clear();
        self.registrar.spawned.clear();
        self.tasks.clear();
        dropped
    }

    /// Reports whether the handle refers to a task that is still registered.
    #[must_use]
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.registrar.live.contains(&handle)
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrar.live.len()
    }

    /// Reports whether no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrar.live.is_empty()
    }

    /// Number of ticks executed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Polls every pending task once, in registration order.
    pub fn tick(&mut self, dt: Duration, state: &mut C) -> TickReport {
        let frame = Frame {
            dt,
            index: self.ticks,
        };
        self.ticks += 1;

        let Self {
            tasks, registrar, ..
        } = self;
        tasks.append(&mut registrar.spawned);

        let mut report = TickReport::default();
        for entry in tasks.iter_mut() {
            let handle = entry.handle;
            if !registrar.live.contains(&handle) {
                continue;
            }

            let mut cx = TaskContext {
                state: &mut *state,
                frame,
                handle,
                registrar: &mut *registrar,
            };
            match entry.task.poll(&mut cx) {
                Ok(Progress::Pending) => {}
                Ok(Progress::Complete) => {
                    if registrar.live.remove(&handle) {
                        report.completed.push(handle);
                    }
                }
                Err(fault) => {
                    let _ = registrar.live.remove(&handle);
                    warn!(%handle, %fault, "task faulted");
                    report.faulted.push((handle, fault));
                }
            }
        }
        tasks.retain(|entry| registrar.live.contains(&entry.handle));

        trace!(
            tick = frame.index,
            pending = registrar.live.len(),
            completed = report.completed.len(),
            "scheduler ticked"
        );
        report
    }
}
