//! Worker abstraction
//!
//! A worker is bound to one input queue and one output queue. Once started it
//! pops items until the input reads empty, handing each one to
//! [`Worker::process`], which decides what (if anything) to push onto the
//! output queue.
//!
//! A worker never waits for more input. The first time `try_pop` comes back
//! empty the worker is finished for good, so the input queue has to be fully
//! populated before any worker starts. [`Pool`](crate::pool::Pool) does this
//! for you.

use crate::error::{Error, Result};
use crate::queue::Queue;
use crossbeam::thread::{Scope, ScopedJoinHandle};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a worker
pub type WorkerId = u64;

/// Global worker ID counter
static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_worker_id() -> WorkerId {
    WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Worker thread configuration
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Worker name (for logs and thread names)
    pub name: Option<String>,

    /// CPU core to pin this worker to (None = no pinning)
    pub cpu_affinity: Option<usize>,

    /// Stack size for worker thread (None = default)
    pub stack_size: Option<usize>,
}

impl WorkerConfig {
    /// Create a new worker configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set CPU affinity
    pub fn with_cpu_affinity(mut self, cpu: usize) -> Self {
        self.cpu_affinity = Some(cpu);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

/// Worker lifecycle state
///
/// Only the part of the lifecycle a [`BoundWorker`] sees itself. Being
/// started and joined belong to the pool: spawning the thread is the start,
/// and the [`WorkerReport`] handed back by the join is the record of a joined
/// worker. Pool-run workers are moved onto their threads, so their state is
/// observable only when driving [`BoundWorker::run`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum WorkerState {
    /// Bound to its queues, not yet running
    Created,

    /// Draining the input queue
    Running,

    /// Observed the input queue empty
    Finished,
}

/// Trait for concrete worker kinds
///
/// `process` receives one item and the shared output queue. It may push any
/// number of results. Returning an error (or panicking) drops the item: the
/// failure is recorded in the worker's [`WorkerReport`] and the worker moves
/// on to the next item.
///
/// The output queue handle can be cloned or lent to a nested pool, which is
/// how two-level fan-outs deposit everything into one collection.
pub trait Worker: Send {
    /// Input item type
    type Item: Send;

    /// Result type pushed to the output queue
    type Output: Send;

    /// Handle one item
    fn process(&mut self, item: Self::Item, output: &Queue<Self::Output>) -> Result<()>;
}

/// Worker built from a plain transformation closure
///
/// Pushes exactly one result per successful call. Errors are converted with
/// their `Display` output.
pub struct FnWorker<F, I, R, E> {
    f: F,
    _marker: PhantomData<fn(I) -> std::result::Result<R, E>>,
}

impl<F, I, R, E> FnWorker<F, I, R, E>
where
    F: FnMut(I) -> std::result::Result<R, E>,
{
    /// Wrap a transformation
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, I, R, E> Worker for FnWorker<F, I, R, E>
where
    F: FnMut(I) -> std::result::Result<R, E> + Send,
    I: Send,
    R: Send,
    E: fmt::Display,
{
    type Item = I;
    type Output = R;

    fn process(&mut self, item: I, output: &Queue<R>) -> Result<()> {
        let result = (self.f)(item).map_err(Error::transform)?;
        output.push(result);
        Ok(())
    }
}

/// One dropped item
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Failure {
    /// Worker that was handling the item
    pub worker: WorkerId,

    /// What went wrong
    pub error: Error,
}

impl Failure {
    /// Create a failure record
    pub fn new(worker: WorkerId, error: Error) -> Self {
        Self { worker, error }
    }
}

/// What one worker did before it finished
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct WorkerReport {
    /// Worker ID
    pub id: WorkerId,

    /// Worker name, if any
    pub name: Option<String>,

    /// Items processed successfully
    pub processed: usize,

    /// Items dropped
    pub failures: Vec<Failure>,
}

impl WorkerReport {
    fn new(id: WorkerId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            processed: 0,
            failures: Vec::new(),
        }
    }

    /// Number of items dropped
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// A worker bound to its input and output queues
pub struct BoundWorker<'q, W: Worker> {
    id: WorkerId,
    name: Option<String>,
    worker: W,
    input: &'q Queue<W::Item>,
    output: &'q Queue<W::Output>,
    state: WorkerState,
}

impl<'q, W: Worker> BoundWorker<'q, W> {
    /// Bind `worker` to a pair of queues
    pub fn new(worker: W, input: &'q Queue<W::Item>, output: &'q Queue<W::Output>) -> Self {
        Self {
            id: next_worker_id(),
            name: None,
            worker,
            input,
            output,
            state: WorkerState::Created,
        }
    }

    /// Set the worker name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Get the worker ID
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Get the worker name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// The input queue this worker drains
    pub fn input(&self) -> &Queue<W::Item> {
        self.input
    }

    /// The output queue this worker fills
    pub fn output(&self) -> &Queue<W::Output> {
        self.output
    }

    /// Drain the input queue on the current thread
    ///
    /// Returns as soon as the input reads empty. Items pushed after that
    /// point are left for someone else.
    pub fn run(&mut self) -> WorkerReport {
        self.state = WorkerState::Running;
        debug!(worker = self.id, name = ?self.name, "worker started");

        let mut report = WorkerReport::new(self.id, self.name.clone());

        while let Some(item) = self.input.try_pop() {
            let worker = &mut self.worker;
            let output = self.output;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.process(item, output)));

            let error = match outcome {
                Ok(Ok(())) => {
                    report.processed += 1;
                    continue;
                }
                Ok(Err(err)) => err,
                Err(payload) => Error::from_panic(payload),
            };

            warn!(worker = self.id, error = %error, "item dropped");
            report.failures.push(Failure::new(self.id, error));
        }

        self.state = WorkerState::Finished;
        debug!(
            worker = self.id,
            processed = report.processed,
            failed = report.failed(),
            "input exhausted, worker finished"
        );

        report
    }
}

/// Start a bound worker on its own scoped thread
pub(crate) fn spawn_scoped<'scope, 'env, W>(
    scope: &'scope Scope<'env>,
    mut bound: BoundWorker<'env, W>,
    config: &WorkerConfig,
) -> Result<ScopedJoinHandle<'scope, WorkerReport>>
where
    W: Worker + 'env,
{
    let id = bound.id();
    let mut builder = scope.builder();

    if let Some(name) = &config.name {
        builder = builder.name(format!("worker-{}-{}", id, name));
    } else {
        builder = builder.name(format!("worker-{}", id));
    }

    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let cpu_affinity = config.cpu_affinity;

    builder
        .spawn(move |_| {
            if let Some(cpu) = cpu_affinity {
                if let Some(core_ids) = core_affinity::get_core_ids() {
                    if cpu < core_ids.len() {
                        core_affinity::set_for_current(core_ids[cpu]);
                    }
                }
            }

            bound.run()
        })
        .map_err(|e| Error::Spawn(e.to_string()))
}
