//! Fixed-size worker pools
//!
//! A [`Pool`] runs one batch at a time: it fills a private input queue,
//! spawns exactly `concurrency` workers on scoped threads, joins them all and
//! then hands back whatever landed in the output queue.
//!
//! Results come back in no particular order. If the caller needs to match
//! results to inputs, the transformation has to carry a key in its result.
//!
//! [`Pool::run_into`] writes into a caller-owned output queue instead of a
//! fresh one and leaves it undrained. That is the building block for nested
//! pools: an outer worker runs an inner batch into the queue its own pool
//! handed it.

use crate::error::{Error, Result};
use crate::queue::Queue;
use crate::worker::{spawn_scoped, BoundWorker, Failure, FnWorker, Worker, WorkerConfig, WorkerReport};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers started per batch
    pub concurrency: usize,

    /// Configuration template for workers
    pub worker_config: WorkerConfig,

    /// Whether to enable CPU affinity pinning
    pub enable_cpu_affinity: bool,

    /// Label used in logs and default worker names
    pub label: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            worker_config: WorkerConfig::default(),
            enable_cpu_affinity: false,
            label: None,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the worker configuration template
    pub fn with_worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker_config = config;
        self
    }

    /// Enable CPU affinity pinning
    pub fn with_cpu_affinity(mut self, enable: bool) -> Self {
        self.enable_cpu_affinity = enable;
        self
    }

    /// Set the pool label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check the configuration before any work is queued
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("pool")
    }
}

/// Outcome of one batch, minus the results themselves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// One report per worker that ran to completion
    pub workers: Vec<WorkerReport>,

    /// Every dropped item, plus any worker thread that died outside `process`
    pub failures: Vec<Failure>,

    /// Wall-clock time from first spawn to last join
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, report: WorkerReport) {
        self.failures.extend(report.failures.iter().cloned());
        self.workers.push(report);
    }

    /// Items processed successfully across all workers
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed).sum()
    }

    /// Number of recorded failures
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether the batch ran without a single failure
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} failed by {} workers in {:.3}s",
            self.processed(),
            self.failed(),
            self.workers.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Results of a flat batch together with its summary
#[derive(Debug)]
pub struct PoolOutcome<R> {
    /// Drained output queue, in pop order
    pub results: Vec<R>,

    /// Per-worker reports and failures
    pub summary: RunSummary,
}

/// A fixed-size pool of workers draining one shared input queue
#[derive(Debug, Clone, Default)]
pub struct Pool {
    config: PoolConfig,
}

impl Pool {
    /// Create a pool from a configuration
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Create a pool with the default configuration and `concurrency` workers
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self::new(PoolConfig::new().with_concurrency(concurrency))
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Run one batch into a fresh output queue and drain it
    ///
    /// `factory` is called once per worker with the worker index.
    ///
    /// If a worker thread cannot be spawned, the workers already started are
    /// joined and `Error::Spawn` is returned. Whatever those workers pushed is
    /// discarded with the private output queue; use [`Pool::run_into`] to keep
    /// partial results.
    pub fn run<W, F, It>(&self, items: It, factory: F) -> Result<PoolOutcome<W::Output>>
    where
        W: Worker,
        F: FnMut(usize) -> W,
        It: IntoIterator<Item = W::Item>,
    {
        let output = Queue::new();
        let summary = self.run_into(items, factory, &output)?;
        Ok(PoolOutcome {
            results: output.drain_all(),
            summary,
        })
    }

    /// Run one batch into a caller-owned output queue
    ///
    /// The output queue is not drained, so several batches (or nested
    /// batches started from inside workers) can accumulate into it.
    ///
    /// On `Error::Spawn` the workers already started have been joined and
    /// their results stay in `output`, even though the batch as a whole is
    /// reported as failed.
    pub fn run_into<W, F, It>(
        &self,
        items: It,
        factory: F,
        output: &Queue<W::Output>,
    ) -> Result<RunSummary>
    where
        W: Worker,
        F: FnMut(usize) -> W,
        It: IntoIterator<Item = W::Item>,
    {
        self.config.validate()?;

        // Fully populated before the first worker starts.
        let input: Queue<W::Item> = items.into_iter().collect();

        self.run_workers(&input, output, factory)
    }

    fn run_workers<W, F>(
        &self,
        input: &Queue<W::Item>,
        output: &Queue<W::Output>,
        mut factory: F,
    ) -> Result<RunSummary>
    where
        W: Worker,
        F: FnMut(usize) -> W,
    {
        let label = self.config.label();
        let concurrency = self.config.concurrency;
        let started = Instant::now();

        info!(pool = label, items = input.len(), concurrency, "starting batch");

        let joined = crossbeam::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(concurrency);
            let mut spawn_error = None;

            for index in 0..concurrency {
                let mut worker_config = self.config.worker_config.clone();

                if self.config.enable_cpu_affinity {
                    worker_config.cpu_affinity = Some(index % num_cpus::get());
                }

                let name = worker_config
                    .name
                    .get_or_insert_with(|| format!("{}-{}", label, index))
                    .clone();

                let bound = BoundWorker::new(factory(index), input, output).with_name(name);
                let id = bound.id();

                match spawn_scoped(scope, bound, &worker_config) {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            let mut summary = RunSummary::default();

            for (id, handle) in handles {
                match handle.join() {
                    Ok(report) => summary.record(report),
                    Err(payload) => {
                        let error = Error::from_panic(payload);
                        warn!(pool = label, worker = id, error = %error, "worker thread died");
                        summary.failures.push(Failure::new(id, error));
                    }
                }
            }

            summary.elapsed = started.elapsed();

            match spawn_error {
                Some(e) => Err(e),
                None => Ok(summary),
            }
        });

        let summary = joined.map_err(Error::from_panic)??;

        info!(
            pool = label,
            processed = summary.processed(),
            failed = summary.failed(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch complete"
        );

        Ok(summary)
    }
}

/// Process every item with `concurrency` workers made by `factory`
///
/// Returns the drained results in no particular order. Items whose
/// processing failed are missing from the result.
pub fn run_pool<W, F, It>(items: It, factory: F, concurrency: usize) -> Result<Vec<W::Output>>
where
    W: Worker,
    F: FnMut(usize) -> W,
    It: IntoIterator<Item = W::Item>,
{
    Pool::with_concurrency(concurrency)
        .run(items, factory)
        .map(|outcome| outcome.results)
}

/// Run a batch whose workers all push into an existing output queue
///
/// Meant to be called from inside [`Worker::process`] with the output queue
/// the outer pool supplied. Blocks until every nested worker has joined.
pub fn run_nested<W, F, It>(
    items: It,
    factory: F,
    concurrency: usize,
    output: &Queue<W::Output>,
) -> Result<RunSummary>
where
    W: Worker,
    F: FnMut(usize) -> W,
    It: IntoIterator<Item = W::Item>,
{
    let config = PoolConfig::new()
        .with_concurrency(concurrency)
        .with_label("nested");
    Pool::new(config).run_into(items, factory, output)
}

/// Apply `f` to every item on `concurrency` threads
pub fn map_concurrent<I, R, E, F, It>(items: It, f: F, concurrency: usize) -> Result<Vec<R>>
where
    I: Send,
    R: Send,
    E: fmt::Display,
    F: Fn(I) -> std::result::Result<R, E> + Sync,
    It: IntoIterator<Item = I>,
{
    run_pool(items, |_| FnWorker::new(&f), concurrency)
}
