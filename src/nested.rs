//! Two-level fan-out
//!
//! [`FanOut`] is an outer worker kind. For every outer item it derives a list
//! of inner items, runs them through a nested pool, and lets the inner
//! workers push straight into the outer pool's output queue. The outer pool
//! sees the worker as busy until the nested join returns, and the caller gets
//! one flat result collection without a merge step.
//!
//! ```text
//!   outer pool (M workers)          output queue
//!   ┌──────────┐  expand   ┌────────────────┐
//!   │ FanOut 1 │ ────────> │ inner pool (K) │ ──┐
//!   └──────────┘           └────────────────┘   │
//!   ┌──────────┐  expand   ┌────────────────┐   ├──> Queue<R>
//!   │ FanOut 2 │ ────────> │ inner pool (K) │ ──┘
//!   └──────────┘           └────────────────┘
//! ```
//!
//! Up to M×K threads run at peak.

use crate::error::{Error, Result};
use crate::pool::{Pool, PoolConfig};
use crate::queue::Queue;
use crate::worker::Worker;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Outer worker that expands each item into a nested batch
///
/// * `expand` turns one outer item into the inner items.
/// * `make_inner` builds inner workers, called with the inner worker index.
/// * `inner` configures every nested pool.
///
/// If some inner items fail, their siblings' results stay in the output
/// queue and the outer item is reported as failed with a count of the
/// dropped inner items.
pub struct FanOut<I, X, E, F> {
    expand: E,
    make_inner: F,
    pool: Pool,
    _marker: PhantomData<fn(I) -> X>,
}

impl<I, X, E, F, W> FanOut<I, X, E, F>
where
    E: FnMut(I) -> std::result::Result<Vec<W::Item>, X>,
    F: FnMut(usize) -> W,
    W: Worker,
{
    /// Create a fan-out worker
    pub fn new(expand: E, make_inner: F, inner: PoolConfig) -> Self {
        Self {
            expand,
            make_inner,
            pool: Pool::new(inner),
            _marker: PhantomData,
        }
    }
}

impl<I, X, E, F> FanOut<I, X, E, F> {
    /// Configuration used for the nested pools
    pub fn inner_config(&self) -> &PoolConfig {
        self.pool.config()
    }
}

impl<I, X, E, F, W> Worker for FanOut<I, X, E, F>
where
    I: Send,
    X: fmt::Display,
    E: FnMut(I) -> std::result::Result<Vec<W::Item>, X> + Send,
    F: FnMut(usize) -> W + Send,
    W: Worker,
{
    type Item = I;
    type Output = W::Output;

    fn process(&mut self, item: I, output: &Queue<W::Output>) -> Result<()> {
        let inner = (self.expand)(item).map_err(Error::transform)?;
        let total = inner.len();

        let summary = self.pool.run_into(inner, &mut self.make_inner, output)?;

        debug!(inner_items = total, summary = %summary, "nested batch joined");

        if !summary.is_clean() {
            return Err(Error::Other(format!(
                "{} of {} nested items failed",
                summary.failed(),
                total
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::run_pool;
    use crate::worker::{FnWorker, WorkerConfig};

    type Pair = (u32, u32);

    fn lecture_worker() -> FnWorker<impl FnMut(Pair) -> std::result::Result<String, String>, Pair, String, String> {
        FnWorker::new(|(course, lecture): Pair| {
            if lecture == 99 {
                return Err(format!("lecture {} of course {} has no audio column", lecture, course));
            }
            Ok(format!("c{}-l{}", course, lecture))
        })
    }

    #[test]
    fn test_fan_out_flattens() {
        let results = run_pool(
            vec![1u32, 2, 3],
            |_| {
                FanOut::new(
                    |course: u32| -> std::result::Result<Vec<Pair>, String> {
                        Ok((0..4).map(|l| (course, l)).collect())
                    },
                    |_| lecture_worker(),
                    PoolConfig::new().with_concurrency(2),
                )
            },
            2,
        )
        .unwrap();

        assert_eq!(results.len(), 12);
        assert!(results.contains(&"c3-l2".to_string()));
    }

    #[test]
    fn test_inner_failure_keeps_siblings() {
        let outcome = Pool::with_concurrency(2)
            .run(vec![7u32], |_| {
                FanOut::new(
                    |course: u32| -> std::result::Result<Vec<Pair>, String> {
                        Ok(vec![(course, 1), (course, 99), (course, 2)])
                    },
                    |_| lecture_worker(),
                    PoolConfig::new().with_concurrency(3),
                )
            })
            .unwrap();

        let mut results = outcome.results;
        results.sort();
        assert_eq!(results, vec!["c7-l1".to_string(), "c7-l2".to_string()]);
        assert_eq!(outcome.summary.failed(), 1);
        assert_eq!(
            outcome.summary.failures[0].error,
            Error::Other("1 of 3 nested items failed".to_string())
        );
    }

    #[test]
    fn test_expand_failure_drops_outer_item() {
        let outcome = Pool::with_concurrency(1)
            .run(vec![1u32, 0], |_| {
                FanOut::new(
                    |course: u32| -> std::result::Result<Vec<Pair>, String> {
                        if course == 0 {
                            return Err("missing sessions table".to_string());
                        }
                        Ok(vec![(course, 1)])
                    },
                    |_| lecture_worker(),
                    PoolConfig::new().with_concurrency(1),
                )
            })
            .unwrap();

        assert_eq!(outcome.results, vec!["c1-l1".to_string()]);
        assert_eq!(
            outcome.summary.failures[0].error,
            Error::Transform("missing sessions table".to_string())
        );
    }

    #[test]
    fn test_invalid_inner_config_fails_outer_item() {
        let outcome = Pool::with_concurrency(1)
            .run(vec![1u32], |_| {
                FanOut::new(
                    |course: u32| -> std::result::Result<Vec<Pair>, String> { Ok(vec![(course, 1)]) },
                    |_| lecture_worker(),
                    PoolConfig::new().with_concurrency(0),
                )
            })
            .unwrap();

        assert!(outcome.results.is_empty());
        assert!(matches!(
            outcome.summary.failures[0].error,
            Error::InvalidConfig(_)
        ));
    }

    #[test]
    fn test_inner_spawn_failure_fails_outer_item() {
        let outcome = Pool::with_concurrency(1)
            .run(vec![1u32], |_| {
                FanOut::new(
                    |course: u32| -> std::result::Result<Vec<Pair>, String> { Ok(vec![(course, 1)]) },
                    |_| lecture_worker(),
                    PoolConfig::new()
                        .with_concurrency(2)
                        .with_worker_config(WorkerConfig::new().with_stack_size(usize::MAX / 4)),
                )
            })
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.summary.failed(), 1);
        assert!(matches!(outcome.summary.failures[0].error, Error::Spawn(_)));
    }
}
