//! # fanout
//!
//! Fixed-size thread pools that drain a shared input queue, apply a
//! per-item transformation, and collect results in a shared output queue.
//!
//! ## Key Features
//!
//! - **Pull model**: a fixed number of workers pop from one queue until it
//!   reads empty, so a large batch never means one thread per item
//! - **Shared output**: queue handles are reference counted, so nested pools
//!   can push into the queue of the pool that started them
//! - **Contained failures**: an error or panic while processing one item drops
//!   that item, is recorded in the batch summary, and leaves the worker running
//! - **Scoped threads**: workers may borrow from the caller's stack
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────┐
//!            ┌──> │ Worker 1 │ ──┐
//! ┌────────┐ │    └──────────┘   │    ┌────────┐
//! │ input  │ ┤    ┌──────────┐   ├──> │ output │ ──> drain_all()
//! │ Queue  │ ├──> │ Worker 2 │ ──┤    │ Queue  │
//! └────────┘ │    └──────────┘   │    └────────┘
//!            │    ┌──────────┐   │         ▲
//!            └──> │ Worker N │ ──┘         │
//!                 └──────────┘             │
//!                      └── nested pool ────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use fanout::prelude::*;
//!
//! let mut doubled = map_concurrent(vec![1, 2, 3, 4, 5], |x: i32| Ok::<_, Error>(x * 2), 3)?;
//! doubled.sort();
//! assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
//! # Ok::<(), fanout::Error>(())
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod fetch;
pub mod nested;
pub mod pool;
pub mod queue;
pub mod worker;

// Re-exports
pub use error::{Error, Result};
pub use fetch::{download, Downloader, FetchPage, Page, DEFAULT_DOWNLOAD_THREADS};
pub use nested::FanOut;
pub use pool::{map_concurrent, run_nested, run_pool, Pool, PoolConfig, PoolOutcome, RunSummary};
pub use queue::{Queue, QueueStats};
pub use worker::{
    BoundWorker, Failure, FnWorker, Worker, WorkerConfig, WorkerId, WorkerReport, WorkerState,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::nested::FanOut;
    pub use crate::pool::{map_concurrent, run_nested, run_pool, Pool, PoolConfig};
    pub use crate::queue::Queue;
    pub use crate::worker::{FnWorker, Worker, WorkerConfig};
}
