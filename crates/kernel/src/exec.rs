//! Stage executors: run one pipeline stage over `N` independent lanes.
//!
//! Every solver stage is written as a pure per-lane function. The executor
//! decides whether lanes run in a plain loop or across the rayon thread
//! pool; either way the call returns only after every lane finished, which
//! is the barrier between pipeline stages.

use rayon::prelude::*;

/// Lanes handed to one rayon task at minimum.
const PAR_MIN_LANES_PER_TASK: usize = 64;

/// Capability to run a stage over `lanes` independent indices.
///
/// Lanes have no ordering guarantee relative to each other. Results are
/// returned in lane order.
pub trait LaneExecutor: Sync {
    /// Evaluate `f` for every lane and collect the results in lane order.
    fn map_lanes<T, F>(&self, lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;

    /// Run `f` for every lane for its side effects.
    fn for_each_lane<F>(&self, lanes: usize, f: F)
    where
        F: Fn(usize) + Sync + Send;

    /// Short label for logging.
    fn name(&self) -> &'static str;
}

/// Runs lanes one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl LaneExecutor for SequentialExecutor {
    fn map_lanes<T, F>(&self, lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..lanes).map(f).collect()
    }

    fn for_each_lane<F>(&self, lanes: usize, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        (0..lanes).for_each(f)
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Runs lanes across the global rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelExecutor;

impl LaneExecutor for ParallelExecutor {
    fn map_lanes<T, F>(&self, lanes: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..lanes)
            .into_par_iter()
            .with_min_len(PAR_MIN_LANES_PER_TASK)
            .map(f)
            .collect()
    }

    fn for_each_lane<F>(&self, lanes: usize, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        (0..lanes)
            .into_par_iter()
            .with_min_len(PAR_MIN_LANES_PER_TASK)
            .for_each(f)
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}
