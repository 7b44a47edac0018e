//! Bounded-concurrency task runner used by both upload and download.
//!
//! The scheduler is a parallel map: at most `limit` workers are polled at
//! once, queued tasks start in input order, completion order is whatever
//! the I/O yields. It has no retry logic. What happens to siblings after a
//! failure is decided by [`FailurePolicy`].

use std::future::Future;
use std::num::NonZeroUsize;

use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TransferError;

/// What the scheduler does with outstanding tasks once one has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep running in-flight and queued tasks to completion.
    #[default]
    Drain,
    /// Stop starting queued tasks and drop in-flight ones.
    CancelSiblings,
}

/// Terminal state of one scheduled task.
#[derive(Debug)]
pub enum TaskOutcome<R, E> {
    Completed(R),
    Failed(E),
    /// Never started, or dropped while in flight.
    Cancelled,
}

/// Why a schedule did not produce a full set of results.
#[derive(Debug)]
pub enum ScheduleError<E> {
    /// The first task failure observed.
    Failed(E),
    /// The external cancellation token fired before all tasks finished.
    Interrupted,
}

/// Outcome of every task, indexed like the input.
#[derive(Debug)]
pub struct ScheduleReport<R, E> {
    outcomes: Vec<TaskOutcome<R, E>>,
    first_failure: Option<usize>,
    interrupted: bool,
}

impl<R, E> ScheduleReport<R, E> {
    pub fn outcomes(&self) -> &[TaskOutcome<R, E>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when every task completed successfully.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, TaskOutcome::Completed(_)))
    }

    /// True when the external cancellation token stopped the run.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Failed(_)))
            .count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Cancelled))
            .count()
    }

    /// Collapses the report into all results, or the reason there are none.
    ///
    /// A task failure takes precedence over an interruption.
    pub fn into_result(mut self) -> Result<Vec<R>, ScheduleError<E>> {
        if let Some(idx) = self.first_failure {
            let failed = std::mem::replace(&mut self.outcomes[idx], TaskOutcome::Cancelled);
            if let TaskOutcome::Failed(err) = failed {
                return Err(ScheduleError::Failed(err));
            }
        }
        let mut results = Vec::with_capacity(self.outcomes.len());
        for outcome in self.outcomes {
            match outcome {
                TaskOutcome::Completed(r) => results.push(r),
                TaskOutcome::Failed(_) | TaskOutcome::Cancelled => {
                    return Err(ScheduleError::Interrupted);
                }
            }
        }
        Ok(results)
    }
}

/// Runs independent tasks with an upper bound on concurrency.
#[derive(Debug, Clone)]
pub struct TransferScheduler {
    limit: NonZeroUsize,
    policy: FailurePolicy,
    cancel: CancellationToken,
}

impl TransferScheduler {
    /// Creates a scheduler; `limit` must be at least 1.
    pub fn new(limit: usize, policy: FailurePolicy) -> Result<Self, TransferError> {
        let limit = NonZeroUsize::new(limit).ok_or(TransferError::InvalidConcurrency(limit))?;
        Ok(Self {
            limit,
            policy,
            cancel: CancellationToken::new(),
        })
    }

    /// Attaches an external cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Runs `worker` over every task and returns once each has a
    /// terminal outcome.
    pub async fn run<T, R, E, F, Fut>(
        &self,
        tasks: impl IntoIterator<Item = T>,
        mut worker: F,
    ) -> ScheduleReport<R, E>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let tasks: Vec<T> = tasks.into_iter().collect();
        let total = tasks.len();
        let mut slots: Vec<Option<TaskOutcome<R, E>>> = (0..total).map(|_| None).collect();
        let mut first_failure = None;
        let mut interrupted = false;

        debug!(
            tasks = total,
            limit = self.limit.get(),
            policy = ?self.policy,
            "scheduling transfers"
        );

        {
            let mut in_flight = stream::iter(tasks.into_iter().enumerate())
                .map(|(idx, task)| {
                    let fut = worker(task);
                    async move { (idx, fut.await) }
                })
                .buffer_unordered(self.limit.get());

            loop {
                let next = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        interrupted = true;
                        break;
                    }
                    next = in_flight.next() => next,
                };
                let Some((idx, result)) = next else {
                    break;
                };
                match result {
                    Ok(value) => slots[idx] = Some(TaskOutcome::Completed(value)),
                    Err(err) => {
                        slots[idx] = Some(TaskOutcome::Failed(err));
                        if first_failure.is_none() {
                            first_failure = Some(idx);
                        }
                        if self.policy == FailurePolicy::CancelSiblings {
                            debug!(task = idx, "task failed, cancelling siblings");
                            break;
                        }
                    }
                }
            }
            // Dropping the stream drops any in-flight worker futures.
        }

        let outcomes: Vec<TaskOutcome<R, E>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(TaskOutcome::Cancelled))
            .collect();

        ScheduleReport {
            outcomes,
            first_failure,
            interrupted,
        }
    }
}
