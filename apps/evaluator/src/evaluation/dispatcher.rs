use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::evaluation::candidates::CandidatePool;
use crate::evaluation::judgment::JudgmentClient;
use crate::evaluation::models::{CandidateId, Perspective, RawJudgment, RoleRequirements};

/// A task that produced no `RawJudgment` at all: it panicked or never got a
/// slot. Absorbed oracle failures are not task failures; they arrive as
/// degraded judgments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    pub candidate_id: CandidateId,
    pub perspective: Perspective,
    pub reason: String,
}

/// Every task's outcome, already partitioned. Only `judgments` may be
/// handed to the aggregator.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub judgments: Vec<RawJudgment>,
    pub failures: Vec<TaskFailure>,
}

impl DispatchOutcome {
    pub fn degraded(&self) -> usize {
        self.judgments.iter().filter(|j| j.degraded).count()
    }
}

type TaskKey = (CandidateId, Perspective);

/// Spawned judgment tasks, aborted when dropped. If the `dispatch` future is
/// cancelled, no oracle call outlives it.
struct TaskSet {
    handles: Vec<(TaskKey, JoinHandle<Result<RawJudgment, String>>)>,
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}

/// Fans one judgment per (candidate, perspective) out over a bounded pool of
/// concurrent oracle calls.
pub struct Dispatcher {
    client: Arc<JudgmentClient>,
    max_concurrent: usize,
}

impl Dispatcher {
    pub fn new(client: Arc<JudgmentClient>, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs `|pool| × |Perspective::ALL|` tasks, at most `max_concurrent` in
    /// flight; the rest queue for a permit. Returns once every task finished.
    pub async fn dispatch(
        &self,
        pool: &CandidatePool,
        requirements: Arc<RoleRequirements>,
    ) -> DispatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = TaskSet {
            handles: Vec::with_capacity(pool.len() * Perspective::ALL.len()),
        };

        for (candidate_id, profile) in pool.iter() {
            for perspective in Perspective::ALL {
                let sem = semaphore.clone();
                let client = self.client.clone();
                let requirements = requirements.clone();
                let profile = profile.clone();

                let handle = tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire().await else {
                        return Err("dispatch semaphore closed".to_string());
                    };
                    Ok(client
                        .judge(candidate_id, &profile, &requirements, perspective)
                        .await)
                });
                tasks.handles.push(((candidate_id, perspective), handle));
            }
        }

        info!(
            tasks = tasks.handles.len(),
            max_concurrent = self.max_concurrent,
            "judgment tasks dispatched"
        );

        let mut outcome = DispatchOutcome::default();
        for ((candidate_id, perspective), handle) in tasks.handles.iter_mut() {
            let (candidate_id, perspective) = (*candidate_id, *perspective);
            let reason = match handle.await {
                Ok(Ok(judgment)) => {
                    outcome.judgments.push(judgment);
                    continue;
                }
                Ok(Err(reason)) => reason,
                Err(join_error) => join_error.to_string(),
            };
            warn!(candidate_id, %perspective, %reason, "judgment task failed");
            outcome.failures.push(TaskFailure {
                candidate_id,
                perspective,
                reason,
            });
        }

        info!(
            judgments = outcome.judgments.len(),
            degraded = outcome.degraded(),
            failures = outcome.failures.len(),
            "dispatch complete"
        );
        outcome
    }
}
