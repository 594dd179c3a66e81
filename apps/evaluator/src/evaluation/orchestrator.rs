use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::evaluation::candidates::load_candidate_pool;
use crate::evaluation::consensus::aggregate;
use crate::evaluation::dispatcher::{Dispatcher, TaskFailure};
use crate::evaluation::judgment::JudgmentClient;
use crate::evaluation::persistence::PersistenceGate;
use crate::evaluation::requirements::fetch_role;
use crate::store::{EvaluationStore, WipeSummary};

/// Where a run is. `Wiping` only occurs in re-evaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Wiping,
    FetchingRequirements,
    LoadingCandidates,
    Dispatching,
    Aggregating,
    Persisting,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Wiping => "wiping",
            RunState::FetchingRequirements => "fetching_requirements",
            RunState::LoadingCandidates => "loading_candidates",
            RunState::Dispatching => "dispatching",
            RunState::Aggregating => "aggregating",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One async mutex per role. A workflow holds its role's guard from start to
/// finish, so a wipe can never interleave with another run's inserts.
/// Entries nobody holds or waits on are pruned on the next acquire.
#[derive(Default)]
pub struct RoleLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoleLocks {
    pub async fn acquire(&self, role: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(role.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// What one workflow run did. Returned by both entry points on success.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub role: String,
    pub state: RunState,
    pub wiped: Option<WipeSummary>,
    pub candidates: usize,
    pub tasks: usize,
    pub degraded_judgments: usize,
    pub task_failures: Vec<TaskFailure>,
    pub evaluated: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub soft_ratings_preserved: usize,
    pub unresolved_skills: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn start(role: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            role: role.to_string(),
            state: RunState::Idle,
            wiped: None,
            candidates: 0,
            tasks: 0,
            degraded_judgments: 0,
            task_failures: Vec::new(),
            evaluated: 0,
            inserted: 0,
            skipped: 0,
            soft_ratings_preserved: 0,
            unresolved_skills: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn enter(&mut self, state: RunState) {
        info!(run_id = %self.run_id, role = %self.role, from = %self.state, to = %state, "run state");
        self.state = state;
        if state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }
}

/// Drives the two workflows: evaluate a new role, and wipe + re-evaluate.
pub struct Orchestrator {
    store: Arc<dyn EvaluationStore>,
    dispatcher: Dispatcher,
    gate: PersistenceGate,
    locks: RoleLocks,
    /// Soft-skill ratings are shared by every role. Held around the wipe and
    /// around persistence (snapshot through commit) across all roles.
    soft_ratings: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn EvaluationStore>,
        judgment_client: Arc<JudgmentClient>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(judgment_client, max_concurrent),
            gate: PersistenceGate::new(store.clone()),
            store,
            locks: RoleLocks::default(),
            soft_ratings: tokio::sync::Mutex::new(()),
        }
    }

    /// Evaluates every candidate against `role`. Candidates already scored
    /// for the role are left as they are.
    pub async fn evaluate_new_role(&self, role: &str) -> Result<RunSummary, PipelineError> {
        self.run(role, false).await
    }

    /// Deletes every soft-skill rating plus the role's hard-skill ratings and
    /// scoring rows, then evaluates the role from scratch. A failed wipe
    /// aborts the run.
    pub async fn reevaluate_role(&self, role: &str) -> Result<RunSummary, PipelineError> {
        self.run(role, true).await
    }

    async fn run(&self, role: &str, wipe_first: bool) -> Result<RunSummary, PipelineError> {
        let _guard = self.locks.acquire(role).await;

        let mut summary = RunSummary::start(role);
        info!(run_id = %summary.run_id, role, wipe_first, "evaluation run started");

        match self.execute(role, wipe_first, &mut summary).await {
            Ok(()) => {
                summary.enter(RunState::Done);
                info!(
                    run_id = %summary.run_id,
                    role,
                    inserted = summary.inserted,
                    skipped = summary.skipped,
                    degraded = summary.degraded_judgments,
                    task_failures = summary.task_failures.len(),
                    "evaluation run finished"
                );
                Ok(summary)
            }
            Err(e) => {
                let failed_in = summary.state;
                summary.enter(RunState::Failed);
                warn!(run_id = %summary.run_id, role, %failed_in, error = %e, "evaluation run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        role: &str,
        wipe_first: bool,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        if wipe_first {
            summary.enter(RunState::Wiping);
            let wiped = {
                let _soft = self.soft_ratings.lock().await;
                self.store
                    .wipe_role(role)
                    .await
                    .map_err(PipelineError::Wipe)?
            };
            info!(
                role,
                soft_skill_ratings = wiped.soft_skill_ratings,
                hard_skill_ratings = wiped.hard_skill_ratings,
                scoring_rows = wiped.scoring_rows,
                "previous evaluations wiped"
            );
            summary.wiped = Some(wiped);
        }

        summary.enter(RunState::FetchingRequirements);
        let target = fetch_role(self.store.as_ref(), role).await?;

        summary.enter(RunState::LoadingCandidates);
        let pool = load_candidate_pool(self.store.as_ref()).await?;
        summary.candidates = pool.len();

        summary.enter(RunState::Dispatching);
        info!(
            role = target.name(),
            candidates = pool.len(),
            hard_skills = target.requirements.required_hard_skills.len(),
            soft_skills = target.requirements.desired_soft_skills.len(),
            "dispatching judgments"
        );
        let outcome = self
            .dispatcher
            .dispatch(&pool, Arc::new(target.requirements.clone()))
            .await;
        summary.tasks = outcome.judgments.len() + outcome.failures.len();
        summary.degraded_judgments = outcome.degraded();
        summary.task_failures = outcome.failures;
        drop(pool);

        summary.enter(RunState::Aggregating);
        let results = aggregate(&outcome.judgments, &target.weights);
        summary.evaluated = results.len();

        summary.enter(RunState::Persisting);
        let report = {
            let _soft = self.soft_ratings.lock().await;
            self.gate.persist(role, &results).await?
        };
        summary.inserted = report.inserted.len();
        summary.skipped = report.skipped.len();
        summary.soft_ratings_preserved = report.soft_ratings_preserved.len();
        summary.unresolved_skills = report.unresolved_total();

        Ok(())
    }
}
