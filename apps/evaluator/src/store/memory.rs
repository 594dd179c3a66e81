//! In-memory `EvaluationStore` for unit tests. Writes are all-or-nothing like
//! the PostgreSQL transactions, and failures can be injected.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::evaluation::models::ScoringWeights;
use crate::evaluation::persistence::PersistBatch;
use crate::models::candidate::CandidateRow;
use crate::models::role::{RoleRow, SkillCatalogRow};
use crate::models::scoring::{HardSkillRatingRow, ScoringRow, SoftSkillRatingRow};
use crate::store::{EvaluationStore, WipeSummary};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub roles: BTreeMap<String, RoleRow>,
    pub hard_catalog: BTreeMap<String, Vec<SkillCatalogRow>>,
    pub soft_catalog: Vec<SkillCatalogRow>,
    pub candidates: Vec<CandidateRow>,
    pub scoring: Vec<ScoringRow>,
    pub hard_ratings: Vec<HardSkillRatingRow>,
    pub soft_ratings: Vec<SoftSkillRatingRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_commit: AtomicBool,
    fail_wipe: AtomicBool,
    commits: AtomicUsize,
    commit_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn with_role(self, role: &str, mission: Option<&str>, weights: ScoringWeights) -> Self {
        self.lock().roles.insert(
            role.to_string(),
            RoleRow {
                role: role.to_string(),
                mission: mission.map(str::to_string),
                weight_formation: weights.formation,
                weight_experience: weights.experience,
                weight_soft_skill: weights.soft_skill,
                weight_hard_skill: weights.hard_skill,
            },
        );
        self
    }

    pub fn with_hard_skill(self, role: &str, id: i64, name: &str) -> Self {
        self.lock()
            .hard_catalog
            .entry(role.to_string())
            .or_default()
            .push(SkillCatalogRow {
                id,
                name: name.to_string(),
            });
        self
    }

    pub fn with_soft_skill(self, id: i64, name: &str) -> Self {
        self.lock().soft_catalog.push(SkillCatalogRow {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_candidate(self, id: i64, profile: Option<&str>) -> Self {
        self.lock().candidates.push(CandidateRow {
            id,
            profile: profile.map(str::to_string),
        });
        self
    }

    pub fn with_soft_rating(self, row: SoftSkillRatingRow) -> Self {
        self.lock().soft_ratings.push(row);
        self
    }

    /// Makes every commit wait before writing, widening the window between a
    /// run's snapshot reads and its commit.
    pub fn delay_commits(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    pub fn fail_next_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_wipes(&self, fail: bool) {
        self.fail_wipe.store(fail, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MemoryState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn fetch_role(&self, role: &str) -> Result<Option<RoleRow>> {
        Ok(self.lock().roles.get(role).cloned())
    }

    async fn fetch_hard_skill_catalog(&self, role: &str) -> Result<Vec<SkillCatalogRow>> {
        Ok(self.lock().hard_catalog.get(role).cloned().unwrap_or_default())
    }

    async fn fetch_soft_skill_catalog(&self) -> Result<Vec<SkillCatalogRow>> {
        Ok(self.lock().soft_catalog.clone())
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>> {
        Ok(self.lock().candidates.clone())
    }

    async fn candidates_with_scoring(
        &self,
        role: &str,
        candidate_ids: &[i64],
    ) -> Result<HashSet<i64>> {
        Ok(self
            .lock()
            .scoring
            .iter()
            .filter(|s| s.role == role && candidate_ids.contains(&s.candidate_id))
            .map(|s| s.candidate_id)
            .collect())
    }

    async fn candidates_with_soft_ratings(&self, candidate_ids: &[i64]) -> Result<HashSet<i64>> {
        Ok(self
            .lock()
            .soft_ratings
            .iter()
            .filter(|r| candidate_ids.contains(&r.candidate_id))
            .map(|r| r.candidate_id)
            .collect())
    }

    async fn commit_batch(&self, batch: &PersistBatch) -> Result<()> {
        if let Some(delay) = self.commit_delay {
            tokio::time::sleep(delay).await;
        }
        let mut guard = self.lock();
        let mut staged = guard.clone();

        for row in &batch.scoring {
            if staged
                .scoring
                .iter()
                .any(|s| s.role == row.role && s.candidate_id == row.candidate_id)
            {
                bail!(
                    "duplicate key value violates unique constraint \"scoring_pkey\" ({}, {})",
                    row.role,
                    row.candidate_id
                );
            }
            staged.scoring.push(row.clone());
        }
        staged.soft_ratings.extend(batch.soft_skill_ratings.iter().cloned());
        staged.hard_ratings.extend(batch.hard_skill_ratings.iter().cloned());

        if self.fail_commit.load(Ordering::SeqCst) {
            bail!("injected commit failure");
        }

        *guard = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wipe_role(&self, role: &str) -> Result<WipeSummary> {
        if self.fail_wipe.load(Ordering::SeqCst) {
            bail!("update or delete on table \"scoring\" violates foreign key constraint");
        }
        let mut state = self.lock();

        let soft_before = state.soft_ratings.len();
        state.soft_ratings.clear();

        let hard_before = state.hard_ratings.len();
        state.hard_ratings.retain(|r| r.role != role);

        let scoring_before = state.scoring.len();
        state.scoring.retain(|s| s.role != role);

        Ok(WipeSummary {
            soft_skill_ratings: soft_before as u64,
            hard_skill_ratings: (hard_before - state.hard_ratings.len()) as u64,
            scoring_rows: (scoring_before - state.scoring.len()) as u64,
        })
    }

    async fn fetch_scoring(&self, role: &str, candidate_id: i64) -> Result<Option<ScoringRow>> {
        Ok(self
            .lock()
            .scoring
            .iter()
            .find(|s| s.role == role && s.candidate_id == candidate_id)
            .cloned())
    }

    async fn fetch_role_scorings(&self, role: &str) -> Result<Vec<ScoringRow>> {
        let mut rows: Vec<ScoringRow> = self
            .lock()
            .scoring
            .iter()
            .filter(|s| s.role == role)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.candidate_id);
        Ok(rows)
    }
}
