//! Storage collaborator for the evaluation pipeline.
//!
//! `AppState` and the orchestrator hold an `Arc<dyn EvaluationStore>`. Every
//! method acquires and releases its own connection, so nothing is held open
//! while judgments are being dispatched.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::evaluation::persistence::PersistBatch;
use crate::models::candidate::CandidateRow;
use crate::models::role::{RoleRow, SkillCatalogRow};
use crate::models::scoring::ScoringRow;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgEvaluationStore;

/// Row counts removed by a wipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WipeSummary {
    pub soft_skill_ratings: u64,
    pub hard_skill_ratings: u64,
    pub scoring_rows: u64,
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn fetch_role(&self, role: &str) -> Result<Option<RoleRow>>;

    async fn fetch_hard_skill_catalog(&self, role: &str) -> Result<Vec<SkillCatalogRow>>;

    async fn fetch_soft_skill_catalog(&self) -> Result<Vec<SkillCatalogRow>>;

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>>;

    /// Subset of `candidate_ids` that already hold a scoring row for `role`.
    async fn candidates_with_scoring(&self, role: &str, candidate_ids: &[i64])
        -> Result<HashSet<i64>>;

    /// Subset of `candidate_ids` holding any soft-skill rating, for any role.
    async fn candidates_with_soft_ratings(&self, candidate_ids: &[i64]) -> Result<HashSet<i64>>;

    /// Writes the whole batch in one transaction. On error nothing is written.
    async fn commit_batch(&self, batch: &PersistBatch) -> Result<()>;

    /// Deletes every soft-skill rating, then the role's hard-skill ratings and
    /// scoring rows, in one transaction.
    async fn wipe_role(&self, role: &str) -> Result<WipeSummary>;

    async fn fetch_scoring(&self, role: &str, candidate_id: i64) -> Result<Option<ScoringRow>>;

    async fn fetch_role_scorings(&self, role: &str) -> Result<Vec<ScoringRow>>;
}
