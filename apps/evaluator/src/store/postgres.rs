use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::evaluation::persistence::PersistBatch;
use crate::models::candidate::CandidateRow;
use crate::models::role::{RoleRow, SkillCatalogRow};
use crate::models::scoring::ScoringRow;
use crate::store::{EvaluationStore, WipeSummary};

/// Rows per multi-row INSERT. Keeps every statement well under the
/// PostgreSQL bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// `EvaluationStore` over a PostgreSQL pool. Schema: `migrations/0001_evaluation_schema.sql`.
#[derive(Clone)]
pub struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn fetch_role(&self, role: &str) -> Result<Option<RoleRow>> {
        Ok(sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role, mission, weight_formation, weight_experience,
                   weight_soft_skill, weight_hard_skill
            FROM roles
            WHERE role = $1
            "#,
        )
        .bind(role)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fetch_hard_skill_catalog(&self, role: &str) -> Result<Vec<SkillCatalogRow>> {
        Ok(sqlx::query_as::<_, SkillCatalogRow>(
            "SELECT id, name FROM hard_skill_catalog WHERE role = $1 ORDER BY id",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_soft_skill_catalog(&self) -> Result<Vec<SkillCatalogRow>> {
        Ok(
            sqlx::query_as::<_, SkillCatalogRow>("SELECT id, name FROM soft_skill_catalog ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn fetch_candidates(&self) -> Result<Vec<CandidateRow>> {
        Ok(
            sqlx::query_as::<_, CandidateRow>("SELECT id, profile FROM candidates ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn candidates_with_scoring(
        &self,
        role: &str,
        candidate_ids: &[i64],
    ) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT candidate_id FROM scoring WHERE role = $1 AND candidate_id = ANY($2)",
        )
        .bind(role)
        .bind(candidate_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn candidates_with_soft_ratings(&self, candidate_ids: &[i64]) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT candidate_id FROM soft_skill_ratings WHERE candidate_id = ANY($1)",
        )
        .bind(candidate_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn commit_batch(&self, batch: &PersistBatch) -> Result<()> {
        // Dropping the transaction on any `?` below rolls it back.
        let mut tx = self.pool.begin().await.context("failed to open transaction")?;

        for chunk in batch.scoring.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO scoring (role, candidate_id, score, justification, \
                 score_formation, score_experience, score_soft_skill, score_hard_skill, \
                 questions_technical, questions_hr, questions_manager, evaluated_at) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.role.clone())
                    .push_bind(row.candidate_id)
                    .push_bind(row.score)
                    .push_bind(row.justification.clone())
                    .push_bind(row.score_formation)
                    .push_bind(row.score_experience)
                    .push_bind(row.score_soft_skill)
                    .push_bind(row.score_hard_skill)
                    .push_bind(row.questions_technical.clone())
                    .push_bind(row.questions_hr.clone())
                    .push_bind(row.questions_manager.clone())
                    .push_bind(row.evaluated_at);
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .context("failed to insert scoring rows")?;
        }
        info!(rows = batch.scoring.len(), "scoring rows staged");

        for chunk in batch.soft_skill_ratings.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO soft_skill_ratings (candidate_id, skill_id, rating, machine_asserted) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.candidate_id)
                    .push_bind(row.skill_id)
                    .push_bind(row.rating.clone())
                    .push_bind(row.origin.is_machine());
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .context("failed to insert soft-skill ratings")?;
        }
        info!(rows = batch.soft_skill_ratings.len(), "soft-skill ratings staged");

        for chunk in batch.hard_skill_ratings.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO hard_skill_ratings (role, candidate_id, skill_id, rating, machine_asserted) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.role.clone())
                    .push_bind(row.candidate_id)
                    .push_bind(row.skill_id)
                    .push_bind(row.rating.clone())
                    .push_bind(row.origin.is_machine());
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .context("failed to insert hard-skill ratings")?;
        }
        info!(rows = batch.hard_skill_ratings.len(), "hard-skill ratings staged");

        tx.commit().await.context("failed to commit evaluation batch")?;
        Ok(())
    }

    async fn wipe_role(&self, role: &str) -> Result<WipeSummary> {
        let mut tx = self.pool.begin().await.context("failed to open transaction")?;

        // Dependents first.
        let soft = sqlx::query("DELETE FROM soft_skill_ratings")
            .execute(&mut *tx)
            .await
            .context("failed to delete soft-skill ratings")?;
        let hard = sqlx::query("DELETE FROM hard_skill_ratings WHERE role = $1")
            .bind(role)
            .execute(&mut *tx)
            .await
            .context("failed to delete hard-skill ratings")?;
        let scoring = sqlx::query("DELETE FROM scoring WHERE role = $1")
            .bind(role)
            .execute(&mut *tx)
            .await
            .context("failed to delete scoring rows")?;

        tx.commit().await.context("failed to commit wipe")?;

        Ok(WipeSummary {
            soft_skill_ratings: soft.rows_affected(),
            hard_skill_ratings: hard.rows_affected(),
            scoring_rows: scoring.rows_affected(),
        })
    }

    async fn fetch_scoring(&self, role: &str, candidate_id: i64) -> Result<Option<ScoringRow>> {
        Ok(sqlx::query_as::<_, ScoringRow>(
            r#"
            SELECT role, candidate_id, score, justification,
                   score_formation, score_experience, score_soft_skill, score_hard_skill,
                   questions_technical, questions_hr, questions_manager, evaluated_at
            FROM scoring
            WHERE role = $1 AND candidate_id = $2
            "#,
        )
        .bind(role)
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fetch_role_scorings(&self, role: &str) -> Result<Vec<ScoringRow>> {
        Ok(sqlx::query_as::<_, ScoringRow>(
            r#"
            SELECT role, candidate_id, score, justification,
                   score_formation, score_experience, score_soft_skill, score_hard_skill,
                   questions_technical, questions_hr, questions_manager, evaluated_at
            FROM scoring
            WHERE role = $1
            ORDER BY candidate_id
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?)
    }
}
