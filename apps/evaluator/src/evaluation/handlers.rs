//! Axum route handlers for the evaluation trigger and read API.

use std::cmp::Reverse;
use std::future::Future;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, PipelineError};
use crate::evaluation::consensus::{split_justification, JustificationEntry};
use crate::evaluation::models::{CandidateId, PartialScores};
use crate::evaluation::orchestrator::RunSummary;
use crate::models::scoring::ScoringRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RankingEntry {
    pub candidate_id: CandidateId,
    /// Recomputed from the stored averages under the role's current weights.
    pub composite_score: i32,
    /// Score written when the candidate was evaluated.
    pub stored_score: i32,
    pub partial_scores: PartialScores,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub role: String,
    pub candidates: Vec<RankingEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScoringDetailResponse {
    pub scoring: ScoringRow,
    pub justifications: Vec<JustificationEntry>,
}

fn validate_role(role: &str) -> Result<(), AppError> {
    if role.trim().is_empty() {
        return Err(AppError::Validation("role cannot be empty".to_string()));
    }
    Ok(())
}

/// Runs a workflow on its own task. Dropping the request future (client
/// disconnect, proxy timeout) no longer stops a run between wipe and commit.
async fn run_detached<F>(workflow: F) -> Result<RunSummary, AppError>
where
    F: Future<Output = Result<RunSummary, PipelineError>> + Send + 'static,
{
    let summary = tokio::spawn(workflow)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("evaluation task aborted: {e}")))??;
    Ok(summary)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/roles/:role/evaluate
///
/// Runs the evaluate-new-role workflow and returns its summary once the batch
/// is committed.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<RunSummary>, AppError> {
    validate_role(&role)?;
    let orchestrator = state.orchestrator.clone();
    let summary = run_detached(async move { orchestrator.evaluate_new_role(&role).await }).await?;
    Ok(Json(summary))
}

/// POST /api/v1/roles/:role/reevaluate
///
/// Wipes the role's previous evaluations (and all soft-skill ratings), then
/// evaluates it again.
pub async fn handle_reevaluate(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<RunSummary>, AppError> {
    validate_role(&role)?;
    let orchestrator = state.orchestrator.clone();
    let summary = run_detached(async move { orchestrator.reevaluate_role(&role).await }).await?;
    Ok(Json(summary))
}

/// GET /api/v1/roles/:role/ranking
pub async fn handle_ranking(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<RankingResponse>, AppError> {
    let weights = state
        .store
        .fetch_role(&role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role '{role}' not found")))?
        .weights();

    let mut candidates: Vec<RankingEntry> = state
        .store
        .fetch_role_scorings(&role)
        .await?
        .into_iter()
        .map(|row| {
            let partial_scores = row.partial_scores();
            RankingEntry {
                candidate_id: row.candidate_id,
                composite_score: weights.composite_score(&partial_scores),
                stored_score: row.score,
                partial_scores,
                evaluated_at: row.evaluated_at,
            }
        })
        .collect();
    candidates.sort_by_key(|c| (Reverse(c.composite_score), c.candidate_id));

    Ok(Json(RankingResponse { role, candidates }))
}

/// GET /api/v1/roles/:role/candidates/:candidate_id/scoring
pub async fn handle_candidate_scoring(
    State(state): State<AppState>,
    Path((role, candidate_id)): Path<(String, CandidateId)>,
) -> Result<Json<ScoringDetailResponse>, AppError> {
    let scoring = state
        .store
        .fetch_scoring(&role, candidate_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Candidate {candidate_id} has no scoring for role '{role}'"
            ))
        })?;

    let justifications = split_justification(&scoring.justification);
    Ok(Json(ScoringDetailResponse {
        scoring,
        justifications,
    }))
}
