use tracing::info;

use crate::errors::PipelineError;
use crate::evaluation::models::{Role, RoleRequirements};
use crate::store::EvaluationStore;

/// Loads a role's mission, its role-scoped hard-skill catalog, the global
/// soft-skill catalog and its scoring weights.
///
/// A role without a stored row is `NotFound`: there is nothing to evaluate
/// against, so the run must stop.
pub async fn fetch_role(store: &dyn EvaluationStore, role: &str) -> Result<Role, PipelineError> {
    let row = store
        .fetch_role(role)
        .await
        .map_err(PipelineError::Storage)?
        .ok_or_else(|| PipelineError::NotFound(role.to_string()))?;

    let required_hard_skills = store
        .fetch_hard_skill_catalog(role)
        .await
        .map_err(PipelineError::Storage)?
        .into_iter()
        .map(|s| s.name)
        .collect::<Vec<_>>();

    let desired_soft_skills = store
        .fetch_soft_skill_catalog()
        .await
        .map_err(PipelineError::Storage)?
        .into_iter()
        .map(|s| s.name)
        .collect::<Vec<_>>();

    info!(
        role,
        hard_skills = required_hard_skills.len(),
        soft_skills = desired_soft_skills.len(),
        "role requirements loaded"
    );

    Ok(Role {
        weights: row.weights(),
        requirements: RoleRequirements {
            role: row.role,
            mission: row.mission.unwrap_or_default(),
            required_hard_skills,
            desired_soft_skills,
        },
    })
}
