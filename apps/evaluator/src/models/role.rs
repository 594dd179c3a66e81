use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::evaluation::models::ScoringWeights;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRow {
    pub role: String,
    pub mission: Option<String>,
    pub weight_formation: f64,
    pub weight_experience: f64,
    pub weight_soft_skill: f64,
    pub weight_hard_skill: f64,
}

impl RoleRow {
    pub fn weights(&self) -> ScoringWeights {
        ScoringWeights {
            formation: self.weight_formation,
            experience: self.weight_experience,
            soft_skill: self.weight_soft_skill,
            hard_skill: self.weight_hard_skill,
        }
    }
}

/// One entry of either skill catalog. Hard skills are scoped to a role,
/// soft skills are global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SkillCatalogRow {
    pub id: i64,
    pub name: String,
}
