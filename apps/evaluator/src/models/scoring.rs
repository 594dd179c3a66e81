use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::evaluation::models::PartialScores;

/// Persisted consensus for one (role, candidate). At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoringRow {
    pub role: String,
    pub candidate_id: i64,
    pub score: i32,
    pub justification: String,
    pub score_formation: f64,
    pub score_experience: f64,
    pub score_soft_skill: f64,
    pub score_hard_skill: f64,
    pub questions_technical: Json<Vec<String>>,
    pub questions_hr: Json<Vec<String>>,
    pub questions_manager: Json<Vec<String>>,
    pub evaluated_at: DateTime<Utc>,
}

impl ScoringRow {
    pub fn partial_scores(&self) -> PartialScores {
        PartialScores {
            formation: self.score_formation,
            experience: self.score_experience,
            technical_skills: self.score_hard_skill,
            soft_skills: self.score_soft_skill,
        }
    }
}

/// Which copy of a skill rating a row is. Every rating is seeded twice with
/// the same value: one machine-asserted, one for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingOrigin {
    Machine,
    HumanDefault,
}

impl RatingOrigin {
    pub const BOTH: [RatingOrigin; 2] = [RatingOrigin::Machine, RatingOrigin::HumanDefault];

    pub fn is_machine(self) -> bool {
        matches!(self, RatingOrigin::Machine)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardSkillRatingRow {
    pub role: String,
    pub candidate_id: i64,
    pub skill_id: i64,
    pub rating: String,
    pub origin: RatingOrigin,
}

/// Soft-skill ratings are role-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftSkillRatingRow {
    pub candidate_id: i64,
    pub skill_id: i64,
    pub rating: String,
    pub origin: RatingOrigin,
}
