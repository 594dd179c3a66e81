use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::evaluation::prompts::{HR_PERSONA, MANAGER_PERSONA, TECHNICAL_PERSONA};

pub type CandidateId = i64;

/// Upper bound of the oracle's partial-score scale.
pub const ORACLE_SCORE_SCALE: f64 = 100.0;
/// Upper bound of the internal partial-score scale.
pub const INTERNAL_SCORE_SCALE: f64 = 10.0;

// ────────────────────────────────────────────────────────────────────────────
// Perspectives
// ────────────────────────────────────────────────────────────────────────────

/// One simulated evaluator persona. Declaration order is the canonical
/// ordering used for every perspective-ordered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    Technical,
    Hr,
    Manager,
}

impl Perspective {
    pub const ALL: [Perspective; 3] = [Perspective::Technical, Perspective::Hr, Perspective::Manager];

    /// Label used when consolidating text across perspectives.
    pub fn label(self) -> &'static str {
        match self {
            Perspective::Technical => "Technical Evaluator",
            Perspective::Hr => "HR Evaluator",
            Perspective::Manager => "Manager Evaluator",
        }
    }

    /// Persona description handed to the oracle, parameterized by role name.
    pub fn persona(self, role: &str) -> String {
        let template = match self {
            Perspective::Technical => TECHNICAL_PERSONA,
            Perspective::Hr => HR_PERSONA,
            Perspective::Manager => MANAGER_PERSONA,
        };
        template.replace("{role}", role)
    }

    pub fn from_label(label: &str) -> Option<Perspective> {
        Perspective::ALL.into_iter().find(|p| p.label() == label)
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scores and weights
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Formation,
    Experience,
    TechnicalSkills,
    SoftSkills,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 4] = [
        ScoreCategory::Formation,
        ScoreCategory::Experience,
        ScoreCategory::TechnicalSkills,
        ScoreCategory::SoftSkills,
    ];

    /// Key used in the oracle's `partial_scores` object.
    pub fn key(self) -> &'static str {
        match self {
            ScoreCategory::Formation => "formation",
            ScoreCategory::Experience => "experience",
            ScoreCategory::TechnicalSkills => "technical_skills",
            ScoreCategory::SoftSkills => "soft_skills",
        }
    }

    pub fn from_key(key: &str) -> Option<ScoreCategory> {
        ScoreCategory::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// Per-category averages on the internal 0–10 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialScores {
    pub formation: f64,
    pub experience: f64,
    pub technical_skills: f64,
    pub soft_skills: f64,
}

impl PartialScores {
    pub fn get(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::Formation => self.formation,
            ScoreCategory::Experience => self.experience,
            ScoreCategory::TechnicalSkills => self.technical_skills,
            ScoreCategory::SoftSkills => self.soft_skills,
        }
    }

    pub fn set(&mut self, category: ScoreCategory, value: f64) {
        match category {
            ScoreCategory::Formation => self.formation = value,
            ScoreCategory::Experience => self.experience = value,
            ScoreCategory::TechnicalSkills => self.technical_skills = value,
            ScoreCategory::SoftSkills => self.soft_skills = value,
        }
    }
}

/// A role's scoring weights. Applied verbatim: they are expected to sum to
/// 1.0 but are never renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub formation: f64,
    pub experience: f64,
    pub soft_skill: f64,
    pub hard_skill: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            formation: 0.25,
            experience: 0.25,
            soft_skill: 0.25,
            hard_skill: 0.25,
        }
    }
}

impl ScoringWeights {
    pub fn weight(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::Formation => self.formation,
            ScoreCategory::Experience => self.experience,
            ScoreCategory::TechnicalSkills => self.hard_skill,
            ScoreCategory::SoftSkills => self.soft_skill,
        }
    }

    /// Σ weight × average over the four categories, on the 0–10 scale.
    pub fn weighted_sum(&self, scores: &PartialScores) -> f64 {
        ScoreCategory::ALL
            .iter()
            .map(|&c| scores.get(c) * self.weight(c))
            .sum()
    }

    /// Global score written at evaluation time: 10 × weighted sum, truncated.
    pub fn global_score(&self, scores: &PartialScores) -> i32 {
        (self.weighted_sum(scores) * 10.0).trunc() as i32
    }

    /// Score recomputed for display under the role's current weights, rounded.
    pub fn composite_score(&self, scores: &PartialScores) -> i32 {
        (self.weighted_sum(scores) * 10.0).round() as i32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ordinal skill ratings
// ────────────────────────────────────────────────────────────────────────────

/// Evidence level for a skill, A (weakest) to D (strongest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillRating {
    A,
    B,
    C,
    D,
}

impl SkillRating {
    /// Parses a rating as emitted by the oracle. Case and surrounding
    /// whitespace are ignored; anything else is not a rating.
    pub fn parse(raw: &str) -> Option<SkillRating> {
        match raw.trim() {
            "A" | "a" => Some(SkillRating::A),
            "B" | "b" => Some(SkillRating::B),
            "C" | "c" => Some(SkillRating::C),
            "D" | "d" => Some(SkillRating::D),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        match self {
            SkillRating::A => 1,
            SkillRating::B => 2,
            SkillRating::C => 3,
            SkillRating::D => 4,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<SkillRating> {
        match value {
            1 => Some(SkillRating::A),
            2 => Some(SkillRating::B),
            3 => Some(SkillRating::C),
            4 => Some(SkillRating::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillRating::A => "A",
            SkillRating::B => "B",
            SkillRating::C => "C",
            SkillRating::D => "D",
        }
    }
}

impl fmt::Display for SkillRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Role and candidate inputs
// ────────────────────────────────────────────────────────────────────────────

/// What the oracle is told about the role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRequirements {
    pub role: String,
    pub mission: String,
    pub required_hard_skills: Vec<String>,
    pub desired_soft_skills: Vec<String>,
}

/// A role as the pipeline sees it: requirements plus the weights carried
/// explicitly into aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub requirements: RoleRequirements,
    pub weights: ScoringWeights,
}

impl Role {
    pub fn name(&self) -> &str {
        &self.requirements.role
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline records
// ────────────────────────────────────────────────────────────────────────────

/// One perspective's judgment of one candidate. Oracle failures are carried
/// as a degraded record rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJudgment {
    pub candidate_id: CandidateId,
    pub perspective: Perspective,
    /// Scores on the oracle's 0–100 scale. Categories the oracle left out or
    /// reported as non-numeric are absent.
    pub partial_scores: BTreeMap<ScoreCategory, f64>,
    pub rationale: String,
    pub justification: String,
    /// Skill name → rating exactly as emitted; parsed during consensus.
    pub hard_skills: BTreeMap<String, String>,
    pub soft_skills: BTreeMap<String, String>,
    pub questions: Vec<String>,
    pub degraded: bool,
}

/// The reconciled evaluation of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub candidate_id: CandidateId,
    /// 0–100.
    pub global_score: i32,
    /// 0–10, rounded to two decimals.
    pub partial_averages: PartialScores,
    pub rationale: String,
    pub justification: String,
    pub hard_skills: BTreeMap<String, SkillRating>,
    pub soft_skills: BTreeMap<String, SkillRating>,
    /// Always holds an entry for every perspective, possibly empty.
    pub questions: BTreeMap<Perspective, Vec<String>>,
    pub contributing_perspectives: usize,
    pub degraded_judgments: usize,
}

impl ConsensusResult {
    pub fn questions_for(&self, perspective: Perspective) -> &[String] {
        self.questions
            .get(&perspective)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
