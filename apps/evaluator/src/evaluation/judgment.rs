//! Judgment client: one oracle call per (candidate, perspective), normalized
//! into a `RawJudgment`.
//!
//! `judge` never fails. Transport errors, API errors, unparsable responses and
//! deadline expiry all come back as a degraded record: every partial score 0,
//! no skill ratings, and a marker justification. One bad call therefore shows
//! up as a visibly zero-scored perspective instead of cancelling the batch or
//! dropping the candidate from aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::evaluation::models::{
    CandidateId, Perspective, RawJudgment, RoleRequirements, ScoreCategory,
};
use crate::evaluation::prompts::{JUDGMENT_PROMPT_TEMPLATE, JUDGMENT_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};

pub const DEGRADED_JUSTIFICATION: &str = "Evaluation failed: processing error.";
pub const DEGRADED_QUESTION: &str = "Interview questions could not be generated.";

/// Everything the oracle is told for one judgment.
#[derive(Debug, Clone)]
pub struct JudgmentRequest<'a> {
    pub candidate_id: CandidateId,
    pub perspective: Perspective,
    pub persona: String,
    pub requirements: &'a RoleRequirements,
    pub profile: &'a Value,
}

/// The oracle's answer, decoded leniently. Scores and ratings stay loosely
/// typed here; `JudgmentClient` normalizes them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OracleJudgment {
    pub step_by_step_reasoning: Option<String>,
    pub partial_scores: BTreeMap<String, Value>,
    pub justification: Option<String>,
    pub soft_skill_match: BTreeMap<String, Value>,
    pub hard_skill_match: BTreeMap<String, Value>,
    pub interview_questions: Vec<String>,
}

/// The external judgment oracle. Implement this to swap backends without
/// touching the dispatcher or aggregator.
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    async fn judge(&self, request: &JudgmentRequest<'_>) -> Result<OracleJudgment, LlmError>;
}

#[async_trait]
impl JudgmentOracle for LlmClient {
    async fn judge(&self, request: &JudgmentRequest<'_>) -> Result<OracleJudgment, LlmError> {
        let prompt = build_judgment_prompt(request)?;
        debug!(
            candidate_id = request.candidate_id,
            perspective = %request.perspective,
            "requesting judgment"
        );
        self.call_json::<OracleJudgment>(&prompt, JUDGMENT_SYSTEM)
            .await
    }
}

fn build_judgment_prompt(request: &JudgmentRequest<'_>) -> Result<String, serde_json::Error> {
    let requirements_json = serde_json::to_string_pretty(request.requirements)?;
    let profile_json = serde_json::to_string_pretty(request.profile)?;
    Ok(JUDGMENT_PROMPT_TEMPLATE
        .replace("{persona}", &request.persona)
        .replace("{candidate_id}", &request.candidate_id.to_string())
        .replace("{requirements_json}", &requirements_json)
        .replace("{profile_json}", &profile_json))
}

// ────────────────────────────────────────────────────────────────────────────
// JudgmentClient
// ────────────────────────────────────────────────────────────────────────────

pub struct JudgmentClient {
    oracle: Arc<dyn JudgmentOracle>,
    deadline: Duration,
}

impl JudgmentClient {
    pub fn new(oracle: Arc<dyn JudgmentOracle>, deadline: Duration) -> Self {
        Self { oracle, deadline }
    }

    /// Judges one candidate from one perspective. Never fails; see module docs.
    pub async fn judge(
        &self,
        candidate_id: CandidateId,
        profile: &Value,
        requirements: &RoleRequirements,
        perspective: Perspective,
    ) -> RawJudgment {
        let request = JudgmentRequest {
            candidate_id,
            perspective,
            persona: perspective.persona(&requirements.role),
            requirements,
            profile,
        };

        let outcome = match tokio::time::timeout(self.deadline, self.oracle.judge(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.deadline)),
        };

        match outcome {
            Ok(judgment) => normalize_judgment(candidate_id, perspective, judgment),
            Err(e) => {
                warn!(
                    candidate_id,
                    %perspective,
                    error = %e,
                    "oracle failure absorbed into degraded judgment"
                );
                degraded_judgment(candidate_id, perspective, &e)
            }
        }
    }
}

/// Converts an oracle answer into a `RawJudgment`. Identity fields come from
/// the task, never from the oracle's output.
pub fn normalize_judgment(
    candidate_id: CandidateId,
    perspective: Perspective,
    judgment: OracleJudgment,
) -> RawJudgment {
    let mut partial_scores = BTreeMap::new();
    for (key, value) in &judgment.partial_scores {
        let Some(category) = ScoreCategory::from_key(key.trim()) else {
            debug!(candidate_id, %perspective, key = %key, "ignoring unknown score category");
            continue;
        };
        match numeric_score(value) {
            Some(score) => {
                partial_scores.insert(category, score);
            }
            None => warn!(
                candidate_id,
                %perspective,
                category = category.key(),
                value = %value,
                "non-numeric partial score skipped"
            ),
        }
    }

    RawJudgment {
        candidate_id,
        perspective,
        partial_scores,
        rationale: judgment.step_by_step_reasoning.unwrap_or_default(),
        justification: judgment.justification.unwrap_or_default(),
        hard_skills: rating_strings(judgment.hard_skill_match),
        soft_skills: rating_strings(judgment.soft_skill_match),
        questions: judgment.interview_questions,
        degraded: false,
    }
}

/// The record substituted for a failed oracle call.
pub fn degraded_judgment(
    candidate_id: CandidateId,
    perspective: Perspective,
    error: &LlmError,
) -> RawJudgment {
    RawJudgment {
        candidate_id,
        perspective,
        partial_scores: ScoreCategory::ALL.into_iter().map(|c| (c, 0.0)).collect(),
        rationale: format!("Judgment oracle error: {error}"),
        justification: DEGRADED_JUSTIFICATION.to_string(),
        hard_skills: BTreeMap::new(),
        soft_skills: BTreeMap::new(),
        questions: vec![DEGRADED_QUESTION.to_string()],
        degraded: true,
    }
}

fn numeric_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn rating_strings(ratings: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    ratings
        .into_iter()
        .map(|(skill, value)| {
            let rating = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (skill, rating)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Oracle that answers every call with the same scripted result.
    pub(crate) struct ScriptedOracle {
        pub answer: Result<OracleJudgment, String>,
        pub delay: Option<Duration>,
    }

    #[async_trait]
    impl JudgmentOracle for ScriptedOracle {
        async fn judge(&self, _request: &JudgmentRequest<'_>) -> Result<OracleJudgment, LlmError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer.clone().map_err(|message| LlmError::Api {
                status: 500,
                message,
            })
        }
    }

    fn requirements() -> RoleRequirements {
        RoleRequirements {
            role: "Backend Engineer".to_string(),
            mission: "Build and run the payments platform".to_string(),
            required_hard_skills: vec!["Rust".to_string(), "PostgreSQL".to_string()],
            desired_soft_skills: vec!["Teamwork".to_string()],
        }
    }

    fn oracle_answer() -> OracleJudgment {
        serde_json::from_value(json!({
            "step_by_step_reasoning": "Solid experience.",
            "partial_scores": {
                "formation": 80,
                "experience": "90",
                "technical_skills": "N/A",
                "soft_skills": 70.5,
                "charisma": 100
            },
            "justification": "Strong profile.",
            "soft_skill_match": {"Teamwork": "C"},
            "hard_skill_match": {"Rust": "D", "PostgreSQL": 3},
            "interview_questions": ["Why Rust?", "Why Postgres?"]
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_keeps_numeric_and_numeric_string_scores() {
        let raw = normalize_judgment(7, Perspective::Hr, oracle_answer());
        assert_eq!(raw.partial_scores.get(&ScoreCategory::Formation), Some(&80.0));
        assert_eq!(raw.partial_scores.get(&ScoreCategory::Experience), Some(&90.0));
        assert_eq!(raw.partial_scores.get(&ScoreCategory::SoftSkills), Some(&70.5));
        assert!(!raw.partial_scores.contains_key(&ScoreCategory::TechnicalSkills));
        assert_eq!(raw.partial_scores.len(), 3);
        assert!(!raw.degraded);
    }

    #[test]
    fn test_normalize_stringifies_non_string_ratings() {
        let raw = normalize_judgment(7, Perspective::Hr, oracle_answer());
        assert_eq!(raw.hard_skills.get("Rust").map(String::as_str), Some("D"));
        assert_eq!(raw.hard_skills.get("PostgreSQL").map(String::as_str), Some("3"));
        assert_eq!(raw.soft_skills.get("Teamwork").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let judgment: OracleJudgment = serde_json::from_value(json!({})).unwrap();
        let raw = normalize_judgment(1, Perspective::Manager, judgment);
        assert!(raw.partial_scores.is_empty());
        assert!(raw.rationale.is_empty());
        assert!(raw.questions.is_empty());
    }

    #[test]
    fn test_degraded_judgment_is_zeroed_and_flagged() {
        let raw = degraded_judgment(3, Perspective::Technical, &LlmError::EmptyContent);
        assert!(raw.degraded);
        assert_eq!(raw.partial_scores.len(), 4);
        assert!(raw.partial_scores.values().all(|&s| s == 0.0));
        assert!(raw.hard_skills.is_empty() && raw.soft_skills.is_empty());
        assert_eq!(raw.justification, DEGRADED_JUSTIFICATION);
        assert!(raw.rationale.contains("empty content"));
    }

    #[test]
    fn test_prompt_carries_persona_requirements_and_profile() {
        let reqs = requirements();
        let profile = json!({"career": [{"company": "Acme", "years": 4}]});
        let request = JudgmentRequest {
            candidate_id: 42,
            perspective: Perspective::Technical,
            persona: Perspective::Technical.persona(&reqs.role),
            requirements: &reqs,
            profile: &profile,
        };
        let prompt = build_judgment_prompt(&request).unwrap();
        assert!(prompt.contains("Backend Engineer"));
        assert!(prompt.contains("payments platform"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("candidate 42"));
        assert!(!prompt.contains("{profile_json}"));
    }

    #[tokio::test]
    async fn test_identity_is_stamped_from_inputs() {
        let client = JudgmentClient::new(
            Arc::new(ScriptedOracle {
                answer: Ok(oracle_answer()),
                delay: None,
            }),
            Duration::from_secs(5),
        );
        let raw = client
            .judge(99, &json!({}), &requirements(), Perspective::Manager)
            .await;
        assert_eq!(raw.candidate_id, 99);
        assert_eq!(raw.perspective, Perspective::Manager);
    }

    #[tokio::test]
    async fn test_oracle_error_becomes_degraded_record() {
        let client = JudgmentClient::new(
            Arc::new(ScriptedOracle {
                answer: Err("overloaded".to_string()),
                delay: None,
            }),
            Duration::from_secs(5),
        );
        let raw = client
            .judge(5, &json!({}), &requirements(), Perspective::Hr)
            .await;
        assert!(raw.degraded);
        assert_eq!(raw.candidate_id, 5);
        assert!(raw.rationale.contains("overloaded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_hits_deadline() {
        let client = JudgmentClient::new(
            Arc::new(ScriptedOracle {
                answer: Ok(oracle_answer()),
                delay: Some(Duration::from_secs(600)),
            }),
            Duration::from_secs(35),
        );
        let raw = client
            .judge(5, &json!({}), &requirements(), Perspective::Technical)
            .await;
        assert!(raw.degraded);
        assert!(raw.rationale.contains("Timed out"));
    }
}
