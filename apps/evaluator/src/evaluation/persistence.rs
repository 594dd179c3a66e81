//! Persistence gate: turns a run's consensus results into one atomic write.
//!
//! Reads (skill catalogs, existing scoring rows, existing soft-skill
//! ratings) happen first; the batch is then built in memory and handed to
//! `EvaluationStore::commit_batch`, which writes it in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::evaluation::models::{CandidateId, ConsensusResult, Perspective, SkillRating};
use crate::evaluation::normalize::normalize_skill_name;
use crate::models::role::SkillCatalogRow;
use crate::models::scoring::{HardSkillRatingRow, RatingOrigin, ScoringRow, SoftSkillRatingRow};
use crate::store::EvaluationStore;

/// Rows to insert for one run. Committed all at once or not at all.
#[derive(Debug, Clone, Default)]
pub struct PersistBatch {
    pub scoring: Vec<ScoringRow>,
    pub hard_skill_ratings: Vec<HardSkillRatingRow>,
    pub soft_skill_ratings: Vec<SoftSkillRatingRow>,
}

impl PersistBatch {
    pub fn is_empty(&self) -> bool {
        self.scoring.is_empty()
            && self.hard_skill_ratings.is_empty()
            && self.soft_skill_ratings.is_empty()
    }
}

/// Skill name → catalog id, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct SkillLookup {
    ids: HashMap<String, i64>,
}

impl SkillLookup {
    /// When two catalog entries normalize to the same key the first one wins.
    pub fn from_catalog(rows: &[SkillCatalogRow]) -> Self {
        let mut ids = HashMap::with_capacity(rows.len());
        for row in rows {
            ids.entry(normalize_skill_name(&row.name)).or_insert(row.id);
        }
        Self { ids }
    }

    pub fn resolve(&self, name: &str) -> Option<i64> {
        self.ids.get(&normalize_skill_name(name)).copied()
    }
}

/// Everything read from storage before the batch is built.
#[derive(Debug, Clone, Default)]
pub struct PersistenceSnapshot {
    pub hard_skills: SkillLookup,
    pub soft_skills: SkillLookup,
    pub already_scored: HashSet<CandidateId>,
    pub has_soft_ratings: HashSet<CandidateId>,
}

/// What a persistence step did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistReport {
    pub inserted: Vec<CandidateId>,
    /// Candidates that already held a scoring row for the role.
    pub skipped: Vec<CandidateId>,
    /// Candidates whose existing soft-skill ratings were left untouched.
    pub soft_ratings_preserved: Vec<CandidateId>,
    /// Skill names with no catalog match, with how often they were dropped.
    pub unresolved_skills: BTreeMap<String, usize>,
    pub hard_ratings_written: usize,
    pub soft_ratings_written: usize,
}

impl PersistReport {
    pub fn unresolved_total(&self) -> usize {
        self.unresolved_skills.values().sum()
    }
}

/// Builds the batch for `results`. Pure; all storage state comes in through
/// `snapshot`.
pub fn build_batch(
    role: &str,
    results: &BTreeMap<CandidateId, ConsensusResult>,
    snapshot: &PersistenceSnapshot,
    evaluated_at: DateTime<Utc>,
) -> (PersistBatch, PersistReport) {
    let mut batch = PersistBatch::default();
    let mut report = PersistReport::default();

    for (&candidate_id, result) in results {
        if snapshot.already_scored.contains(&candidate_id) {
            report.skipped.push(candidate_id);
            continue;
        }

        batch.scoring.push(scoring_row(role, result, evaluated_at));
        report.inserted.push(candidate_id);

        if snapshot.has_soft_ratings.contains(&candidate_id) {
            report.soft_ratings_preserved.push(candidate_id);
        } else {
            for (skill_id, rating) in
                resolve_ratings(&result.soft_skills, &snapshot.soft_skills, &mut report)
            {
                for origin in RatingOrigin::BOTH {
                    batch.soft_skill_ratings.push(SoftSkillRatingRow {
                        candidate_id,
                        skill_id,
                        rating: rating.to_string(),
                        origin,
                    });
                }
            }
        }

        for (skill_id, rating) in
            resolve_ratings(&result.hard_skills, &snapshot.hard_skills, &mut report)
        {
            for origin in RatingOrigin::BOTH {
                batch.hard_skill_ratings.push(HardSkillRatingRow {
                    role: role.to_string(),
                    candidate_id,
                    skill_id,
                    rating: rating.to_string(),
                    origin,
                });
            }
        }
    }

    report.hard_ratings_written = batch.hard_skill_ratings.len();
    report.soft_ratings_written = batch.soft_skill_ratings.len();
    (batch, report)
}

fn scoring_row(role: &str, result: &ConsensusResult, evaluated_at: DateTime<Utc>) -> ScoringRow {
    let questions = |p: Perspective| Json(result.questions_for(p).to_vec());
    ScoringRow {
        role: role.to_string(),
        candidate_id: result.candidate_id,
        score: result.global_score,
        justification: result.justification.clone(),
        score_formation: result.partial_averages.formation,
        score_experience: result.partial_averages.experience,
        score_soft_skill: result.partial_averages.soft_skills,
        score_hard_skill: result.partial_averages.technical_skills,
        questions_technical: questions(Perspective::Technical),
        questions_hr: questions(Perspective::Hr),
        questions_manager: questions(Perspective::Manager),
        evaluated_at,
    }
}

fn resolve_ratings(
    ratings: &BTreeMap<String, SkillRating>,
    lookup: &SkillLookup,
    report: &mut PersistReport,
) -> Vec<(i64, SkillRating)> {
    ratings
        .iter()
        .filter_map(|(name, &rating)| match lookup.resolve(name) {
            Some(id) => Some((id, rating)),
            None => {
                *report.unresolved_skills.entry(name.clone()).or_default() += 1;
                None
            }
        })
        .collect()
}

pub struct PersistenceGate {
    store: Arc<dyn EvaluationStore>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn EvaluationStore>) -> Self {
        Self { store }
    }

    /// Persists every result not already scored for `role`. Any failure,
    /// while reading the snapshot or while writing, is a
    /// `TransactionFailure` and leaves storage unchanged.
    pub async fn persist(
        &self,
        role: &str,
        results: &BTreeMap<CandidateId, ConsensusResult>,
    ) -> Result<PersistReport, PipelineError> {
        let snapshot = self
            .snapshot(role, results)
            .await
            .map_err(PipelineError::TransactionFailure)?;

        let (batch, report) = build_batch(role, results, &snapshot, Utc::now());

        for candidate_id in &report.skipped {
            warn!(role, candidate_id, "scoring row already exists, skipping candidate");
        }
        if !report.unresolved_skills.is_empty() {
            warn!(
                role,
                unresolved = report.unresolved_total(),
                names = ?report.unresolved_skills.keys().collect::<Vec<_>>(),
                "skill names without a catalog match were dropped"
            );
        }

        if !batch.is_empty() {
            self.store
                .commit_batch(&batch)
                .await
                .map_err(PipelineError::TransactionFailure)?;
        }

        info!(
            role,
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            hard_ratings = report.hard_ratings_written,
            soft_ratings = report.soft_ratings_written,
            "evaluation batch committed"
        );
        Ok(report)
    }

    async fn snapshot(
        &self,
        role: &str,
        results: &BTreeMap<CandidateId, ConsensusResult>,
    ) -> anyhow::Result<PersistenceSnapshot> {
        let ids: Vec<CandidateId> = results.keys().copied().collect();
        let hard_catalog = self.store.fetch_hard_skill_catalog(role).await?;
        let soft_catalog = self.store.fetch_soft_skill_catalog().await?;

        Ok(PersistenceSnapshot {
            hard_skills: SkillLookup::from_catalog(&hard_catalog),
            soft_skills: SkillLookup::from_catalog(&soft_catalog),
            already_scored: self.store.candidates_with_scoring(role, &ids).await?,
            has_soft_ratings: self.store.candidates_with_soft_ratings(&ids).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::models::{PartialScores, ScoringWeights};
    use crate::store::memory::MemoryStore;

    const ROLE: &str = "Data Engineer";

    fn result(candidate_id: CandidateId) -> ConsensusResult {
        ConsensusResult {
            candidate_id,
            global_score: 72,
            partial_averages: PartialScores {
                formation: 7.0,
                experience: 8.0,
                technical_skills: 6.5,
                soft_skills: 7.33,
            },
            rationale: "--- Rationale from HR Evaluator ---\nok".to_string(),
            justification: "- HR Evaluator: ok".to_string(),
            hard_skills: [
                ("  SPARK ".to_string(), SkillRating::D),
                ("Cobol".to_string(), SkillRating::B),
            ]
            .into_iter()
            .collect(),
            soft_skills: [("Comunicación".to_string(), SkillRating::C)]
                .into_iter()
                .collect(),
            questions: Perspective::ALL
                .into_iter()
                .map(|p| (p, vec![format!("{p} question")]))
                .collect(),
            contributing_perspectives: 3,
            degraded_judgments: 0,
        }
    }

    fn results(ids: &[CandidateId]) -> BTreeMap<CandidateId, ConsensusResult> {
        ids.iter().map(|&id| (id, result(id))).collect()
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::default()
                .with_role(ROLE, Some("Own the lakehouse"), ScoringWeights::default())
                .with_hard_skill(ROLE, 1, "Spark")
                .with_soft_skill(10, "comunicacion")
                .with_candidate(1, None)
                .with_candidate(2, None),
        )
    }

    #[test]
    fn test_lookup_matches_normalized_names() {
        let lookup = SkillLookup::from_catalog(&[SkillCatalogRow {
            id: 4,
            name: "Gestión de Proyectos".to_string(),
        }]);
        assert_eq!(lookup.resolve("  gestion de proyectos"), Some(4));
        assert_eq!(lookup.resolve("Gestion"), None);
    }

    #[test]
    fn test_every_rating_is_written_twice() {
        let snapshot = PersistenceSnapshot {
            hard_skills: SkillLookup::from_catalog(&[SkillCatalogRow {
                id: 1,
                name: "Spark".to_string(),
            }]),
            soft_skills: SkillLookup::from_catalog(&[SkillCatalogRow {
                id: 10,
                name: "Comunicacion".to_string(),
            }]),
            ..PersistenceSnapshot::default()
        };
        let (batch, report) = build_batch(ROLE, &results(&[1]), &snapshot, Utc::now());

        assert_eq!(batch.scoring.len(), 1);
        assert_eq!(batch.hard_skill_ratings.len(), 2);
        assert_eq!(batch.soft_skill_ratings.len(), 2);
        let origins: Vec<_> = batch.hard_skill_ratings.iter().map(|r| r.origin).collect();
        assert_eq!(origins, RatingOrigin::BOTH);
        assert!(batch.hard_skill_ratings.iter().all(|r| r.rating == "D"));
        assert!(batch.soft_skill_ratings.iter().all(|r| r.rating == "C"));
        assert_eq!(report.unresolved_skills.get("Cobol"), Some(&1));
    }

    #[test]
    fn test_scoring_row_carries_consensus() {
        let snapshot = PersistenceSnapshot::default();
        let (batch, _) = build_batch(ROLE, &results(&[1]), &snapshot, Utc::now());
        let row = &batch.scoring[0];
        assert_eq!(row.score, 72);
        assert_eq!(row.score_hard_skill, 6.5);
        assert_eq!(row.score_soft_skill, 7.33);
        assert_eq!(row.questions_manager.0, vec!["Manager Evaluator question"]);
    }

    #[tokio::test]
    async fn test_second_run_skips_already_scored_candidates() {
        let store = store();
        let gate = PersistenceGate::new(store.clone());

        let first = gate.persist(ROLE, &results(&[1, 2])).await.unwrap();
        assert_eq!(first.inserted, vec![1, 2]);

        let second = gate.persist(ROLE, &results(&[1, 2])).await.unwrap();
        assert!(second.inserted.is_empty());
        assert_eq!(second.skipped, vec![1, 2]);

        let state = store.snapshot();
        assert_eq!(state.scoring.len(), 2);
        assert_eq!(state.hard_ratings.len(), 4);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_soft_ratings_are_preserved() {
        let store = Arc::new(
            MemoryStore::default()
                .with_soft_skill(10, "Comunicacion")
                .with_hard_skill(ROLE, 1, "Spark")
                .with_soft_rating(SoftSkillRatingRow {
                    candidate_id: 1,
                    skill_id: 10,
                    rating: "A".to_string(),
                    origin: RatingOrigin::HumanDefault,
                }),
        );
        let gate = PersistenceGate::new(store.clone());

        let report = gate.persist(ROLE, &results(&[1, 2])).await.unwrap();
        assert_eq!(report.soft_ratings_preserved, vec![1]);

        let state = store.snapshot();
        let for_one: Vec<_> = state
            .soft_ratings
            .iter()
            .filter(|r| r.candidate_id == 1)
            .collect();
        assert_eq!(for_one.len(), 1);
        assert_eq!(for_one[0].rating, "A");
        assert_eq!(state.soft_ratings.iter().filter(|r| r.candidate_id == 2).count(), 2);
        // Hard-skill ratings have no such guard.
        assert_eq!(state.hard_ratings.iter().filter(|r| r.candidate_id == 1).count(), 2);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing_behind() {
        let store = store();
        store.fail_next_commits(true);
        let gate = PersistenceGate::new(store.clone());

        let err = gate.persist(ROLE, &results(&[1, 2])).await.unwrap_err();
        assert!(matches!(err, PipelineError::TransactionFailure(_)));

        let state = store.snapshot();
        assert!(state.scoring.is_empty());
        assert!(state.hard_ratings.is_empty());
        assert!(state.soft_ratings.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_skills_are_counted_not_fatal() {
        let store = store();
        let gate = PersistenceGate::new(store.clone());

        let report = gate.persist(ROLE, &results(&[1, 2])).await.unwrap();
        assert_eq!(report.unresolved_skills.get("Cobol"), Some(&2));
        assert_eq!(report.unresolved_total(), 2);
        assert_eq!(report.hard_ratings_written, 4);
        assert_eq!(report.soft_ratings_written, 4);
    }
}
