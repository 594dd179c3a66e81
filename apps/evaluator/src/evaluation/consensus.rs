//! Consensus aggregation: reconciles every perspective's judgment of a
//! candidate into one `ConsensusResult`.
//!
//! Pure and deterministic: grouping is by candidate id, sums and medians do
//! not depend on arrival order, and text is always consolidated in
//! `Perspective` declaration order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::evaluation::models::{
    CandidateId, ConsensusResult, PartialScores, Perspective, RawJudgment, ScoreCategory,
    ScoringWeights, SkillRating, INTERNAL_SCORE_SCALE, ORACLE_SCORE_SCALE,
};

const RATIONALE_SEPARATOR: &str = "\n\n---\n\n";
const NOT_PROVIDED: &str = "Not provided.";

/// Aggregates a run's valid judgments, one result per candidate present.
pub fn aggregate(
    judgments: &[RawJudgment],
    weights: &ScoringWeights,
) -> BTreeMap<CandidateId, ConsensusResult> {
    let mut groups: BTreeMap<CandidateId, Vec<&RawJudgment>> = BTreeMap::new();
    for judgment in judgments {
        groups.entry(judgment.candidate_id).or_default().push(judgment);
    }

    groups
        .into_iter()
        .map(|(candidate_id, mut group)| {
            group.sort_by_key(|j| j.perspective);
            (candidate_id, consolidate(candidate_id, &group, weights))
        })
        .collect()
}

/// `group` is non-empty and sorted by perspective.
fn consolidate(
    candidate_id: CandidateId,
    group: &[&RawJudgment],
    weights: &ScoringWeights,
) -> ConsensusResult {
    let partial_averages = average_scores(group);

    let rationale = group
        .iter()
        .map(|j| {
            format!(
                "--- Rationale from {} ---\n{}",
                j.perspective.label(),
                or_not_provided(&j.rationale)
            )
        })
        .collect::<Vec<_>>()
        .join(RATIONALE_SEPARATOR);

    let justification = group
        .iter()
        .map(|j| format!("- {}: {}", j.perspective, or_not_provided(&j.justification)))
        .collect::<Vec<_>>()
        .join("\n");

    let questions = Perspective::ALL
        .into_iter()
        .map(|p| {
            let asked = group
                .iter()
                .filter(|j| j.perspective == p)
                .flat_map(|j| j.questions.iter().map(String::as_str));
            (p, dedup_preserving_order(asked))
        })
        .collect();

    ConsensusResult {
        candidate_id,
        global_score: weights.global_score(&partial_averages),
        partial_averages,
        rationale,
        justification,
        hard_skills: skill_ratings(group.iter().map(|j| &j.hard_skills)),
        soft_skills: skill_ratings(group.iter().map(|j| &j.soft_skills)),
        questions,
        contributing_perspectives: group
            .iter()
            .map(|j| j.perspective)
            .collect::<BTreeSet<_>>()
            .len(),
        degraded_judgments: group.iter().filter(|j| j.degraded).count(),
    }
}

/// Per category: Σ(score rescaled to 0–10) / number of judgments, rounded to
/// two decimals. A judgment missing a category adds nothing to that sum but
/// still counts in the divisor.
fn average_scores(group: &[&RawJudgment]) -> PartialScores {
    let contributors = group.len() as f64;
    let mut averages = PartialScores::default();
    for category in ScoreCategory::ALL {
        let sum: f64 = group
            .iter()
            .filter_map(|j| j.partial_scores.get(&category))
            .map(|score| score / ORACLE_SCORE_SCALE * INTERNAL_SCORE_SCALE)
            .sum();
        averages.set(category, round_to_hundredths(sum / contributors));
    }
    averages
}

fn or_not_provided(text: &str) -> &str {
    match text.trim() {
        "" => NOT_PROVIDED,
        trimmed => trimmed,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn skill_ratings<'a>(
    per_judgment: impl Iterator<Item = &'a BTreeMap<String, String>>,
) -> BTreeMap<String, SkillRating> {
    let mut collected: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for ratings in per_judgment {
        for (skill, rating) in ratings {
            collected.entry(skill.as_str()).or_default().push(rating.as_str());
        }
    }
    collected
        .into_iter()
        .map(|(skill, ratings)| (skill.to_string(), skill_consensus(&ratings)))
        .collect()
}

/// Median of the parseable ratings on A=1..D=4, rounded half-to-even, mapped
/// back to a letter. No parseable rating means no evidence: `A`.
pub fn skill_consensus(ratings: &[&str]) -> SkillRating {
    let mut ordinals: Vec<u8> = ratings
        .iter()
        .filter_map(|r| SkillRating::parse(r))
        .map(SkillRating::ordinal)
        .collect();
    if ordinals.is_empty() {
        return SkillRating::A;
    }
    ordinals.sort_unstable();

    let mid = ordinals.len() / 2;
    let median = if ordinals.len() % 2 == 1 {
        f64::from(ordinals[mid])
    } else {
        (f64::from(ordinals[mid - 1]) + f64::from(ordinals[mid])) / 2.0
    };

    SkillRating::from_ordinal(median.round_ties_even() as i64).unwrap_or(SkillRating::A)
}

/// Drops exact-text repeats, keeping the first occurrence's position.
pub fn dedup_preserving_order<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

/// One evaluator's part of a consolidated justification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JustificationEntry {
    pub evaluator: String,
    pub text: String,
}

/// Splits a consolidated justification back into per-evaluator entries.
/// Lines that do not open a new `- <label>: ` entry continue the previous
/// one; text before the first entry is kept under an empty evaluator.
pub fn split_justification(consolidated: &str) -> Vec<JustificationEntry> {
    let mut entries: Vec<JustificationEntry> = Vec::new();
    for line in consolidated.lines() {
        let opened = line
            .strip_prefix("- ")
            .and_then(|rest| rest.split_once(": "))
            .filter(|(label, _)| Perspective::from_label(label).is_some());

        if let Some((label, text)) = opened {
            entries.push(JustificationEntry {
                evaluator: label.to_string(),
                text: text.to_string(),
            });
        } else if let Some(last) = entries.last_mut() {
            last.text.push('\n');
            last.text.push_str(line);
        } else if !line.trim().is_empty() {
            entries.push(JustificationEntry {
                evaluator: String::new(),
                text: line.to_string(),
            });
        }
    }
    entries
}
