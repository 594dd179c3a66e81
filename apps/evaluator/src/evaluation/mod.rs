// Candidate evaluation pipeline.
// Requirements + candidate pool -> one judgment per (candidate, perspective)
// -> consensus per candidate -> one atomic write.
// Oracle calls go through the JudgmentOracle trait; storage through EvaluationStore.

pub mod candidates;
pub mod consensus;
pub mod dispatcher;
pub mod handlers;
pub mod judgment;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod persistence;
pub mod prompts;
pub mod requirements;
