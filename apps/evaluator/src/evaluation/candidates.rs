use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::evaluation::models::CandidateId;
use crate::models::candidate::CandidateRow;
use crate::store::EvaluationStore;

/// Every candidate's profile document, loaded once per run. Profiles are
/// shared with dispatch tasks without copying.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    profiles: BTreeMap<CandidateId, Arc<Value>>,
}

impl CandidatePool {
    pub fn from_rows(rows: Vec<CandidateRow>) -> Self {
        let profiles = rows
            .into_iter()
            .map(|row| {
                let profile = parse_profile(row.id, row.profile.as_deref());
                (row.id, Arc::new(profile))
            })
            .collect();
        Self { profiles }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CandidateId, &Arc<Value>)> {
        self.profiles.iter().map(|(id, profile)| (*id, profile))
    }
}

/// Loads every candidate. An empty pool is `EmptyPool`: the run must stop.
pub async fn load_candidate_pool(store: &dyn EvaluationStore) -> Result<CandidatePool, PipelineError> {
    let rows = store
        .fetch_candidates()
        .await
        .map_err(PipelineError::Storage)?;

    let pool = CandidatePool::from_rows(rows);
    if pool.is_empty() {
        return Err(PipelineError::EmptyPool);
    }

    info!(candidates = pool.len(), "candidate pool loaded");
    Ok(pool)
}

/// Parses a stored profile document. Missing or corrupt documents become `{}`
/// so one bad record cannot block the rest of the pool.
pub fn parse_profile(candidate_id: CandidateId, raw: Option<&str>) -> Value {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Value::Object(Map::new());
    };
    match serde_json::from_str(raw) {
        Ok(profile) => profile,
        Err(e) => {
            warn!(candidate_id, error = %e, "malformed profile document, using empty profile");
            Value::Object(Map::new())
        }
    }
}
