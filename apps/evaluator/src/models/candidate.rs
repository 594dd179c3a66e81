use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A candidate as stored. `profile` is the raw JSON document text; it is
/// parsed (and repaired to `{}` when malformed) by the candidate pool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub profile: Option<String>,
}
