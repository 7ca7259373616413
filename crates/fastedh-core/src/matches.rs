//! Match history contract.
//!
//! The history lives in a remote read-only table; this crate only defines
//! what it expects from that backend. Records are opaque JSON objects.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TrackerError;

/// One row of the remote match table.
pub type MatchRecord = Map<String, Value>;

/// Read-only access to the remote match table.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Select every row. `Ok(None)` means the backend answered without data.
    async fn select_all(&self) -> Result<Option<Vec<MatchRecord>>, TrackerError>;
}

/// Load the full match history.
///
/// Backend errors surface as [`TrackerError::Query`]; a response without data
/// is [`TrackerError::NoMatches`].
pub async fn load_matches(source: &dyn MatchSource) -> Result<Vec<MatchRecord>, TrackerError> {
    let matches = source
        .select_all()
        .await
        .map_err(|e| match e {
            TrackerError::Query(message) => TrackerError::Query(message),
            other => TrackerError::Query(other.to_string()),
        })?
        .ok_or(TrackerError::NoMatches)?;
    debug!(count = matches.len(), "Loaded match history");
    Ok(matches)
}
