use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable checkpoint for one export run. Persisted to the blob store at the
/// end of every chunk step and deleted on successful finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobState {
    pub job_id: String,
    pub object_key: String,
    /// Continuation token for the next step. Always `Some` while persisted;
    /// a finished job has no checkpoint at all.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub chunk_keys: Vec<String>,
    #[serde(default)]
    pub chunk_count: usize,
    /// Converted features across all completed chunks. Excludes the batch
    /// currently being merged at finalize time.
    #[serde(default)]
    pub total_features: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    pub fn new(job_id: String, object_key: String) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            object_key,
            cursor: None,
            chunk_keys: Vec::new(),
            chunk_count: 0,
            total_features: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_state_starts_empty() {
        let state = JobState::new("job-1".to_string(), "churches.geojson".to_string());
        assert!(state.cursor.is_none());
        assert!(state.chunk_keys.is_empty());
        assert_eq!(state.chunk_count, 0);
        assert_eq!(state.total_features, 0);
    }

    #[test]
    fn test_job_state_serde_roundtrip() {
        let mut state = JobState::new("job-1".to_string(), "churches.geojson".to_string());
        state.cursor = Some("itrNextPage".to_string());
        state.chunk_keys.push("jobs/job-1/chunk-00000.json".to_string());
        state.chunk_count = 1;
        state.total_features = 98;

        let json = serde_json::to_string(&state).expect("serialize");
        let parsed: JobState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_job_state_missing_optional_fields_default() {
        let json = r#"{
            "job_id": "job-2",
            "object_key": "churches.geojson",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let state: JobState = serde_json::from_str(json).expect("deserialize");
        assert!(state.cursor.is_none());
        assert_eq!(state.chunk_count, 0);
        assert_eq!(state.total_features, 0);
    }
}
