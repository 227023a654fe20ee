use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::convert::record_to_feature;
use crate::errors::ParishError;
use crate::models::{AppConfig, Feature, FeatureCollection, JobState};
use crate::storage::BlobStore;
use crate::upstream::{fetch_pages, TableClient};

const DOCUMENT_CONTENT_TYPE: &str = "application/geo+json";

/// Outcome of one export step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    InProgress {
        job_id: String,
        next_cursor: String,
        processed: usize,
        total_features: usize,
        object_key: String,
    },
    Completed {
        job_id: String,
        features: usize,
        updated_at: DateTime<Utc>,
        object_key: String,
    },
}

/// Per-job async mutexes. The checkpoint is read-modify-written once per
/// step, so steps for one job id must never interleave.
#[derive(Default, Clone)]
pub struct JobLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl JobLocks {
    pub async fn lock_for(&self, job_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a finished job's entry so the map does not grow with every
    /// minted job id. In-flight holders keep their `Arc` alive.
    pub async fn release(&self, job_id: &str) {
        self.inner.lock().await.remove(job_id);
    }
}

/// Checkpointed bulk export of upstream records into the published
/// GeoJSON document.
///
/// Each step consumes a bounded number of upstream pages, persists the
/// converted features as a chunk, and advances the durable `JobState`. When
/// the upstream cursor runs out, the finalize path replays all chunks in
/// order, publishes the document, and deletes the job's artifacts.
pub struct ExportJob {
    store: Arc<dyn BlobStore>,
    tables: Arc<dyn TableClient>,
    config: Arc<AppConfig>,
    locks: JobLocks,
}

impl ExportJob {
    pub fn new(
        store: Arc<dyn BlobStore>,
        tables: Arc<dyn TableClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            tables,
            config,
            locks: JobLocks::default(),
        }
    }

    fn checkpoint_key(job_id: &str) -> String {
        format!("jobs/{}.json", job_id)
    }

    fn chunk_key(job_id: &str, sequence: usize) -> String {
        format!("jobs/{}/chunk-{:05}.json", job_id, sequence)
    }

    fn validate_job_id(job_id: &str) -> Result<()> {
        let ok = !job_id.is_empty()
            && job_id.len() <= 64
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(())
        } else {
            Err(ParishError::Validation(format!("Invalid job id: '{}'", job_id)).into())
        }
    }

    async fn load_state(&self, job_id: &str) -> Result<JobState> {
        match self.store.get(&Self::checkpoint_key(job_id)).await? {
            Some(object) => {
                let state: JobState = serde_json::from_slice(&object.body)
                    .map_err(|e| ParishError::Storage(format!("Corrupt checkpoint: {}", e)))?;
                Ok(state)
            }
            None => Ok(JobState::new(
                job_id.to_string(),
                self.config.object_key.clone(),
            )),
        }
    }

    async fn persist_state(&self, state: &JobState) -> Result<()> {
        let body = serde_json::to_vec(state)?;
        self.store
            .put(&Self::checkpoint_key(&state.job_id), body, "application/json")
            .await
    }

    /// Run one export step: fetch up to `max_pages` pages from the current
    /// cursor, convert, and either persist a chunk (more pages remain) or
    /// finalize the document (cursor exhausted).
    ///
    /// An explicit `cursor` overrides the checkpointed one, letting callers
    /// redirect a resume. Steps for the same job id are serialized.
    pub async fn step(
        &self,
        job_id: Option<String>,
        cursor: Option<String>,
        max_pages: Option<usize>,
    ) -> Result<StepOutcome> {
        let job_id = job_id.unwrap_or_else(|| Uuid::now_v7().to_string());
        Self::validate_job_id(&job_id)?;

        let lock = self.locks.lock_for(&job_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_state(&job_id).await?;
        let effective_cursor = cursor.or_else(|| state.cursor.clone());
        let max_pages = self.config.clamp_max_pages(max_pages);

        // An upstream failure here leaves the checkpoint untouched, so the
        // cursor from before this step stays valid for retry.
        let batch = fetch_pages(
            self.tables.as_ref(),
            &self.config.churches_table,
            &self.config.fetch_fields,
            self.config.page_size,
            effective_cursor,
            max_pages,
        )
        .await?;

        let features: Vec<Feature> = batch
            .records
            .iter()
            .filter_map(|record| record_to_feature(record, &self.config))
            .collect();
        let processed = features.len();

        tracing::debug!(
            "Export step for job '{}': {} pages, {} records, {} features",
            job_id,
            batch.pages_used,
            batch.records.len(),
            processed
        );

        match batch.next_cursor {
            Some(next_cursor) => {
                let chunk_key = Self::chunk_key(&job_id, state.chunk_count);
                self.store
                    .put(
                        &chunk_key,
                        serde_json::to_vec(&features)?,
                        "application/json",
                    )
                    .await?;

                // Checkpoint is written after the chunk: a crash in between
                // repeats this page range on resume rather than losing it.
                state.chunk_keys.push(chunk_key);
                state.chunk_count += 1;
                state.total_features += processed;
                state.cursor = Some(next_cursor.clone());
                state.updated_at = Utc::now();
                self.persist_state(&state).await?;

                tracing::info!(
                    "Job '{}' in progress: chunk {} persisted, {} features so far",
                    job_id,
                    state.chunk_count,
                    state.total_features
                );

                Ok(StepOutcome::InProgress {
                    job_id,
                    next_cursor,
                    processed,
                    total_features: state.total_features,
                    object_key: state.object_key,
                })
            }
            None => {
                let outcome = self.finalize(state, features).await?;
                self.locks.release(&job_id).await;
                Ok(outcome)
            }
        }
    }

    /// Replay all chunks in completion order, append the final batch,
    /// publish the document, and delete the job's artifacts.
    async fn finalize(&self, state: JobState, tail: Vec<Feature>) -> Result<StepOutcome> {
        let mut all_features: Vec<Feature> = Vec::with_capacity(state.total_features + tail.len());
        for chunk_key in &state.chunk_keys {
            let object = self.store.get(chunk_key).await?.ok_or_else(|| {
                ParishError::Storage(format!("Missing chunk '{}' at finalize", chunk_key))
            })?;
            let chunk: Vec<Feature> = serde_json::from_slice(&object.body)
                .map_err(|e| ParishError::Storage(format!("Corrupt chunk '{}': {}", chunk_key, e)))?;
            all_features.extend(chunk);
        }
        all_features.extend(tail);
        let total = all_features.len();

        let document = FeatureCollection::new(all_features);
        self.store
            .put(
                &state.object_key,
                serde_json::to_vec(&document)?,
                DOCUMENT_CONTENT_TYPE,
            )
            .await?;

        for chunk_key in &state.chunk_keys {
            self.store.delete(chunk_key).await?;
        }
        self.store
            .delete(&Self::checkpoint_key(&state.job_id))
            .await?;

        let updated_at = Utc::now();
        tracing::info!(
            "Job '{}' completed: {} features published to '{}'",
            state.job_id,
            total,
            state.object_key
        );

        Ok(StepOutcome::Completed {
            job_id: state.job_id,
            features: total,
            updated_at,
            object_key: state.object_key,
        })
    }

    /// Drive `step` in-process until completion, bounded by the configured
    /// iteration ceiling. Holds no state of its own.
    pub async fn run_to_completion(
        &self,
        job_id: Option<String>,
        cursor: Option<String>,
        max_pages: Option<usize>,
    ) -> Result<StepOutcome> {
        let mut job_id = job_id;
        let mut cursor = cursor;

        for _ in 0..self.config.max_iterations {
            match self.step(job_id.take(), cursor.take(), max_pages).await? {
                StepOutcome::InProgress {
                    job_id: id,
                    next_cursor,
                    ..
                } => {
                    job_id = Some(id);
                    // The cursor is already checkpointed; passing it again is
                    // harmless and keeps the loop explicit.
                    cursor = Some(next_cursor);
                }
                completed @ StepOutcome::Completed { .. } => return Ok(completed),
            }
        }

        Err(ParishError::Internal(format!(
            "Export did not complete within {} iterations",
            self.config.max_iterations
        ))
        .into())
    }
}
