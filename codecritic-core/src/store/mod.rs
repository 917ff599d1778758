//! Record store contract and the in-memory implementation.
//!
//! The store is an external collaborator; the pipeline interacts with it
//! only through [`RecordStore`]. The orchestrator enforces the
//! single-writer-per-id discipline: a record is inserted once with
//! `processing` status and updated once by `complete`.

use crate::models::record::{AnalysisRecord, AnalysisStatus};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Feedback on a completed analysis.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub analysis_id: Uuid,
    /// 1-5
    pub rating: u8,
    pub comment: Option<String>,
    pub helpful: bool,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a new record with `processing` status.
    async fn insert(&self, record: &AnalysisRecord) -> Result<()>;

    /// The single completion update. Fails when the record is unknown or
    /// already complete, preserving the exactly-once transition.
    async fn complete(&self, record: &AnalysisRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRecord>>;

    /// Most recent records first.
    async fn list(&self, limit: usize) -> Result<Vec<AnalysisRecord>>;

    async fn add_feedback(&self, feedback: &Feedback) -> Result<()>;
}

/// In-memory store used by tests and the one-shot CLI path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, AnalysisRecord>>,
    feedback: Mutex<Vec<Feedback>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, AnalysisRecord>>> {
        self.records
            .lock()
            .map_err(|_| crate::Error::Store("record map poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        let mut records = self.lock_records()?;
        if records.contains_key(&record.id) {
            return Err(crate::Error::Store(format!(
                "record {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn complete(&self, record: &AnalysisRecord) -> Result<()> {
        let mut records = self.lock_records()?;
        match records.get(&record.id) {
            None => Err(crate::Error::Store(format!(
                "record {} does not exist",
                record.id
            ))),
            Some(existing) if existing.status == AnalysisStatus::Complete => {
                Err(crate::Error::Store(format!(
                    "record {} is already complete",
                    record.id
                )))
            }
            Some(_) => {
                records.insert(record.id, record.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRecord>> {
        Ok(self.lock_records()?.get(&id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let records = self.lock_records()?;
        let mut all: Vec<AnalysisRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn add_feedback(&self, feedback: &Feedback) -> Result<()> {
        if !(1..=5).contains(&feedback.rating) {
            return Err(crate::Error::Store(format!(
                "rating must be 1-5, got {}",
                feedback.rating
            )));
        }
        self.feedback
            .lock()
            .map_err(|_| crate::Error::Store("feedback list poisoned".to_string()))?
            .push(feedback.clone());
        Ok(())
    }
}
