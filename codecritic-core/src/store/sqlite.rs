//! SQLite record store.
//!
//! Materializes the five-relation layout (`analyses`, `findings`,
//! `stage_logs`, `linguistic_details`, `feedback`). Pattern and stage tags
//! are stored as their canonical strings and re-validated on read, so an
//! unknown tag can never cross the persistence boundary in either
//! direction.

use super::{Feedback, RecordStore};
use crate::models::finding::{DetectionStage, Finding, Pattern};
use crate::models::record::{AnalysisRecord, AnalysisStatus, LinguisticExtras, StageLog};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS analyses (
    id               TEXT PRIMARY KEY,
    prompt           TEXT NOT NULL,
    code             TEXT NOT NULL,
    language         TEXT NOT NULL,
    status           TEXT NOT NULL,
    overall_severity INTEGER NOT NULL,
    has_bugs         INTEGER NOT NULL,
    summary          TEXT NOT NULL,
    confidence       REAL NOT NULL,
    created_at       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS findings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id     TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    pattern         TEXT NOT NULL,
    severity        INTEGER NOT NULL,
    confidence      REAL NOT NULL,
    description     TEXT NOT NULL,
    location        TEXT,
    fix_hint        TEXT,
    detection_stage TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stage_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    stage_name  TEXT NOT NULL,
    success     INTEGER NOT NULL,
    error       TEXT,
    elapsed_s   REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS linguistic_details (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id        TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    intent_match_score REAL,
    unprompted_features TEXT NOT NULL,
    missing_features    TEXT NOT NULL,
    hardcoded_values    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS feedback (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment     TEXT,
    helpful     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_findings_analysis ON findings(analysis_id);
CREATE INDEX IF NOT EXISTS idx_stage_logs_analysis ON stage_logs(analysis_id);
";

/// SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| crate::Error::Store("connection poisoned".to_string()))
    }

    fn write_children(tx: &rusqlite::Transaction<'_>, record: &AnalysisRecord) -> Result<()> {
        let id = record.id.to_string();
        for finding in &record.findings {
            tx.execute(
                "INSERT INTO findings
                 (analysis_id, pattern, severity, confidence, description, location, fix_hint, detection_stage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    finding.pattern.tag(),
                    finding.severity,
                    finding.confidence,
                    finding.description,
                    finding.location,
                    finding.fix_hint,
                    finding.detection_stage.to_string(),
                ],
            )?;
        }
        for log in &record.stage_logs {
            tx.execute(
                "INSERT INTO stage_logs (analysis_id, stage_name, success, error, elapsed_s)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, log.stage, log.success, log.error, log.elapsed_seconds],
            )?;
        }
        let extras = &record.linguistic_extras;
        tx.execute(
            "INSERT INTO linguistic_details
             (analysis_id, intent_match_score, unprompted_features, missing_features, hardcoded_values)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                extras.intent_match_score,
                serde_json::to_string(&extras.unprompted_features)?,
                serde_json::to_string(&extras.missing_features)?,
                serde_json::to_string(&extras.hardcoded_values)?,
            ],
        )?;
        Ok(())
    }

    fn read_record(conn: &Connection, id: Uuid) -> Result<Option<AnalysisRecord>> {
        let id_text = id.to_string();
        let head = conn
            .query_row(
                "SELECT prompt, code, language, status, overall_severity, has_bugs, summary, created_at
                 FROM analyses WHERE id = ?1",
                params![id_text],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u8>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((prompt, code, language, status, overall_severity, has_bugs, summary, created_at)) =
            head
        else {
            return Ok(None);
        };

        let status = match status.as_str() {
            "processing" => AnalysisStatus::Processing,
            "complete" => AnalysisStatus::Complete,
            other => {
                return Err(crate::Error::Store(format!("unknown status: {other}")));
            }
        };
        let created_at: DateTime<Utc> = created_at
            .parse()
            .map_err(|e| crate::Error::Store(format!("bad created_at: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT pattern, severity, confidence, description, location, fix_hint, detection_stage
             FROM findings WHERE analysis_id = ?1 ORDER BY id",
        )?;
        let findings = stmt
            .query_map(params![id_text], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(pattern, severity, confidence, description, location, fix_hint, stage)| {
                // Reject unknown tags: the taxonomy is a closed sum.
                let pattern: Pattern = pattern.parse()?;
                let detection_stage: DetectionStage = stage.parse()?;
                Ok(Finding {
                    pattern,
                    severity,
                    confidence,
                    description,
                    location,
                    column: None,
                    fix_hint,
                    detection_stage,
                    evidence: serde_json::json!({}),
                })
            })
            .collect::<Result<Vec<Finding>>>()?;

        let mut stmt = conn.prepare(
            "SELECT stage_name, success, error, elapsed_s
             FROM stage_logs WHERE analysis_id = ?1 ORDER BY id",
        )?;
        let stage_logs = stmt
            .query_map(params![id_text], |row| {
                Ok(StageLog {
                    stage: row.get(0)?,
                    success: row.get(1)?,
                    error: row.get(2)?,
                    elapsed_seconds: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let extras = conn
            .query_row(
                "SELECT intent_match_score, unprompted_features, missing_features, hardcoded_values
                 FROM linguistic_details WHERE analysis_id = ?1 ORDER BY id DESC LIMIT 1",
                params![id_text],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let linguistic_extras = match extras {
            Some((score, unprompted, missing, hardcoded)) => LinguisticExtras {
                intent_match_score: score,
                unprompted_features: serde_json::from_str(&unprompted)?,
                missing_features: serde_json::from_str(&missing)?,
                hardcoded_values: serde_json::from_str(&hardcoded)?,
            },
            None => LinguisticExtras::default(),
        };

        Ok(Some(AnalysisRecord {
            id,
            prompt,
            code,
            language,
            status,
            has_bugs,
            overall_severity,
            summary,
            findings,
            stage_logs,
            linguistic_extras,
            created_at,
        }))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO analyses
             (id, prompt, code, language, status, overall_severity, has_bugs, summary, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.prompt,
                record.code,
                record.language,
                record.status.to_string(),
                record.overall_severity,
                record.has_bugs,
                record.summary,
                record.confidence(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(crate::Error::Store(format!(
                "record {} already exists",
                record.id
            )));
        }
        Self::write_children(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    async fn complete(&self, record: &AnalysisRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = record.id.to_string();
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM analyses WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match current.as_deref() {
            None => {
                return Err(crate::Error::Store(format!(
                    "record {} does not exist",
                    record.id
                )))
            }
            Some("complete") => {
                return Err(crate::Error::Store(format!(
                    "record {} is already complete",
                    record.id
                )))
            }
            Some(_) => {}
        }

        // The completion rewrites the findings wholesale: the linguistic
        // pass replaces the preliminary set.
        tx.execute("DELETE FROM findings WHERE analysis_id = ?1", params![id])?;
        tx.execute("DELETE FROM stage_logs WHERE analysis_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM linguistic_details WHERE analysis_id = ?1",
            params![id],
        )?;
        tx.execute(
            "UPDATE analyses
             SET status = ?2, overall_severity = ?3, has_bugs = ?4, summary = ?5, confidence = ?6
             WHERE id = ?1",
            params![
                id,
                AnalysisStatus::Complete.to_string(),
                record.overall_severity,
                record.has_bugs,
                record.summary,
                record.confidence(),
            ],
        )?;
        Self::write_children(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRecord>> {
        let conn = self.lock()?;
        Self::read_record(&conn, id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let ids: Vec<Uuid> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT id FROM analyses ORDER BY created_at DESC, id LIMIT ?1",
            )?;
            let collected = stmt
                .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            collected
        };
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get(id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn add_feedback(&self, feedback: &Feedback) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feedback (analysis_id, rating, comment, helpful)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                feedback.analysis_id.to_string(),
                feedback.rating,
                feedback.comment,
                feedback.helpful,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::{DetectionStage, Finding, Pattern};

    fn sample_record() -> AnalysisRecord {
        let mut record = AnalysisRecord::new("divide a by b", "def divide(a,b):\n    return a/b");
        record.findings.push(
            Finding::new(Pattern::MissingCornerCase, 5, DetectionStage::Static)
                .with_confidence(0.7)
                .with_description("Division by `b` has no zero check")
                .at_line(2)
                .with_fix_hint("Guard the division"),
        );
        record.stage_logs.push(StageLog::ok("static", 0.01));
        record.linguistic_extras.hardcoded_values = vec!["[1, 2, 3]".to_string()];
        record.refresh_rollups();
        record
    }

    #[tokio::test]
    async fn test_insert_get_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AnalysisStatus::Processing);
        assert_eq!(fetched.findings.len(), 1);
        assert_eq!(fetched.findings[0].pattern, Pattern::MissingCornerCase);
        assert_eq!(fetched.findings[0].location.as_deref(), Some("Line 2"));
        assert_eq!(fetched.stage_logs.len(), 1);
        assert_eq!(
            fetched.linguistic_extras.hardcoded_values,
            vec!["[1, 2, 3]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_complete_replaces_findings_and_transitions_once() {
        let store = SqliteStore::in_memory().unwrap();
        let mut record = sample_record();
        store.insert(&record).await.unwrap();

        record.status = AnalysisStatus::Complete;
        record.findings.push(
            Finding::new(Pattern::PromptBiasedCode, 6, DetectionStage::Linguistic)
                .with_description("hardcodes the example"),
        );
        record.refresh_rollups();
        store.complete(&record).await.unwrap();

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, AnalysisStatus::Complete);
        assert_eq!(fetched.findings.len(), 2);

        assert!(store.complete(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_pattern_rejected_on_read() {
        let store = SqliteStore::in_memory().unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "UPDATE findings SET pattern = 'totally_new_pattern'",
                [],
            )
            .unwrap();
        }
        assert!(store.get(record.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let mut first = sample_record();
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = sample_record();
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let listed = store.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
    }

    #[tokio::test]
    async fn test_feedback_persists_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("critic.db")).unwrap();
        let record = sample_record();
        store.insert(&record).await.unwrap();
        store
            .add_feedback(&Feedback {
                analysis_id: record.id,
                rating: 5,
                comment: None,
                helpful: true,
            })
            .await
            .unwrap();
    }
}
