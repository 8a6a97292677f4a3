//! Persistent analysis history with a reactive read model.
//!
//! Append-mostly SQLite store. Every mutation republishes the full
//! record list (timestamp descending) through a `watch` channel, so
//! readers hold a continuously updated view instead of re-polling.
//! All operations serialize on one connection lock — an import or a
//! clear can never interleave with another write.

use std::path::Path;
use std::str::FromStr;

use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::transfer;
use super::{sqlite, HistoryError};
use crate::models::{CodingSystem, ExtractionMode, HistoryDraft, HistoryRecord};

const EXTRACTION_MODE_KEY: &str = "extraction_mode";

pub struct HistoryStore {
    conn: Mutex<Connection>,
    live: watch::Sender<Vec<HistoryRecord>>,
}

impl HistoryStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Self::from_connection(sqlite::open_database(path)?)
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::from_connection(sqlite::open_memory_database()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HistoryError> {
        let initial = query_all(&conn)?;
        let (live, _) = watch::channel(initial);
        Ok(Self {
            conn: Mutex::new(conn),
            live,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn.lock().map_err(|_| HistoryError::LockPoisoned)
    }

    /// Append a new record. The store assigns the id and timestamp.
    pub fn add(&self, draft: HistoryDraft) -> Result<HistoryRecord, HistoryError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let conn = self.lock()?;
        let id = insert_record(&conn, timestamp, &draft)?;
        self.publish(&conn)?;

        tracing::info!(record_id = id, "Saved analysis to history");
        Ok(HistoryRecord {
            id,
            timestamp,
            clinical_text: draft.clinical_text,
            coding_system: draft.coding_system,
            extracted_concepts: draft.extracted_concepts,
            suggested_diagnoses: draft.suggested_diagnoses,
            source_file_name: draft.source_file_name,
            clinical_summary: draft.clinical_summary,
        })
    }

    /// Delete one record. Deleting an absent id is a recoverable,
    /// logged error — not a silent no-op.
    pub fn delete(&self, id: i64) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM history_records WHERE id = ?1", params![id])?;
        if affected == 0 {
            tracing::warn!(record_id = id, "Delete requested for unknown history record");
            return Err(HistoryError::NotFound { id });
        }
        self.publish(&conn)?;
        tracing::info!(record_id = id, "Deleted history record");
        Ok(())
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM history_records", [])?;
        self.publish(&conn)?;
        tracing::info!(removed, "Cleared history");
        Ok(())
    }

    /// All records, most recent first.
    pub fn list(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let conn = self.lock()?;
        query_all(&conn)
    }

    /// Continuously updated view of [`Self::list`]. The receiver holds
    /// the latest snapshot; no re-polling needed.
    pub fn subscribe(&self) -> watch::Receiver<Vec<HistoryRecord>> {
        self.live.subscribe()
    }

    /// Serialize every record to a JSON array.
    pub fn export_all(&self) -> Result<String, HistoryError> {
        let records = self.list()?;
        serde_json::to_string_pretty(&records)
            .map_err(|e| HistoryError::Corrupted(e.to_string()))
    }

    /// Replace the entire store with a validated import payload.
    ///
    /// The payload is parsed and validated in full before any mutation;
    /// on any failure the store is untouched. On success the clear and
    /// re-insert happen in one transaction, with ids reassigned by the
    /// store (payload ids are never trusted). Returns the record count.
    pub fn import_replace(&self, raw: &str) -> Result<usize, HistoryError> {
        let entries = transfer::parse_import(raw)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM history_records", [])?;
        // Insert in reverse payload order so the newest record gets the
        // largest id; the id tie-break then preserves payload order for
        // records with equal timestamps.
        for entry in entries.iter().rev() {
            insert_record(&tx, entry.timestamp, &entry.draft)?;
        }
        tx.commit()?;

        self.publish(&conn)?;
        tracing::info!(records = entries.len(), "Replaced history from import");
        Ok(entries.len())
    }

    // ── Preferences ─────────────────────────────────────────

    /// Persisted ingestion strategy; defaults to standard extraction.
    pub fn extraction_mode(&self) -> Result<ExtractionMode, HistoryError> {
        let conn = self.lock()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![EXTRACTION_MODE_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match stored {
            Some(value) => ExtractionMode::from_str(&value),
            None => Ok(ExtractionMode::Standard),
        }
    }

    pub fn set_extraction_mode(&self, mode: ExtractionMode) -> Result<(), HistoryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![EXTRACTION_MODE_KEY, mode.as_str()],
        )?;
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────

    fn publish(&self, conn: &Connection) -> Result<(), HistoryError> {
        let snapshot = query_all(conn)?;
        self.live.send_replace(snapshot);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(super) fn insert_record(
    conn: &Connection,
    timestamp: i64,
    draft: &HistoryDraft,
) -> Result<i64, HistoryError> {
    let concepts_json = serde_json::to_string(&draft.extracted_concepts)
        .map_err(|e| HistoryError::Corrupted(e.to_string()))?;
    let diagnoses_json = serde_json::to_string(&draft.suggested_diagnoses)
        .map_err(|e| HistoryError::Corrupted(e.to_string()))?;

    conn.execute(
        "INSERT INTO history_records (timestamp, clinical_text, coding_system,
         extracted_concepts, suggested_diagnoses, source_file_name, clinical_summary)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            timestamp,
            draft.clinical_text,
            draft.coding_system.as_str(),
            concepts_json,
            diagnoses_json,
            draft.source_file_name,
            draft.clinical_summary,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_all(conn: &Connection) -> Result<Vec<HistoryRecord>, HistoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, clinical_text, coding_system,
         extracted_concepts, suggested_diagnoses, source_file_name, clinical_summary
         FROM history_records
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(HistoryRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            clinical_text: row.get(2)?,
            coding_system: row.get(3)?,
            extracted_concepts: row.get(4)?,
            suggested_diagnoses: row.get(5)?,
            source_file_name: row.get(6)?,
            clinical_summary: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

// Internal row type for HistoryRecord mapping
struct HistoryRow {
    id: i64,
    timestamp: i64,
    clinical_text: String,
    coding_system: String,
    extracted_concepts: String,
    suggested_diagnoses: String,
    source_file_name: Option<String>,
    clinical_summary: Option<String>,
}

fn record_from_row(row: HistoryRow) -> Result<HistoryRecord, HistoryError> {
    Ok(HistoryRecord {
        id: row.id,
        timestamp: row.timestamp,
        clinical_text: row.clinical_text,
        coding_system: CodingSystem::from_str(&row.coding_system)?,
        extracted_concepts: serde_json::from_str(&row.extracted_concepts)
            .map_err(|e| HistoryError::Corrupted(format!("concept list: {e}")))?,
        suggested_diagnoses: serde_json::from_str(&row.suggested_diagnoses)
            .map_err(|e| HistoryError::Corrupted(format!("diagnosis list: {e}")))?,
        source_file_name: row.source_file_name,
        clinical_summary: row.clinical_summary,
    })
}
