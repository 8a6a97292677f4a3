use serde::{Deserialize, Serialize};

use super::case::DiagnosisSuggestion;
use super::enums::CodingSystem;

/// One persisted analysis. Created only by an explicit save; immutable
/// once stored except whole-record deletion. `id` is store-assigned and
/// `timestamp` (epoch milliseconds) is the only sort key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: i64,
    pub clinical_text: String,
    pub coding_system: CodingSystem,
    pub extracted_concepts: Vec<String>,
    pub suggested_diagnoses: Vec<DiagnosisSuggestion>,
    pub source_file_name: Option<String>,
    pub clinical_summary: Option<String>,
}

/// Everything a save provides; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct HistoryDraft {
    pub clinical_text: String,
    pub coding_system: CodingSystem,
    pub extracted_concepts: Vec<String>,
    pub suggested_diagnoses: Vec<DiagnosisSuggestion>,
    pub source_file_name: Option<String>,
    pub clinical_summary: Option<String>,
}
