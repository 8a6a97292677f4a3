//! Import payload validation.
//!
//! An import is all-or-nothing: the whole payload is parsed and
//! structurally validated here before the store mutates anything.
//! Record ids in the payload are ignored — the store reassigns them —
//! but every other required field must be present and well-typed.

use serde::Deserialize;

use super::HistoryError;
use crate::models::{CodingSystem, DiagnosisSuggestion, HistoryDraft};

/// One validated record ready for insertion, timestamp preserved from
/// the payload.
#[derive(Debug)]
pub(super) struct ImportedEntry {
    pub timestamp: i64,
    pub draft: HistoryDraft,
}

/// A record as it appears in an export payload. Unknown fields (such
/// as the exported `id`) are tolerated and discarded; missing required
/// fields reject the import.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedRecord {
    timestamp: f64,
    clinical_text: String,
    coding_system: CodingSystem,
    extracted_concepts: Vec<String>,
    suggested_diagnoses: Vec<ImportedDiagnosis>,
    #[serde(default)]
    source_file_name: Option<String>,
    #[serde(default)]
    clinical_summary: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedDiagnosis {
    id: String,
    code: String,
    description: String,
    confidence: f64,
    #[serde(default)]
    is_principal: bool,
    #[serde(default)]
    is_selected: bool,
}

/// Parse and validate an import payload.
///
/// Rejects anything that is not a JSON array of fully-formed records;
/// nothing is partially accepted.
pub(super) fn parse_import(raw: &str) -> Result<Vec<ImportedEntry>, HistoryError> {
    let records: Vec<ImportedRecord> =
        serde_json::from_str(raw).map_err(|e| HistoryError::InvalidImport(e.to_string()))?;

    Ok(records.into_iter().map(ImportedEntry::from).collect())
}

impl From<ImportedRecord> for ImportedEntry {
    fn from(record: ImportedRecord) -> Self {
        Self {
            timestamp: record.timestamp as i64,
            draft: HistoryDraft {
                clinical_text: record.clinical_text,
                coding_system: record.coding_system,
                extracted_concepts: record.extracted_concepts,
                suggested_diagnoses: record
                    .suggested_diagnoses
                    .into_iter()
                    .map(DiagnosisSuggestion::from)
                    .collect(),
                source_file_name: record.source_file_name,
                clinical_summary: record.clinical_summary,
            },
        }
    }
}

impl From<ImportedDiagnosis> for DiagnosisSuggestion {
    fn from(d: ImportedDiagnosis) -> Self {
        Self {
            id: d.id,
            code: d.code,
            description: d.description,
            confidence: d.confidence,
            is_principal: d.is_principal,
            is_selected: d.is_selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::HistoryStore;
    use super::*;
    use crate::models::CodingSystem;

    fn draft(text: &str) -> HistoryDraft {
        HistoryDraft {
            clinical_text: text.into(),
            coding_system: CodingSystem::Icd11,
            extracted_concepts: vec!["fever".into(), "cough".into()],
            suggested_diagnoses: vec![DiagnosisSuggestion::arriving(
                "CA40.0",
                "Bacterial pneumonia",
                0.74,
            )],
            source_file_name: Some("scan.pdf".into()),
            clinical_summary: None,
        }
    }

    #[test]
    fn parse_accepts_minimal_record() {
        let raw = r#"[{
            "timestamp": 1760000000000,
            "clinicalText": "fever",
            "codingSystem": "icd10",
            "extractedConcepts": ["fever"],
            "suggestedDiagnoses": [{
                "id": "abc-1",
                "code": "R50.9",
                "description": "Fever, unspecified",
                "confidence": 0.9
            }]
        }]"#;

        let entries = parse_import(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, 1_760_000_000_000);
        let d = &entries[0].draft.suggested_diagnoses[0];
        // Missing optional booleans default to false.
        assert!(!d.is_principal);
        assert!(!d.is_selected);
    }

    #[test]
    fn parse_tolerates_exported_id_field() {
        let raw = r#"[{
            "id": 42,
            "timestamp": 1,
            "clinicalText": "t",
            "codingSystem": "snomed_ct",
            "extractedConcepts": [],
            "suggestedDiagnoses": []
        }]"#;
        let entries = parse_import(raw).unwrap();
        assert_eq!(entries[0].draft.coding_system, CodingSystem::SnomedCt);
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(parse_import(r#"{"records": []}"#).is_err());
        assert!(parse_import("not json").is_err());
        assert!(parse_import("42").is_err());
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        // Diagnosis lacking `code`.
        let raw = r#"[{
            "timestamp": 1,
            "clinicalText": "t",
            "codingSystem": "icd10",
            "extractedConcepts": [],
            "suggestedDiagnoses": [{
                "id": "x",
                "description": "Fever",
                "confidence": 0.5
            }]
        }]"#;
        let err = parse_import(raw).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidImport(_)));
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn parse_rejects_unknown_coding_system() {
        let raw = r#"[{
            "timestamp": 1,
            "clinicalText": "t",
            "codingSystem": "icd9",
            "extractedConcepts": [],
            "suggestedDiagnoses": []
        }]"#;
        assert!(parse_import(raw).is_err());
    }

    #[test]
    fn parse_rejects_wrong_types() {
        // Non-numeric timestamp.
        let raw = r#"[{
            "timestamp": "yesterday",
            "clinicalText": "t",
            "codingSystem": "icd10",
            "extractedConcepts": [],
            "suggestedDiagnoses": []
        }]"#;
        assert!(parse_import(raw).is_err());

        // Non-string concept.
        let raw = r#"[{
            "timestamp": 1,
            "clinicalText": "t",
            "codingSystem": "icd10",
            "extractedConcepts": [7],
            "suggestedDiagnoses": []
        }]"#;
        assert!(parse_import(raw).is_err());
    }

    // ── End-to-end through the store ────────────────────────

    #[test]
    fn export_import_round_trip_preserves_contents() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.add(draft("first")).unwrap();
        store.add(draft("second")).unwrap();
        let before = store.list().unwrap();

        let payload = store.export_all().unwrap();
        let imported = store.import_replace(&payload).unwrap();
        let after = store.list().unwrap();

        assert_eq!(imported, 2);
        assert_eq!(after.len(), before.len());
        for (a, b) in before.iter().zip(&after) {
            // Contents survive; record ids are reassigned by the store.
            assert_ne!(a.id, b.id);
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.clinical_text, b.clinical_text);
            assert_eq!(a.coding_system, b.coding_system);
            assert_eq!(a.extracted_concepts, b.extracted_concepts);
            assert_eq!(a.source_file_name, b.source_file_name);
            assert_eq!(a.clinical_summary, b.clinical_summary);
            assert_eq!(
                a.suggested_diagnoses.len(),
                b.suggested_diagnoses.len()
            );
            for (da, db) in a.suggested_diagnoses.iter().zip(&b.suggested_diagnoses) {
                assert_eq!(da.id, db.id);
                assert_eq!(da.code, db.code);
                assert_eq!(da.description, db.description);
            }
        }
    }

    #[test]
    fn import_replaces_existing_records() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.add(draft("old")).unwrap();

        let other = HistoryStore::open_in_memory().unwrap();
        other.add(draft("imported")).unwrap();
        let payload = other.export_all().unwrap();

        store.import_replace(&payload).unwrap();
        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].clinical_text, "imported");
    }

    #[test]
    fn failed_import_leaves_store_unchanged() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.add(draft("keep me")).unwrap();
        let before = store.export_all().unwrap();

        let err = store.import_replace(r#"[{"timestamp": 1}]"#).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidImport(_)));

        // Byte-for-byte identical export → nothing moved.
        assert_eq!(store.export_all().unwrap(), before);
    }

    #[test]
    fn import_notifies_subscribers() {
        let store = HistoryStore::open_in_memory().unwrap();
        let rx = store.subscribe();

        let other = HistoryStore::open_in_memory().unwrap();
        other.add(draft("a")).unwrap();
        other.add(draft("b")).unwrap();

        store.import_replace(&other.export_all().unwrap()).unwrap();
        assert_eq!(rx.borrow().len(), 2);
    }
}
