//! Form-scoped case state.
//!
//! One `CaseSession` owns the active [`ClinicalCase`] plus the
//! collections the orchestration produces: extracted concepts, the
//! curated diagnosis list, and the optional clinical summary. Loading a
//! history record copies it by value — edits here never touch the
//! stored record until an explicit new save.

use crate::curation::DiagnosisList;
use crate::history::HistoryError;
use crate::ingestion::{self, IngestOutcome, IngestionError, UploadedFile};
use crate::models::{ClinicalCase, CodingSystem, ExtractionMode, HistoryDraft, HistoryRecord};
use crate::orchestrator::{SubmissionError, SubmissionOutcome, SuggestionOrchestrator};
use crate::retry::{RetryObserver, RetrySchedule};
use crate::ai::CompletionService;

#[derive(Debug, Default)]
pub struct CaseSession {
    case: ClinicalCase,
    concepts: Vec<String>,
    diagnoses: DiagnosisList,
    summary: Option<String>,
    ingestion_error: Option<IngestionError>,
}

impl CaseSession {
    pub fn new(coding_system: CodingSystem) -> Self {
        Self {
            case: ClinicalCase::empty(coding_system),
            ..Self::default()
        }
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn case(&self) -> &ClinicalCase {
        &self.case
    }

    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }

    pub fn diagnoses(&self) -> &DiagnosisList {
        &self.diagnoses
    }

    pub fn diagnoses_mut(&mut self) -> &mut DiagnosisList {
        &mut self.diagnoses
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn ingestion_error(&self) -> Option<&IngestionError> {
        self.ingestion_error.as_ref()
    }

    pub fn set_clinical_text(&mut self, text: &str) {
        self.case.clinical_text = text.to_string();
    }

    pub fn set_coding_system(&mut self, coding_system: CodingSystem) {
        self.case.coding_system = coding_system;
    }

    // ── Ingestion ───────────────────────────────────────────

    /// Ingest an uploaded file into the case.
    ///
    /// The current clinical text and any displayed ingestion error are
    /// cleared *before* ingestion begins; on rejection (unsupported
    /// type, unreadable file) the text stays blank and the error is
    /// retained for display.
    pub async fn ingest_upload(
        &mut self,
        file: &UploadedFile,
        mode: ExtractionMode,
        schedule: &RetrySchedule,
        observer: &dyn RetryObserver,
        service: &dyn CompletionService,
    ) -> Result<(), IngestionError> {
        self.case.clinical_text.clear();
        self.case.source_file_name = None;
        self.ingestion_error = None;

        match ingestion::ingest_file(file, mode, schedule, observer, service).await {
            Ok(IngestOutcome {
                clinical_text,
                source_file_name,
                error,
            }) => {
                self.case.clinical_text = clinical_text;
                self.case.source_file_name = Some(source_file_name);
                self.ingestion_error = error;
                Ok(())
            }
            Err(error) => {
                self.ingestion_error = Some(error.clone());
                Err(error)
            }
        }
    }

    // ── Submission ──────────────────────────────────────────

    /// Clear the collections a fresh submission replaces.
    ///
    /// Concepts and diagnoses go; the summary stays — summarization is
    /// an independently triggered action.
    pub fn begin_submission(&mut self) {
        self.concepts.clear();
        self.diagnoses.clear();
    }

    /// Apply a settled submission outcome, unless it is stale.
    ///
    /// Returns `false` (and changes nothing) when the outcome's
    /// generation is no longer the orchestrator's current one — a newer
    /// submission has superseded it. Fulfilled collections replace the
    /// existing ones; rejected ones leave prior state untouched.
    pub fn apply_submission(
        &mut self,
        outcome: SubmissionOutcome,
        current_generation: u64,
    ) -> bool {
        if outcome.generation != current_generation {
            tracing::info!(
                stale = outcome.generation,
                current = current_generation,
                "Discarding superseded submission outcome"
            );
            return false;
        }

        if let Some(concepts) = outcome.concepts {
            self.concepts = concepts;
        }
        if let Some(diagnoses) = outcome.diagnoses {
            self.diagnoses.replace(diagnoses);
        }
        true
    }

    /// Convenience flow: clear, submit, apply.
    ///
    /// Returns the operation-scoped error, if any, after committing
    /// whatever succeeded.
    pub async fn run_submission(
        &mut self,
        orchestrator: &SuggestionOrchestrator,
        observer: &dyn RetryObserver,
    ) -> Option<SubmissionError> {
        self.begin_submission();
        let mut outcome = orchestrator
            .submit(&self.case.clinical_text, self.case.coding_system, observer)
            .await;
        let error = outcome.error.take();
        self.apply_submission(outcome, orchestrator.current_generation());
        error
    }

    pub fn apply_summary(&mut self, summary: String) {
        self.summary = Some(summary);
    }

    // ── History interop ─────────────────────────────────────

    /// Replace the whole session with a copy of a stored record.
    pub fn load_record(&mut self, record: &HistoryRecord) {
        self.case = ClinicalCase {
            clinical_text: record.clinical_text.clone(),
            coding_system: record.coding_system,
            source_file_name: record.source_file_name.clone(),
        };
        self.concepts = record.extracted_concepts.clone();
        self.diagnoses.replace(record.suggested_diagnoses.clone());
        self.summary = record.clinical_summary.clone();
        self.ingestion_error = None;
    }

    /// Snapshot the session for saving.
    ///
    /// A case with no diagnoses and no summary has nothing worth
    /// keeping and is rejected.
    pub fn draft(&self) -> Result<HistoryDraft, HistoryError> {
        if self.diagnoses.is_empty() && self.summary.is_none() {
            return Err(HistoryError::NothingToSave);
        }
        Ok(HistoryDraft {
            clinical_text: self.case.clinical_text.clone(),
            coding_system: self.case.coding_system,
            extracted_concepts: self.concepts.clone(),
            suggested_diagnoses: self.diagnoses.items().to_vec(),
            source_file_name: self.case.source_file_name.clone(),
            clinical_summary: self.summary.clone(),
        })
    }
}
