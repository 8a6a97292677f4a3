use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use super::AiError;
use crate::models::CodingSystem;

/// One code as it arrives on the wire, before a surrogate id is minted.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestedCode {
    pub code: String,
    pub description: String,
    pub confidence: f64,
}

/// The five completion operations this crate consumes.
///
/// All text understanding is delegated here. Implementations may be
/// invoked more than once for the same logical request — retries do not
/// guarantee exactly-once delivery.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Ordered clinical concept labels found in the document text.
    async fn extract_concepts(&self, document_text: &str) -> Result<Vec<String>, AiError>;

    /// Ordered diagnostic code suggestions for the given coding system.
    async fn suggest_diagnoses(
        &self,
        clinical_text: &str,
        coding_system: CodingSystem,
    ) -> Result<Vec<SuggestedCode>, AiError>;

    /// Verbatim text extraction from a scanned document (base64 data URI).
    async fn extract_text_from_document(
        &self,
        data_uri: &str,
        mime_type: &str,
    ) -> Result<String, AiError>;

    /// Condensed rendition of a long, redundant document (base64 data URI).
    async fn condense_extensive_document(
        &self,
        data_uri: &str,
        mime_type: &str,
    ) -> Result<String, AiError>;

    /// Short clinical summary of the notes.
    async fn summarize_clinical_notes(&self, clinical_text: &str) -> Result<String, AiError>;
}

// ═══════════════════════════════════════════════════════════
// MockCompletionService — scripted outcomes for tests
// ═══════════════════════════════════════════════════════════

/// Scripted mock: each operation pops the next queued outcome and counts
/// its invocations. An empty queue yields a `MalformedResponse` error so
/// an unscripted call fails loudly instead of hanging a test.
#[derive(Default)]
pub struct MockCompletionService {
    concepts: Mutex<VecDeque<Result<Vec<String>, AiError>>>,
    diagnoses: Mutex<VecDeque<Result<Vec<SuggestedCode>, AiError>>>,
    extractions: Mutex<VecDeque<Result<String, AiError>>>,
    condensations: Mutex<VecDeque<Result<String, AiError>>>,
    summaries: Mutex<VecDeque<Result<String, AiError>>>,
    concept_calls: AtomicUsize,
    diagnosis_calls: AtomicUsize,
    extraction_calls: AtomicUsize,
    condensation_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_concepts(self, outcome: Result<Vec<String>, AiError>) -> Self {
        self.concepts.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_diagnoses(self, outcome: Result<Vec<SuggestedCode>, AiError>) -> Self {
        self.diagnoses.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_extraction(self, outcome: Result<String, AiError>) -> Self {
        self.extractions.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_condensation(self, outcome: Result<String, AiError>) -> Self {
        self.condensations.lock().unwrap().push_back(outcome);
        self
    }

    pub fn script_summary(self, outcome: Result<String, AiError>) -> Self {
        self.summaries.lock().unwrap().push_back(outcome);
        self
    }

    pub fn concept_calls(&self) -> usize {
        self.concept_calls.load(Ordering::SeqCst)
    }

    pub fn diagnosis_calls(&self) -> usize {
        self.diagnosis_calls.load(Ordering::SeqCst)
    }

    pub fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }

    pub fn condensation_calls(&self) -> usize {
        self.condensation_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    fn next<T>(queue: &Mutex<VecDeque<Result<T, AiError>>>, op: &str) -> Result<T, AiError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::MalformedResponse(format!("mock: no scripted {op} outcome"))))
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn extract_concepts(&self, _document_text: &str) -> Result<Vec<String>, AiError> {
        self.concept_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.concepts, "concept extraction")
    }

    async fn suggest_diagnoses(
        &self,
        _clinical_text: &str,
        _coding_system: CodingSystem,
    ) -> Result<Vec<SuggestedCode>, AiError> {
        self.diagnosis_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.diagnoses, "diagnosis suggestion")
    }

    async fn extract_text_from_document(
        &self,
        _data_uri: &str,
        _mime_type: &str,
    ) -> Result<String, AiError> {
        self.extraction_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.extractions, "document extraction")
    }

    async fn condense_extensive_document(
        &self,
        _data_uri: &str,
        _mime_type: &str,
    ) -> Result<String, AiError> {
        self.condensation_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.condensations, "document condensation")
    }

    async fn summarize_clinical_notes(&self, _clinical_text: &str) -> Result<String, AiError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.summaries, "summarization")
    }
}
