//! Suggestion orchestration: concept extraction and diagnosis
//! suggestion run concurrently against the same input and settle
//! independently — partial success is a first-class outcome.
//!
//! The retry decision is joint: if either operation fails transiently
//! and attempts remain, *both* are re-invoked after the next scheduled
//! delay. Both calls take the same input and a fresh attempt is cheap
//! relative to correctness, so the already-succeeded sibling simply
//! runs again.
//!
//! Every submission carries a generation token. A new submission bumps
//! the generation, so late results of a superseded submission can be
//! recognized and discarded by the session instead of clobbering newer
//! state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::ai::{AiError, CompletionService};
use crate::models::{CodingSystem, DiagnosisSuggestion};
use crate::retry::{is_retryable, run_with_retry, RetryError, RetryNotice, RetryObserver, RetrySchedule};

// ═══════════════════════════════════════════════════════════
// Submission state machine
// ═══════════════════════════════════════════════════════════

/// Where a submission currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    Running { attempt: usize },
    Retrying { attempt: usize, total_attempts: usize },
    Settled,
}

/// Phase plus the generation it belongs to. Observers compare the
/// generation against [`SuggestionOrchestrator::current_generation`]
/// to ignore updates from superseded submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub generation: u64,
    pub phase: SubmissionPhase,
}

// ═══════════════════════════════════════════════════════════
// Outcome types
// ═══════════════════════════════════════════════════════════

/// Operation-scoped submission failure. A failed operation never aborts
/// its sibling; the variants say exactly which side failed and whether
/// the attempt ceiling was hit.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Concept extraction failed: {source}")]
    ConceptExtraction {
        exhausted: bool,
        attempts: usize,
        source: AiError,
    },

    #[error("Diagnosis suggestion failed: {source}")]
    DiagnosisSuggestion {
        exhausted: bool,
        attempts: usize,
        source: AiError,
    },

    #[error("Concept extraction failed ({concepts}); diagnosis suggestion failed ({diagnoses})")]
    Both {
        exhausted: bool,
        attempts: usize,
        concepts: AiError,
        diagnoses: AiError,
    },
}

impl SubmissionError {
    /// Message for the clinician: which sub-operation failed, whether
    /// all attempts were used up, and what to do next.
    pub fn user_message(&self) -> String {
        let (what, exhausted, attempts) = match self {
            Self::ConceptExtraction { exhausted, attempts, .. } => {
                ("Concept extraction", *exhausted, *attempts)
            }
            Self::DiagnosisSuggestion { exhausted, attempts, .. } => {
                ("Diagnosis suggestion", *exhausted, *attempts)
            }
            Self::Both { exhausted, attempts, .. } => {
                ("Concept extraction and diagnosis suggestion", *exhausted, *attempts)
            }
        };
        if exhausted {
            format!(
                "{what} failed after {attempts} attempts — the AI service is overloaded. \
                 Wait a moment and submit again."
            )
        } else {
            format!("{what} failed. Check the AI service and submit again, or continue manually.")
        }
    }
}

/// What a submission settled to. `None` collections mean "leave the
/// prior collection untouched" — that operation failed.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub generation: u64,
    pub attempts: usize,
    pub concepts: Option<Vec<String>>,
    pub diagnoses: Option<Vec<DiagnosisSuggestion>>,
    pub error: Option<SubmissionError>,
}

// ═══════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════

/// Runs the concurrent concept/diagnosis calls with joint retry.
pub struct SuggestionOrchestrator {
    service: Arc<dyn CompletionService>,
    schedule: RetrySchedule,
    generation: AtomicU64,
    phase_tx: watch::Sender<PhaseSnapshot>,
}

impl SuggestionOrchestrator {
    pub fn new(service: Arc<dyn CompletionService>, schedule: RetrySchedule) -> Self {
        let (phase_tx, _) = watch::channel(PhaseSnapshot {
            generation: 0,
            phase: SubmissionPhase::Idle,
        });
        Self {
            service,
            schedule,
            generation: AtomicU64::new(0),
            phase_tx,
        }
    }

    /// The generation of the latest submission. Outcomes carrying an
    /// older generation are stale.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Watch submission phase transitions.
    pub fn phases(&self) -> watch::Receiver<PhaseSnapshot> {
        self.phase_tx.subscribe()
    }

    fn publish(&self, generation: u64, phase: SubmissionPhase) {
        self.phase_tx.send_replace(PhaseSnapshot { generation, phase });
    }

    /// Run one submission to settlement.
    ///
    /// Always returns an outcome — orchestration failures are data, not
    /// panics. The caller decides whether the outcome is still current
    /// (see [`crate::session::CaseSession::apply_submission`]).
    pub async fn submit(
        &self,
        clinical_text: &str,
        coding_system: CodingSystem,
        observer: &dyn RetryObserver,
    ) -> SubmissionOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let total_attempts = self.schedule.total_attempts();
        let mut attempt = 1;

        tracing::info!(generation, chars = clinical_text.len(), system = coding_system.as_str(), "Submission started");
        self.publish(generation, SubmissionPhase::Running { attempt });

        loop {
            let (concepts_result, diagnoses_result) = tokio::join!(
                self.service.extract_concepts(clinical_text),
                self.service.suggest_diagnoses(clinical_text, coding_system),
            );

            let concepts_retryable =
                concepts_result.as_ref().err().map(is_retryable).unwrap_or(false);
            let diagnoses_retryable =
                diagnoses_result.as_ref().err().map(is_retryable).unwrap_or(false);

            if concepts_retryable || diagnoses_retryable {
                if let Some(delay) = self.schedule.delay_after(attempt) {
                    observer.on_retry(&RetryNotice {
                        attempt,
                        total_attempts,
                        delay,
                    });
                    self.publish(generation, SubmissionPhase::Retrying { attempt, total_attempts });
                    tracing::warn!(
                        generation,
                        attempt,
                        total_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient suggestion failure, re-running both operations"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    self.publish(generation, SubmissionPhase::Running { attempt });
                    continue;
                }
            }

            let outcome = self.finalize(generation, attempt, concepts_result, diagnoses_result);
            self.publish(generation, SubmissionPhase::Settled);
            return outcome;
        }
    }

    fn finalize(
        &self,
        generation: u64,
        attempts: usize,
        concepts_result: Result<Vec<String>, AiError>,
        diagnoses_result: Result<Vec<crate::ai::SuggestedCode>, AiError>,
    ) -> SubmissionOutcome {
        let (concepts, concepts_error) = match concepts_result {
            Ok(concepts) => (Some(concepts), None),
            Err(e) => (None, Some(e)),
        };
        let (diagnoses, diagnoses_error) = match diagnoses_result {
            Ok(codes) => {
                let minted = codes
                    .into_iter()
                    .map(|c| DiagnosisSuggestion::arriving(&c.code, &c.description, c.confidence))
                    .collect();
                (Some(minted), None)
            }
            Err(e) => (None, Some(e)),
        };

        let error = match (concepts_error, diagnoses_error) {
            (None, None) => None,
            (Some(c), None) => Some(SubmissionError::ConceptExtraction {
                exhausted: is_retryable(&c),
                attempts,
                source: c,
            }),
            (None, Some(d)) => Some(SubmissionError::DiagnosisSuggestion {
                exhausted: is_retryable(&d),
                attempts,
                source: d,
            }),
            (Some(c), Some(d)) => Some(SubmissionError::Both {
                exhausted: is_retryable(&c) || is_retryable(&d),
                attempts,
                concepts: c,
                diagnoses: d,
            }),
        };

        match &error {
            None => tracing::info!(
                generation,
                attempts,
                concepts = concepts.as_ref().map(Vec::len).unwrap_or(0),
                diagnoses = diagnoses.as_ref().map(Vec::len).unwrap_or(0),
                "Submission settled"
            ),
            Some(e) => tracing::warn!(generation, attempts, error = %e, "Submission settled with failure"),
        }

        SubmissionOutcome {
            generation,
            attempts,
            concepts,
            diagnoses,
            error,
        }
    }

    /// Generate a clinical summary. Independent of submission: never
    /// touches concepts or diagnoses, retried on the same schedule.
    pub async fn summarize(
        &self,
        clinical_text: &str,
        observer: &dyn RetryObserver,
    ) -> Result<String, RetryError> {
        run_with_retry(&self.schedule, observer, |_attempt| {
            self.service.summarize_clinical_notes(clinical_text)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::ai::{MockCompletionService, SuggestedCode};
    use crate::retry::NoopObserver;

    struct RecordingObserver {
        notices: Mutex<Vec<RetryNotice>>,
    }

    impl RecordingObserver {
        fn new() -> Self {
            Self {
                notices: Mutex::new(Vec::new()),
            }
        }

        fn delays(&self) -> Vec<Duration> {
            self.notices.lock().unwrap().iter().map(|n| n.delay).collect()
        }
    }

    impl RetryObserver for RecordingObserver {
        fn on_retry(&self, notice: &RetryNotice) {
            self.notices.lock().unwrap().push(notice.clone());
        }
    }

    fn rate_limited() -> AiError {
        AiError::Service {
            status: 429,
            body: "Rate limit exceeded, try again later".into(),
        }
    }

    fn malformed() -> AiError {
        AiError::MalformedResponse("diagnosis list: missing field `code`".into())
    }

    fn pneumonia() -> SuggestedCode {
        SuggestedCode {
            code: "J18.9".into(),
            description: "Pneumonia, unspecified organism".into(),
            confidence: 0.82,
        }
    }

    fn orchestrator(mock: Arc<MockCompletionService>) -> SuggestionOrchestrator {
        SuggestionOrchestrator::new(mock, RetrySchedule::from_millis(&[10, 20, 30]))
    }

    #[tokio::test(start_paused = true)]
    async fn both_succeed_first_attempt() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Ok(vec!["fever".into(), "cough".into()]))
                .script_diagnoses(Ok(vec![pneumonia()])),
        );
        let orch = orchestrator(mock.clone());

        let outcome = orch.submit("fever and cough", CodingSystem::Icd10, &NoopObserver).await;

        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.concepts.unwrap(), vec!["fever", "cough"]);
        let diagnoses = outcome.diagnoses.unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].code, "J18.9");
        assert!(!diagnoses[0].is_principal);
        assert!(!diagnoses[0].is_selected);
        assert_eq!(mock.concept_calls(), 1);
        assert_eq!(mock.diagnosis_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_then_success_on_fourth_attempt() {
        // Concepts succeed every time; diagnoses fail retryably on
        // attempts 1-3 and succeed on attempt 4. The joint retry
        // re-runs the already-succeeded concept call each time — both
        // operations are re-invoked even when only one failed.
        let mut mock = MockCompletionService::new();
        for _ in 0..4 {
            mock = mock.script_concepts(Ok(vec!["fever".into(), "cough".into()]));
        }
        let mock = Arc::new(
            mock.script_diagnoses(Err(rate_limited()))
                .script_diagnoses(Err(rate_limited()))
                .script_diagnoses(Err(rate_limited()))
                .script_diagnoses(Ok(vec![pneumonia()])),
        );
        let orch = orchestrator(mock.clone());
        let observer = RecordingObserver::new();

        let text = "male with fever and cough";
        assert_eq!(text.len(), 25);
        let outcome = orch.submit(text, CodingSystem::Icd10, &observer).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.concepts.unwrap(), vec!["fever", "cough"]);
        let diagnoses = outcome.diagnoses.unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert!((diagnoses[0].confidence - 0.82).abs() < f64::EPSILON);

        assert_eq!(mock.diagnosis_calls(), 4);
        assert_eq!(mock.concept_calls(), 4);
        assert_eq!(
            observer.delays(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(30),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_permanent_failure_commits_the_sibling() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Ok(vec!["fever".into()]))
                .script_diagnoses(Err(malformed())),
        );
        let orch = orchestrator(mock.clone());

        let outcome = orch.submit("fever", CodingSystem::Icd11, &NoopObserver).await;

        // No retry for a permanent failure; the fulfilled side commits.
        assert_eq!(outcome.attempts, 1);
        assert_eq!(mock.concept_calls(), 1);
        assert_eq!(mock.diagnosis_calls(), 1);
        assert_eq!(outcome.concepts.unwrap(), vec!["fever"]);
        assert!(outcome.diagnoses.is_none());
        match outcome.error.unwrap() {
            SubmissionError::DiagnosisSuggestion { exhausted, .. } => assert!(!exhausted),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn both_permanent_failures_combine() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Err(malformed()))
                .script_diagnoses(Err(malformed())),
        );
        let orch = orchestrator(mock.clone());

        let outcome = orch.submit("fever", CodingSystem::Icd10, &NoopObserver).await;

        assert!(outcome.concepts.is_none());
        assert!(outcome.diagnoses.is_none());
        assert!(matches!(outcome.error, Some(SubmissionError::Both { .. })));
        assert_eq!(mock.concept_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transient_failure_is_marked() {
        let mut mock = MockCompletionService::new();
        for _ in 0..4 {
            mock = mock
                .script_concepts(Ok(vec!["fever".into()]))
                .script_diagnoses(Err(rate_limited()));
        }
        let orch = orchestrator(Arc::new(mock));

        let outcome = orch.submit("fever", CodingSystem::Icd10, &NoopObserver).await;

        assert_eq!(outcome.attempts, 4);
        match outcome.error.unwrap() {
            SubmissionError::DiagnosisSuggestion { exhausted, attempts, .. } => {
                assert!(exhausted);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The sibling's last success still commits.
        assert_eq!(outcome.concepts.unwrap(), vec!["fever"]);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_sibling_does_not_block_joint_retry() {
        // Concepts fail permanently on attempt 1; diagnoses fail
        // retryably, so both run again. The permanent concept failure
        // repeats, the diagnoses recover.
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Err(malformed()))
                .script_concepts(Err(malformed()))
                .script_diagnoses(Err(rate_limited()))
                .script_diagnoses(Ok(vec![pneumonia()])),
        );
        let orch = orchestrator(mock.clone());

        let outcome = orch.submit("fever", CodingSystem::Icd10, &NoopObserver).await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(mock.concept_calls(), 2);
        assert_eq!(mock.diagnosis_calls(), 2);
        assert!(outcome.concepts.is_none());
        assert_eq!(outcome.diagnoses.unwrap().len(), 1);
        assert!(matches!(
            outcome.error,
            Some(SubmissionError::ConceptExtraction { exhausted: false, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn generations_increase_per_submission() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Ok(vec![]))
                .script_diagnoses(Ok(vec![]))
                .script_concepts(Ok(vec![]))
                .script_diagnoses(Ok(vec![])),
        );
        let orch = orchestrator(mock);

        let first = orch.submit("a", CodingSystem::Icd10, &NoopObserver).await;
        let second = orch.submit("b", CodingSystem::Icd10, &NoopObserver).await;

        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
        assert_eq!(orch.current_generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn phases_progress_through_retry_to_settled() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_concepts(Ok(vec![]))
                .script_concepts(Ok(vec![]))
                .script_diagnoses(Err(rate_limited()))
                .script_diagnoses(Ok(vec![])),
        );
        let orch = orchestrator(mock);
        let mut phases = orch.phases();

        assert_eq!(
            *phases.borrow(),
            PhaseSnapshot {
                generation: 0,
                phase: SubmissionPhase::Idle,
            }
        );

        orch.submit("fever", CodingSystem::Icd10, &NoopObserver).await;

        // The watch channel keeps the latest value.
        assert!(phases.has_changed().unwrap());
        let last = phases.borrow_and_update().clone();
        assert_eq!(last.generation, 1);
        assert_eq!(last.phase, SubmissionPhase::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn summarize_retries_independently() {
        let mock = Arc::new(
            MockCompletionService::new()
                .script_summary(Err(rate_limited()))
                .script_summary(Ok("Febrile respiratory illness.".into())),
        );
        let orch = orchestrator(mock.clone());

        let summary = orch.summarize("long notes", &NoopObserver).await.unwrap();

        assert_eq!(summary, "Febrile respiratory illness.");
        assert_eq!(mock.summary_calls(), 2);
        assert_eq!(mock.concept_calls(), 0);
        assert_eq!(mock.diagnosis_calls(), 0);
    }

    #[test]
    fn user_messages_name_the_failing_operation() {
        let err = SubmissionError::DiagnosisSuggestion {
            exhausted: true,
            attempts: 4,
            source: rate_limited(),
        };
        let msg = err.user_message();
        assert!(msg.contains("Diagnosis suggestion"));
        assert!(msg.contains("4 attempts"));

        let err = SubmissionError::ConceptExtraction {
            exhausted: false,
            attempts: 1,
            source: malformed(),
        };
        assert!(err.user_message().contains("Concept extraction"));
    }
}
