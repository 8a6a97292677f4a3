//! Document ingestion: uploaded file → clinical text.
//!
//! Plain text is read directly. Images and PDFs are shipped to the AI
//! service as base64 data URIs, through either the standard extraction
//! or the long-document condensation operation (a persisted user
//! preference), wrapped by the retry scheduler. Whatever happens, the
//! caller always ends up with explained text or a scoped error — never
//! a silent empty string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::ai::CompletionService;
use crate::models::ExtractionMode;
use crate::retry::{run_with_retry, RetryError, RetryObserver, RetrySchedule};

// ---------------------------------------------------------------------------
// Upload classification
// ---------------------------------------------------------------------------

/// The three accepted upload classes. Everything else is rejected
/// before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    PlainText,
    Image,
    Pdf,
}

impl UploadKind {
    /// Classify from the MIME type, falling back to a filename-based
    /// guess when the browser or OS gave us an empty MIME string.
    pub fn classify(mime_type: &str, file_name: &str) -> Result<Self, IngestionError> {
        let mime = if mime_type.trim().is_empty() {
            mime_guess::from_path(file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        } else {
            mime_type.trim().to_lowercase()
        };

        if mime == "text/plain" {
            Ok(Self::PlainText)
        } else if mime.starts_with("image/") {
            Ok(Self::Image)
        } else if mime == "application/pdf" {
            Ok(Self::Pdf)
        } else {
            Err(IngestionError::UnsupportedFileType { mime })
        }
    }
}

/// An uploaded file, fully in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }

    /// Read a file from disk; the MIME type is guessed from the name.
    pub fn from_path(path: &std::path::Path) -> Result<Self, IngestionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|e| IngestionError::ReadFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum IngestionError {
    #[error("Unsupported file type: {mime}. Upload plain text, an image, or a PDF.")]
    UnsupportedFileType { mime: String },

    #[error("Could not read {name}: {reason}. Try another file.")]
    ReadFailed { name: String, reason: String },

    #[error(
        "The AI service is overloaded — extraction gave up after {attempts} attempts. \
         Wait a moment and retry, or type the clinical notes manually."
    )]
    ServiceOverloaded { attempts: usize },

    #[error(
        "Could not communicate with the AI service: {reason}. \
         Check the service, or type the clinical notes manually."
    )]
    Communication { reason: String },
}

/// What ingestion produced. `clinical_text` is always populated on the
/// AI path — with extracted text, or with a diagnostic placeholder when
/// `error` is set.
#[derive(Debug)]
pub struct IngestOutcome {
    pub clinical_text: String,
    pub source_file_name: String,
    pub error: Option<IngestionError>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Turn an uploaded file into clinical text.
///
/// Unsupported types and unreadable text files surface as `Err` with the
/// clinical text left untouched (blank, since the caller clears it before
/// ingestion). The AI path always returns `Ok`: terminal failures embed a
/// placeholder in the text and carry the scoped error alongside it.
pub async fn ingest_file(
    file: &UploadedFile,
    mode: ExtractionMode,
    schedule: &RetrySchedule,
    observer: &dyn RetryObserver,
    service: &dyn CompletionService,
) -> Result<IngestOutcome, IngestionError> {
    let kind = UploadKind::classify(&file.mime_type, &file.name)?;

    if kind == UploadKind::PlainText {
        let text = String::from_utf8_lossy(&file.bytes).into_owned();
        tracing::info!(file = %file.name, chars = text.len(), "Read plain text upload");
        return Ok(IngestOutcome {
            clinical_text: text,
            source_file_name: file.name.clone(),
            error: None,
        });
    }

    let data_uri = file.data_uri();
    let uri = data_uri.as_str();
    let mime = file.mime_type.as_str();
    tracing::info!(file = %file.name, mime, mode = mode.as_str(), "Starting document extraction");

    let result = run_with_retry(schedule, observer, |_attempt| async move {
        match mode {
            ExtractionMode::Standard => service.extract_text_from_document(uri, mime).await,
            ExtractionMode::Condense => service.condense_extensive_document(uri, mime).await,
        }
    })
    .await;

    let outcome = match result {
        Ok(text) if text.trim().is_empty() => IngestOutcome {
            clinical_text: empty_extraction_placeholder(mime),
            source_file_name: file.name.clone(),
            error: None,
        },
        Ok(text) => IngestOutcome {
            clinical_text: text,
            source_file_name: file.name.clone(),
            error: None,
        },
        Err(retry_error) => {
            let error = match retry_error {
                RetryError::Exhausted { attempts, source } => {
                    tracing::warn!(file = %file.name, attempts, error = %source, "Extraction exhausted retries");
                    IngestionError::ServiceOverloaded { attempts }
                }
                RetryError::Permanent { source } => {
                    tracing::warn!(file = %file.name, error = %source, "Extraction failed permanently");
                    IngestionError::Communication {
                        reason: source.to_string(),
                    }
                }
            };
            IngestOutcome {
                clinical_text: failure_placeholder(&error),
                source_file_name: file.name.clone(),
                error: Some(error),
            }
        }
    };

    Ok(outcome)
}

/// Placeholder when the service answered but found nothing.
fn empty_extraction_placeholder(mime_type: &str) -> String {
    format!(
        "[No text could be extracted from this {mime_type} document. \
         It may be empty or unreadable — please type the clinical notes manually.]"
    )
}

/// Placeholder when extraction failed terminally.
fn failure_placeholder(error: &IngestionError) -> String {
    format!("[Automatic extraction failed: {error} Please type the clinical notes manually.]")
}
