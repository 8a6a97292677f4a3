//! AI completion boundary.
//!
//! Everything that understands text lives on the far side of
//! [`CompletionService`] — an opaque, possibly-flaky remote function.
//! The production implementation talks to an Ollama-style local
//! inference endpoint; tests use [`MockCompletionService`] with
//! scripted per-operation outcomes.

pub mod client;
pub mod prompts;
pub mod service;

pub use client::HttpCompletionClient;
pub use service::{CompletionService, MockCompletionService, SuggestedCode};

use thiserror::Error;

/// Errors from AI completion operations.
///
/// The retry classifier inspects only the rendered message of these
/// errors, so Display text is part of the contract: capacity and
/// availability failures must say so.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Cannot reach AI service at {0}")]
    Connection(String),

    #[error("AI service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),
}
