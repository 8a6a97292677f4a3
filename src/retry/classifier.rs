use crate::ai::AiError;

/// Message fragments that mark a failure as transient.
///
/// Capacity exhaustion, service unavailability and rate limiting in the
/// phrasings the AI endpoints actually emit. Matching is a heuristic on
/// the rendered message, not a protocol-level status check: a false
/// negative fails the user action early, a false positive wastes retries.
const RETRYABLE_SIGNALS: &[&str] = &[
    "overloaded",
    "unavailable",
    "rate limit",
    "rate-limit",
    "too many requests",
    "resource exhausted",
    "resource_exhausted",
    "capacity",
    "quota",
    "try again later",
    "429",
    "503",
];

/// Is this failure worth retrying?
///
/// Total over all [`AiError`] values; anything unrecognized — including
/// malformed responses and validation failures — is permanent.
pub fn is_retryable(error: &AiError) -> bool {
    let message = error.to_string().to_lowercase();
    RETRYABLE_SIGNALS.iter().any(|signal| message.contains(signal))
}
