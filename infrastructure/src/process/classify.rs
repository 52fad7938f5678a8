//! Normalization of agent process failures into [`ErrorKind`].
//!
//! Agent CLIs report provider errors as free text on stderr (sometimes
//! stdout) with a generic non-zero exit code. The text is matched
//! case-insensitively against known provider phrasings; anything
//! unrecognized is `Unknown`, which the retry policy treats as retryable.

use quorum_gate_domain::ErrorKind;
use std::io;

/// Phrase table, checked in order. The first group that matches wins.
const SIGNALS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::RateLimited,
        &["rate limit", "rate-limit", "ratelimit", "429", "too many requests"],
    ),
    (
        ErrorKind::ServiceUnavailable,
        &["service unavailable", "503", "502", "bad gateway", "overloaded", "529"],
    ),
    (
        ErrorKind::Network,
        &[
            "connection refused",
            "connection reset",
            "connection closed",
            "network error",
            "dns error",
            "timed out",
            "timeout",
            "econnreset",
            "econnrefused",
        ],
    ),
    (
        ErrorKind::Authentication,
        &[
            "invalid api key",
            "invalid_api_key",
            "unauthorized",
            "401",
            "authentication",
            "not logged in",
            "credentials",
        ],
    ),
    (
        ErrorKind::Denied,
        &[
            "quota exceeded",
            "insufficient quota",
            "insufficient_quota",
            "permission denied",
            "forbidden",
            "403",
        ],
    ),
    (
        ErrorKind::NotFound,
        &["model not found", "model_not_found", "does not exist", "404"],
    ),
    (
        ErrorKind::MalformedRequest,
        &[
            "invalid model",
            "bad request",
            "invalid request",
            "400",
            "context length",
            "unknown option",
            "unrecognized argument",
        ],
    ),
];

/// Classify free text, if any known signal is present.
pub fn classify_message(text: &str) -> Option<ErrorKind> {
    let lower = text.to_lowercase();
    SIGNALS
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lower.contains(needle)))
        .map(|(kind, _)| *kind)
}

/// Classify a process that exited unsuccessfully.
///
/// stderr is consulted first, then stdout, then well-known shell exit codes.
pub fn classify_exit(stderr: &str, stdout: &str, exit_code: Option<i32>) -> ErrorKind {
    if let Some(kind) = classify_message(stderr).or_else(|| classify_message(stdout)) {
        return kind;
    }
    match exit_code {
        Some(126) => ErrorKind::Denied,
        Some(127) => ErrorKind::NotFound,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a failure to spawn the agent binary.
pub fn classify_spawn_error(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Denied,
        io::ErrorKind::InvalidInput => ErrorKind::MalformedRequest,
        _ => ErrorKind::Unknown,
    }
}
