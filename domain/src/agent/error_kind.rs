//! Closed set of agent failure kinds.
//!
//! Every failure an agent run can produce (subprocess exit codes, stderr text,
//! spawn errors, timeouts, storage contention) is normalized into an
//! [`ErrorKind`] at the supervisor boundary. Downstream code matches over this
//! fixed set instead of inspecting strings.

use serde::{Deserialize, Serialize};

/// Retry classification of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient; retry with backoff
    Retryable,
    /// Do not retry
    Permanent,
}

/// Normalized reason an agent attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // ==================== Transient ====================
    /// Connection refused/reset, DNS failure, network timeout
    Network,
    /// Rate limit response (HTTP 429 and friends)
    RateLimited,
    /// Backend overloaded or unavailable (HTTP 5xx)
    ServiceUnavailable,
    /// Storage reported busy/locked
    StorageBusy,
    /// Non-zero exit without a recognizable cause
    Unknown,

    // ==================== Permanent ====================
    /// Missing or rejected credential
    Authentication,
    /// The request or invocation was malformed
    MalformedRequest,
    /// The backend or OS explicitly denied the operation
    Denied,
    /// Executable, model or resource not found
    NotFound,
    /// Process exited successfully but produced no output
    EmptyOutput,
    /// Per-agent timeout elapsed
    Timeout,
    /// The round was cancelled externally
    Cancelled,
}

impl ErrorKind {
    /// Every defined kind, in declaration order.
    pub const ALL: [ErrorKind; 12] = [
        ErrorKind::Network,
        ErrorKind::RateLimited,
        ErrorKind::ServiceUnavailable,
        ErrorKind::StorageBusy,
        ErrorKind::Unknown,
        ErrorKind::Authentication,
        ErrorKind::MalformedRequest,
        ErrorKind::Denied,
        ErrorKind::NotFound,
        ErrorKind::EmptyOutput,
        ErrorKind::Timeout,
        ErrorKind::Cancelled,
    ];

    /// Classify this kind as retryable or permanent.
    pub fn classify(self) -> ErrorClass {
        match self {
            ErrorKind::Network
            | ErrorKind::RateLimited
            | ErrorKind::ServiceUnavailable
            | ErrorKind::StorageBusy
            | ErrorKind::Unknown => ErrorClass::Retryable,
            ErrorKind::Authentication
            | ErrorKind::MalformedRequest
            | ErrorKind::Denied
            | ErrorKind::NotFound
            | ErrorKind::EmptyOutput
            | ErrorKind::Timeout
            | ErrorKind::Cancelled => ErrorClass::Permanent,
        }
    }

    pub fn is_retryable(self) -> bool {
        self.classify() == ErrorClass::Retryable
    }

    /// Stable storage/display identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::StorageBusy => "storage_busy",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Authentication => "authentication",
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::Denied => "denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::EmptyOutput => "empty_output",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = crate::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::DomainError::UnknownValue {
                kind: "error kind",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_maps_to_exactly_one_class() {
        let mut retryable = HashSet::new();
        let mut permanent = HashSet::new();
        for kind in ErrorKind::ALL {
            match kind.classify() {
                ErrorClass::Retryable => retryable.insert(kind),
                ErrorClass::Permanent => permanent.insert(kind),
            };
        }
        assert!(retryable.is_disjoint(&permanent));
        assert_eq!(retryable.len() + permanent.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_classification_table() {
        let table = [
            (ErrorKind::Network, ErrorClass::Retryable),
            (ErrorKind::RateLimited, ErrorClass::Retryable),
            (ErrorKind::ServiceUnavailable, ErrorClass::Retryable),
            (ErrorKind::StorageBusy, ErrorClass::Retryable),
            (ErrorKind::Unknown, ErrorClass::Retryable),
            (ErrorKind::Authentication, ErrorClass::Permanent),
            (ErrorKind::MalformedRequest, ErrorClass::Permanent),
            (ErrorKind::Denied, ErrorClass::Permanent),
            (ErrorKind::NotFound, ErrorClass::Permanent),
            (ErrorKind::EmptyOutput, ErrorClass::Permanent),
            (ErrorKind::Timeout, ErrorClass::Permanent),
            (ErrorKind::Cancelled, ErrorClass::Permanent),
        ];
        assert_eq!(table.len(), ErrorKind::ALL.len());
        for (kind, expected) in table {
            assert_eq!(kind.classify(), expected, "{kind}");
        }
    }

    #[test]
    fn test_as_str_is_unique_and_parses_back() {
        let names: HashSet<_> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), ErrorKind::ALL.len());
        for kind in ErrorKind::ALL {
            assert_eq!(kind.as_str().parse::<ErrorKind>().ok(), Some(kind));
        }
        assert!("bogus".parse::<ErrorKind>().is_err());
    }
}
