//! Error taxonomy for backend round trips.
//!
//! Every component operation that talks to the backend returns
//! [`ClientError`]. None of these are retried automatically; callers surface
//! the message to the user and let them retry by hand.
//!
//! Trace payloads that cannot be decoded are *not* errors: they are reported
//! as [`crate::trace::DecodeDegraded`] alongside the reconciled entries.

use thiserror::Error;

/// Failure of a single backend round trip (or a request rejected before one).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport failure: the backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected an uploaded knowledge file.
    #[error("import rejected: {0}")]
    Import(String),

    /// The referenced id no longer exists (e.g. raced delete).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request would violate a knowledge-base invariant
    /// (deleting the system snapshot or the active one).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success status, with the backend's detail verbatim.
    #[error("backend error (HTTP {status}): {detail}")]
    Backend { status: u16, detail: String },

    /// A success response whose body does not have the documented shape.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// Blank chat input, rejected without a network call.
    #[error("message is empty")]
    EmptyMessage,
}

impl ClientError {
    /// Whether this error came from the transport rather than the backend.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// The user-facing detail: the backend's own text where there is one.
    pub fn detail(&self) -> &str {
        match self {
            Self::Unavailable(d) | Self::Import(d) | Self::NotFound(d) | Self::Conflict(d) => d,
            Self::Backend { detail, .. } => detail,
            Self::InvalidResponse { reason, .. } => reason,
            Self::EmptyMessage => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_backend_detail_verbatim() {
        let err = ClientError::Import("sheet 'intents' is missing".to_string());
        assert_eq!(err.to_string(), "import rejected: sheet 'intents' is missing");
        assert_eq!(err.detail(), "sheet 'intents' is missing");
    }

    #[test]
    fn backend_variant_formats_status() {
        let err = ClientError::Backend {
            status: 500,
            detail: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "backend error (HTTP 500): boom");
    }

    #[test]
    fn only_transport_failures_are_unavailable() {
        assert!(ClientError::Unavailable("refused".into()).is_unavailable());
        assert!(!ClientError::NotFound("7".into()).is_unavailable());
    }
}
