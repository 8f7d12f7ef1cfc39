// =============================================================================
// Feed error taxonomy
// =============================================================================
//
// Transport, malformed-payload and provider-limit failures never reach the
// presentation layer: the orchestrator recovers from them locally. Only a
// refresh invocation that itself blows up is surfaced, as a transient notice.
// =============================================================================

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`FeedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    TransportError,
    MalformedResponse,
    ProviderLimitReached,
    RefreshInvocationError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransportError => write!(f, "TransportError"),
            Self::MalformedResponse => write!(f, "MalformedResponse"),
            Self::ProviderLimitReached => write!(f, "ProviderLimitReached"),
            Self::RefreshInvocationError => write!(f, "RefreshInvocationError"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider limit reached: {0}")]
    ProviderLimitReached(String),

    #[error("refresh invocation failed: {0}")]
    RefreshInvocation(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::HttpStatus { .. } => ErrorKind::TransportError,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ProviderLimitReached(_) => ErrorKind::ProviderLimitReached,
            Self::RefreshInvocation(_) => ErrorKind::RefreshInvocationError,
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            FeedError::HttpStatus { status: 502 }.kind(),
            ErrorKind::TransportError
        );
        assert_eq!(
            FeedError::MalformedResponse("no series".into()).kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            FeedError::ProviderLimitReached("Note".into()).kind(),
            ErrorKind::ProviderLimitReached
        );
        assert_eq!(
            FeedError::RefreshInvocation("panicked".into()).kind(),
            ErrorKind::RefreshInvocationError
        );
    }

    #[test]
    fn messages_carry_detail() {
        let err = FeedError::HttpStatus { status: 503 };
        assert_eq!(err.to_string(), "provider returned HTTP 503");
        let err = FeedError::ProviderLimitReached("5 calls per minute".into());
        assert!(err.to_string().contains("5 calls per minute"));
    }
}
