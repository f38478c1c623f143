//! Failure taxonomy for a single turn.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnErrorKind {
    /// No response was received.
    Transport,
    /// A response arrived but could not be used.
    Protocol,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("request failed before a response was received: {0}")]
    Transport(String),
    #[error("completion service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Decode(String),
    #[error("response contained no completion choices")]
    EmptyChoices,
    #[error("completion choice carried no content")]
    MissingContent,
    #[error("transcript has no trailing user message to send")]
    MissingUserTurn,
    #[error("turn task stopped before the backend answered: {0}")]
    Interrupted(String),
}

impl TurnError {
    pub fn kind(&self) -> TurnErrorKind {
        match self {
            TurnError::Transport(_) | TurnError::Interrupted(_) => TurnErrorKind::Transport,
            TurnError::Status { .. }
            | TurnError::Decode(_)
            | TurnError::EmptyChoices
            | TurnError::MissingContent
            | TurnError::MissingUserTurn => TurnErrorKind::Protocol,
        }
    }
}

impl From<reqwest::Error> for TurnError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            TurnError::Decode(value.to_string())
        } else {
            TurnError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for TurnError {
    fn from(value: serde_json::Error) -> Self {
        TurnError::Decode(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_classify_as_transport() {
        assert_eq!(
            TurnError::Transport("connection refused".into()).kind(),
            TurnErrorKind::Transport
        );
        assert_eq!(
            TurnError::Status {
                status: 503,
                body: String::new()
            }
            .kind(),
            TurnErrorKind::Protocol
        );
        assert_eq!(
            TurnError::Interrupted("task panicked".into()).kind(),
            TurnErrorKind::Transport
        );
        assert_eq!(TurnError::EmptyChoices.kind(), TurnErrorKind::Protocol);
        assert_eq!(TurnError::MissingContent.kind(), TurnErrorKind::Protocol);
    }

    #[test]
    fn json_errors_become_decode_failures() {
        let err = serde_json::from_str::<serde_json::Value>("<html>").expect_err("invalid json");
        assert!(matches!(TurnError::from(err), TurnError::Decode(_)));
    }
}
