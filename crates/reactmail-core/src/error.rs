//! Error taxonomy for the forwarding pipeline

use std::time::Duration;
use thiserror::Error;

/// Errors that end a webhook request with a non-200 status
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Malformed or incomplete inbound payload
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Verification token or app id did not match
    #[error("unauthorized webhook request")]
    Unauthorized,

    /// The chat platform failed us
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ForwardError {
    /// HTTP status code the webhook caller should see
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::Upstream(_) => 500,
        }
    }
}

/// Failures talking to the chat platform's REST API
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("API error: {0}")]
    Api(String),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("expected exactly one message, found {0}")]
    UnexpectedMessageCount(usize),
}

/// Failures running the mail command. Never surfaced to the webhook caller.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to start mail command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mail command I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail command timed out after {0:?}")]
    Timeout(Duration),

    #[error("mail command terminated by signal")]
    Terminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ForwardError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(ForwardError::Unauthorized.status_code(), 401);
        let upstream: ForwardError = UpstreamError::UnexpectedMessageCount(0).into();
        assert_eq!(upstream.status_code(), 500);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            UpstreamError::UnexpectedMessageCount(2).to_string(),
            "expected exactly one message, found 2"
        );
        assert_eq!(
            MailError::Timeout(Duration::from_secs(5)).to_string(),
            "mail command timed out after 5s"
        );
    }
}
