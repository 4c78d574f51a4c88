use conduit_agent::AgentError;
use conduit_obo::ExchangeError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConduitError {
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Agent request failed: {0}")]
    Agent(#[from] AgentError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// What the caller should be told, independent of which component failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was unusable (e.g. empty question)
    InvalidRequest,
    /// The caller is not authorized for the target resource
    Unauthorized,
    /// The agent service was reached but could not answer
    AgentFailed,
    /// The authority or the agent service could not be reached
    Unavailable,
    /// The agent did not answer within the request deadline
    Timeout,
    /// Misconfiguration on our side
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::AgentFailed => "agent_failed",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConduitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Exchange(e) => match e {
                ExchangeError::EmptyInput { field: "caller token" } => ErrorKind::Unauthorized,
                ExchangeError::EmptyInput { .. } | ExchangeError::Config(_) => ErrorKind::Internal,
                ExchangeError::Rejected { .. } => ErrorKind::Unauthorized,
                ExchangeError::Unavailable(_)
                | ExchangeError::AuthorityFailure { .. }
                | ExchangeError::MalformedResponse(_) => {
                    ErrorKind::Unavailable
                }
            },
            Self::Agent(e) => match e {
                AgentError::EmptyQuestion => ErrorKind::InvalidRequest,
                AgentError::MissingToken | AgentError::Config(_) => ErrorKind::Internal,
                AgentError::Timeout(_) => ErrorKind::Timeout,
                AgentError::Cancelled => ErrorKind::Unavailable,
                e if e.is_unauthorized() => ErrorKind::Unauthorized,
                e if e.is_unavailable() => ErrorKind::Unavailable,
                _ => ErrorKind::AgentFailed,
            },
            Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Actionable message for the end user; never includes token material
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidRequest => format!("The request could not be processed: {}", self.detail()),
            ErrorKind::Unauthorized => format!(
                "You are not authorized to use the agent service: {}",
                self.detail()
            ),
            ErrorKind::AgentFailed => format!("The agent could not answer: {}", self.detail()),
            ErrorKind::Unavailable => {
                "The agent service is unreachable right now. Please try again later.".to_string()
            }
            ErrorKind::Timeout => {
                "The agent took too long to answer. Please try again.".to_string()
            }
            ErrorKind::Internal => "The service is misconfigured. Contact an administrator.".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Exchange(ExchangeError::Rejected { code, description, .. }) => {
                if description.is_empty() {
                    code.clone()
                } else {
                    description.clone()
                }
            }
            Self::Exchange(e) => e.to_string(),
            Self::Agent(AgentError::RunFailed { status, message, .. }) => match message {
                Some(message) => format!("run {} ({})", status, message),
                None => format!("run {}", status),
            },
            Self::Agent(e) => e.to_string(),
            Self::Config(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_agent::{ProtocolStep, RunStatus};
    use std::time::Duration;

    #[test]
    fn test_exchange_rejection_is_unauthorized() {
        let err = ConduitError::from(ExchangeError::Rejected {
            status: 400,
            code: "invalid_grant".to_string(),
            description: "AADSTS65001: consent required".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(err.user_message().contains("AADSTS65001"));
    }

    #[test]
    fn test_authority_outage_is_unavailable() {
        let err = ConduitError::from(ExchangeError::AuthorityFailure { status: 503 });
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(!err.user_message().contains("not authorized"));
    }

    #[test]
    fn test_empty_caller_token_is_unauthorized() {
        let err = ConduitError::from(ExchangeError::EmptyInput { field: "caller token" });
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = ConduitError::from(ExchangeError::EmptyInput { field: "target scope" });
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_agent_error_kinds() {
        let cases = [
            (AgentError::EmptyQuestion, ErrorKind::InvalidRequest),
            (AgentError::EmptyResponse, ErrorKind::AgentFailed),
            (AgentError::Timeout(Duration::from_secs(300)), ErrorKind::Timeout),
            (
                AgentError::Protocol {
                    step: ProtocolStep::CreateThread,
                    status: 403,
                    body: String::new(),
                },
                ErrorKind::Unauthorized,
            ),
            (
                AgentError::Protocol {
                    step: ProtocolStep::StartRun,
                    status: 502,
                    body: String::new(),
                },
                ErrorKind::Unavailable,
            ),
            (
                AgentError::Protocol {
                    step: ProtocolStep::StartRun,
                    status: 400,
                    body: String::new(),
                },
                ErrorKind::AgentFailed,
            ),
            (
                AgentError::RunFailed {
                    run_id: "run_1".to_string(),
                    status: RunStatus::Failed,
                    code: None,
                    message: Some("quota".to_string()),
                },
                ErrorKind::AgentFailed,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(ConduitError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_run_failure_message() {
        let err = ConduitError::from(AgentError::RunFailed {
            run_id: "run_1".to_string(),
            status: RunStatus::Failed,
            code: Some("server_error".to_string()),
            message: Some("Sorry, something went wrong.".to_string()),
        });
        assert_eq!(
            err.user_message(),
            "The agent could not answer: run failed (Sorry, something went wrong.)"
        );
    }
}
