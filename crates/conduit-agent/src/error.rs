use crate::types::RunStatus;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Protocol step, carried by errors so callers know where a conversation broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    CreateAssistant,
    GetAssistant,
    CreateThread,
    AppendMessage,
    StartRun,
    PollRun,
    ListMessages,
    DeleteThread,
}

impl ProtocolStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAssistant => "create_assistant",
            Self::GetAssistant => "get_assistant",
            Self::CreateThread => "create_thread",
            Self::AppendMessage => "append_message",
            Self::StartRun => "start_run",
            Self::PollRun => "poll_run",
            Self::ListMessages => "list_messages",
            Self::DeleteThread => "delete_thread",
        }
    }
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Bearer token must not be empty")]
    MissingToken,

    #[error("Agent protocol error at {step} ({status}): {body}")]
    Protocol {
        step: ProtocolStep,
        status: u16,
        body: String,
    },

    #[error("Agent service unreachable at {step}: {source}")]
    Transport {
        step: ProtocolStep,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid agent response at {step}: {message}")]
    Decode { step: ProtocolStep, message: String },

    #[error(
        "Agent run {run_id} ended with status {status}: {}",
        .message.as_deref().unwrap_or("no detail reported")
    )]
    RunFailed {
        run_id: String,
        status: RunStatus,
        code: Option<String>,
        message: Option<String>,
    },

    #[error("Agent run {run_id} still unfinished after {waited:?}")]
    PollTimeout { run_id: String, waited: Duration },

    #[error("Agent run completed without any text content")]
    EmptyResponse,

    #[error("Failed to delete thread {thread_id}: {reason}")]
    CleanupFailed { thread_id: String, reason: String },

    #[error("Agent request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Step at which the protocol failed, for transport-level errors
    pub fn step(&self) -> Option<ProtocolStep> {
        match self {
            Self::Protocol { step, .. } | Self::Transport { step, .. } | Self::Decode { step, .. } => {
                Some(*step)
            }
            Self::PollTimeout { .. } | Self::RunFailed { .. } => Some(ProtocolStep::PollRun),
            _ => None,
        }
    }

    /// HTTP status returned by the agent service, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The service could not be reached or did not answer in time
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout(_) => true,
            Self::Protocol { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// The service refused the bearer token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Protocol { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failed_message() {
        let err = AgentError::RunFailed {
            run_id: "run_1".to_string(),
            status: RunStatus::Failed,
            code: Some("server_error".to_string()),
            message: Some("Sorry, something went wrong.".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Agent run run_1 ended with status failed: Sorry, something went wrong."
        );

        let err = AgentError::RunFailed {
            run_id: "run_2".to_string(),
            status: RunStatus::Expired,
            code: None,
            message: None,
        };
        assert!(err.to_string().ends_with("expired: no detail reported"));
    }

    #[test]
    fn test_protocol_error_classification() {
        let err = AgentError::Protocol {
            step: ProtocolStep::CreateThread,
            status: 403,
            body: String::new(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_unavailable());
        assert_eq!(err.step(), Some(ProtocolStep::CreateThread));
        assert_eq!(err.status(), Some(403));

        let err = AgentError::Protocol {
            step: ProtocolStep::PollRun,
            status: 503,
            body: String::new(),
        };
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("poll_run"));
    }
}
