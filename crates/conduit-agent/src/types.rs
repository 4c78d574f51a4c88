use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent configuration a run executes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Conversation history container, one per `ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentThread {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub content: Vec<MessageContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }

    /// First non-empty text block, if the message has one
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            MessageContent::Text { text } if !text.value.trim().is_empty() => {
                Some(text.value.as_str())
            }
            _ => None,
        })
    }
}

/// One block of message content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    ImageFile { image_file: ImageFile },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFile {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,

    #[serde(default)]
    pub has_more: bool,
}

/// Order for listing thread messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Asc,
    Desc,
}

impl ListOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One execution of an assistant over a thread
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,

    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default)]
    pub assistant_id: Option<String>,

    pub status: RunStatus,

    #[serde(default)]
    pub last_error: Option<RunError>,

    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

impl Run {
    /// Remote error detail in `(code, message)` form
    pub fn failure_detail(&self) -> (Option<String>, Option<String>) {
        if let Some(err) = &self.last_error {
            return (err.code.clone(), err.message.clone());
        }
        if let Some(details) = &self.incomplete_details {
            return (None, details.reason.clone());
        }
        (None, None)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Run lifecycle status as reported by the service
///
/// `queued`, `in_progress` and `cancelling` keep the run alive; everything
/// else is terminal, and only `completed` is a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    Unknown(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "cancelling" => Self::Cancelling,
            // This client never submits tool outputs, so a run waiting on
            // them cannot progress.
            "requires_action" => Self::RequiresAction,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            "incomplete" => Self::Incomplete,
            _ => Self::Unknown(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Request payloads

#[derive(Debug, Serialize)]
pub(crate) struct CreateAssistantRequest<'a> {
    pub model: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
}
