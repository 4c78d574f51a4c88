// Conversation driver over the assistant/thread/run protocol (HTTP direct, no SDK)

use crate::error::{AgentError, Result};
use crate::lease::ThreadLease;
use crate::poll::{PollPolicy, PollStop, Poller};
use crate::session::{AgentSession, AssistantSource};
use crate::types::{ListOrder, MessageList, Run};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);
const CLIENT_USER_AGENT: &str = concat!("conduit-agent/", env!("CARGO_PKG_VERSION"));

/// Client for an agent service exposing assistants, threads, messages and runs.
///
/// - URL: `{endpoint}/{resource}?api-version={api_version}`
/// - Auth: `Authorization: Bearer` with the token passed to each [`ask`](Self::ask)
/// - Holds no per-conversation state; one instance serves concurrent requests
#[derive(Debug)]
pub struct AgentClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_version: String,
    assistant: AssistantSource,
    poll_policy: PollPolicy,
    request_timeout: Duration,
    cleanup_timeout: Duration,
}

impl AgentClient {
    pub fn builder() -> AgentClientBuilder {
        AgentClientBuilder::default()
    }

    /// Protocol calls authenticated with `token`
    pub fn session<'a>(&'a self, token: &'a str) -> AgentSession<'a> {
        AgentSession::new(self, token)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    /// Ask the agent one question and return its answer text.
    ///
    /// Creates a fresh thread, appends `question` as a user message, runs the
    /// assistant, polls until the run is terminal, reads the latest assistant
    /// message and deletes the thread. Not idempotent: each call is a new
    /// remote conversation.
    pub async fn ask(&self, question: &str, token: &str) -> Result<String> {
        self.ask_with_cancellation(question, token, &CancellationToken::new())
            .await
    }

    /// [`ask`](Self::ask) that stops early when `cancel` fires.
    ///
    /// The thread is still deleted after a cancellation or timeout.
    pub async fn ask_with_cancellation(
        &self,
        question: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::EmptyQuestion);
        }
        if token.trim().is_empty() {
            return Err(AgentError::MissingToken);
        }

        let session = self.session(token);
        let deadline = Instant::now() + self.request_timeout;

        let assistant_id = self
            .bounded(deadline, cancel, session.resolve_assistant(&self.assistant))
            .await?;

        let thread = self
            .bounded(deadline, cancel, session.create_thread())
            .await?;
        let lease = ThreadLease::new(thread);

        let outcome = self
            .bounded(
                deadline,
                cancel,
                self.converse(&session, lease.thread_id(), &assistant_id, question, cancel),
            )
            .await;

        lease.release(&session, self.cleanup_timeout).await;

        match &outcome {
            Ok(_) => tracing::info!("Agent answered (assistant {})", assistant_id),
            Err(e) => tracing::warn!("Agent conversation failed: {}", e),
        }
        outcome
    }

    /// Steps between thread creation and cleanup
    async fn converse(
        &self,
        session: &AgentSession<'_>,
        thread_id: &str,
        assistant_id: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        session.append_message(thread_id, question).await?;

        let run = session.start_run(thread_id, assistant_id).await?;
        let run = self.wait_for_run(session, thread_id, run, cancel).await?;

        if !run.status.is_success() {
            let (code, message) = run.failure_detail();
            return Err(AgentError::RunFailed {
                run_id: run.id,
                status: run.status,
                code,
                message,
            });
        }

        let messages = session.list_messages(thread_id, ListOrder::Desc).await?;
        extract_answer(&messages)
    }

    /// Re-fetch the run until its status is terminal
    async fn wait_for_run(
        &self,
        session: &AgentSession<'_>,
        thread_id: &str,
        mut run: Run,
        cancel: &CancellationToken,
    ) -> Result<Run> {
        let mut poller = Poller::new(&self.poll_policy, cancel);

        while !run.status.is_terminal() {
            poller.wait().await.map_err(|stop| match stop {
                PollStop::Cancelled => AgentError::Cancelled,
                PollStop::MaxWait(waited) => AgentError::PollTimeout {
                    run_id: run.id.clone(),
                    waited,
                },
            })?;
            run = session.get_run(thread_id, &run.id).await?;
        }

        tracing::debug!(
            "Run {} finished with status {} after {} status checks",
            run.id,
            run.status,
            poller.attempts()
        );
        Ok(run)
    }

    /// Apply the end-to-end deadline and cancellation to one stage
    async fn bounded<T, F>(&self, deadline: Instant, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = tokio::time::timeout_at(deadline, fut) => {
                result.unwrap_or(Err(AgentError::Timeout(self.request_timeout)))
            }
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}?api-version={}", self.endpoint, path, self.api_version)
    }
}

/// Most recent assistant message's first text block
fn extract_answer(messages: &MessageList) -> Result<String> {
    messages
        .data
        .iter()
        .find(|m| m.is_assistant())
        .and_then(|m| m.first_text())
        .map(str::to_string)
        .ok_or(AgentError::EmptyResponse)
}

/// Builder for AgentClient
#[derive(Default)]
pub struct AgentClientBuilder {
    endpoint: Option<String>,
    api_version: Option<String>,
    assistant: Option<AssistantSource>,
    poll_policy: Option<PollPolicy>,
    request_timeout: Option<Duration>,
    cleanup_timeout: Option<Duration>,
}

impl AgentClientBuilder {
    /// Base address of the agent service, e.g.
    /// "https://api.fabric.microsoft.com/v1/workspaces/{ws}/aiskills/{id}/aiassistant/openai"
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn assistant(mut self, source: AssistantSource) -> Self {
        self.assistant = Some(source);
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    /// End-to-end bound for one `ask`, cleanup excluded
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AgentClient> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AgentError::Config("Endpoint is required".to_string()))?;

        // Remove trailing slash from endpoint
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let api_version = self
            .api_version
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(AgentClient {
            http_client,
            endpoint,
            api_version,
            assistant: self.assistant.unwrap_or_default(),
            poll_policy: self.poll_policy.unwrap_or_default(),
            request_timeout,
            cleanup_timeout: self.cleanup_timeout.unwrap_or(DEFAULT_CLEANUP_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_requires_endpoint() {
        let err = AgentClient::builder().build().unwrap_err();
        assert!(err.to_string().contains("Endpoint"));
    }

    #[test]
    fn test_url_structure() {
        let client = AgentClient::builder()
            .endpoint("https://agents.example.com/openai/")
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), "https://agents.example.com/openai");
        assert_eq!(
            client.url("threads/t1/runs"),
            "https://agents.example.com/openai/threads/t1/runs?api-version=2024-05-01-preview"
        );
    }

    #[test]
    fn test_custom_api_version() {
        let client = AgentClient::builder()
            .endpoint("https://agents.example.com")
            .api_version("2025-01-01")
            .build()
            .unwrap();

        assert!(client.url("threads").ends_with("?api-version=2025-01-01"));
    }

    #[test]
    fn test_extract_answer_uses_latest_assistant_message() {
        let messages: MessageList = serde_json::from_value(json!({
            "data": [
                { "id": "m3", "role": "assistant", "content": [
                    { "type": "text", "text": { "value": "There are 12 buildings." } }
                ]},
                { "id": "m2", "role": "assistant", "content": [
                    { "type": "text", "text": { "value": "Older answer" } }
                ]},
                { "id": "m1", "role": "user", "content": [
                    { "type": "text", "text": { "value": "How many buildings?" } }
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(extract_answer(&messages).unwrap(), "There are 12 buildings.");
    }

    #[test]
    fn test_extract_answer_without_assistant_text() {
        let messages: MessageList = serde_json::from_value(json!({
            "data": [
                { "id": "m1", "role": "user", "content": [
                    { "type": "text", "text": { "value": "How many buildings?" } }
                ]}
            ]
        }))
        .unwrap();

        assert!(matches!(extract_answer(&messages), Err(AgentError::EmptyResponse)));
    }
}
