// Individual protocol calls, authenticated with one caller's bearer token

use crate::client::AgentClient;
use crate::error::{AgentError, ProtocolStep, Result};
use crate::types::{
    AgentThread, Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest,
    ListOrder, MessageList, Run, ThreadMessage,
};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

/// Where the assistant id for a conversation comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantSource {
    /// Pre-provisioned id, used as-is without a network call
    Configured(String),
    /// Pre-provisioned id, confirmed with `GET assistants/{id}`
    Lookup(String),
    /// Created per call with `POST assistants`
    Create { model: String },
}

impl Default for AssistantSource {
    fn default() -> Self {
        // Data agents ignore the model; the field is still required
        Self::Create {
            model: "not used".to_string(),
        }
    }
}

/// Protocol calls bound to one bearer token.
///
/// Every call maps a non-2xx response to [`AgentError::Protocol`] tagged with
/// its step. Nothing here retries.
pub struct AgentSession<'a> {
    client: &'a AgentClient,
    token: &'a str,
}

impl<'a> AgentSession<'a> {
    pub(crate) fn new(client: &'a AgentClient, token: &'a str) -> Self {
        Self { client, token }
    }

    pub async fn resolve_assistant(&self, source: &AssistantSource) -> Result<String> {
        match source {
            AssistantSource::Configured(id) => Ok(id.clone()),
            AssistantSource::Lookup(id) => Ok(self.get_assistant(id).await?.id),
            AssistantSource::Create { model } => Ok(self.create_assistant(model).await?.id),
        }
    }

    pub async fn create_assistant(&self, model: &str) -> Result<Assistant> {
        let step = ProtocolStep::CreateAssistant;
        let request = self
            .client
            .http()
            .post(self.client.url("assistants"))
            .json(&CreateAssistantRequest { model });
        let assistant: Assistant = self.send(step, request).await?;
        tracing::debug!("Created assistant: {}", assistant.id);
        Ok(assistant)
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        let step = ProtocolStep::GetAssistant;
        let request = self
            .client
            .http()
            .get(self.client.url(&format!("assistants/{}", assistant_id)));
        self.send(step, request).await
    }

    pub async fn create_thread(&self) -> Result<AgentThread> {
        let step = ProtocolStep::CreateThread;
        let request = self
            .client
            .http()
            .post(self.client.url("threads"))
            .json(&serde_json::json!({}));
        let thread: AgentThread = self.send(step, request).await?;
        tracing::debug!("Created thread: {}", thread.id);
        Ok(thread)
    }

    /// Append a user-role message to the thread
    pub async fn append_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let step = ProtocolStep::AppendMessage;
        let request = self
            .client
            .http()
            .post(self.client.url(&format!("threads/{}/messages", thread_id)))
            .json(&CreateMessageRequest {
                role: "user",
                content,
            });
        let message: ThreadMessage = self.send(step, request).await?;
        tracing::debug!("Created message: {}", message.id);
        Ok(message)
    }

    pub async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let step = ProtocolStep::StartRun;
        let request = self
            .client
            .http()
            .post(self.client.url(&format!("threads/{}/runs", thread_id)))
            .json(&CreateRunRequest { assistant_id });
        let run: Run = self.send(step, request).await?;
        tracing::debug!("Created run: {} ({})", run.id, run.status);
        Ok(run)
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let step = ProtocolStep::PollRun;
        let request = self
            .client
            .http()
            .get(self.client.url(&format!("threads/{}/runs/{}", thread_id, run_id)));
        let run: Run = self.send(step, request).await?;
        tracing::debug!("Run status: {} ({})", run.status, run.id);
        Ok(run)
    }

    pub async fn list_messages(&self, thread_id: &str, order: ListOrder) -> Result<MessageList> {
        let step = ProtocolStep::ListMessages;
        let request = self
            .client
            .http()
            .get(self.client.url(&format!("threads/{}/messages", thread_id)))
            .query(&[("order", order.as_str())]);
        self.send(step, request).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let step = ProtocolStep::DeleteThread;
        let request = self
            .client
            .http()
            .delete(self.client.url(&format!("threads/{}", thread_id)));
        self.execute(step, request).await.map(|_| ())
    }

    async fn send<T: DeserializeOwned>(&self, step: ProtocolStep, request: RequestBuilder) -> Result<T> {
        let response = self.execute(step, request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| AgentError::Transport { step, source })?;

        serde_json::from_slice(&body).map_err(|e| AgentError::Decode {
            step,
            message: e.to_string(),
        })
    }

    async fn execute(&self, step: ProtocolStep, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(self.token)
            .send()
            .await
            .map_err(|source| AgentError::Transport { step, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Protocol {
                step,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}
