//! Per-request composition: exchange the caller's token, then ask the agent

use crate::error::{ConduitError, Result};
use conduit_agent::{AgentClient, AgentError};
use conduit_obo::TokenExchanger;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Asks a remote agent on behalf of an authenticated caller.
///
/// Every call performs a fresh on-behalf-of exchange followed by one full
/// agent conversation. Nothing is shared between calls except the HTTP
/// connection pools, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct DelegatedAgent {
    exchanger: Arc<dyn TokenExchanger>,
    agent: Arc<AgentClient>,
    target_scope: String,
}

impl DelegatedAgent {
    pub fn builder() -> DelegatedAgentBuilder {
        DelegatedAgentBuilder::default()
    }

    pub fn target_scope(&self) -> &str {
        &self.target_scope
    }

    /// Exchange `caller_token` for the target scope and ask `question`
    pub async fn ask(&self, caller_token: &str, question: &str) -> Result<String> {
        self.ask_with_cancellation(caller_token, question, &CancellationToken::new())
            .await
    }

    pub async fn ask_with_cancellation(
        &self,
        caller_token: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(AgentError::EmptyQuestion.into());
        }

        let token = self
            .exchanger
            .exchange(caller_token, &self.target_scope)
            .await?;
        tracing::debug!("Exchanged caller token for scope {}", token.scope());

        let answer = self
            .agent
            .ask_with_cancellation(question, token.secret(), cancel)
            .await?;

        Ok(answer)
    }
}

/// Builder for DelegatedAgent
#[derive(Default)]
pub struct DelegatedAgentBuilder {
    exchanger: Option<Arc<dyn TokenExchanger>>,
    agent: Option<Arc<AgentClient>>,
    target_scope: Option<String>,
}

impl DelegatedAgentBuilder {
    pub fn exchanger(mut self, exchanger: impl TokenExchanger + 'static) -> Self {
        self.exchanger = Some(Arc::new(exchanger));
        self
    }

    pub fn shared_exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
        self.exchanger = Some(exchanger);
        self
    }

    pub fn agent(mut self, agent: AgentClient) -> Self {
        self.agent = Some(Arc::new(agent));
        self
    }

    /// Scope the downstream agent service accepts,
    /// e.g. "https://api.fabric.microsoft.com/.default"
    pub fn target_scope(mut self, scope: impl Into<String>) -> Self {
        self.target_scope = Some(scope.into());
        self
    }

    pub fn build(self) -> Result<DelegatedAgent> {
        let exchanger = self
            .exchanger
            .ok_or_else(|| ConduitError::Config("exchanger is required".to_string()))?;
        let agent = self
            .agent
            .ok_or_else(|| ConduitError::Config("agent client is required".to_string()))?;
        let target_scope = self
            .target_scope
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConduitError::Config("target scope is required".to_string()))?;

        Ok(DelegatedAgent {
            exchanger,
            agent,
            target_scope,
        })
    }
}
