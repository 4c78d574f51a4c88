use conduit::{AgentClient, AssistantSource, DelegatedAgent, OboTokenExchanger, PollPolicy};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: DelegatedAgent,
}

impl AppState {
    pub fn new(config: Config, agent: DelegatedAgent) -> Self {
        Self {
            config: Arc::new(config),
            agent,
        }
    }

    /// Wire the exchanger and agent client from configuration
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let exchanger = OboTokenExchanger::builder()
            .instance(&config.azure.instance)
            .tenant_id(&config.azure.tenant_id)
            .client_id(&config.azure.client_id)
            .client_secret(&config.client_secret)
            .source_scope(&config.obo.source_scope)
            .build()?;

        if config.agent.poll_interval_ms == 0 {
            anyhow::bail!("agent.poll_interval_ms must be greater than zero");
        }

        let mut poll_policy = PollPolicy::fixed(config.agent.poll_interval());
        if let Some(secs) = config.agent.poll_max_wait_secs {
            poll_policy = poll_policy.with_max_wait(Duration::from_secs(secs));
        }

        let client = AgentClient::builder()
            .endpoint(&config.agent.endpoint)
            .api_version(&config.agent.api_version)
            .assistant(assistant_source(&config))
            .poll_policy(poll_policy)
            .request_timeout(config.agent.request_timeout())
            .build()?;

        let agent = DelegatedAgent::builder()
            .exchanger(exchanger)
            .agent(client)
            .target_scope(&config.obo.target_scope)
            .build()?;

        Ok(Self::new(config, agent))
    }

    pub fn default_question(&self) -> &str {
        &self.config.agent.default_question
    }
}

fn assistant_source(config: &Config) -> AssistantSource {
    match config.agent.agent_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && config.agent.verify_agent => {
            AssistantSource::Lookup(id.to_string())
        }
        Some(id) if !id.is_empty() => AssistantSource::Configured(id.to_string()),
        _ => AssistantSource::default(),
    }
}
