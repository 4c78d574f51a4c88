//! # Conduit - delegated access to remote agents
//!
//! Lets a web-facing service ask a remote agent a question on behalf of an
//! already-authenticated caller:
//!
//! 1. **conduit-obo** exchanges the caller's token for one scoped to the agent
//!    service (on-behalf-of grant)
//! 2. **conduit-agent** drives the thread/message/run protocol with that token
//!    and returns the answer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let agent = DelegatedAgent::builder()
//!         .exchanger(
//!             OboTokenExchanger::builder()
//!                 .tenant_id("contoso.onmicrosoft.com")
//!                 .client_id("00000000-0000-0000-0000-000000000000")
//!                 .client_secret(std::env::var("AZURE_CLIENT_SECRET")?)
//!                 .build()?,
//!         )
//!         .agent(
//!             AgentClient::builder()
//!                 .endpoint("https://api.fabric.microsoft.com/v1/workspaces/ws/aiskills/skill/aiassistant/openai")
//!                 .build()?,
//!         )
//!         .target_scope("https://api.fabric.microsoft.com/.default")
//!         .build()?;
//!
//!     let caller_token = "<token issued to this service for the caller>";
//!     let answer = agent.ask(caller_token, "Give me number of buildings per tenant.").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub use conduit_agent as agent;
pub use conduit_obo as obo;

pub use conduit_agent::{AgentClient, AgentError, AssistantSource, PollPolicy};
pub use conduit_obo::{ExchangeError, ExchangedToken, OboTokenExchanger, TokenExchanger};

pub mod delegate;
pub mod error;

pub use delegate::{DelegatedAgent, DelegatedAgentBuilder};
pub use error::{ConduitError, ErrorKind, Result};

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::delegate::DelegatedAgent;
    pub use crate::error::{ConduitError, ErrorKind};
    pub use crate::{AgentClient, AssistantSource, OboTokenExchanger, PollPolicy};
    pub use tokio_util::sync::CancellationToken;
}
