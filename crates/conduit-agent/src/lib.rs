//! Client for agent services speaking the assistant/thread/message/run
//! protocol.
//!
//! One [`AgentClient::ask`] call is one conversation turn: create a thread,
//! post the question, start a run, poll it to a terminal status, read the
//! answer and delete the thread. The thread is deleted on every exit path
//! once it exists (see [`ThreadLease`]).

pub mod client;
pub mod error;
pub mod lease;
pub mod poll;
pub mod session;
pub mod types;

pub use client::{AgentClient, AgentClientBuilder, DEFAULT_API_VERSION};
pub use error::{AgentError, ProtocolStep, Result};
pub use lease::ThreadLease;
pub use poll::{PollPolicy, PollStop, Poller};
pub use session::{AgentSession, AssistantSource};
pub use types::{
    AgentThread, Assistant, ListOrder, MessageContent, MessageList, Run, RunStatus, ThreadMessage,
};

pub use tokio_util::sync::CancellationToken;
