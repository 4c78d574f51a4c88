use crate::error::AgentError;
use crate::session::AgentSession;
use crate::types::AgentThread;
use std::time::Duration;

/// A thread that exists on the agent service and must be deleted.
///
/// Obtained once thread creation succeeds. [`ThreadLease::release`] makes
/// exactly one deletion attempt; failures are logged as
/// [`AgentError::CleanupFailed`] and never returned. Dropping an unreleased
/// lease logs the leak.
#[must_use = "a leased thread must be released"]
#[derive(Debug)]
pub struct ThreadLease {
    thread_id: String,
    released: bool,
}

impl ThreadLease {
    pub fn new(thread: AgentThread) -> Self {
        Self {
            thread_id: thread.id,
            released: false,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Delete the thread, bounded by `timeout`.
    pub async fn release(mut self, session: &AgentSession<'_>, timeout: Duration) {
        self.released = true;

        let result = match tokio::time::timeout(timeout, session.delete_thread(&self.thread_id)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(timeout)),
        };

        match result {
            Ok(()) => tracing::debug!("Deleted thread: {}", self.thread_id),
            Err(e) => {
                let err = AgentError::CleanupFailed {
                    thread_id: self.thread_id.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", err);
            }
        }
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                "Thread {} dropped without cleanup; it stays on the agent service",
                self.thread_id
            );
        }
    }
}
