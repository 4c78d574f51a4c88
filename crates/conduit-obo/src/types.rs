use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// The caller's access token together with the scope it was issued for.
///
/// Lives only for the duration of one exchange. `Debug` never prints the
/// token.
#[derive(Clone)]
pub struct CredentialAssertion {
    token: String,
    audience: Option<String>,
}

impl CredentialAssertion {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            audience: None,
        }
    }

    /// Record the scope/audience the caller token was issued for (log-safe)
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for CredentialAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAssertion")
            .field("token", &"<redacted>")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Bearer token for a downstream resource, produced by one exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    secret: String,
    expires_at: DateTime<Utc>,
    scope: String,
}

impl ExchangedToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>, scope: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
            scope: scope.into(),
        }
    }

    /// Raw bearer value, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Scope this token was granted for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}
