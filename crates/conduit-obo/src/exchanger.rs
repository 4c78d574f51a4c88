// On-behalf-of exchange against an OAuth2 v2.0 token endpoint (HTTP direct, no SDK)

use crate::error::{ExchangeError, Result};
use crate::types::{CredentialAssertion, ExchangedToken};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

const DEFAULT_INSTANCE: &str = "https://login.microsoftonline.com";
const OBO_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchanges a caller token for a token valid on another resource.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Perform one on-behalf-of exchange.
    ///
    /// Fails with [`ExchangeError::EmptyInput`] before touching the network
    /// when either argument is blank.
    async fn exchange(&self, caller_token: &str, target_scope: &str) -> Result<ExchangedToken>;
}

/// Confidential client performing the on-behalf-of grant.
///
/// - Token endpoint: `{instance}/{tenant_id}/oauth2/v2.0/token`
/// - Auth: client id + client secret in the form body
/// - No retries and no caching: every call is one round trip
pub struct OboTokenExchanger {
    http_client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    source_scope: Option<String>,
}

impl OboTokenExchanger {
    pub fn builder() -> OboTokenExchangerBuilder {
        OboTokenExchangerBuilder::default()
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange an already-wrapped caller assertion.
    pub async fn exchange_assertion(
        &self,
        assertion: &CredentialAssertion,
        target_scope: &str,
    ) -> Result<ExchangedToken> {
        if assertion.is_empty() {
            return Err(ExchangeError::EmptyInput { field: "caller token" });
        }
        let target_scope = target_scope.trim();
        if target_scope.is_empty() {
            return Err(ExchangeError::EmptyInput { field: "target scope" });
        }

        let params = [
            ("grant_type", OBO_GRANT_TYPE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("assertion", assertion.token()),
            ("scope", target_scope),
            ("requested_token_use", "on_behalf_of"),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    "Identity authority unreachable for scope {}: {}",
                    target_scope,
                    e
                );
                ExchangeError::Unavailable(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &body, target_scope, assertion));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(ExchangeError::MalformedResponse(
                "access_token is empty".to_string(),
            ));
        }

        let expires_at = token
            .expires_in
            .lifetime()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                ExchangeError::MalformedResponse(format!(
                    "expires_in out of range: {}",
                    token.expires_in
                ))
            })?;

        tracing::info!(
            "Successfully acquired OBO token for scope: {} (from {})",
            target_scope,
            assertion.audience().unwrap_or("<unknown>")
        );

        // Tag with the requested scope; the authority's `scope` echo may list
        // expanded permissions but the token is only valid for this resource.
        Ok(ExchangedToken::new(token.access_token, expires_at, target_scope))
    }
}

/// Map a non-2xx authority response to an error.
///
/// An OAuth error body is a rejection. Without one, a 5xx is an outage and
/// anything else is a rejection carrying only the status.
fn classify_failure(
    status: StatusCode,
    body: &str,
    target_scope: &str,
    assertion: &CredentialAssertion,
) -> ExchangeError {
    let source = assertion.audience().unwrap_or("<unknown>");

    match serde_json::from_str::<AuthorityError>(body) {
        Ok(err) => {
            tracing::error!(
                "Failed to acquire OBO token for scope {} (from {}): {} ({})",
                target_scope,
                source,
                err.error,
                status
            );
            ExchangeError::Rejected {
                status: status.as_u16(),
                code: err.error,
                description: err.error_description.unwrap_or_default(),
            }
        }
        Err(_) if status.is_server_error() => {
            tracing::error!(
                "Identity authority failed for scope {} (from {}): {}",
                target_scope,
                source,
                status
            );
            ExchangeError::AuthorityFailure {
                status: status.as_u16(),
            }
        }
        Err(_) => {
            tracing::error!(
                "Failed to acquire OBO token for scope {} (from {}): {}",
                target_scope,
                source,
                status
            );
            ExchangeError::Rejected {
                status: status.as_u16(),
                code: "http_error".to_string(),
                description: String::new(),
            }
        }
    }
}

#[async_trait]
impl TokenExchanger for OboTokenExchanger {
    async fn exchange(&self, caller_token: &str, target_scope: &str) -> Result<ExchangedToken> {
        let mut assertion = CredentialAssertion::new(caller_token);
        if let Some(source) = &self.source_scope {
            assertion = assertion.with_audience(source.clone());
        }
        self.exchange_assertion(&assertion, target_scope).await
    }
}

impl fmt::Debug for OboTokenExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OboTokenExchanger")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("source_scope", &self.source_scope)
            .finish()
    }
}

/// Builder for OboTokenExchanger
#[derive(Default)]
pub struct OboTokenExchangerBuilder {
    instance: Option<String>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    source_scope: Option<String>,
    timeout: Option<Duration>,
}

impl OboTokenExchangerBuilder {
    /// Authority host, e.g. "https://login.microsoftonline.com/"
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Scope the incoming caller tokens were issued for. Only used in logs.
    pub fn source_scope(mut self, scope: impl Into<String>) -> Self {
        self.source_scope = Some(scope.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<OboTokenExchanger> {
        let tenant_id = required(self.tenant_id, "Tenant ID")?;
        let client_id = required(self.client_id, "Client ID")?;
        let client_secret = required(self.client_secret, "Client secret")?;

        let instance = self.instance.unwrap_or_else(|| DEFAULT_INSTANCE.to_string());
        let token_endpoint = format!(
            "{}/{}/oauth2/v2.0/token",
            instance.trim_end_matches('/'),
            tenant_id.trim_matches('/')
        );

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| ExchangeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(OboTokenExchanger {
            http_client,
            token_endpoint,
            client_id,
            client_secret,
            source_scope: self.source_scope,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ExchangeError::Config(format!("{} is required", name)))
}

// ============================================================================
// AUTHORITY RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
}

/// Some authorities send `expires_in` as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    /// Token lifetime; `None` unless a positive, representable number of seconds
    fn lifetime(&self) -> Option<ChronoDuration> {
        let secs = match self {
            Self::Seconds(s) => *s,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        if secs <= 0 {
            return None;
        }
        ChronoDuration::try_seconds(secs)
    }
}

impl fmt::Display for ExpiresIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{}", s),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorityError {
    error: String,
    error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> OboTokenExchangerBuilder {
        OboTokenExchanger::builder()
            .tenant_id("contoso-tenant")
            .client_id("client-id")
            .client_secret("client-secret")
    }

    #[test]
    fn test_default_token_endpoint() {
        let exchanger = builder().build().unwrap();
        assert_eq!(
            exchanger.token_endpoint(),
            "https://login.microsoftonline.com/contoso-tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_instance_trailing_slash() {
        let exchanger = builder()
            .instance("https://login.microsoftonline.com/")
            .build()
            .unwrap();
        assert_eq!(
            exchanger.token_endpoint(),
            "https://login.microsoftonline.com/contoso-tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_missing_client_secret() {
        let result = OboTokenExchanger::builder()
            .tenant_id("t")
            .client_id("c")
            .build();

        let err = result.err().unwrap().to_string();
        assert!(err.contains("Client secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let exchanger = builder().build().unwrap();
        let debug = format!("{:?}", exchanger);
        assert!(!debug.contains("client-secret"));
    }

    #[test]
    fn test_blank_scope_rejected_before_sending() {
        let exchanger = builder()
            .instance("http://127.0.0.1:1")
            .build()
            .unwrap();

        let result = tokio_test::block_on(
            exchanger.exchange_assertion(&CredentialAssertion::new("caller-token"), "   "),
        );

        assert!(matches!(
            result,
            Err(ExchangeError::EmptyInput { field: "target scope" })
        ));
    }

    #[test]
    fn test_expires_in_forms() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3599}"#).unwrap();
        assert_eq!(numeric.expires_in.lifetime(), Some(ChronoDuration::seconds(3599)));

        let text: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":"3600"}"#).unwrap();
        assert_eq!(text.expires_in.lifetime(), Some(ChronoDuration::seconds(3600)));
    }
}
