use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Cannot exchange token: {field} is empty")]
    EmptyInput { field: &'static str },

    #[error("Token exchange rejected by authority ({status}): {code}: {description}")]
    Rejected {
        status: u16,
        code: String,
        description: String,
    },

    #[error("Identity authority unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("Identity authority failed with status {status}")]
    AuthorityFailure { status: u16 },

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// True when the authority could not be reached or did not answer
    /// with a usable response, as opposed to an explicit rejection.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::AuthorityFailure { .. } | Self::MalformedResponse(_)
        )
    }

    /// OAuth error code reported by the authority, if any.
    pub fn authority_code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
