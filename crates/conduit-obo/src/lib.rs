//! On-behalf-of token exchange.
//!
//! Turns a caller's access token (issued for this service's own resource)
//! into a token for a downstream resource, asserting the caller's identity.
//! One exchange per call: nothing is cached and the token value is never
//! logged.

pub mod error;
pub mod exchanger;
pub mod types;

pub use error::{ExchangeError, Result};
pub use exchanger::{OboTokenExchanger, OboTokenExchangerBuilder, TokenExchanger};
pub use types::{CredentialAssertion, ExchangedToken};
