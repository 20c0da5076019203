//! Access token acquisition for QuickBooks Online.
//!
//! Token refresh against the Intuit OAuth service is owned by the
//! deployment's identity plumbing; this crate only consumes a bearer
//! token through the [`AccessTokenProvider`] seam.

use async_trait::async_trait;

use caseflow_core::{Error, Result};

/// Supplies a bearer token for QuickBooks API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return a currently-valid access token, or an error when no
    /// token is available.
    async fn access_token(&self) -> Result<String>;
}

/// Reads the token from the `QBO_ACCESS_TOKEN` environment variable.
pub struct EnvTokenProvider;

/// Environment variable holding the QuickBooks bearer token.
pub const QBO_ACCESS_TOKEN_VAR: &str = "QBO_ACCESS_TOKEN";

#[async_trait]
impl AccessTokenProvider for EnvTokenProvider {
    async fn access_token(&self) -> Result<String> {
        match std::env::var(QBO_ACCESS_TOKEN_VAR) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::Config(format!(
                "{} is not set; QuickBooks sync is unavailable",
                QBO_ACCESS_TOKEN_VAR
            ))),
        }
    }
}

/// Fixed-token provider for tests.
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_token() {
        let provider = StaticTokenProvider("tok-123".to_string());
        assert_eq!(provider.access_token().await.unwrap(), "tok-123");
    }
}
