use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Exchanges the long-lived API key for a short-lived access token.
///
/// Tokens are not assumed valid across reconnects, so a fresh one is fetched
/// before every session open.
pub struct AuthClient {
    http: reqwest::Client,
    issue_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(issue_url: &str, api_key: &str, skip_tls_verify: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .context("unable to build HTTP client for token issuance")?;

        Ok(AuthClient {
            http,
            issue_url: issue_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn fetch_token(&self) -> Result<String> {
        let response = self
            .http
            .post(&self.issue_url)
            .json(&json!({ "api_key": self.api_key }))
            .send()
            .await
            .with_context(|| format!("unable to reach token issuer at {}", self.issue_url))?
            .error_for_status()
            .context("token issuer rejected the API key")?;

        let token: TokenResponse = response
            .json()
            .await
            .context("unable to decode token issuer response")?;

        Ok(token.token)
    }
}
