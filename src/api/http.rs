//! JSON-over-HTTP API binding.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use super::Api;
use crate::config::ApiConfig;

/// A REST endpoint authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpApi {
    name: String,
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpApi {
    /// Build the binding, picking `test_url` over `url` when `test` is set.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let base_url = match (&config.test_url, config.test) {
            (Some(test_url), true) => test_url.clone(),
            _ => config.url.clone(),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            name: config.name.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource.trim_start_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl Api for HttpApi {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, resource: &str) -> Result<Value> {
        let url = self.url(resource);
        let resp = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn post(&self, resource: &str, data: &Value) -> Result<Value> {
        let url = self.url(resource);
        let resp = self
            .authorize(self.client.post(&url).json(data))
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(test: bool) -> ApiConfig {
        ApiConfig {
            name: "Tracker".to_string(),
            url: "https://tracker.example.com/api/".to_string(),
            test_url: Some("https://staging.tracker.example.com/api".to_string()),
            token: Some("secret".to_string()),
            test,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_base_url_selection() {
        let api = HttpApi::from_config(&config(false)).unwrap();
        assert_eq!(api.base_url(), "https://tracker.example.com/api");
        assert_eq!(api.url("/issues"), "https://tracker.example.com/api/issues");

        let api = HttpApi::from_config(&config(true)).unwrap();
        assert_eq!(api.base_url(), "https://staging.tracker.example.com/api");
        assert_eq!(api.name(), "Tracker");
    }
}
