use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::auth::ProviderAuth;
use super::{Method, TransportRequest};
use crate::core::errors::ProviderError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

/// JSON-over-HTTP plumbing shared by the provider transports: URL joining,
/// authentication, and mapping of network and status failures onto
/// [`ProviderError`].
pub struct HttpTransport {
    provider: String,
    base_url: String,
    auth: ProviderAuth,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(provider: &str, base_url: &str, auth: ProviderAuth) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            client,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Sends the request. A 401 on an OAuth2 provider forces one token
    /// refresh and one resend.
    pub async fn send(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<Value, ProviderError> {
        match self.send_once(endpoint, request).await {
            Err(ProviderError::Api { status: 401, .. }) if self.auth.oauth().is_some() => {
                info!("{} rejected the access token, refreshing", self.provider);
                if let Some(manager) = self.auth.oauth() {
                    manager.refresh(true).await?;
                }
                self.send_once(endpoint, request).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let builder = self.auth.apply(builder).await?;

        debug!("{} {:?} {}", self.provider, request.method, url);
        let response = builder.send().await.map_err(|e| ProviderError::Transient {
            provider: self.provider.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ProviderError::Api {
                provider: self.provider.clone(),
                status: status.as_u16() as u32,
                message: body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Malformed {
                provider: self.provider.clone(),
                message: e.to_string(),
            })
    }
}
