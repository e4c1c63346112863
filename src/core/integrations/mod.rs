//! Outbound provider integrations.
//!
//! Each provider supplies a [`ProviderTransport`] (one request in, one JSON
//! document out) and a typed client that names its cache keys and TTLs.
//! The shared cache → admission → retry → telemetry pipeline lives in
//! [`execute`].

pub mod auth;
mod execute;
mod http;
pub mod providers;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ProviderError;

pub use execute::{ExecuteOptions, IntegrationContext, execute};
pub use http::HttpTransport;
pub use retry::{RetryOutcome, RetryPolicy, retry_provider_call};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    KeywordData,
    SerpAnalysis,
    CitationTracking,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [
        ProviderId::KeywordData,
        ProviderId::SerpAnalysis,
        ProviderId::CitationTracking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::KeywordData => "keyword_data",
            ProviderId::SerpAnalysis => "serp_analysis",
            ProviderId::CitationTracking => "citation_tracking",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// Provider-agnostic description of one outbound request.
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Provider name used for rate budgets, request logs and health rows.
    fn identify(&self) -> &str;

    /// Sends one request. Non-2xx answers and provider-specific failure
    /// codes come back as [`ProviderError::Api`] carrying the status.
    async fn transport(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<serde_json::Value, ProviderError>;
}
