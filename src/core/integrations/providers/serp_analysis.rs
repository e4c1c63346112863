use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::{CoreError, ProviderError};
use crate::core::integrations::{
    ExecuteOptions, HttpTransport, IntegrationContext, ProviderId, ProviderTransport,
    TransportRequest, auth::ProviderAuth, execute,
};

pub const DEFAULT_BASE_URL: &str = "https://api.serpanalysis.io";
pub const SERP_TTL: Duration = Duration::from_secs(6 * 60 * 60);

const SERP_ENDPOINT: &str = "/v1/serp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpResult {
    pub position: u32,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpAnalysis {
    pub keyword: String,
    #[serde(default)]
    pub results: Vec<SerpResult>,
    #[serde(default)]
    pub people_also_ask: Vec<String>,
    #[serde(default)]
    pub recommended_word_count: Option<u32>,
}

pub struct SerpAnalysisHttp {
    http: HttpTransport,
}

impl SerpAnalysisHttp {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: HttpTransport::new(
                ProviderId::SerpAnalysis.as_str(),
                base_url,
                ProviderAuth::Bearer(api_key.to_string()),
            ),
        }
    }
}

#[async_trait]
impl ProviderTransport for SerpAnalysisHttp {
    fn identify(&self) -> &str {
        self.http.provider()
    }

    async fn transport(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<Value, ProviderError> {
        self.http.send(endpoint, request).await
    }
}

pub struct SerpAnalysisClient {
    ctx: IntegrationContext,
    transport: Arc<dyn ProviderTransport>,
}

impl SerpAnalysisClient {
    pub fn new(ctx: IntegrationContext, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { ctx, transport }
    }

    pub async fn analyze(
        &self,
        keyword: &str,
        client_id: Option<&str>,
    ) -> Result<SerpAnalysis, CoreError> {
        let options = ExecuteOptions {
            client_id: client_id.map(str::to_string),
            cache_ttl: Some(SERP_TTL),
            request: TransportRequest::get()
                .with_query("q", keyword)
                .with_query("depth", "10"),
            ..ExecuteOptions::default()
        };
        execute(
            &self.ctx,
            self.transport.as_ref(),
            SERP_ENDPOINT,
            &format!("serp_analysis:serp:{}", keyword.to_lowercase()),
            &options,
        )
        .await
    }
}
