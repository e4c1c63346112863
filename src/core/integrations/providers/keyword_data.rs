//! Bulk SEO data provider (domain metrics, competitor keyword overlap).
//!
//! Responses arrive in an envelope carrying the provider's own five-digit
//! status codes; `20000` means success at both the envelope and task level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::{CoreError, ProviderError};
use crate::core::integrations::{
    ExecuteOptions, HttpTransport, IntegrationContext, ProviderId, ProviderTransport,
    TransportRequest, auth::ProviderAuth, execute,
};

pub const DEFAULT_BASE_URL: &str = "https://api.dataforseo.com";
pub const DOMAIN_METRICS_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const KEYWORD_OVERLAP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const STATUS_OK: u32 = 20_000;
const DOMAIN_METRICS_ENDPOINT: &str = "/v3/dataforseo_labs/google/domain_rank_overview/live";
const KEYWORD_OVERLAP_ENDPOINT: &str = "/v3/dataforseo_labs/google/domain_intersection/live";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainMetrics {
    #[serde(alias = "target")]
    pub domain: String,
    #[serde(default)]
    pub organic_keywords: u64,
    #[serde(default)]
    pub organic_traffic: f64,
    #[serde(default)]
    pub domain_rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedKeyword {
    pub keyword: String,
    #[serde(default)]
    pub search_volume: Option<u64>,
    #[serde(default)]
    pub client_position: Option<u32>,
    #[serde(default)]
    pub competitor_position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordOverlap {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SharedKeyword>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status_code: u32,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Task {
    status_code: u32,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    result: Option<Vec<Value>>,
}

/// Validates the envelope and returns the first task's first result.
fn unwrap_envelope(provider: &str, raw: Value) -> Result<Value, ProviderError> {
    let envelope: Envelope = serde_json::from_value(raw).map_err(|e| ProviderError::Malformed {
        provider: provider.to_string(),
        message: e.to_string(),
    })?;
    if envelope.status_code != STATUS_OK {
        return Err(ProviderError::Api {
            provider: provider.to_string(),
            status: envelope.status_code,
            message: envelope.status_message,
        });
    }
    let task = envelope
        .tasks
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed {
            provider: provider.to_string(),
            message: "response carried no tasks".into(),
        })?;
    if task.status_code != STATUS_OK {
        return Err(ProviderError::Api {
            provider: provider.to_string(),
            status: task.status_code,
            message: task.status_message,
        });
    }
    Ok(task
        .result
        .and_then(|items| items.into_iter().next())
        .unwrap_or(Value::Null))
}

pub struct KeywordDataHttp {
    http: HttpTransport,
}

impl KeywordDataHttp {
    pub fn new(base_url: &str, login: &str, password: &str) -> Self {
        Self {
            http: HttpTransport::new(
                ProviderId::KeywordData.as_str(),
                base_url,
                ProviderAuth::Basic {
                    username: login.to_string(),
                    password: password.to_string(),
                },
            ),
        }
    }
}

#[async_trait]
impl ProviderTransport for KeywordDataHttp {
    fn identify(&self) -> &str {
        self.http.provider()
    }

    async fn transport(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<Value, ProviderError> {
        let raw = self.http.send(endpoint, request).await?;
        unwrap_envelope(self.identify(), raw)
    }
}

pub struct KeywordDataClient {
    ctx: IntegrationContext,
    transport: Arc<dyn ProviderTransport>,
}

impl KeywordDataClient {
    pub fn new(ctx: IntegrationContext, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { ctx, transport }
    }

    pub async fn domain_metrics(
        &self,
        domain: &str,
        client_id: Option<&str>,
    ) -> Result<DomainMetrics, CoreError> {
        let options = ExecuteOptions {
            client_id: client_id.map(str::to_string),
            cache_ttl: Some(DOMAIN_METRICS_TTL),
            request: TransportRequest::post(json!([{
                "target": domain,
                "location_code": 2840,
                "language_code": "en",
            }])),
            ..ExecuteOptions::default()
        };
        execute(
            &self.ctx,
            self.transport.as_ref(),
            DOMAIN_METRICS_ENDPOINT,
            &format!("keyword_data:domain_metrics:{}", domain),
            &options,
        )
        .await
    }

    pub async fn keyword_overlap(
        &self,
        client_domain: &str,
        competitor_domain: &str,
        client_id: Option<&str>,
    ) -> Result<KeywordOverlap, CoreError> {
        let options = ExecuteOptions {
            client_id: client_id.map(str::to_string),
            cache_ttl: Some(KEYWORD_OVERLAP_TTL),
            request: TransportRequest::post(json!([{
                "target1": client_domain,
                "target2": competitor_domain,
                "location_code": 2840,
                "language_code": "en",
                "limit": 100,
            }])),
            ..ExecuteOptions::default()
        };
        execute(
            &self.ctx,
            self.transport.as_ref(),
            KEYWORD_OVERLAP_ENDPOINT,
            &format!("keyword_data:overlap:{}:{}", client_domain, competitor_domain),
            &options,
        )
        .await
    }
}
