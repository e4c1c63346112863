use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::{CoreError, ProviderError};
use crate::core::integrations::auth::{OAuthTokenManager, ProviderAuth};
use crate::core::integrations::{
    ExecuteOptions, HttpTransport, IntegrationContext, ProviderId, ProviderTransport,
    TransportRequest, execute,
};

pub const DEFAULT_BASE_URL: &str = "https://api.citationtracker.io";
pub const DEFAULT_TOKEN_URL: &str = "https://auth.citationtracker.io/oauth/token";
pub const CITATIONS_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCitation {
    pub keyword: String,
    #[serde(default)]
    pub citations: u32,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCitations {
    pub organization_id: String,
    pub project_id: String,
    #[serde(default)]
    pub keywords: Vec<KeywordCitation>,
}

pub struct CitationTrackingHttp {
    http: HttpTransport,
}

impl CitationTrackingHttp {
    pub fn new(base_url: &str, tokens: Arc<OAuthTokenManager>) -> Self {
        Self {
            http: HttpTransport::new(
                ProviderId::CitationTracking.as_str(),
                base_url,
                ProviderAuth::OAuth2(tokens),
            ),
        }
    }
}

#[async_trait]
impl ProviderTransport for CitationTrackingHttp {
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

pub struct CitationTrackingClient {
    ctx: IntegrationContext,
    transport: Arc<dyn ProviderTransport>,
}

impl CitationTrackingClient {
    pub fn new(ctx: IntegrationContext, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { ctx, transport }
    }

    pub async fn keyword_citations(
        &self,
        organization_id: &str,
        project_id: &str,
        client_id: Option<&str>,
    ) -> Result<KeywordCitations, CoreError> {
        let endpoint = format!(
            "/v1/organizations/{}/projects/{}/keyword-citations",
            organization_id, project_id
        );
        let options = ExecuteOptions {
            client_id: client_id.map(str::to_string),
            cache_ttl: Some(CITATIONS_TTL),
            request: TransportRequest::get(),
            ..ExecuteOptions::default()
        };
        execute(
            &self.ctx,
            self.transport.as_ref(),
            &endpoint,
            &format!("citation_tracking:citations:{}:{}", organization_id, project_id),
            &options,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::integrations::testing::{FnTransport, harness};
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn citations_are_fetched_per_org_and_project() {
        let h = harness(false).await;
        let transport = Arc::new(FnTransport::new("citation_tracking", |endpoint, _, _| {
            assert_eq!(endpoint, "/v1/organizations/org-1/projects/proj-9/keyword-citations");
            Ok(json!({
                "organization_id": "org-1",
                "project_id": "proj-9",
                "keywords": [{"keyword": "anvils", "citations": 3, "sources": ["chatgpt"]}]
            }))
        }));
        let client = CitationTrackingClient::new(h.ctx.clone(), transport);
        let citations = client
            .keyword_citations("org-1", "proj-9", Some("acme"))
            .await
            .unwrap();
        assert_eq!(citations.keywords[0].citations, 3);
    }
}
