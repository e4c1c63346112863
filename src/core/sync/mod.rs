//! Client sync: fans one request out to a provider client and gathers the
//! results per competitor or keyword.
//!
//! A failure on one competitor or keyword is reported on that item and does
//! not fail the batch. Rate limiting is the exception: if any item is
//! denied, the whole sync fails with the longest retry hint seen.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::errors::CoreError;
use crate::core::integrations::ProviderId;
use crate::core::integrations::providers::{
    CitationTrackingClient, DomainMetrics, KeywordCitations, KeywordDataClient, KeywordOverlap,
    SerpAnalysis, SerpAnalysisClient,
};
use crate::core::store::ClientStore;

/// Target keywords analyzed per SERP sync.
pub const SERP_KEYWORD_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SyncRequest {
    KeywordData,
    SerpAnalysis,
    CitationTracking {
        organization_id: String,
        project_id: String,
    },
}

impl SyncRequest {
    pub fn provider(&self) -> ProviderId {
        match self {
            SyncRequest::KeywordData => ProviderId::KeywordData,
            SyncRequest::SerpAnalysis => ProviderId::SerpAnalysis,
            SyncRequest::CitationTracking { .. } => ProviderId::CitationTracking,
        }
    }

    /// Builds a request from a provider name plus the citation-tracking
    /// identifiers, which are only required for that provider.
    pub fn parse(
        provider: &str,
        organization_id: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Self, CoreError> {
        match ProviderId::parse(provider) {
            Some(ProviderId::KeywordData) => Ok(SyncRequest::KeywordData),
            Some(ProviderId::SerpAnalysis) => Ok(SyncRequest::SerpAnalysis),
            Some(ProviderId::CitationTracking) => match (organization_id, project_id) {
                (Some(org), Some(project)) if !org.is_empty() && !project.is_empty() => {
                    Ok(SyncRequest::CitationTracking {
                        organization_id: org.to_string(),
                        project_id: project.to_string(),
                    })
                }
                _ => Err(CoreError::Validation(
                    "citation_tracking sync needs organization_id and project_id".into(),
                )),
            },
            None => Err(CoreError::InvalidProvider(provider.to_string())),
        }
    }

    /// Decodes a JSON body, reporting an unknown provider name separately
    /// from a malformed payload.
    pub fn from_json(body: Value) -> Result<Self, CoreError> {
        let provider = body
            .get("provider")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation("missing 'provider'".into()))?;
        if ProviderId::parse(provider).is_none() {
            return Err(CoreError::InvalidProvider(provider.to_string()));
        }
        serde_json::from_value(body).map_err(|e| CoreError::Validation(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome<T> {
    Ok { data: T },
    Error { kind: String, message: String },
}

impl<T> ItemOutcome<T> {
    fn from_result(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => ItemOutcome::Ok { data },
            Err(e) => ItemOutcome::Error {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ItemOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SyncReport {
    KeywordData {
        client_id: String,
        domain_metrics: DomainMetrics,
        competitors: BTreeMap<String, ItemOutcome<KeywordOverlap>>,
    },
    SerpAnalysis {
        client_id: String,
        keywords: BTreeMap<String, ItemOutcome<SerpAnalysis>>,
    },
    CitationTracking {
        client_id: String,
        citations: KeywordCitations,
    },
}

/// Collapses every rate-limit denial among `errors` into one error carrying
/// the longest retry hint.
fn fold_rate_limits<'a>(
    provider: ProviderId,
    errors: impl IntoIterator<Item = &'a CoreError>,
) -> Option<CoreError> {
    let mut denied = false;
    let mut retry_after: Option<u64> = None;
    for error in errors {
        if let CoreError::RateLimited {
            retry_after_secs, ..
        } = error
        {
            denied = true;
            retry_after = retry_after.max(*retry_after_secs);
        }
    }
    denied.then(|| CoreError::RateLimited {
        provider: provider.as_str().to_string(),
        retry_after_secs: retry_after,
    })
}

fn not_configured(provider: ProviderId) -> CoreError {
    CoreError::Validation(format!("provider '{}' is not configured", provider))
}

pub struct SyncOrchestrator {
    clients: Arc<dyn ClientStore>,
    keyword_data: Option<Arc<KeywordDataClient>>,
    serp_analysis: Option<Arc<SerpAnalysisClient>>,
    citation_tracking: Option<Arc<CitationTrackingClient>>,
}

impl SyncOrchestrator {
    pub fn new(clients: Arc<dyn ClientStore>) -> Self {
        Self {
            clients,
            keyword_data: None,
            serp_analysis: None,
            citation_tracking: None,
        }
    }

    pub fn with_keyword_data(mut self, client: Arc<KeywordDataClient>) -> Self {
        self.keyword_data = Some(client);
        self
    }

    pub fn with_serp_analysis(mut self, client: Arc<SerpAnalysisClient>) -> Self {
        self.serp_analysis = Some(client);
        self
    }

    pub fn with_citation_tracking(mut self, client: Arc<CitationTrackingClient>) -> Self {
        self.citation_tracking = Some(client);
        self
    }

    pub fn configured_providers(&self) -> Vec<ProviderId> {
        let mut out = Vec::new();
        if self.keyword_data.is_some() {
            out.push(ProviderId::KeywordData);
        }
        if self.serp_analysis.is_some() {
            out.push(ProviderId::SerpAnalysis);
        }
        if self.citation_tracking.is_some() {
            out.push(ProviderId::CitationTracking);
        }
        out
    }

    pub async fn sync(
        &self,
        client_id: &str,
        request: &SyncRequest,
    ) -> Result<SyncReport, CoreError> {
        let client = self
            .clients
            .get_client(client_id)
            .await?
            .ok_or_else(|| CoreError::not_found("client", client_id))?;
        info!("Syncing client {} from {}", client_id, request.provider());

        match request {
            SyncRequest::KeywordData => {
                let api = self
                    .keyword_data
                    .as_ref()
                    .ok_or_else(|| not_configured(ProviderId::KeywordData))?;
                let competitors = self.clients.list_competitors(client_id).await?;

                let domain = client.domain.as_str();

                let own = api.domain_metrics(domain, Some(client_id));
                let overlaps = join_all(competitors.iter().map(|competitor| async move {
                    let result = api
                        .keyword_overlap(domain, &competitor.domain, Some(client_id))
                        .await;
                    (competitor.domain.clone(), result)
                }));
                let (own, overlaps) = futures_util::join!(own, overlaps);

                let errors = own
                    .as_ref()
                    .err()
                    .into_iter()
                    .chain(overlaps.iter().filter_map(|(_, r)| r.as_ref().err()));
                if let Some(limited) = fold_rate_limits(ProviderId::KeywordData, errors) {
                    warn!("Keyword sync for {} hit the rate limit", client_id);
                    return Err(limited);
                }
                let domain_metrics = own?;

                let competitors = overlaps
                    .into_iter()
                    .map(|(domain, result)| {
                        if let Err(e) = &result {
                            warn!("Keyword overlap for {} vs {} failed: {}", client_id, domain, e);
                        }
                        (domain, ItemOutcome::from_result(result))
                    })
                    .collect();
                Ok(SyncReport::KeywordData {
                    client_id: client_id.to_string(),
                    domain_metrics,
                    competitors,
                })
            }
            SyncRequest::SerpAnalysis => {
                let api = self
                    .serp_analysis
                    .as_ref()
                    .ok_or_else(|| not_configured(ProviderId::SerpAnalysis))?;
                let mut seen = HashSet::new();
                let keywords: Vec<&String> = client
                    .target_keywords
                    .iter()
                    .filter(|keyword| seen.insert(keyword.as_str()))
                    .take(SERP_KEYWORD_LIMIT)
                    .collect();

                let results = join_all(keywords.into_iter().map(|keyword| async move {
                    (keyword.clone(), api.analyze(keyword, Some(client_id)).await)
                }))
                .await;

                let errors = results.iter().filter_map(|(_, r)| r.as_ref().err());
                if let Some(limited) = fold_rate_limits(ProviderId::SerpAnalysis, errors) {
                    warn!("SERP sync for {} hit the rate limit", client_id);
                    return Err(limited);
                }
                let keywords = results
                    .into_iter()
                    .map(|(keyword, result)| (keyword, ItemOutcome::from_result(result)))
                    .collect();
                Ok(SyncReport::SerpAnalysis {
                    client_id: client_id.to_string(),
                    keywords,
                })
            }
            SyncRequest::CitationTracking {
                organization_id,
                project_id,
            } => {
                let api = self
                    .citation_tracking
                    .as_ref()
                    .ok_or_else(|| not_configured(ProviderId::CitationTracking))?;
                let citations = api
                    .keyword_citations(organization_id, project_id, Some(client_id))
                    .await?;
                Ok(SyncReport::CitationTracking {
                    client_id: client_id.to_string(),
                    citations,
                })
            }
        }
    }
}
