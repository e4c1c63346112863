//! Composition root: opens the store and wires every component once.

use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::info;

use crate::core::cache::{CacheGateway, SqliteKv};
use crate::core::config::AppConfig;
use crate::core::crypto::TokenCipher;
use crate::core::integrations::auth::{HttpTokenEndpoint, OAuthTokenManager};
use crate::core::integrations::providers::{
    CitationTrackingClient, CitationTrackingHttp, KeywordDataClient, KeywordDataHttp,
    SerpAnalysisClient, SerpAnalysisHttp,
};
use crate::core::integrations::{IntegrationContext, ProviderId, RetryPolicy};
use crate::core::ratelimit::RateLimiterRegistry;
use crate::core::store::SqliteStore;
use crate::core::sync::SyncOrchestrator;
use crate::core::telemetry::Telemetry;
use crate::core::workflow::WorkflowEngine;

pub struct App {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub kv: Arc<SqliteKv>,
    pub cache: CacheGateway,
    pub telemetry: Telemetry,
    pub workflow: WorkflowEngine,
    pub sync: Arc<SyncOrchestrator>,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(config.db_path()).await?);
        Self::with_store(config, store).await
    }

    pub async fn with_store(config: AppConfig, store: Arc<SqliteStore>) -> Result<Self> {
        let kv = Arc::new(SqliteKv::new(store.get_db()).await?);
        let cache = CacheGateway::new(kv.clone());
        let telemetry = Telemetry::spawn(store.clone());
        let ctx = IntegrationContext {
            cache: cache.clone(),
            limiter: Arc::new(RateLimiterRegistry::new(
                kv.clone(),
                config.rate_budgets.clone(),
            )),
            telemetry: telemetry.clone(),
            retry: RetryPolicy::default(),
        };

        let mut sync = SyncOrchestrator::new(store.clone());
        if let Some(kd) = &config.keyword_data {
            let transport = KeywordDataHttp::new(&kd.base_url, &kd.login, &kd.password);
            sync = sync.with_keyword_data(Arc::new(KeywordDataClient::new(
                ctx.clone(),
                Arc::new(transport),
            )));
        }
        if let Some(serp) = &config.serp_analysis {
            let transport = SerpAnalysisHttp::new(&serp.base_url, &serp.api_key);
            sync = sync.with_serp_analysis(Arc::new(SerpAnalysisClient::new(
                ctx.clone(),
                Arc::new(transport),
            )));
        }
        if let Some(citation) = &config.citation_tracking {
            let key = config
                .encryption_key
                .ok_or_else(|| anyhow!("citation tracking requires BRIEFLINE_ENCRYPTION_KEY"))?;
            let provider = ProviderId::CitationTracking.as_str();
            let tokens = Arc::new(OAuthTokenManager::new(
                provider,
                store.clone(),
                TokenCipher::new(&key),
                Arc::new(HttpTokenEndpoint::new(
                    provider,
                    &citation.token_url,
                    &citation.client_id,
                    &citation.client_secret,
                )),
            ));
            if let Some(refresh_token) = &citation.refresh_token
                && tokens.seed_refresh_token(refresh_token).await?
            {
                info!("Seeded OAuth refresh token for {}", provider);
            }
            let transport = CitationTrackingHttp::new(&citation.base_url, tokens);
            sync = sync.with_citation_tracking(Arc::new(CitationTrackingClient::new(
                ctx.clone(),
                Arc::new(transport),
            )));
        }

        let configured: Vec<&str> = sync
            .configured_providers()
            .iter()
            .map(|p| p.as_str())
            .collect();
        info!(
            "Providers configured: {}",
            if configured.is_empty() {
                "none".to_string()
            } else {
                configured.join(", ")
            }
        );

        let workflow = WorkflowEngine::new(store.clone(), cache.clone());
        Ok(Self {
            config,
            store,
            kv,
            cache,
            telemetry,
            workflow,
            sync: Arc::new(sync),
        })
    }
}
