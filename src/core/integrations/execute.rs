use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::retry::{RetryPolicy, retry_provider_call};
use super::{ProviderTransport, TransportRequest};
use crate::core::cache::CacheGateway;
use crate::core::errors::{CoreError, ProviderError};
use crate::core::ratelimit::RateLimiterRegistry;
use crate::core::store::{CallOutcome, HealthObservation, RequestLogEntry};
use crate::core::telemetry::Telemetry;

/// Shared collaborators every provider client executes against.
#[derive(Clone)]
pub struct IntegrationContext {
    pub cache: CacheGateway,
    pub limiter: Arc<RateLimiterRegistry>,
    pub telemetry: Telemetry,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub skip_cache: bool,
    /// Client the call is made on behalf of; recorded in the request log.
    pub client_id: Option<String>,
    /// Populate the cache on success when set.
    pub cache_ttl: Option<Duration>,
    pub request: TransportRequest,
}

/// Runs one provider operation: cache lookup, rate admission, transport
/// with retry, then cache population. Every transport attempt is logged and
/// fed into the provider's health row through [`Telemetry`].
pub async fn execute<T>(
    ctx: &IntegrationContext,
    transport: &dyn ProviderTransport,
    endpoint: &str,
    cache_key: &str,
    options: &ExecuteOptions,
) -> Result<T, CoreError>
where
    T: DeserializeOwned + Serialize,
{
    let provider = transport.identify();

    if !options.skip_cache
        && let Some(hit) = ctx.cache.get::<T>(cache_key).await
    {
        return Ok(hit);
    }

    let admission = ctx.limiter.acquire(provider).await;
    if !admission.allowed {
        return Err(CoreError::RateLimited {
            provider: provider.to_string(),
            retry_after_secs: admission.retry_after_secs,
        });
    }

    let outcome = retry_provider_call(&ctx.retry, provider, endpoint, || async move {
        let started = Instant::now();
        let result = transport
            .transport(endpoint, &options.request)
            .await
            .and_then(|raw| {
                serde_json::from_value::<T>(raw).map_err(|e| ProviderError::Malformed {
                    provider: provider.to_string(),
                    message: e.to_string(),
                })
            });
        record_attempt(
            &ctx.telemetry,
            provider,
            endpoint,
            options.client_id.as_deref(),
            result.as_ref().err(),
            started.elapsed(),
        );
        result
    })
    .await;

    match outcome.result {
        Ok(value) => {
            debug!(
                "{} {} answered after {} attempt(s)",
                provider, endpoint, outcome.attempts
            );
            if let Some(ttl) = options.cache_ttl {
                ctx.cache.set(cache_key, &value, ttl);
            }
            Ok(value)
        }
        Err(err) => {
            warn!(
                "{} {} failed after {} attempt(s): {}",
                provider, endpoint, outcome.attempts, err
            );
            Err(CoreError::Provider(err))
        }
    }
}

fn record_attempt(
    telemetry: &Telemetry,
    provider: &str,
    endpoint: &str,
    client_id: Option<&str>,
    error: Option<&ProviderError>,
    latency: Duration,
) {
    let response_time_ms = latency.as_millis() as u64;
    telemetry.log_request(RequestLogEntry {
        client_id: client_id.map(str::to_string),
        provider: provider.to_string(),
        endpoint: endpoint.to_string(),
        status_code: match error {
            None => Some(200),
            Some(err) => err.status_code(),
        },
        response_time_ms,
        error_message: error.map(|e| e.to_string()),
    });
    telemetry.record_health(HealthObservation {
        provider: provider.to_string(),
        outcome: if error.is_none() {
            CallOutcome::Success
        } else {
            CallOutcome::Failure
        },
        response_time_ms,
        observed_at: Utc::now(),
    });
}
