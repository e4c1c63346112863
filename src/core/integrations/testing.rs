use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{IntegrationContext, ProviderTransport, RetryPolicy, TransportRequest};
use crate::core::cache::{CacheError, CacheGateway, MemoryKv};
use crate::core::errors::ProviderError;
use crate::core::ratelimit::{
    RateBudget, RateBudgets, RateLimiterRegistry, SlidingWindowStore, WindowDecision,
};
use crate::core::store::SqliteStore;
use crate::core::telemetry::Telemetry;

type Responder =
    Box<dyn Fn(&str, &TransportRequest, usize) -> Result<Value, ProviderError> + Send + Sync>;

/// Transport whose answers come from a closure receiving the endpoint, the
/// request and the 1-based call number.
pub(crate) struct FnTransport {
    provider: String,
    calls: AtomicUsize,
    respond: Responder,
}

impl FnTransport {
    pub(crate) fn new<F>(provider: &str, respond: F) -> Self
    where
        F: Fn(&str, &TransportRequest, usize) -> Result<Value, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            provider: provider.to_string(),
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderTransport for FnTransport {
    fn identify(&self) -> &str {
        &self.provider
    }

    async fn transport(
        &self,
        endpoint: &str,
        request: &TransportRequest,
    ) -> Result<Value, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(endpoint, request, call)
    }
}

/// Sliding-window store that counts `limit` calls and either admits
/// through a real in-memory window or denies with a 30 second reset.
pub(crate) struct CountingWindow {
    inner: MemoryKv,
    calls: AtomicUsize,
    deny: bool,
}

impl CountingWindow {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlidingWindowStore for CountingWindow {
    async fn limit(
        &self,
        identifier: &str,
        budget: RateBudget,
        now_ms: i64,
    ) -> Result<WindowDecision, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Ok(WindowDecision {
                success: false,
                retry_at_ms: now_ms + 30_000,
            });
        }
        self.inner.limit(identifier, budget, now_ms).await
    }
}

pub(crate) struct Harness {
    pub kv: Arc<MemoryKv>,
    pub window: Arc<CountingWindow>,
    pub store: Arc<SqliteStore>,
    pub ctx: IntegrationContext,
}

pub(crate) async fn harness(deny: bool) -> Harness {
    let kv = Arc::new(MemoryKv::new());
    let window = Arc::new(CountingWindow {
        inner: MemoryKv::new(),
        calls: AtomicUsize::new(0),
        deny,
    });
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let ctx = IntegrationContext {
        cache: CacheGateway::new(kv.clone()),
        limiter: Arc::new(RateLimiterRegistry::new(
            window.clone(),
            RateBudgets::default(),
        )),
        telemetry: Telemetry::spawn(store.clone()),
        retry: RetryPolicy::default(),
    };
    Harness {
        kv,
        window,
        store,
        ctx,
    }
}
