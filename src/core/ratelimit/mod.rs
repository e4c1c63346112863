//! Per-provider admission control over a shared sliding-window counter.

mod window;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::cache::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateBudget {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    fn window_ms(&self) -> i64 {
        (self.window.as_millis() as i64).max(1)
    }
}

/// Budgets by provider name, with a conservative fallback for anything
/// not listed.
#[derive(Debug, Clone)]
pub struct RateBudgets {
    by_provider: HashMap<String, RateBudget>,
    fallback: RateBudget,
}

impl Default for RateBudgets {
    fn default() -> Self {
        let mut by_provider = HashMap::new();
        by_provider.insert("keyword_data".to_string(), RateBudget::per_minute(2000));
        by_provider.insert("serp_analysis".to_string(), RateBudget::per_minute(100));
        by_provider.insert("citation_tracking".to_string(), RateBudget::per_minute(30));
        Self {
            by_provider,
            fallback: RateBudget::per_minute(60),
        }
    }
}

impl RateBudgets {
    pub fn with_budget(mut self, provider: &str, budget: RateBudget) -> Self {
        self.by_provider.insert(provider.to_string(), budget);
        self
    }

    pub fn budget_for(&self, provider: &str) -> RateBudget {
        self.by_provider
            .get(provider)
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// Outcome of one `limit` call against the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub success: bool,
    /// Epoch milliseconds at which the next request would be admitted.
    pub retry_at_ms: i64,
}

/// Sliding-window counter held in a shared store. Implementations evaluate
/// the estimate and record the hit atomically.
#[async_trait]
pub trait SlidingWindowStore: Send + Sync {
    async fn limit(
        &self,
        identifier: &str,
        budget: RateBudget,
        now_ms: i64,
    ) -> Result<WindowDecision, CacheError>;
}

/// Two-bucket estimate: the previous window's count weighted by how much
/// of it still overlaps the trailing interval, plus the current count.
pub(crate) fn admits(previous: u64, current: u64, budget: RateBudget, now_ms: i64) -> bool {
    let window_ms = budget.window_ms() as u128;
    let elapsed = now_ms.rem_euclid(budget.window_ms()) as u128;
    // Scaled by the window length to stay in integers.
    let estimate = previous as u128 * (window_ms - elapsed) + current as u128 * window_ms;
    estimate < budget.max_requests as u128 * window_ms
}

/// Earliest instant after `now_ms` at which `admits` holds again, assuming
/// no further hits are recorded.
pub(crate) fn next_admission_ms(previous: u64, current: u64, budget: RateBudget, now_ms: i64) -> i64 {
    let window_ms = budget.window_ms();
    let bucket_start = bucket_of(budget, now_ms) * window_ms;
    let next_start = bucket_start + window_ms;
    let max = budget.max_requests as u128;
    let w = window_ms as u128;

    // Least elapsed offset at which `weight * (w - elapsed) < room` holds.
    let earliest_offset = |weight: u64, room: u128| -> i64 {
        let span = room.div_ceil(weight as u128).min(w + 1) as i64;
        (window_ms - span + 1).max(0)
    };

    // Still in this window: the previous count has to decay far enough.
    if (current as u128) < max && previous > 0 {
        let offset = earliest_offset(previous, (max - current as u128) * w);
        if offset < window_ms {
            return (bucket_start + offset).max(now_ms + 1);
        }
    }

    // Next window: this window's count becomes the decaying one.
    let at = if current == 0 {
        next_start
    } else {
        next_start + earliest_offset(current, max * w)
    };
    at.max(now_ms + 1)
}

pub(crate) fn bucket_of(budget: RateBudget, now_ms: i64) -> i64 {
    now_ms.div_euclid(budget.window_ms())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub retry_after_secs: Option<u64>,
}

impl Admission {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }
}

pub struct ProviderLimiter {
    provider: String,
    budget: RateBudget,
    store: Arc<dyn SlidingWindowStore>,
}

impl ProviderLimiter {
    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    pub async fn acquire_at(&self, now_ms: i64) -> Admission {
        let identifier = format!("ratelimit:{}", self.provider);
        match self.store.limit(&identifier, self.budget, now_ms).await {
            Ok(decision) if decision.success => Admission::allow(),
            Ok(decision) => {
                let wait_ms = (decision.retry_at_ms - now_ms).max(0) as u64;
                let retry_after = wait_ms.div_ceil(1000).max(1);
                warn!(
                    "Rate budget exhausted for {} ({} per {:?}), retry in {}s",
                    self.provider, self.budget.max_requests, self.budget.window, retry_after
                );
                Admission {
                    allowed: false,
                    retry_after_secs: Some(retry_after),
                }
            }
            Err(e) => {
                warn!(
                    "Rate limiter store unavailable for {}, admitting request: {}",
                    self.provider, e
                );
                Admission::allow()
            }
        }
    }
}

/// Lazily creates one limiter per provider name and keeps it for the life
/// of the registry.
pub struct RateLimiterRegistry {
    store: Arc<dyn SlidingWindowStore>,
    budgets: RateBudgets,
    limiters: Mutex<HashMap<String, Arc<ProviderLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(store: Arc<dyn SlidingWindowStore>, budgets: RateBudgets) -> Self {
        Self {
            store,
            budgets,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn limiter(&self, provider: &str) -> Arc<ProviderLimiter> {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(provider.to_string())
            .or_insert_with(|| {
                debug!("Creating rate limiter for {}", provider);
                Arc::new(ProviderLimiter {
                    provider: provider.to_string(),
                    budget: self.budgets.budget_for(provider),
                    store: self.store.clone(),
                })
            })
            .clone()
    }

    pub async fn acquire(&self, provider: &str) -> Admission {
        self.acquire_at(provider, Utc::now().timestamp_millis()).await
    }

    pub async fn acquire_at(&self, provider: &str, now_ms: i64) -> Admission {
        self.limiter(provider).await.acquire_at(now_ms).await
    }
}
