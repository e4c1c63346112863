use thiserror::Error;

use crate::core::store::StoreError;

/// Failure raised by a provider transport or by the provider itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Non-success HTTP status or a provider-specific failure code.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u32,
        message: String,
    },
    /// Timeouts, dropped connections and similar network-level failures.
    #[error("{provider} transient failure: {message}")]
    Transient { provider: String, message: String },
    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },
    #[error("{provider} authentication failed: {message}")]
    Auth { provider: String, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Api { provider, .. }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Malformed { provider, .. }
            | ProviderError::Auth { provider, .. } => provider,
        }
    }

    pub fn status_code(&self) -> Option<u32> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Auth { .. } => Some(401),
            _ => None,
        }
    }

    /// Server-side failures are worth another attempt; everything else is final.
    ///
    /// Providers with their own five-digit status scheme (e.g. `50000`) use the
    /// same leading-digit convention as HTTP.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => {
                (500..600).contains(status) || (50_000..60_000).contains(status)
            }
            ProviderError::Transient { .. } => true,
            ProviderError::Malformed { .. } | ProviderError::Auth { .. } => false,
        }
    }
}

/// Every caller-facing failure of the core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
    #[error("invalid provider '{0}'")]
    InvalidProvider(String),
    #[error(transparent)]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Store(other),
        }
    }
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-checkable identifier for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::NotFound { .. } => "not_found",
            CoreError::AccessDenied(_) => "access_denied",
            CoreError::Unauthenticated => "unauthenticated",
            CoreError::RateLimited { .. } => "rate_limited",
            CoreError::Provider(_) => "provider_api",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::InvalidProvider(_) => "invalid_provider",
            CoreError::Store(_) => "store",
            CoreError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::InvalidProvider(_) => 400,
            CoreError::NotFound { .. } => 404,
            CoreError::AccessDenied(_) => 403,
            CoreError::Unauthenticated => 401,
            CoreError::RateLimited { .. } => 429,
            CoreError::Provider(err) if err.status_code().is_some() => 502,
            CoreError::Provider(_) | CoreError::Store(_) | CoreError::Internal(_) => 500,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            CoreError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}
