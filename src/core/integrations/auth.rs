//! Provider authentication schemes.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::crypto::TokenCipher;
use crate::core::errors::ProviderError;
use crate::core::store::{IntegrationStore, StoredOAuthToken};

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone)]
pub enum ProviderAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
    OAuth2(Arc<OAuthTokenManager>),
}

impl ProviderAuth {
    pub(crate) async fn apply(
        &self,
        builder: RequestBuilder,
    ) -> Result<RequestBuilder, ProviderError> {
        Ok(match self {
            ProviderAuth::None => builder,
            ProviderAuth::Bearer(token) => builder.bearer_auth(token),
            ProviderAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            ProviderAuth::OAuth2(manager) => builder.bearer_auth(manager.access_token().await?),
        })
    }

    pub(crate) fn oauth(&self) -> Option<&OAuthTokenManager> {
        match self {
            ProviderAuth::OAuth2(manager) => Some(manager),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Exchanges a refresh token for a new grant.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct HttpTokenEndpoint {
    provider: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl HttpTokenEndpoint {
    pub fn new(provider: &str, token_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            provider: provider.to_string(),
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn auth_error(&self, message: String) -> ProviderError {
        ProviderError::Auth {
            provider: self.provider.clone(),
            message,
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Transient {
                provider: self.provider.clone(),
                message: format!("token refresh request failed: {}", e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.auth_error(format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorBody>(&body)
                .ok()
                .and_then(|b| match (b.error, b.error_description) {
                    (Some(error), Some(desc)) => Some(format!("{} - {}", error, desc)),
                    (Some(error), None) => Some(error),
                    _ => None,
                })
                .unwrap_or(body);
            return Err(self.auth_error(format!("token refresh failed (HTTP {}): {}", status, detail)));
        }

        serde_json::from_str(&body)
            .map_err(|e| self.auth_error(format!("failed to parse token response: {}", e)))
    }
}

/// Holds an OAuth2 access/refresh pair at rest (encrypted) and refreshes it
/// on expiry or on demand. Concurrent refreshes are serialized.
pub struct OAuthTokenManager {
    provider: String,
    store: Arc<dyn IntegrationStore>,
    cipher: TokenCipher,
    endpoint: Arc<dyn TokenEndpoint>,
    refresh_lock: Mutex<()>,
}

impl OAuthTokenManager {
    pub fn new(
        provider: &str,
        store: Arc<dyn IntegrationStore>,
        cipher: TokenCipher,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            store,
            cipher,
            endpoint,
            refresh_lock: Mutex::new(()),
        }
    }

    fn auth_error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::Auth {
            provider: self.provider.clone(),
            message: message.into(),
        }
    }

    /// Persists a token pair, encrypted.
    pub async fn store_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        let sealed = StoredOAuthToken {
            provider: self.provider.clone(),
            access_token: self
                .cipher
                .encrypt(access_token)
                .map_err(|e| self.auth_error(e.to_string()))?,
            refresh_token: self
                .cipher
                .encrypt(refresh_token)
                .map_err(|e| self.auth_error(e.to_string()))?,
            expires_at,
        };
        self.store
            .save_oauth_token(&sealed)
            .await
            .map_err(|e| self.auth_error(format!("failed to persist tokens: {}", e)))
    }

    /// Seeds the store with a refresh token when nothing is stored yet. The
    /// seeded pair is already expired so the first call refreshes it.
    pub async fn seed_refresh_token(&self, refresh_token: &str) -> Result<bool, ProviderError> {
        if self.load().await?.is_some() {
            return Ok(false);
        }
        self.store_tokens("", refresh_token, Utc::now()).await?;
        Ok(true)
    }

    async fn load(&self) -> Result<Option<StoredOAuthToken>, ProviderError> {
        self.store
            .load_oauth_token(&self.provider)
            .await
            .map_err(|e| self.auth_error(format!("failed to load tokens: {}", e)))
    }

    fn is_fresh(token: &StoredOAuthToken) -> bool {
        token.expires_at > Utc::now() + ChronoDuration::seconds(EXPIRY_SKEW_SECS)
    }

    pub async fn access_token(&self) -> Result<String, ProviderError> {
        let stored = self
            .load()
            .await?
            .ok_or_else(|| self.auth_error("no OAuth tokens stored"))?;
        if Self::is_fresh(&stored) {
            return self
                .cipher
                .decrypt(&stored.access_token)
                .map_err(|e| self.auth_error(e.to_string()));
        }
        self.refresh(false).await
    }

    /// Refreshes the pair. Unless `force` is set, a pair another task already
    /// refreshed while this one waited for the lock is reused.
    pub async fn refresh(&self, force: bool) -> Result<String, ProviderError> {
        let _guard = self.refresh_lock.lock().await;
        let stored = self
            .load()
            .await?
            .ok_or_else(|| self.auth_error("no OAuth tokens stored"))?;
        if !force && Self::is_fresh(&stored) {
            return self
                .cipher
                .decrypt(&stored.access_token)
                .map_err(|e| self.auth_error(e.to_string()));
        }

        let refresh_token = self
            .cipher
            .decrypt(&stored.refresh_token)
            .map_err(|e| self.auth_error(e.to_string()))?;
        let grant = self.endpoint.refresh(&refresh_token).await.inspect_err(|e| {
            warn!("OAuth refresh for {} failed: {}", self.provider, e);
        })?;

        let expires_at = Utc::now() + ChronoDuration::seconds(grant.expires_in.unwrap_or(3600));
        let next_refresh = grant.refresh_token.as_deref().unwrap_or(&refresh_token);
        self.store_tokens(&grant.access_token, next_refresh, expires_at)
            .await?;
        info!("Refreshed OAuth tokens for {}", self.provider);
        Ok(grant.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEndpoint {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenEndpoint for CountingEndpoint {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if refresh_token == "revoked" {
                return Err(ProviderError::Auth {
                    provider: "citation_tracking".into(),
                    message: "invalid_grant".into(),
                });
            }
            Ok(TokenGrant {
                access_token: format!("access-{}", n),
                refresh_token: Some(format!("refresh-{}", n)),
                expires_in: Some(3600),
            })
        }
    }

    async fn manager() -> (Arc<SqliteStore>, Arc<CountingEndpoint>, OAuthTokenManager) {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let endpoint = Arc::new(CountingEndpoint {
            calls: AtomicUsize::new(0),
        });
        let manager = OAuthTokenManager::new(
            "citation_tracking",
            store.clone(),
            TokenCipher::new(&[3u8; 32]),
            endpoint.clone(),
        );
        (store, endpoint, manager)
    }

    #[tokio::test]
    async fn fresh_tokens_are_used_without_refresh() {
        let (_, endpoint, manager) = manager().await;
        manager
            .store_tokens("live", "r", Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();
        assert_eq!(manager.access_token().await.unwrap(), "live");
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_tokens_refresh_and_persist_encrypted() {
        let (store, endpoint, manager) = manager().await;
        assert!(manager.seed_refresh_token("seed").await.unwrap());
        assert!(!manager.seed_refresh_token("ignored").await.unwrap());

        assert_eq!(manager.access_token().await.unwrap(), "access-1");
        assert_eq!(manager.access_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);

        let stored = store.load_oauth_token("citation_tracking").await.unwrap().unwrap();
        assert_ne!(stored.access_token, "access-1");
        assert_ne!(stored.refresh_token, "refresh-1");
    }

    #[tokio::test]
    async fn forced_refresh_rotates_a_fresh_pair() {
        let (_, endpoint, manager) = manager().await;
        manager
            .store_tokens("live", "r", Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();
        assert_eq!(manager.refresh(true).await.unwrap(), "access-1");
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_or_revoked_tokens_are_auth_errors() {
        let (_, _, manager) = manager().await;
        assert!(matches!(
            manager.access_token().await,
            Err(ProviderError::Auth { .. })
        ));
        manager.store_tokens("", "revoked", Utc::now()).await.unwrap();
        assert!(matches!(
            manager.access_token().await,
            Err(ProviderError::Auth { .. })
        ));
    }
}
