//! Process configuration, read once from the environment.

use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

use crate::core::integrations::ProviderId;
use crate::core::integrations::providers::{citation_tracking, keyword_data, serp_analysis};
use crate::core::ratelimit::{RateBudget, RateBudgets};

pub const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 17990;
const DB_FILE: &str = "briefline.db";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}: {reason}")]
    Invalid { name: String, reason: String },
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordDataConfig {
    pub base_url: String,
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerpAnalysisConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationTrackingConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Bootstraps the stored token pair on first start.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub log_level: Level,
    pub encryption_key: Option<[u8; 32]>,
    pub keyword_data: Option<KeywordDataConfig>,
    pub serp_analysis: Option<SerpAnalysisConfig>,
    pub citation_tracking: Option<CitationTrackingConfig>,
    pub rate_budgets: RateBudgets,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any name → value lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = get("BRIEFLINE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let api_host = get("BRIEFLINE_API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        let api_port = match get("BRIEFLINE_API_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| invalid("BRIEFLINE_API_PORT", format!("'{}' is not a port", raw)))?,
            None => DEFAULT_API_PORT,
        };
        let log_level = match get("BRIEFLINE_LOG") {
            Some(raw) => raw
                .parse::<Level>()
                .map_err(|_| invalid("BRIEFLINE_LOG", format!("unknown level '{}'", raw)))?,
            None => Level::INFO,
        };
        let encryption_key = get("BRIEFLINE_ENCRYPTION_KEY")
            .map(|raw| parse_encryption_key(&raw))
            .transpose()?;

        let keyword_data = match (get("KEYWORD_DATA_LOGIN"), get("KEYWORD_DATA_PASSWORD")) {
            (Some(login), Some(password)) => Some(KeywordDataConfig {
                base_url: get("KEYWORD_DATA_BASE_URL")
                    .unwrap_or_else(|| keyword_data::DEFAULT_BASE_URL.to_string()),
                login,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("KEYWORD_DATA_PASSWORD", "required with KEYWORD_DATA_LOGIN"));
            }
            (None, Some(_)) => {
                return Err(invalid("KEYWORD_DATA_LOGIN", "required with KEYWORD_DATA_PASSWORD"));
            }
        };

        let serp_analysis = get("SERP_ANALYSIS_API_KEY").map(|api_key| SerpAnalysisConfig {
            base_url: get("SERP_ANALYSIS_BASE_URL")
                .unwrap_or_else(|| serp_analysis::DEFAULT_BASE_URL.to_string()),
            api_key,
        });

        let citation_tracking = match (get("CITATION_CLIENT_ID"), get("CITATION_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => {
                if encryption_key.is_none() {
                    return Err(invalid(
                        "BRIEFLINE_ENCRYPTION_KEY",
                        "required when citation tracking credentials are set",
                    ));
                }
                Some(CitationTrackingConfig {
                    base_url: get("CITATION_BASE_URL")
                        .unwrap_or_else(|| citation_tracking::DEFAULT_BASE_URL.to_string()),
                    token_url: get("CITATION_TOKEN_URL")
                        .unwrap_or_else(|| citation_tracking::DEFAULT_TOKEN_URL.to_string()),
                    client_id,
                    client_secret,
                    refresh_token: get("CITATION_REFRESH_TOKEN"),
                })
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(invalid("CITATION_CLIENT_SECRET", "required with CITATION_CLIENT_ID"));
            }
            (None, Some(_)) => {
                return Err(invalid("CITATION_CLIENT_ID", "required with CITATION_CLIENT_SECRET"));
            }
        };

        let mut rate_budgets = RateBudgets::default();
        for provider in ProviderId::ALL {
            let name = format!("BRIEFLINE_RATE_{}", provider.as_str().to_uppercase());
            if let Some(raw) = get(&name) {
                let per_minute = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid(&name, format!("'{}' is not a positive count", raw)))?;
                rate_budgets =
                    rate_budgets.with_budget(provider.as_str(), RateBudget::per_minute(per_minute));
            }
        }

        Ok(Self {
            data_dir,
            api_host,
            api_port,
            log_level,
            encryption_key,
            keyword_data,
            serp_analysis,
            citation_tracking,
            rate_budgets,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".briefline"))
        .unwrap_or_else(|| PathBuf::from(".briefline"))
}

fn parse_encryption_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    const NAME: &str = "BRIEFLINE_ENCRYPTION_KEY";
    let raw = raw.trim();
    if raw.len() != 64 {
        return Err(invalid(
            NAME,
            format!("expected 64 hex characters, got {}", raw.len()),
        ));
    }
    let bytes = hex::decode(raw).map_err(|e| invalid(NAME, e.to_string()))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_leave_every_provider_unconfigured() {
        let config = load(&[("BRIEFLINE_DATA_DIR", "/tmp/bl")]).unwrap();
        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/bl/briefline.db"));
        assert!(config.encryption_key.is_none());
        assert!(config.keyword_data.is_none());
        assert!(config.serp_analysis.is_none());
        assert!(config.citation_tracking.is_none());
        assert_eq!(
            config.rate_budgets.budget_for("serp_analysis"),
            RateBudget::per_minute(100)
        );
    }

    #[test]
    fn encryption_key_must_be_64_hex_characters() {
        let config = load(&[("BRIEFLINE_ENCRYPTION_KEY", KEY)]).unwrap();
        let key = config.encryption_key.unwrap();
        assert_eq!(key[0], 0);
        assert_eq!(key[31], 0x1f);

        let err = load(&[("BRIEFLINE_ENCRYPTION_KEY", "abcd")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "BRIEFLINE_ENCRYPTION_KEY"));

        let not_hex = "z".repeat(64);
        assert!(load(&[("BRIEFLINE_ENCRYPTION_KEY", not_hex.as_str())]).is_err());
    }

    #[test]
    fn provider_credentials_come_in_pairs() {
        let config = load(&[
            ("KEYWORD_DATA_LOGIN", "user"),
            ("KEYWORD_DATA_PASSWORD", "secret"),
            ("KEYWORD_DATA_BASE_URL", "http://127.0.0.1:9"),
            ("SERP_ANALYSIS_API_KEY", "sk-1"),
        ])
        .unwrap();
        let kd = config.keyword_data.unwrap();
        assert_eq!(kd.base_url, "http://127.0.0.1:9");
        assert_eq!(
            config.serp_analysis.unwrap().base_url,
            serp_analysis::DEFAULT_BASE_URL
        );

        let err = load(&[("KEYWORD_DATA_LOGIN", "user")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "KEYWORD_DATA_PASSWORD".into(),
                reason: "required with KEYWORD_DATA_LOGIN".into(),
            }
        );
    }

    #[test]
    fn citation_tracking_needs_the_encryption_key() {
        let creds = [
            ("CITATION_CLIENT_ID", "cid"),
            ("CITATION_CLIENT_SECRET", "csecret"),
        ];
        let err = load(&creds).unwrap_err();
        assert!(err.to_string().starts_with("BRIEFLINE_ENCRYPTION_KEY"));

        let mut vars = creds.to_vec();
        vars.push(("BRIEFLINE_ENCRYPTION_KEY", KEY));
        vars.push(("CITATION_REFRESH_TOKEN", "rt-1"));
        let citation = load(&vars).unwrap().citation_tracking.unwrap();
        assert_eq!(citation.token_url, citation_tracking::DEFAULT_TOKEN_URL);
        assert_eq!(citation.refresh_token.as_deref(), Some("rt-1"));
    }

    #[test]
    fn bad_scalars_name_their_variable() {
        for (name, value) in [
            ("BRIEFLINE_API_PORT", "http"),
            ("BRIEFLINE_LOG", "chatty"),
            ("BRIEFLINE_RATE_SERP_ANALYSIS", "0"),
        ] {
            match load(&[(name, value)]).unwrap_err() {
                ConfigError::Invalid { name: got, .. } => assert_eq!(got, name),
            }
        }
    }

    #[test]
    fn rate_budgets_can_be_overridden_and_blank_values_ignored() {
        let config = load(&[
            ("BRIEFLINE_RATE_CITATION_TRACKING", "5"),
            ("BRIEFLINE_LOG", "debug"),
            ("BRIEFLINE_API_HOST", "  "),
        ])
        .unwrap();
        assert_eq!(
            config.rate_budgets.budget_for("citation_tracking"),
            RateBudget::per_minute(5)
        );
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.api_host, "127.0.0.1");
    }
}
