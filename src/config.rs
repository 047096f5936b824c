//! Client configuration.
//!
//! Resolution order: explicit overrides (CLI flags) > environment (optionally
//! loaded from `.env`) > defaults.

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::navigator::AuthenticatedVisitPolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_STORAGE_PATH: &str = ".vaultx_session";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "VAULTX_API_URL";
pub const ENV_STORAGE_PATH: &str = "VAULTX_STORAGE_PATH";
pub const ENV_TIMEOUT_SECS: &str = "VAULTX_TIMEOUT_SECS";
pub const ENV_PUBLIC_ROUTE_POLICY: &str = "VAULTX_PUBLIC_ROUTE_POLICY";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub storage_path: String,
    pub request_timeout: Duration,
    pub authenticated_visit_policy: AuthenticatedVisitPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            authenticated_visit_policy: AuthenticatedVisitPolicy::default(),
        }
    }
}

/// Values given explicitly on the command line; `None` falls through to env/defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub storage_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub policy: Option<String>,
}

impl ClientConfig {
    /// Loads `.env` if present, then resolves from the process environment.
    pub fn from_env(overrides: ConfigOverrides) -> ClientResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    /// Resolution with an injectable environment lookup.
    pub fn resolve(
        overrides: ConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ClientResult<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = overrides
            .api_base_url
            .or_else(|| non_empty(ENV_API_URL))
            .unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ClientError::config(format!(
                "API URL must start with http:// or https:// (got '{api_base_url}')"
            )));
        }

        let storage_path = overrides
            .storage_path
            .or_else(|| non_empty(ENV_STORAGE_PATH))
            .unwrap_or(defaults.storage_path);

        let request_timeout = match overrides.timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => match non_empty(ENV_TIMEOUT_SECS) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| {
                        ClientError::config(format!(
                            "{ENV_TIMEOUT_SECS} must be a whole number of seconds"
                        ))
                    })?,
                None => defaults.request_timeout,
            },
        };
        if request_timeout.is_zero() {
            return Err(ClientError::config("request timeout must be positive"));
        }

        let authenticated_visit_policy = match overrides
            .policy
            .or_else(|| non_empty(ENV_PUBLIC_ROUTE_POLICY))
        {
            Some(raw) => raw.parse().map_err(ClientError::config)?,
            None => defaults.authenticated_visit_policy,
        };

        Ok(Self {
            api_base_url,
            storage_path,
            request_timeout,
            authenticated_visit_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let cfg = ClientConfig::resolve(ConfigOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn env_values_are_used_and_flags_win() {
        let env = env_of(&[
            (ENV_API_URL, "https://vaultx.example/api"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_PUBLIC_ROUTE_POLICY, "redirect"),
        ]);
        let overrides = ConfigOverrides {
            api_base_url: Some("http://localhost:9000/api".into()),
            ..Default::default()
        };
        let cfg = ClientConfig::resolve(overrides, env).unwrap();
        assert_eq!(cfg.api_base_url, "http://localhost:9000/api");
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(
            cfg.authenticated_visit_policy,
            AuthenticatedVisitPolicy::RedirectToDashboard
        );
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let bad_timeout = env_of(&[(ENV_TIMEOUT_SECS, "soon")]);
        assert!(matches!(
            ClientConfig::resolve(ConfigOverrides::default(), bad_timeout),
            Err(ClientError::Config(_))
        ));

        let bad_url = env_of(&[(ENV_API_URL, "localhost:8080")]);
        assert!(ClientConfig::resolve(ConfigOverrides::default(), bad_url).is_err());

        let bad_policy = env_of(&[(ENV_PUBLIC_ROUTE_POLICY, "sometimes")]);
        assert!(ClientConfig::resolve(ConfigOverrides::default(), bad_policy).is_err());
    }
}
