use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_DAILY_GENERATIONS: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    /// Generations allowed per client per UTC day. Zero disables generation.
    pub daily_generations: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            daily_generations: DEFAULT_DAILY_GENERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub github_token: Option<String>,
    pub github_base_url: String,
    pub usage: UsageLimits,
    /// Header carrying the client address when running behind a proxy. Unset
    /// means usage is keyed by the peer address.
    pub client_ip_header: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let daily_generations = match get("DAILY_GENERATION_LIMIT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "DAILY_GENERATION_LIMIT",
                value: raw,
            })?,
            None => DEFAULT_DAILY_GENERATIONS,
        };

        let client_ip_header = match get("CLIENT_IP_HEADER") {
            Some(raw) => match http::HeaderName::try_from(raw.as_str()) {
                Ok(name) => Some(name.as_str().to_string()),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        var: "CLIENT_IP_HEADER",
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            github_token: get("GITHUB_TOKEN"),
            github_base_url: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            usage: UsageLimits { daily_generations },
            client_ip_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.github_base_url, DEFAULT_GITHUB_API_URL);
        assert_eq!(config.github_token, None);
        assert_eq!(config.usage.daily_generations, DEFAULT_DAILY_GENERATIONS);
        assert_eq!(config.client_ip_header, None);
    }

    #[test]
    fn missing_api_key() {
        let err = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn overrides_and_trailing_slashes() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GITHUB_API_URL", "http://localhost:9000/"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("DAILY_GENERATION_LIMIT", "3"),
        ]))
        .unwrap();
        assert_eq!(config.github_base_url, "http://localhost:9000");
        assert_eq!(config.github_token.as_deref(), Some("ghp_x"));
        assert_eq!(config.usage.daily_generations, 3);
    }

    #[test]
    fn client_ip_header_is_normalised() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("CLIENT_IP_HEADER", "X-Forwarded-For"),
        ]))
        .unwrap();
        assert_eq!(config.client_ip_header.as_deref(), Some("x-forwarded-for"));

        let err = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("CLIENT_IP_HEADER", "not a header"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CLIENT_IP_HEADER", .. }));
    }

    #[test]
    fn invalid_limit() {
        let err = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DAILY_GENERATION_LIMIT", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DAILY_GENERATION_LIMIT", .. }));
    }
}
