//! Provider configuration loaded from a JSON document.
//!
//! ```json
//! {
//!   "traveltime": { "app-id": "...", "api-key": "...", "max-rpm": "60" },
//!   "api-providers": [
//!     { "name": "google", "enabled": true, "api-key": "...", "max-rpm": 60,
//!       "api-endpoint": "https://example.com" }
//!   ]
//! }
//! ```
//!
//! Empty credentials fall back to the provider's environment variable, so a
//! config file can be committed without secrets.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{ComparisonError, Result};
use crate::providers::Provider;

const TRAVELTIME_APP_ID_VAR: &str = "TRAVELTIME_APP_ID";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub app_id: Option<String>,
    pub api_key: String,
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub max_rpm: u32,
    pub credentials: Credentials,
    pub api_endpoint: Option<String>,
}

impl ProviderConfig {
    /// A config with default rate and endpoint and no credentials.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            max_rpm: provider.default_rpm(),
            credentials: Credentials::default(),
            api_endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.api_key = key.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        self.api_endpoint
            .as_deref()
            .unwrap_or(self.provider.default_endpoint())
            .trim_end_matches('/')
    }
}

/// The base provider being evaluated plus the enabled competitors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Providers {
    pub base: ProviderConfig,
    pub competitors: Vec<ProviderConfig>,
}

impl Providers {
    pub fn all_names(&self) -> Vec<Provider> {
        self.all_providers().map(|p| p.provider).collect()
    }

    pub fn all_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        std::iter::once(&self.base).chain(self.competitors.iter())
    }

    pub fn competitor_names(&self) -> Vec<Provider> {
        self.competitors.iter().map(|p| p.provider).collect()
    }
}

#[derive(Deserialize)]
struct RawConfig {
    traveltime: RawBase,
    #[serde(rename = "api-providers", default)]
    api_providers: Vec<RawCompetitor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawBase {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    api_key: String,
    #[serde(default, deserialize_with = "deserialize_rpm")]
    max_rpm: Option<u32>,
    api_endpoint: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawCompetitor {
    name: String,
    enabled: bool,
    #[serde(default)]
    api_key: String,
    #[serde(default, deserialize_with = "deserialize_rpm")]
    max_rpm: Option<u32>,
    api_endpoint: Option<String>,
}

/// Accepts `"60"` as well as `60`.
fn deserialize_rpm<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rpm {
        Number(u32),
        Text(String),
    }

    match Option::<Rpm>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Rpm::Number(n)) => Ok(Some(n)),
        Some(Rpm::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("max-rpm `{s}` is not a whole number"))),
    }
}

fn validated_rpm(provider: Provider, rpm: Option<u32>) -> Result<u32> {
    match rpm.unwrap_or_else(|| provider.default_rpm()) {
        0 => Err(ComparisonError::Config(format!(
            "max-rpm for {provider} must be greater than zero"
        ))),
        n => Ok(n),
    }
}

fn key_or_env(value: String, var: Option<&str>) -> String {
    if !value.trim().is_empty() {
        return value;
    }
    match var.and_then(|v| std::env::var(v).ok()) {
        Some(from_env) => {
            debug!(var, "Using API key from environment");
            from_env
        }
        None => value,
    }
}

/// Parses a config document. Disabled competitors are dropped before their
/// names are validated.
pub fn parse_json_to_providers(json: &str) -> Result<Providers> {
    let raw: RawConfig = serde_json::from_str(json)?;

    let base_provider = Provider::TravelTime;
    let app_id = key_or_env(raw.traveltime.app_id, Some(TRAVELTIME_APP_ID_VAR));
    let base = ProviderConfig {
        provider: base_provider,
        max_rpm: validated_rpm(base_provider, raw.traveltime.max_rpm)?,
        credentials: Credentials {
            app_id: Some(app_id),
            api_key: key_or_env(raw.traveltime.api_key, base_provider.api_key_env_var()),
        },
        api_endpoint: raw.traveltime.api_endpoint,
    };

    let mut competitors: Vec<ProviderConfig> = Vec::new();
    for entry in raw.api_providers.into_iter().filter(|e| e.enabled) {
        let provider: Provider = entry.name.parse()?;
        if provider == base_provider || competitors.iter().any(|c| c.provider == provider) {
            return Err(ComparisonError::Config(format!(
                "provider {provider} is configured more than once"
            )));
        }

        competitors.push(ProviderConfig {
            provider,
            max_rpm: validated_rpm(provider, entry.max_rpm)?,
            credentials: Credentials {
                app_id: None,
                api_key: key_or_env(entry.api_key, provider.api_key_env_var()),
            },
            api_endpoint: entry.api_endpoint,
        });
    }

    Ok(Providers { base, competitors })
}

/// Loads the config from a JSON file at `path`.
pub fn parse_config(path: &str) -> Result<Providers> {
    let content = std::fs::read_to_string(path)?;
    parse_json_to_providers(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ProviderConfig {
        ProviderConfig {
            provider: Provider::TravelTime,
            max_rpm: 60,
            credentials: Credentials {
                app_id: Some("<your-app-id>".to_string()),
                api_key: "<your-api-key>".to_string(),
            },
            api_endpoint: None,
        }
    }

    #[test]
    fn test_json_config_parse() {
        let json = r#"
            {
              "traveltime": {
                "app-id": "<your-app-id>",
                "api-key": "<your-api-key>",
                "max-rpm": "60"
              },
              "api-providers": [
                {
                  "name": "google",
                  "enabled": true,
                  "api-key": "<your-api-key>",
                  "max-rpm": "60",
                  "api-endpoint": "some-custom-endpoint.com"
                },
                {
                  "name": "tomtom",
                  "enabled": false,
                  "api-key": "<your-api-key>",
                  "max-rpm": "30"
                }
              ]
            }
        "#;

        let providers = parse_json_to_providers(json).unwrap();

        assert_eq!(
            providers,
            Providers {
                base: base(),
                competitors: vec![ProviderConfig {
                    provider: Provider::Google,
                    max_rpm: 60,
                    credentials: Credentials {
                        app_id: None,
                        api_key: "<your-api-key>".to_string(),
                    },
                    api_endpoint: Some("some-custom-endpoint.com".to_string()),
                }],
            }
        );
        assert_eq!(providers.all_names(), vec![Provider::TravelTime, Provider::Google]);
    }

    #[test]
    fn test_json_config_parse_all_disabled_providers() {
        let json = r#"
            {
              "traveltime": {
                "app-id": "<your-app-id>", "api-key": "<your-api-key>", "max-rpm": "60"
              },
              "api-providers": [
                {"name": "google", "enabled": false, "api-key": "<your-api-key>", "max-rpm": "60"},
                {"name": "not-a-provider", "enabled": false, "api-key": "", "max-rpm": "30"}
              ]
            }
        "#;

        let providers = parse_json_to_providers(json).unwrap();
        assert_eq!(providers.base, base());
        assert!(providers.competitors.is_empty());
    }

    #[test]
    fn test_json_config_parse_empty_providers() {
        let json = r#"
            {
              "traveltime": {"app-id": "<your-app-id>", "api-key": "<your-api-key>", "max-rpm": 60},
              "api-providers": []
            }
        "#;

        let providers = parse_json_to_providers(json).unwrap();
        assert_eq!(providers.all_names(), vec![Provider::TravelTime]);
    }

    #[test]
    fn test_unknown_enabled_provider_is_an_error() {
        let json = r#"
            {
              "traveltime": {"app-id": "a", "api-key": "b", "max-rpm": "60"},
              "api-providers": [{"name": "bing", "enabled": true, "api-key": "k", "max-rpm": "60"}]
            }
        "#;

        let err = parse_json_to_providers(json).unwrap_err();
        assert!(matches!(err, ComparisonError::UnknownProvider(_)));
    }

    #[test]
    fn test_zero_rpm_is_an_error() {
        let json = r#"
            {
              "traveltime": {"app-id": "a", "api-key": "b", "max-rpm": "0"},
              "api-providers": []
            }
        "#;

        assert!(matches!(
            parse_json_to_providers(json),
            Err(ComparisonError::Config(_))
        ));
    }

    #[test]
    fn test_non_numeric_rpm_is_an_error() {
        let json = r#"
            {
              "traveltime": {"app-id": "a", "api-key": "b", "max-rpm": "lots"},
              "api-providers": []
            }
        "#;

        assert!(matches!(
            parse_json_to_providers(json),
            Err(ComparisonError::Json(_))
        ));
    }

    #[test]
    fn test_missing_rpm_uses_provider_default() {
        let json = r#"
            {
              "traveltime": {"app-id": "a", "api-key": "b"},
              "api-providers": [{"name": "openroutes", "enabled": true, "api-key": "k"}]
            }
        "#;

        let providers = parse_json_to_providers(json).unwrap();
        assert_eq!(providers.base.max_rpm, 60);
        assert_eq!(providers.competitors[0].max_rpm, 20);
    }

    #[test]
    fn test_endpoint_falls_back_to_default() {
        let config = ProviderConfig::new(Provider::Osrm);
        assert_eq!(config.endpoint(), "http://router.project-osrm.org");

        let custom = ProviderConfig::new(Provider::Osrm).with_endpoint("http://localhost:5000/");
        assert_eq!(custom.endpoint(), "http://localhost:5000");
    }
}
