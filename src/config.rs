//! Client configuration and startup validation.
//!
//! Pathological timeout values are clamped to safe defaults with a warning;
//! malformed endpoint URLs and malformed cache definitions refuse startup.

use gqlclient_core::{GraphqlClientError, HttpMethod, Result};
use gqlclient_resilience::ChainConfig;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for one GraphQL client instance.
#[derive(Debug, Clone)]
pub struct GraphqlClientConfig {
    /// Endpoint URL.
    pub url: String,
    /// Identifier under which the embedding application registers this
    /// client.
    pub identifier: String,
    /// Default HTTP method; overridable per request.
    pub method: HttpMethod,
    /// Allow a plain-text (`http://`) endpoint. Refused otherwise.
    pub allow_insecure: bool,
    /// Maximum concurrent connections in the pool.
    pub max_connections: usize,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Socket/read timeout, bounding the whole request.
    pub request_timeout: Duration,
    /// Idle-connection keep-alive.
    pub idle_keep_alive: Duration,
    /// Connection time-to-live.
    pub connection_ttl: Duration,
    /// Static headers sent with every request; per-request headers win on
    /// name conflict.
    pub static_headers: Vec<(String, String)>,
    /// Named-cache definitions, one `name:enabled:maxSize:ttlSeconds` entry
    /// per cache. Blank entries are skipped; malformed entries fail startup.
    pub cache_definitions: Vec<String>,
    /// Route requests through the fault-tolerant executor.
    pub fault_tolerant: bool,
    /// Per-failure-class breaker overrides.
    pub resilience: ChainConfig,
}

impl GraphqlClientConfig {
    /// Default request (socket/read) timeout.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default idle keep-alive.
    pub const DEFAULT_IDLE_KEEP_ALIVE: Duration = Duration::from_secs(60);
    /// Default connection time-to-live.
    pub const DEFAULT_CONNECTION_TTL: Duration = Duration::from_secs(300);
    /// Default pool ceiling.
    pub const DEFAULT_MAX_CONNECTIONS: usize = 20;
    /// Timeouts above this bound are considered pathological and clamped.
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);

    /// Create a configuration for the given endpoint with default values.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            identifier: "default".to_string(),
            method: HttpMethod::Post,
            allow_insecure: false,
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            idle_keep_alive: Self::DEFAULT_IDLE_KEEP_ALIVE,
            connection_ttl: Self::DEFAULT_CONNECTION_TTL,
            static_headers: Vec::new(),
            cache_definitions: Vec::new(),
            fault_tolerant: true,
            resilience: ChainConfig::default(),
        }
    }

    /// Validate the endpoint URL: it must parse, and a plain-text scheme is
    /// refused unless insecure transport is explicitly allowed.
    pub fn validated_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| {
            GraphqlClientError::configuration(format!("Invalid endpoint URL '{}': {e}", self.url))
        })?;
        match url.scheme() {
            "https" => Ok(url),
            "http" if self.allow_insecure => {
                warn!(url = %self.url, "Using insecure plain-text endpoint");
                Ok(url)
            }
            "http" => Err(GraphqlClientError::configuration(format!(
                "Plain-text endpoint '{}' requires allow_insecure",
                self.url
            ))),
            other => Err(GraphqlClientError::configuration(format!(
                "Unsupported URL scheme '{other}'"
            ))),
        }
    }

    /// Clamp all timeouts to sane values, warning on anything pathological.
    pub fn clamped_timeouts(&self) -> (Duration, Duration) {
        (
            clamp_timeout(
                "connect_timeout",
                self.connect_timeout,
                Self::DEFAULT_CONNECT_TIMEOUT,
            ),
            clamp_timeout(
                "request_timeout",
                self.request_timeout,
                Self::DEFAULT_REQUEST_TIMEOUT,
            ),
        )
    }

    /// Parse the cache definition strings. Malformed entries fail startup;
    /// blank entries are skipped; disabled caches are logged and skipped.
    pub fn parsed_caches(&self) -> Result<Vec<CacheDefinition>> {
        let mut definitions = Vec::new();
        for entry in &self.cache_definitions {
            if let Some(definition) = CacheDefinition::parse(entry)? {
                if definition.enabled {
                    definitions.push(definition);
                } else {
                    debug!(cache = %definition.name, "Skipping disabled cache");
                }
            }
        }
        Ok(definitions)
    }
}

/// A timeout of zero (or less, in configuration sources that allow it) or an
/// excessively large value falls back to the default with a warning; it is
/// never silently accepted.
fn clamp_timeout(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() || value > GraphqlClientConfig::MAX_TIMEOUT {
        warn!(
            timeout = name,
            configured_ms = value.as_millis() as u64,
            fallback_ms = default.as_millis() as u64,
            "Pathological timeout value, falling back to default"
        );
        default
    } else {
        value
    }
}

/// One parsed `name:enabled:maxSize:ttlSeconds` cache definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDefinition {
    /// Cache name.
    pub name: String,
    /// Whether the cache is enabled.
    pub enabled: bool,
    /// Maximum entry count.
    pub max_entries: usize,
    /// Per-entry time-to-live.
    pub ttl: Duration,
}

impl CacheDefinition {
    /// Parse one definition string. Returns `Ok(None)` for a blank entry.
    pub fn parse(entry: &str) -> Result<Option<Self>> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 4 {
            return Err(GraphqlClientError::configuration(format!(
                "Malformed cache definition '{entry}': expected name:enabled:maxSize:ttlSeconds"
            )));
        }

        let name = parts[0].trim();
        if name.is_empty() {
            return Err(GraphqlClientError::configuration(format!(
                "Malformed cache definition '{entry}': empty cache name"
            )));
        }
        let enabled = parts[1].trim().parse::<bool>().map_err(|_| {
            GraphqlClientError::configuration(format!(
                "Malformed cache definition '{entry}': invalid enabled flag '{}'",
                parts[1]
            ))
        })?;
        let max_entries = parts[2].trim().parse::<usize>().map_err(|_| {
            GraphqlClientError::configuration(format!(
                "Malformed cache definition '{entry}': invalid maxSize '{}'",
                parts[2]
            ))
        })?;
        let ttl_seconds = parts[3].trim().parse::<u64>().map_err(|_| {
            GraphqlClientError::configuration(format!(
                "Malformed cache definition '{entry}': invalid ttlSeconds '{}'",
                parts[3]
            ))
        })?;

        Ok(Some(Self {
            name: name.to_string(),
            enabled,
            max_entries,
            ttl: Duration::from_secs(ttl_seconds),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_url_accepted() {
        let config = GraphqlClientConfig::new("https://example.com/graphql");
        assert!(config.validated_url().is_ok());
    }

    #[test]
    fn test_plain_text_refused_unless_allowed() {
        let mut config = GraphqlClientConfig::new("http://example.com/graphql");
        assert!(config.validated_url().is_err());

        config.allow_insecure = true;
        assert!(config.validated_url().is_ok());
    }

    #[test]
    fn test_malformed_url_refused() {
        let config = GraphqlClientConfig::new("not a url");
        assert!(matches!(
            config.validated_url(),
            Err(GraphqlClientError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let mut config = GraphqlClientConfig::new("https://example.com/graphql");
        config.request_timeout = Duration::ZERO;
        config.connect_timeout = Duration::from_secs(3600);

        let (connect, request) = config.clamped_timeouts();
        assert_eq!(request, GraphqlClientConfig::DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(connect, GraphqlClientConfig::DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_sane_timeouts_kept() {
        let mut config = GraphqlClientConfig::new("https://example.com/graphql");
        config.request_timeout = Duration::from_secs(12);
        let (_, request) = config.clamped_timeouts();
        assert_eq!(request, Duration::from_secs(12));
    }

    #[test]
    fn test_cache_definition_parsing() {
        let definition = CacheDefinition::parse("products:true:100:300")
            .unwrap()
            .unwrap();
        assert_eq!(definition.name, "products");
        assert!(definition.enabled);
        assert_eq!(definition.max_entries, 100);
        assert_eq!(definition.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_blank_definition_skipped() {
        assert!(CacheDefinition::parse("").unwrap().is_none());
        assert!(CacheDefinition::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_malformed_definition_fails() {
        assert!(CacheDefinition::parse("products:true:100").is_err());
        assert!(CacheDefinition::parse("products:yes:100:300").is_err());
        assert!(CacheDefinition::parse("products:true:not-a-number:300").is_err());
        assert!(CacheDefinition::parse(":true:100:300").is_err());
    }

    #[test]
    fn test_disabled_cache_skipped() {
        let mut config = GraphqlClientConfig::new("https://example.com/graphql");
        config.cache_definitions = vec![
            "products:true:100:300".to_string(),
            "categories:false:10:60".to_string(),
            String::new(),
        ];
        let caches = config.parsed_caches().unwrap();
        assert_eq!(caches.len(), 1);
        assert_eq!(caches[0].name, "products");
    }
}
