//! The client orchestrator: owns configuration, the pooled transport, the
//! named caches, and the chosen executor.

use crate::config::GraphqlClientConfig;
use crate::executor::{Executor, FaultTolerantExecutor, PlainExecutor};
use gqlclient_cache::{CacheInvalidator, CacheRegistry, CacheStats, CachedResult, ResponseCache};
use gqlclient_core::{
    CacheKey, CachingStrategy, DataFetchingPolicy, DefaultDecoder, GraphqlClientError,
    GraphqlRequest, GraphqlResponse, HttpMethod, RawResponse, RequestOptions, ResponseDecoder,
    Result,
};
use gqlclient_resilience::{BreakerChain, ChainConfig};
use gqlclient_telemetry::ClientMetrics;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A resilient, cache-aware client for one remote GraphQL endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use gqlclient::{GraphqlClient, GraphqlRequest, RequestOptions};
/// use serde_json::Value;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), gqlclient::GraphqlClientError> {
/// let client = GraphqlClient::builder()
///     .endpoint("https://example.com/graphql")
///     .cache_definition("products:true:100:300")
///     .build()?;
///
/// let request = GraphqlRequest::new("{products{sku}}");
/// let response = client
///     .execute::<Value, Value>(&request, RequestOptions::new())
///     .await?;
/// println!("{:?}", response.data);
/// # Ok(())
/// # }
/// ```
pub struct GraphqlClient {
    config: GraphqlClientConfig,
    executor: Arc<dyn Executor>,
    caches: Arc<CacheRegistry>,
    invalidator: CacheInvalidator,
    chain: Option<Arc<BreakerChain>>,
    metrics: Arc<ClientMetrics>,
    closed: AtomicBool,
}

impl GraphqlClient {
    /// Create a builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Construct a client from a validated configuration.
    ///
    /// Refuses to start on a malformed endpoint URL, a plain-text endpoint
    /// without `allow_insecure`, or a malformed cache definition.
    pub fn new(config: GraphqlClientConfig) -> Result<Self> {
        let endpoint = config.validated_url()?;
        let (connect_timeout, request_timeout) = config.clamped_timeouts();

        let metrics = Arc::new(
            ClientMetrics::new()
                .map_err(|e| GraphqlClientError::configuration(e.to_string()))?,
        );
        metrics.set_pool_max_connections(config.max_connections);

        let mut headers = HeaderMap::new();
        for (name, value) in &config.static_headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                GraphqlClientError::configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                GraphqlClientError::configuration(format!("Invalid header value for '{name}': {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        // One pooled transport shared by every call; the concurrent-
        // connection ceiling is enforced by the executor's permit gate.
        // Idle connections are recycled at the shorter of keep-alive and
        // connection TTL.
        let idle = config.idle_keep_alive.min(config.connection_ttl);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(idle)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                GraphqlClientError::configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        let mut registry = CacheRegistry::new();
        for definition in config.parsed_caches()? {
            registry.insert(ResponseCache::new(
                definition.name,
                definition.max_entries,
                definition.ttl,
            ));
        }
        let caches = Arc::new(registry);
        let invalidator = CacheInvalidator::new(Arc::clone(&caches));

        let plain = PlainExecutor::new(
            http,
            endpoint,
            config.method,
            config.max_connections,
            Arc::clone(&metrics),
        );
        let (executor, chain): (Arc<dyn Executor>, Option<Arc<BreakerChain>>) =
            if config.fault_tolerant {
                let chain = Arc::new(BreakerChain::new(config.resilience));
                (
                    Arc::new(FaultTolerantExecutor::new(plain, Arc::clone(&chain))),
                    Some(chain),
                )
            } else {
                (Arc::new(plain), None)
            };

        info!(
            endpoint = %config.url,
            identifier = %config.identifier,
            fault_tolerant = config.fault_tolerant,
            caches = caches.len(),
            "GraphQL client ready"
        );

        Ok(Self {
            config,
            executor,
            caches,
            invalidator,
            chain,
            metrics,
            closed: AtomicBool::new(false),
        })
    }

    /// The client configuration.
    pub fn config(&self) -> &GraphqlClientConfig {
        &self.config
    }

    /// Execute a request, applying the caching decision.
    ///
    /// A cache is consulted only when the request is not a mutation and the
    /// options carry a cache-first strategy naming a configured cache; every
    /// other call goes straight to the executor.
    pub async fn execute<T, U>(
        &self,
        request: &GraphqlRequest,
        options: RequestOptions,
    ) -> Result<GraphqlResponse<T, U>>
    where
        T: DeserializeOwned,
        U: DeserializeOwned,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(GraphqlClientError::configuration("Client is closed"));
        }

        let raw = match self.cache_for(request, &options) {
            Some(cache) => {
                let key = CacheKey::new(request.clone(), options.clone());
                let outcome = cache
                    .get_or_compute(&key, || async {
                        let raw = self.executor.execute(request, &options).await?;
                        Ok(CachedResult {
                            body: raw.body,
                            duration_ms: raw.duration_ms,
                        })
                    })
                    .await;
                self.publish_cache_stats();

                match outcome {
                    Some(result) => RawResponse {
                        status: 200,
                        body: result.body,
                        duration_ms: result.duration_ms,
                    },
                    // The cache-fill failure was logged and swallowed; the
                    // caller gets no result rather than the propagated error.
                    None => {
                        return Err(GraphqlClientError::response_unavailable(cache.name()))
                    }
                }
            }
            None => self.executor.execute(request, &options).await?,
        };

        decode_response(&raw, &options)
    }

    /// Selectively invalidate cache entries. A no-op when no cache is
    /// configured.
    pub fn invalidate_cache(
        &self,
        store_view: Option<&str>,
        cache_names: Option<&[String]>,
        patterns: Option<&[String]>,
    ) -> Result<()> {
        if self.caches.is_empty() {
            debug!("No caches configured, invalidation is a no-op");
            return Ok(());
        }
        self.invalidator
            .invalidate(store_view, cache_names, patterns)
    }

    /// Statistics for every configured cache.
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.caches.stats()
    }

    /// The breaker chain, present in fault-tolerant mode.
    pub fn breaker_chain(&self) -> Option<&Arc<BreakerChain>> {
        self.chain.as_ref()
    }

    /// The prometheus registry for metric exposition.
    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    /// Shut the client down: caches are destroyed as a whole and further
    /// calls are refused. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.caches.clear_all();
            info!(identifier = %self.config.identifier, "GraphQL client closed");
        }
    }

    /// Whether the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn cache_for(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
    ) -> Option<&Arc<ResponseCache>> {
        if request.is_mutation() {
            return None;
        }
        let caching = options.caching.as_ref()?;
        if caching.policy != DataFetchingPolicy::CacheFirst {
            return None;
        }
        self.caches.get(&caching.cache_name)
    }

    fn publish_cache_stats(&self) {
        for stats in self.caches.stats() {
            self.metrics.record_cache_stats(
                &stats.name,
                stats.hits,
                stats.misses,
                stats.evictions,
                stats.fill_ratio(),
            );
        }
    }
}

impl std::fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.config.url)
            .field("identifier", &self.config.identifier)
            .field("fault_tolerant", &self.config.fault_tolerant)
            .field("caches", &self.caches.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn decode_response<T, U>(
    raw: &RawResponse,
    options: &RequestOptions,
) -> Result<GraphqlResponse<T, U>>
where
    T: DeserializeOwned,
    U: DeserializeOwned,
{
    let decoder: &dyn ResponseDecoder = options
        .decoder
        .as_deref()
        .unwrap_or(&DefaultDecoder);
    let envelope = decoder.decode(&raw.body)?;

    if let Some(errors) = &envelope.errors {
        if !errors.is_empty() {
            // GraphQL-level errors inside a successful response are not
            // failures; partial data and errors are returned together.
            warn!(count = errors.len(), "GraphQL response contains errors");
        }
    }

    envelope.into_typed(raw.duration_ms)
}

/// Builder for [`GraphqlClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    config: GraphqlClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default configuration and no endpoint.
    pub fn new() -> Self {
        Self {
            config: GraphqlClientConfig::new(String::new()),
        }
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the registry identifier.
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Set the default HTTP method.
    #[must_use]
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = method;
        self
    }

    /// Allow a plain-text (`http://`) endpoint.
    #[must_use]
    pub fn allow_insecure(mut self, allow: bool) -> Self {
        self.config.allow_insecure = allow;
        self
    }

    /// Set the connection-pool ceiling.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the request (socket/read) timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the idle keep-alive.
    #[must_use]
    pub fn idle_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.idle_keep_alive = keep_alive;
        self
    }

    /// Set the connection time-to-live.
    #[must_use]
    pub fn connection_ttl(mut self, ttl: Duration) -> Self {
        self.config.connection_ttl = ttl;
        self
    }

    /// Add a static header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.static_headers.push((name.into(), value.into()));
        self
    }

    /// Add one `name:enabled:maxSize:ttlSeconds` cache definition.
    #[must_use]
    pub fn cache_definition(mut self, definition: impl Into<String>) -> Self {
        self.config.cache_definitions.push(definition.into());
        self
    }

    /// Enable or disable the fault-tolerant executor.
    #[must_use]
    pub fn fault_tolerant(mut self, enabled: bool) -> Self {
        self.config.fault_tolerant = enabled;
        self
    }

    /// Override per-failure-class breaker configuration.
    #[must_use]
    pub fn resilience(mut self, config: ChainConfig) -> Self {
        self.config.resilience = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphqlClient> {
        GraphqlClient::new(self.config)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience re-export so callers can build a cache-first strategy without
/// importing the core crate directly.
pub fn cache_first(cache_name: impl Into<String>) -> CachingStrategy {
    CachingStrategy::cache_first(cache_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_malformed_url() {
        let result = GraphqlClient::builder().endpoint("not a url").build();
        assert!(matches!(
            result,
            Err(GraphqlClientError::Configuration { .. })
        ));
    }

    #[test]
    fn test_builder_rejects_insecure_endpoint_by_default() {
        let result = GraphqlClient::builder()
            .endpoint("http://example.com/graphql")
            .build();
        assert!(result.is_err());

        let result = GraphqlClient::builder()
            .endpoint("http://example.com/graphql")
            .allow_insecure(true)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_rejects_malformed_cache_definition() {
        let result = GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .cache_definition("broken")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let client = GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .build()
            .unwrap();

        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());
    }

    #[test]
    fn test_invalidate_without_caches_is_noop() {
        let client = GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .build()
            .unwrap();
        assert!(client.invalidate_cache(None, None, None).is_ok());
    }

    #[test]
    fn test_breaker_chain_presence_follows_toggle() {
        let client = GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .fault_tolerant(true)
            .build()
            .unwrap();
        assert!(client.breaker_chain().is_some());

        let client = GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .fault_tolerant(false)
            .build()
            .unwrap();
        assert!(client.breaker_chain().is_none());
    }
}
