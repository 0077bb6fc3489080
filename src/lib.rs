//! # gqlclient
//!
//! A resilient, cache-aware GraphQL client.
//!
//! The crate combines two concerns behind one facade:
//!
//! - **Response caching** with fingerprinted keys, bounded TTL caches,
//!   single-flight fills, and selective pattern-based invalidation
//!   ([`gqlclient_cache`]).
//! - **Fault tolerance** via three independent circuit breakers, one per
//!   failure class (service unavailable, other server errors, socket
//!   timeouts), with progressive open delays ([`gqlclient_resilience`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gqlclient::{CachingStrategy, GraphqlClient, GraphqlRequest, RequestOptions};
//! use serde_json::Value;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), gqlclient::GraphqlClientError> {
//! let client = GraphqlClient::builder()
//!     .endpoint("https://example.com/graphql")
//!     .cache_definition("products:true:500:600")
//!     .fault_tolerant(true)
//!     .build()?;
//!
//! let request = GraphqlRequest::new("{products(filter:{sku:{eq:\"sku1\"}}){items{name}}}")
//!     .with_variables(serde_json::json!({}));
//! let options = RequestOptions::new()
//!     .with_header("Store", "default")
//!     .with_caching(CachingStrategy::cache_first("products"));
//!
//! let response = client.execute::<Value, Value>(&request, options).await?;
//! if let Some(data) = response.data {
//!     println!("{data}");
//! }
//!
//! // Later, invalidate every cached entry for that store whose body matches
//! // a pattern.
//! client.invalidate_cache(
//!     Some("default"),
//!     None,
//!     Some(&["\"sku\":\\s*\"sku1\"".to_string()]),
//! )?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod executor;
pub mod registry;

pub use client::{ClientBuilder, GraphqlClient};
pub use config::{CacheDefinition, GraphqlClientConfig};
pub use executor::{Executor, FaultTolerantExecutor, PlainExecutor};
pub use registry::{ClientRegistry, InvalidationEvent};

pub use gqlclient_cache::{CacheInvalidator, CacheRegistry, CacheStats, ResponseCache};
pub use gqlclient_core::{
    CacheKey, CachingStrategy, DataFetchingPolicy, DecodedEnvelope, DefaultDecoder,
    GraphqlClientError, GraphqlRequest, GraphqlResponse, HttpMethod, RawResponse, RequestOptions,
    ResponseDecoder, Result,
};
pub use gqlclient_resilience::{
    BreakerChain, BreakerConfig, ChainConfig, CircuitBreaker, CircuitState, DelayPolicy,
    PolicyKind,
};
pub use gqlclient_telemetry::ClientMetrics;
