//! Request types and cache-key fingerprinting.
//!
//! Equality and hashing are structural: two requests with the same query,
//! operation name, and variables content collapse to the same fingerprint
//! regardless of how the variables object was assembled.

use crate::response::ResponseDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// HTTP method used to send a request to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Query parameters, URL-encoded.
    Get,
    /// JSON body.
    Post,
}

/// How a request interacts with a named cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataFetchingPolicy {
    /// Consult the cache first, compute through on miss.
    CacheFirst,
    /// Bypass the cache entirely.
    NetworkOnly,
}

/// Names the cache a request reads from / writes to, and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachingStrategy {
    /// Name of the cache, as configured at client construction.
    pub cache_name: String,
    /// Data-fetching policy for this request.
    pub policy: DataFetchingPolicy,
}

impl CachingStrategy {
    /// Create a strategy targeting the named cache.
    pub fn new(cache_name: impl Into<String>, policy: DataFetchingPolicy) -> Self {
        Self {
            cache_name: cache_name.into(),
            policy,
        }
    }

    /// Convenience constructor for a cache-first strategy.
    pub fn cache_first(cache_name: impl Into<String>) -> Self {
        Self::new(cache_name, DataFetchingPolicy::CacheFirst)
    }
}

/// A GraphQL request: query text, optional operation name, optional variables.
///
/// Serializes to the standard POST envelope
/// (`{"query": ..., "operationName": ..., "variables": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlRequest {
    /// The query document.
    pub query: String,
    /// Optional operation name.
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Optional variables payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlRequest {
    /// Create a request with only a query document.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Set the variables payload.
    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Whether the query document is a mutation. Mutations are never read
    /// from or written to cache.
    pub fn is_mutation(&self) -> bool {
        self.query.trim_start().starts_with("mutation")
    }
}

impl Hash for GraphqlRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.operation_name.hash(state);
        match &self.variables {
            Some(value) => {
                state.write_u8(1);
                hash_json_value(value, state);
            }
            None => state.write_u8(0),
        }
    }
}

/// Hash a JSON value deterministically. `serde_json` maps are sorted by key,
/// so object member order cannot influence the result.
fn hash_json_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(2);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_json_value(item, state);
            }
        }
        Value::Object(map) => {
            state.write_u8(5);
            state.write_usize(map.len());
            for (key, item) in map {
                key.hash(state);
                hash_json_value(item, state);
            }
        }
    }
}

/// Per-request options: method override, custom headers, decoder override,
/// and caching strategy.
///
/// Equality is structural over these fields; absent (`None`) headers are
/// distinct from an empty list. The decoder override compares by pointer
/// identity since a decode function has no structural content.
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// HTTP method override for this request.
    pub method: Option<HttpMethod>,
    /// Custom headers, merged over the client's static headers
    /// (per-request wins on name conflict).
    pub headers: Option<Vec<(String, String)>>,
    /// Decoder override for this request.
    pub decoder: Option<Arc<dyn ResponseDecoder>>,
    /// Caching strategy for this request.
    pub caching: Option<CachingStrategy>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a custom header, creating the header list if absent.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    /// Replace the full header list.
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Override the response decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn ResponseDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Set the caching strategy.
    #[must_use]
    pub fn with_caching(mut self, caching: CachingStrategy) -> Self {
        self.caching = Some(caching);
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }
}

impl PartialEq for RequestOptions {
    fn eq(&self, other: &Self) -> bool {
        let decoder_eq = match (&self.decoder, &other.decoder) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        decoder_eq
            && self.method == other.method
            && self.headers == other.headers
            && self.caching == other.caching
    }
}

impl Eq for RequestOptions {}

impl Hash for RequestOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.headers.hash(state);
        self.decoder.is_some().hash(state);
        self.caching.hash(state);
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("has_decoder", &self.decoder.is_some())
            .field("caching", &self.caching)
            .finish()
    }
}

/// Fingerprint of a `(request, options)` pair used as a cache key.
///
/// The 64-bit hash is computed once at construction; two keys are equal iff
/// both components are equal.
#[derive(Debug, Clone)]
pub struct CacheKey {
    request: GraphqlRequest,
    options: RequestOptions,
    hash: u64,
}

impl CacheKey {
    /// Fingerprint a request and its options.
    pub fn new(request: GraphqlRequest, options: RequestOptions) -> Self {
        let mut hasher = DefaultHasher::new();
        request.hash(&mut hasher);
        options.hash(&mut hasher);
        let hash = hasher.finish();
        Self {
            request,
            options,
            hash,
        }
    }

    /// The fingerprinted request.
    pub fn request(&self) -> &GraphqlRequest {
        &self.request
    }

    /// The fingerprinted options.
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.request == other.request && self.options == other.options
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fingerprint(request: GraphqlRequest, options: RequestOptions) -> u64 {
        let mut hasher = DefaultHasher::new();
        CacheKey::new(request, options).hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_requests_share_fingerprint() {
        let r1 = GraphqlRequest::new("{products{sku}}")
            .with_operation_name("Products")
            .with_variables(json!({"a": 1, "b": "x"}));
        let r2 = GraphqlRequest::new("{products{sku}}")
            .with_operation_name("Products")
            .with_variables(json!({"b": "x", "a": 1}));

        assert_eq!(r1, r2);
        assert_eq!(
            fingerprint(r1, RequestOptions::new()),
            fingerprint(r2, RequestOptions::new())
        );
    }

    #[test]
    fn test_changed_component_changes_fingerprint() {
        let base = GraphqlRequest::new("{products{sku}}")
            .with_operation_name("Products")
            .with_variables(json!({"a": 1}));
        let baseline = fingerprint(base.clone(), RequestOptions::new());

        let changed_query = GraphqlRequest {
            query: "{products{name}}".into(),
            ..base.clone()
        };
        assert_ne!(fingerprint(changed_query, RequestOptions::new()), baseline);

        let changed_op = base.clone().with_operation_name("Other");
        assert_ne!(fingerprint(changed_op, RequestOptions::new()), baseline);

        let changed_vars = base.with_variables(json!({"a": 2}));
        assert_ne!(fingerprint(changed_vars, RequestOptions::new()), baseline);
    }

    #[test]
    fn test_none_headers_distinct_from_empty() {
        let none = RequestOptions::new();
        let empty = RequestOptions::new().with_headers(Vec::new());
        assert_ne!(none, empty);
    }

    #[test]
    fn test_options_equality_covers_all_fields() {
        let a = RequestOptions::new()
            .with_method(HttpMethod::Get)
            .with_header("Store", "default")
            .with_caching(CachingStrategy::cache_first("products"));
        let b = RequestOptions::new()
            .with_method(HttpMethod::Get)
            .with_header("Store", "default")
            .with_caching(CachingStrategy::cache_first("products"));
        assert_eq!(a, b);

        let c = b.clone().with_method(HttpMethod::Post);
        assert_ne!(a, c);
    }

    #[test]
    fn test_header_value_case_insensitive() {
        let options = RequestOptions::new().with_header("Store", "default");
        assert_eq!(options.header_value("store"), Some("default"));
        assert_eq!(options.header_value("STORE"), Some("default"));
        assert_eq!(options.header_value("other"), None);
    }

    #[test]
    fn test_is_mutation() {
        assert!(GraphqlRequest::new("mutation {createOrder}").is_mutation());
        assert!(GraphqlRequest::new("  mutation M {createOrder}").is_mutation());
        assert!(!GraphqlRequest::new("{products{sku}}").is_mutation());
        assert!(!GraphqlRequest::new("query {products}").is_mutation());
    }

    #[test]
    fn test_post_envelope_serialization() {
        let request = GraphqlRequest::new("{x}").with_variables(json!({"k": "v"}));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"query": "{x}", "variables": {"k": "v"}}));
    }
}
