//! A registry of named clients plus the invalidation event that fans out to
//! them.

use crate::client::GraphqlClient;
use dashmap::DashMap;
use gqlclient_core::{GraphqlClientError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Holds every configured client under its identifier so embedding code can
/// look clients up by name and shut them all down together.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<String, Arc<GraphqlClient>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its configured identifier, replacing (and
    /// closing) any previous holder of that name.
    pub fn register(&self, client: GraphqlClient) -> Arc<GraphqlClient> {
        let identifier = client.config().identifier.clone();
        let client = Arc::new(client);
        if let Some(previous) = self
            .clients
            .insert(identifier.clone(), Arc::clone(&client))
        {
            previous.close();
        }
        info!(identifier = %identifier, "Registered GraphQL client");
        client
    }

    /// Look a client up by identifier.
    pub fn get(&self, identifier: &str) -> Option<Arc<GraphqlClient>> {
        self.clients.get(identifier).map(|e| Arc::clone(e.value()))
    }

    /// Remove and close the named client. Returns whether it existed.
    pub fn remove(&self, identifier: &str) -> bool {
        match self.clients.remove(identifier) {
            Some((_, client)) => {
                client.close();
                true
            }
            None => false,
        }
    }

    /// Apply one invalidation event to the named client's caches.
    pub fn invalidate(&self, identifier: &str, event: &InvalidationEvent) -> Result<()> {
        let client = self.get(identifier).ok_or_else(|| {
            GraphqlClientError::configuration(format!("No client registered as '{identifier}'"))
        })?;
        client.invalidate_cache(
            event.store_view.as_deref(),
            event.cache_names.as_deref(),
            event.patterns.as_deref(),
        )
    }

    /// Close every registered client and empty the registry.
    pub fn close_all(&self) {
        for entry in self.clients.iter() {
            entry.value().close();
        }
        self.clients.clear();
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether any client is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}

/// A selective-invalidation request, typically deserialized from an external
/// notification. Every field is optional; the fields are forwarded to the
/// invalidator verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    /// Store view scoping the removal, compared against the `Store` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_view: Option<String>,
    /// Names of the caches to invalidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_names: Option<Vec<String>>,
    /// Regular expressions matched against serialized response bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

impl InvalidationEvent {
    /// An event with no filters, i.e. "invalidate everything".
    pub fn all() -> Self {
        Self::default()
    }

    /// Opt-in strictness: pattern invalidation without a store view always
    /// matches nothing, which callers usually do not intend.
    pub fn validate(&self) -> Result<()> {
        let has_patterns = self
            .patterns
            .as_ref()
            .is_some_and(|p| p.iter().any(|s| !s.trim().is_empty()));
        if has_patterns && self.store_view.is_none() {
            return Err(GraphqlClientError::missing_argument("storeView"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(identifier: &str) -> GraphqlClient {
        GraphqlClient::builder()
            .endpoint("https://example.com/graphql")
            .identifier(identifier)
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ClientRegistry::new();
        registry.register(test_client("catalog"));

        assert!(registry.get("catalog").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_replaces_and_closes_previous() {
        let registry = ClientRegistry::new();
        let first = registry.register(test_client("catalog"));
        registry.register(test_client("catalog"));

        assert!(first.is_closed());
        assert_eq!(registry.len(), 1);
        assert!(!registry.get("catalog").unwrap().is_closed());
    }

    #[test]
    fn test_remove_closes_client() {
        let registry = ClientRegistry::new();
        let client = registry.register(test_client("catalog"));

        assert!(registry.remove("catalog"));
        assert!(client.is_closed());
        assert!(!registry.remove("catalog"));
    }

    #[test]
    fn test_close_all() {
        let registry = ClientRegistry::new();
        let a = registry.register(test_client("a"));
        let b = registry.register(test_client("b"));

        registry.close_all();
        assert!(registry.is_empty());
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[test]
    fn test_invalidate_unknown_client_fails() {
        let registry = ClientRegistry::new();
        let result = registry.invalidate("missing", &InvalidationEvent::all());
        assert!(matches!(
            result,
            Err(GraphqlClientError::Configuration { .. })
        ));
    }

    #[test]
    fn test_event_deserializes_camel_case() {
        let event: InvalidationEvent = serde_json::from_str(
            r#"{"storeView":"default","cacheNames":["products"],"patterns":["sku"]}"#,
        )
        .unwrap();
        assert_eq!(event.store_view.as_deref(), Some("default"));
        assert_eq!(event.cache_names.as_deref(), Some(&["products".to_string()][..]));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_store_view_with_patterns() {
        let event = InvalidationEvent {
            patterns: Some(vec!["sku".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            event.validate(),
            Err(GraphqlClientError::MissingArgument { .. })
        ));

        // Blank patterns do not trigger the check.
        let event = InvalidationEvent {
            patterns: Some(vec!["  ".to_string()]),
            ..Default::default()
        };
        assert!(event.validate().is_ok());
    }
}
