//! Error types for the GraphQL client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, GraphqlClientError>;

/// Errors that can occur when executing requests or invalidating caches.
#[derive(Error, Debug)]
pub enum GraphqlClientError {
    /// Configuration error during client setup.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// I/O failure before or while sending the request.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message describing the transport failure.
        message: String,
    },

    /// Non-success HTTP status (plain mode, undifferentiated).
    #[error("HTTP error: status {status}")]
    HttpStatus {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },

    /// Service unavailable (503), classified in fault-tolerant mode.
    #[error("Service unavailable ({status})")]
    ServiceUnavailable {
        /// HTTP status code (503).
        status: u16,
        /// Raw response body, if any.
        body: String,
    },

    /// Other 5xx server error, classified in fault-tolerant mode.
    #[error("Server error ({status})")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Raw response body, if any.
        body: String,
    },

    /// Connect or read timeout, classified in fault-tolerant mode.
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed milliseconds before the timeout fired.
        elapsed_ms: u64,
    },

    /// A circuit breaker is open; the request was never sent.
    #[error("Circuit breaker open for policy '{policy}'")]
    CircuitOpen {
        /// Name of the policy whose breaker is open.
        policy: String,
    },

    /// Response body could not be decoded into the requested types.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// Error message describing the decode failure.
        message: String,
    },

    /// An invalidation pattern failed to compile as a regular expression.
    #[error("Invalid invalidation pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern string.
        pattern: String,
        /// Compilation error message.
        message: String,
    },

    /// An invalidation request is missing a field required for its type.
    #[error("Missing required argument: {field}")]
    MissingArgument {
        /// Name of the missing field.
        field: String,
    },

    /// A cache-fill computation failed; the failure was logged and swallowed,
    /// leaving no result for this invocation.
    #[error("No response available: execution failed while filling cache '{cache_name}'")]
    ResponseUnavailable {
        /// Name of the cache whose fill computation failed.
        cache_name: String,
    },
}

impl GraphqlClientError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an undifferentiated HTTP status error.
    pub fn http_status(status: u16) -> Self {
        Self::HttpStatus { status }
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(status: u16, body: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            status,
            body: body.into(),
        }
    }

    /// Create a generic server error.
    pub fn server(status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// Create a circuit-open error.
    pub fn circuit_open(policy: impl Into<String>) -> Self {
        Self::CircuitOpen {
            policy: policy.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a pattern compilation error.
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a missing-argument error.
    pub fn missing_argument(field: impl Into<String>) -> Self {
        Self::MissingArgument {
            field: field.into(),
        }
    }

    /// Create a response-unavailable error.
    pub fn response_unavailable(cache_name: impl Into<String>) -> Self {
        Self::ResponseUnavailable {
            cache_name: cache_name.into(),
        }
    }

    /// Get the HTTP status code if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status }
            | Self::ServiceUnavailable { status, .. }
            | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check whether this error represents a 5xx-class server failure.
    pub fn is_server_class(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. } | Self::Server { .. }
        ) || matches!(self, Self::HttpStatus { status } if *status >= 500)
    }

    /// Check whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check whether this error is a fast-fail from an open breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}
