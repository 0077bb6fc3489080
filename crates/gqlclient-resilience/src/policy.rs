//! Failure classifiers and breaker composition.
//!
//! Three independent policies guard the transport call. A failure type not
//! classified by a policy never touches that policy's breaker, but may still
//! trip another whose classifier matches.

use crate::circuit_breaker::{
    BreakerConfig, BreakerStats, CircuitBreaker, DelayPolicy,
};
use gqlclient_core::GraphqlClientError;
use std::time::Duration;

/// The three failure classes with dedicated breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Classifies the specific service-unavailable (503) status.
    ServiceUnavailable,
    /// Classifies any other 5xx status.
    ServerError,
    /// Classifies connect/read timeout failures.
    SocketTimeout,
}

impl PolicyKind {
    /// Stable policy name, used in `CircuitOpen` errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::ServiceUnavailable => "service-unavailable",
            Self::ServerError => "server-error",
            Self::SocketTimeout => "socket-timeout",
        }
    }

    /// Whether this policy classifies the given failure.
    pub fn handles(self, error: &GraphqlClientError) -> bool {
        match self {
            Self::ServiceUnavailable => {
                matches!(error, GraphqlClientError::ServiceUnavailable { .. })
            }
            Self::ServerError => matches!(error, GraphqlClientError::Server { .. }),
            Self::SocketTimeout => matches!(error, GraphqlClientError::Timeout { .. }),
        }
    }

    fn default_config(self) -> BreakerConfig {
        match self {
            Self::ServiceUnavailable => BreakerConfig {
                failure_threshold: 3,
                success_threshold: 1,
                delay: DelayPolicy::Progressive {
                    initial: Duration::from_secs(20),
                    multiplier: 1.5,
                    max: Duration::from_secs(300),
                },
            },
            Self::ServerError => BreakerConfig {
                failure_threshold: 5,
                success_threshold: 1,
                delay: DelayPolicy::Constant(Duration::from_secs(30)),
            },
            Self::SocketTimeout => BreakerConfig {
                failure_threshold: 3,
                success_threshold: 1,
                delay: DelayPolicy::Progressive {
                    initial: Duration::from_secs(10),
                    multiplier: 1.5,
                    max: Duration::from_secs(300),
                },
            },
        }
    }
}

/// Per-policy breaker configuration for the chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainConfig {
    /// Service-unavailable breaker configuration.
    pub service_unavailable: BreakerConfig,
    /// Generic server-error breaker configuration.
    pub server_error: BreakerConfig,
    /// Socket-timeout breaker configuration.
    pub socket_timeout: BreakerConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            service_unavailable: PolicyKind::ServiceUnavailable.default_config(),
            server_error: PolicyKind::ServerError.default_config(),
            socket_timeout: PolicyKind::SocketTimeout.default_config(),
        }
    }
}

struct Policy {
    kind: PolicyKind,
    breaker: CircuitBreaker,
}

/// All three breakers chained around one transport call.
pub struct BreakerChain {
    policies: [Policy; 3],
}

impl BreakerChain {
    /// Build the chain from per-policy configuration.
    pub fn new(config: ChainConfig) -> Self {
        let policy = |kind: PolicyKind, config: BreakerConfig| Policy {
            kind,
            breaker: CircuitBreaker::new(kind.name(), config),
        };
        Self {
            policies: [
                policy(PolicyKind::ServiceUnavailable, config.service_unavailable),
                policy(PolicyKind::ServerError, config.server_error),
                policy(PolicyKind::SocketTimeout, config.socket_timeout),
            ],
        }
    }

    /// Build the chain with default per-policy configuration.
    pub fn with_defaults() -> Self {
        Self::new(ChainConfig::default())
    }

    /// Check every breaker before dialing. Any open breaker short-circuits
    /// the call; the transport is never invoked.
    ///
    /// # Errors
    /// Returns `GraphqlClientError::CircuitOpen` naming the first open
    /// policy.
    pub fn check(&self) -> Result<(), GraphqlClientError> {
        for (index, policy) in self.policies.iter().enumerate() {
            if let Err(error) = policy.breaker.check() {
                // A rejected call never dials, so any trial slot a
                // half-open breaker earlier in the chain handed out must
                // be given back.
                for admitted in &self.policies[..index] {
                    admitted.breaker.release_probe();
                }
                return Err(error);
            }
        }
        Ok(())
    }

    /// Record a successful call on every breaker.
    pub fn on_success(&self) {
        for policy in &self.policies {
            policy.breaker.record_success();
        }
    }

    /// Record a failure on the breakers whose classifier matches it. The
    /// others keep their counters untouched but get their half-open trial
    /// slot back, since the call they admitted produced no signal for them.
    pub fn on_failure(&self, error: &GraphqlClientError) {
        for policy in &self.policies {
            if policy.kind.handles(error) {
                policy.breaker.record_failure();
            } else {
                policy.breaker.release_probe();
            }
        }
    }

    /// The breaker owned by the given policy.
    pub fn breaker(&self, kind: PolicyKind) -> &CircuitBreaker {
        &self
            .policies
            .iter()
            .find(|p| p.kind == kind)
            .unwrap_or(&self.policies[0])
            .breaker
    }

    /// Snapshot of every breaker's statistics.
    pub fn stats(&self) -> Vec<(PolicyKind, BreakerStats)> {
        self.policies
            .iter()
            .map(|p| (p.kind, p.breaker.stats()))
            .collect()
    }
}

impl std::fmt::Debug for BreakerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerChain")
            .field("stats", &self.stats())
            .finish()
    }
}
