//! # gqlclient-resilience
//!
//! Circuit breakers for the fault-tolerant execution path. Each failure
//! class (service-unavailable, generic server error, socket timeout) owns an
//! independent breaker with its own threshold and delay shape; the chain
//! composes the three around one transport call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod policy;

pub use circuit_breaker::{
    BreakerConfig, BreakerStats, CircuitBreaker, CircuitState, DelayPolicy,
};
pub use policy::{BreakerChain, ChainConfig, PolicyKind};
