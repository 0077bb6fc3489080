//! # gqlclient-cache
//!
//! Named, bounded response caches keyed by request fingerprint, with
//! single-flight cache fills and selective, pattern-based invalidation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod invalidator;

pub use cache::{CacheStats, CachedResult, ResponseCache};
pub use invalidator::{CacheInvalidator, CacheRegistry};
