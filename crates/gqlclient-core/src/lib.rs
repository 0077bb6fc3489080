//! # gqlclient-core
//!
//! Core types for the resilient GraphQL client:
//! - Request, options, and caching-strategy types
//! - Cache-key fingerprinting with structural equality
//! - Typed response envelope and the decoder seam
//! - Error taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use error::{GraphqlClientError, Result};
pub use request::{
    CacheKey, CachingStrategy, DataFetchingPolicy, GraphqlRequest, HttpMethod, RequestOptions,
};
pub use response::{
    DecodedEnvelope, DefaultDecoder, GraphqlResponse, RawResponse, ResponseDecoder,
};
